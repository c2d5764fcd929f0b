//! Pure transforms over tree snapshots.
//!
//! # Responsibility
//! - Build, prune, edit and reorder document/folder trees.
//! - Propagate multi-select state across folder boundaries.
//!
//! # Invariants
//! - Every function takes a snapshot by reference and returns a new one.
//! - Invalid requests are no-ops; malformed input is recovered, never raised.

pub mod action;
pub mod convert;
pub mod invariants;
pub mod mutate;
pub mod order;
pub mod prune;
pub mod selection;
