//! Node and tree data model.
//!
//! # Responsibility
//! - Define the flat wire record and the nested snapshot shape.
//! - Keep display payload opaque to the tree engine.
//!
//! # Invariants
//! - Every node is identified by a backend-issued `NodeId`.
//! - Snapshots are immutable; structural edits produce new snapshots.

pub mod node;
