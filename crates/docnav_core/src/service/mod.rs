//! Stateful use-case services over the pure tree transforms.
//!
//! # Responsibility
//! - Hold per-sidebar state (snapshot, selection, rollback point).
//! - Turn refused transforms into typed errors for the UI/FFI layers.

pub mod tree_service;
