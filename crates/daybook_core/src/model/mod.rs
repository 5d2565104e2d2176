//! Domain model for tasks and their view projections.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Timestamps are Unix epoch milliseconds.

pub mod task;
