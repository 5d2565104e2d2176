//! Repository contracts and SQLite persistence.
//!
//! # Responsibility
//! - Define data access contracts used by services and loaders.
//! - Isolate SQLite query details from use-case orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod task_repo;
