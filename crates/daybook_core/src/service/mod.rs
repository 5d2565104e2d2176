//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls, cached list loaders and reminders.
//! - Keep host/UI layers decoupled from storage details.

pub mod task_service;
