//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by storage, services and views.
//! - Validate task fields before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` is never blank for persisted tasks.
//! - Timestamps are Unix epoch milliseconds and never negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a task; also keys the task's reminder.
pub type TaskId = Uuid;

/// Validation failures for task writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    NegativeTimestamp { field: &'static str, value: i64 },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
            Self::NegativeTimestamp { field, value } => {
                write!(f, "task field `{field}` cannot be negative, got {value}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Free-form details; empty when unset.
    pub notes: String,
    pub due_at: Option<i64>,
    /// When the reminder notification should fire.
    pub remind_at: Option<i64>,
    pub is_completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Creates an open task with a generated id.
    pub fn new(title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            notes: String::new(),
            due_at: None,
            remind_at: None,
            is_completed: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Checks field invariants required before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        for (field, value) in [
            ("due_at", self.due_at),
            ("remind_at", self.remind_at),
            ("created_at", Some(self.created_at)),
            ("updated_at", Some(self.updated_at)),
        ] {
            if let Some(value) = value {
                if value < 0 {
                    return Err(TaskValidationError::NegativeTimestamp { field, value });
                }
            }
        }
        Ok(())
    }

    /// Whether a reminder should be pending for this task at `now_ms`.
    pub fn wants_reminder(&self, now_ms: i64) -> bool {
        !self.is_completed && self.remind_at.is_some_and(|at| at > now_ms)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub notes: String,
    pub due_at: Option<i64>,
    pub remind_at: Option<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn due_at(mut self, epoch_ms: i64) -> Self {
        self.due_at = Some(epoch_ms);
        self
    }

    pub fn remind_at(mut self, epoch_ms: i64) -> Self {
        self.remind_at = Some(epoch_ms);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub(crate) fn into_task(self, now_ms: i64) -> Task {
        let mut task = Task::new(self.title, now_ms);
        task.notes = self.notes;
        task.due_at = self.due_at;
        task.remind_at = self.remind_at;
        task
    }
}

/// Today's tasks split by completion, as rendered by the agenda view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayAgenda {
    pub open: Vec<Task>,
    pub completed: Vec<Task>,
}

impl DayAgenda {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let (completed, open) = tasks.into_iter().partition(|task| task.is_completed);
        Self { open, completed }
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.completed.is_empty()
    }
}
