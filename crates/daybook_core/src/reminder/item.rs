//! Reminder record and its alarm payload encoding.

use crate::model::task::{Task, TaskId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reminders are keyed by the id of the task they belong to.
pub type ReminderId = TaskId;

/// Reminder scheduling and delivery errors.
#[derive(Debug)]
pub enum ReminderError {
    EmptyText(ReminderId),
    FireTimeNotInFuture {
        id: ReminderId,
        fire_at: i64,
        now: i64,
    },
    Payload(serde_json::Error),
    /// Raised by `AlarmRegistry` implementations that cannot register.
    Registry(String),
    /// Raised by `NotificationSink` implementations that cannot post.
    Delivery(String),
}

impl Display for ReminderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText(id) => write!(f, "reminder {id} has empty text"),
            Self::FireTimeNotInFuture { id, fire_at, now } => write!(
                f,
                "reminder {id} fire time {fire_at} is not after current time {now}"
            ),
            Self::Payload(err) => write!(f, "invalid reminder payload: {err}"),
            Self::Registry(message) => write!(f, "alarm registry failure: {message}"),
            Self::Delivery(message) => write!(f, "notification delivery failure: {message}"),
        }
    }
}

impl Error for ReminderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Payload(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ReminderError {
    fn from(value: serde_json::Error) -> Self {
        Self::Payload(value)
    }
}

/// A scheduled notification tied to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderItem {
    pub id: ReminderId,
    pub text: String,
    /// Unix epoch milliseconds.
    pub fire_at: i64,
}

impl ReminderItem {
    pub fn new(id: ReminderId, text: impl Into<String>, fire_at: i64) -> Self {
        Self {
            id,
            text: text.into(),
            fire_at,
        }
    }

    /// Builds the reminder for `task`, if the task carries a reminder time.
    pub fn for_task(task: &Task) -> Option<Self> {
        task.remind_at
            .map(|fire_at| Self::new(task.id, task.title.clone(), fire_at))
    }

    /// Encodes this reminder as the opaque payload handed to the alarm
    /// facility and returned at fire time.
    pub fn to_payload(&self) -> Result<String, ReminderError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self, ReminderError> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReminderError, ReminderItem};
    use crate::model::task::Task;

    #[test]
    fn for_task_requires_remind_at() {
        let mut task = Task::new("water plants", 0);
        assert!(ReminderItem::for_task(&task).is_none());

        task.remind_at = Some(5_000);
        let item = ReminderItem::for_task(&task).unwrap();
        assert_eq!(item.id, task.id);
        assert_eq!(item.text, "water plants");
        assert_eq!(item.fire_at, 5_000);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = ReminderItem::from_payload("{\"id\":").unwrap_err();
        assert!(matches!(err, ReminderError::Payload(_)));
    }
}
