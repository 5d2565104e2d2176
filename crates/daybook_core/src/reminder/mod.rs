//! Task reminder scheduling and delivery.
//!
//! # Responsibility
//! - Register reminders with an alarm facility keyed by reminder id.
//! - Turn fired alarm payloads into rendered notifications.
//!
//! # Invariants
//! - A reminder id maps to at most one pending alarm; re-scheduling replaces.
//! - Fired and cancelled reminders are forgotten by the registry.
//! - Pending reminders live only in the alarm registry, never in the database.

pub mod alarm;
pub mod item;
pub mod receiver;
pub mod scheduler;

pub use alarm::TokioAlarmRegistry;
pub use item::{ReminderError, ReminderId, ReminderItem};
pub use receiver::{
    LogNotificationSink, Notification, NotificationSink, ReminderReceiver,
    DEFAULT_REMINDER_TITLE, REMINDER_CHANNEL_ID,
};
pub use scheduler::{AlarmRegistry, ReminderScheduler};
