//! Fire-time delivery: payload in, rendered notification out.

use crate::reminder::item::{ReminderError, ReminderId, ReminderItem};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Notification channel all task reminders are posted to.
pub const REMINDER_CHANNEL_ID: &str = "task_reminders";
/// Title used when the host does not configure one.
pub const DEFAULT_REMINDER_TITLE: &str = "Reminder";

const MAX_BODY_CHARS: usize = 200;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Notification as handed to the platform notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: ReminderId,
    pub channel_id: &'static str,
    pub title: String,
    pub body: String,
}

impl Notification {
    /// Renders `item` with whitespace collapsed and the body length capped.
    pub fn for_reminder(item: &ReminderItem, title: &str) -> Self {
        Self {
            id: item.id,
            channel_id: REMINDER_CHANNEL_ID,
            title: title.to_string(),
            body: render_body(&item.text),
        }
    }
}

/// Platform notification boundary.
pub trait NotificationSink: Send + Sync + 'static {
    fn show(&self, notification: Notification) -> Result<(), ReminderError>;
}

/// Sink that only records notifications in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn show(&self, notification: Notification) -> Result<(), ReminderError> {
        info!(
            "event=notification_show module=reminder status=ok id={} channel={} body_chars={}",
            notification.id,
            notification.channel_id,
            notification.body.chars().count()
        );
        Ok(())
    }
}

/// Receives fired alarm payloads and posts the matching notification.
#[derive(Clone)]
pub struct ReminderReceiver {
    sink: Arc<dyn NotificationSink>,
    title: String,
}

impl ReminderReceiver {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_title(sink, DEFAULT_REMINDER_TITLE)
    }

    pub fn with_title(sink: Arc<dyn NotificationSink>, title: impl Into<String>) -> Self {
        Self {
            sink,
            title: title.into(),
        }
    }

    /// Handles one fired alarm.
    ///
    /// # Errors
    /// - `Payload` when the payload is not a reminder encoding.
    /// - Whatever the sink reports when posting fails.
    pub fn on_receive(&self, payload: &str) -> Result<ReminderId, ReminderError> {
        let item = match ReminderItem::from_payload(payload) {
            Ok(item) => item,
            Err(err) => {
                warn!(
                    "event=reminder_receive module=reminder status=error error_code=bad_payload error={}",
                    err
                );
                return Err(err);
            }
        };

        self.sink
            .show(Notification::for_reminder(&item, &self.title))?;
        info!(
            "event=reminder_receive module=reminder status=ok id={}",
            item.id
        );
        Ok(item.id)
    }
}

fn render_body(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    let mut body = collapsed.chars().take(MAX_BODY_CHARS).collect::<String>();
    if collapsed.chars().count() > MAX_BODY_CHARS {
        body.push_str("...");
    }
    body
}
