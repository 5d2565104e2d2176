//! Reminder scheduling over an alarm facility.

use crate::clock::Clock;
use crate::reminder::item::{ReminderError, ReminderId, ReminderItem};
use log::{debug, info};
use std::sync::Arc;

/// Alarm facility contract.
///
/// Implementations deliver `payload` to a `ReminderReceiver` once `fire_at`
/// (epoch milliseconds) is reached, then forget the id.
pub trait AlarmRegistry: Send + Sync + 'static {
    /// Registers an alarm, replacing any pending alarm with the same id.
    fn set(&self, id: ReminderId, fire_at: i64, payload: String) -> Result<(), ReminderError>;
    /// Removes a pending alarm; returns whether one was pending.
    fn cancel(&self, id: ReminderId) -> bool;
    /// Ids of alarms that have not fired yet.
    fn pending(&self) -> Vec<ReminderId>;
}

/// Validates reminders and hands them to the alarm registry.
pub struct ReminderScheduler<A> {
    registry: Arc<A>,
    clock: Arc<dyn Clock>,
}

impl<A> Clone for ReminderScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<A: AlarmRegistry> ReminderScheduler<A> {
    pub fn new(registry: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn registry(&self) -> &Arc<A> {
        &self.registry
    }

    /// Schedules `item`; an earlier alarm for the same id is replaced.
    ///
    /// # Errors
    /// - `EmptyText` when the reminder text is blank.
    /// - `FireTimeNotInFuture` when `fire_at` is not after now.
    /// - Registry errors unchanged.
    pub fn schedule(&self, item: &ReminderItem) -> Result<(), ReminderError> {
        if item.text.trim().is_empty() {
            return Err(ReminderError::EmptyText(item.id));
        }
        let now = self.clock.now_ms();
        if item.fire_at <= now {
            return Err(ReminderError::FireTimeNotInFuture {
                id: item.id,
                fire_at: item.fire_at,
                now,
            });
        }

        self.registry.set(item.id, item.fire_at, item.to_payload()?)?;
        info!(
            "event=reminder_schedule module=reminder status=ok id={} delay_ms={}",
            item.id,
            item.fire_at - now
        );
        Ok(())
    }

    /// Cancels the pending reminder for `id`; returns whether one existed.
    pub fn cancel(&self, id: ReminderId) -> bool {
        let cancelled = self.registry.cancel(id);
        debug!(
            "event=reminder_cancel module=reminder status=ok id={} was_pending={}",
            id, cancelled
        );
        cancelled
    }

    pub fn is_scheduled(&self, id: ReminderId) -> bool {
        self.registry.pending().contains(&id)
    }

    pub fn pending(&self) -> Vec<ReminderId> {
        self.registry.pending()
    }
}
