//! In-process alarm facility backed by tokio timers.
//!
//! # Invariants
//! - One timer task per reminder id; setting an id again aborts the old timer.
//! - A timer removes its own entry before delivering, and only if it has not
//!   been replaced in the meantime.

use crate::clock::Clock;
use crate::reminder::item::{ReminderError, ReminderId};
use crate::reminder::receiver::ReminderReceiver;
use crate::reminder::scheduler::AlarmRegistry;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct PendingAlarm {
    token: u64,
    fire_at: i64,
    timer: JoinHandle<()>,
}

struct AlarmState {
    alarms: Mutex<HashMap<ReminderId, PendingAlarm>>,
    next_token: AtomicU64,
    receiver: ReminderReceiver,
}

impl AlarmState {
    fn alarms(&self) -> MutexGuard<'_, HashMap<ReminderId, PendingAlarm>> {
        self.alarms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, id: ReminderId, token: u64, payload: &str) {
        {
            let mut alarms = self.alarms();
            let is_current = alarms
                .get(&id)
                .is_some_and(|pending| pending.token == token);
            if !is_current {
                debug!(
                    "event=alarm_fire module=reminder status=skipped id={} reason=replaced",
                    id
                );
                return;
            }
            alarms.remove(&id);
        }

        if let Err(err) = self.receiver.on_receive(payload) {
            warn!(
                "event=alarm_fire module=reminder status=error id={} error={}",
                id, err
            );
        }
    }
}

/// Alarm registry that fires reminders from tokio timer tasks.
#[derive(Clone)]
pub struct TokioAlarmRegistry {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    state: Arc<AlarmState>,
}

impl TokioAlarmRegistry {
    pub fn new(runtime: Handle, clock: Arc<dyn Clock>, receiver: ReminderReceiver) -> Self {
        Self {
            runtime,
            clock,
            state: Arc::new(AlarmState {
                alarms: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                receiver,
            }),
        }
    }

    /// Fire time of the pending alarm for `id`.
    pub fn fire_at(&self, id: ReminderId) -> Option<i64> {
        self.state.alarms().get(&id).map(|pending| pending.fire_at)
    }

    /// Aborts every pending timer.
    pub fn cancel_all(&self) -> usize {
        let mut alarms = self.state.alarms();
        let count = alarms.len();
        for (_, pending) in alarms.drain() {
            pending.timer.abort();
        }
        count
    }
}

impl AlarmRegistry for TokioAlarmRegistry {
    fn set(&self, id: ReminderId, fire_at: i64, payload: String) -> Result<(), ReminderError> {
        let delay_ms = fire_at.saturating_sub(self.clock.now_ms()).max(0);
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        let token = self.state.next_token.fetch_add(1, Ordering::Relaxed);

        // Hold the map lock across spawn so the timer cannot observe the map
        // before its own entry is inserted.
        let mut alarms = self.state.alarms();
        let state = Arc::clone(&self.state);
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            state.fire(id, token, &payload);
        });

        if let Some(previous) = alarms.insert(
            id,
            PendingAlarm {
                token,
                fire_at,
                timer,
            },
        ) {
            previous.timer.abort();
            debug!(
                "event=alarm_set module=reminder status=replaced id={} previous_fire_at={}",
                id, previous.fire_at
            );
        }
        Ok(())
    }

    fn cancel(&self, id: ReminderId) -> bool {
        match self.state.alarms().remove(&id) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> Vec<ReminderId> {
        let mut ids: Vec<ReminderId> = self.state.alarms().keys().copied().collect();
        ids.sort();
        ids
    }
}
