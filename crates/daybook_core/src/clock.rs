//! Wall-clock access in epoch milliseconds.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of "now" for scheduling and day-window queries.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic callers.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Returns `[start, end)` of the local calendar day containing `now_ms`.
pub fn local_day_bounds(now_ms: i64) -> (i64, i64) {
    let Some(now) = DateTime::<Utc>::from_timestamp_millis(now_ms) else {
        return (now_ms, now_ms + DAY_MS);
    };
    let today = now.with_timezone(&Local).date_naive();
    let start = local_midnight_ms(today);
    let end = today
        .succ_opt()
        .map_or(start + DAY_MS, local_midnight_ms);
    (start, end)
}

fn local_midnight_ms(day: NaiveDate) -> i64 {
    let midnight = day.and_time(NaiveTime::MIN);
    // Midnight can be skipped by a DST jump; fall back to the UTC reading.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc().timestamp_millis(), |dt| dt.timestamp_millis())
}
