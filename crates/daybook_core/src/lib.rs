//! Core logic for the Daybook task manager.
//!
//! Hosts the cached reactive loaders that feed view-models, task storage,
//! and reminder scheduling/delivery.

pub mod clock;
pub mod db;
pub mod flow;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use flow::{
    BlockingLoader, LazyFlowLoader, LazyFlowLoaderFactory, LoadFailure, LoaderConfig, LoaderError,
    LoaderErrorKind, ResultContainer, ResultStream, ValueLoader,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::task::{DayAgenda, NewTask, Task, TaskId, TaskValidationError};
pub use reminder::{
    AlarmRegistry, LogNotificationSink, Notification, NotificationSink, ReminderError,
    ReminderItem, ReminderReceiver, ReminderScheduler, TokioAlarmRegistry,
};
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use service::task_service::{TaskService, TaskServiceError, TaskServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
