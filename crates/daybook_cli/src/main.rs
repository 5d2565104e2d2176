//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `daybook_core` wiring end to end.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `daybook_cli [DB_PATH]`. Without a path an in-memory database is
//! used. Set `DAYBOOK_LOG_DIR` to enable file logging.

use daybook_core::db::{open_db_in_memory, open_shared_db, SharedConnection};
use daybook_core::{
    core_version, default_log_level, init_logging, Clock, LazyFlowLoaderFactory, LoaderConfig,
    LogNotificationSink, NewTask, ReminderReceiver, ReminderScheduler, ResultContainer,
    SqliteTaskRepository, SystemClock, TaskService, TokioAlarmRegistry,
};
use futures::StreamExt;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("DAYBOOK_LOG_DIR") {
        init_logging(default_log_level().as_str(), &log_dir)?;
    }
    println!("daybook_core version={}", core_version());

    let conn: SharedConnection = match std::env::args().nth(1) {
        Some(path) => open_shared_db(path)?,
        None => Arc::new(Mutex::new(open_db_in_memory()?)),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = TokioAlarmRegistry::new(
        Handle::current(),
        Arc::clone(&clock),
        ReminderReceiver::new(Arc::new(LogNotificationSink)),
    );
    let reminders = ReminderScheduler::new(Arc::new(registry), Arc::clone(&clock));
    let factory = LazyFlowLoaderFactory::new(Handle::current(), LoaderConfig::default());
    let service = TaskService::new(
        Arc::new(SqliteTaskRepository::new(conn)),
        reminders,
        &factory,
        Arc::clone(&clock),
    );

    let restored = service.restore_reminders()?;
    println!("reminders restored={restored}");

    let now = clock.now_ms();
    let task = service.add_task(
        NewTask::new("daybook smoke check")
            .due_at(now)
            .remind_at(now + 60_000),
    )?;
    println!(
        "task added id={} reminder_pending={}",
        task.id,
        service.reminders().is_scheduled(task.id)
    );

    let mut today = service.observe_today();
    while let Some(state) = today.next().await {
        match state {
            ResultContainer::Loading => println!("today state=loading"),
            ResultContainer::Done(agenda) => {
                println!(
                    "today state=done open={} completed={}",
                    agenda.open.len(),
                    agenda.completed.len()
                );
                break;
            }
            ResultContainer::Error(err) => {
                println!("today state=error {err}");
                break;
            }
        }
    }

    service.complete_task(task.id)?;
    let pending = service
        .observe_pending()
        .filter(|state| futures::future::ready(state.is_terminal()))
        .next()
        .await;
    if let Some(ResultContainer::Done(tasks)) = pending {
        println!("pending count={}", tasks.len());
    }

    factory.shutdown();
    Ok(())
}
