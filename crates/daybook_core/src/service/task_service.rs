//! Task use-case service.
//!
//! # Responsibility
//! - Provide task create/update/complete/delete entry points.
//! - Own one `LazyFlowLoader` per list query and refresh them after writes.
//! - Keep each task's reminder in step with its persisted state.
//!
//! # Invariants
//! - Every successful write refreshes all list loaders.
//! - A reminder is pending only for open tasks whose `remind_at` is in the
//!   future; any other write cancels it.
//! - Reminder failures never roll back a successful write.

use crate::clock::{local_day_bounds, Clock};
use crate::flow::{LazyFlowLoader, LazyFlowLoaderFactory, LoadFailure, ResultStream};
use crate::model::task::{DayAgenda, NewTask, Task, TaskId};
use crate::reminder::{AlarmRegistry, ReminderItem, ReminderScheduler};
use crate::repo::task_repo::{RepoError, TaskListQuery, TaskRepository};
use futures::StreamExt;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    TaskNotFound(TaskId),
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::TaskNotFound(_) => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Task service with cached list streams and reminder bookkeeping.
pub struct TaskService<R, A> {
    repo: Arc<R>,
    reminders: ReminderScheduler<A>,
    clock: Arc<dyn Clock>,
    today: LazyFlowLoader<Vec<Task>>,
    pending: LazyFlowLoader<Vec<Task>>,
}

impl<R, A> TaskService<R, A>
where
    R: TaskRepository,
    A: AlarmRegistry,
{
    /// Creates the service and its list loaders.
    ///
    /// Loaders read through `repo` on the blocking pool of the factory's
    /// runtime.
    pub fn new(
        repo: Arc<R>,
        reminders: ReminderScheduler<A>,
        factory: &LazyFlowLoaderFactory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let today = {
            let repo = Arc::clone(&repo);
            let clock = Arc::clone(&clock);
            factory.create_blocking("today_tasks", move || {
                let (from, to) = local_day_bounds(clock.now_ms());
                repo.list_tasks(&TaskListQuery::due_between(from, to))
                    .map_err(LoadFailure::from)
            })
        };
        let pending = {
            let repo = Arc::clone(&repo);
            factory.create_blocking("pending_tasks", move || {
                repo.list_tasks(&TaskListQuery::pending())
                    .map_err(LoadFailure::from)
            })
        };

        Self {
            repo,
            reminders,
            clock,
            today,
            pending,
        }
    }

    /// Today's tasks, split into open and completed.
    pub fn observe_today(&self) -> ResultStream<DayAgenda> {
        self.today
            .observe()
            .map(|state| state.map(DayAgenda::from_tasks))
            .boxed()
    }

    /// Open tasks ordered by due date, undated last.
    pub fn observe_pending(&self) -> ResultStream<Vec<Task>> {
        self.pending.observe()
    }

    /// Re-runs every list query for current subscribers.
    pub fn refresh_all(&self) {
        self.today.refresh();
        self.pending.refresh();
    }

    pub fn reminders(&self) -> &ReminderScheduler<A> {
        &self.reminders
    }

    /// Creates a task and schedules its reminder.
    pub fn add_task(&self, request: NewTask) -> TaskServiceResult<Task> {
        let task = request.into_task(self.clock.now_ms());
        self.repo.create_task(&task)?;
        info!("event=task_add module=service status=ok id={}", task.id);

        self.sync_reminder(&task);
        self.refresh_all();
        Ok(task)
    }

    /// Replaces a task's editable fields and re-syncs its reminder.
    ///
    /// `created_at` is kept from storage; `updated_at` is set to now.
    pub fn update_task(&self, task: &Task) -> TaskServiceResult<Task> {
        let stored = self.require_task(task.id)?;
        let mut next = task.clone();
        next.created_at = stored.created_at;
        next.updated_at = self.clock.now_ms();
        self.repo.update_task(&next)?;
        info!("event=task_update module=service status=ok id={}", next.id);

        self.sync_reminder(&next);
        self.refresh_all();
        Ok(next)
    }

    /// Marks a task completed or reopens it.
    pub fn set_completed(&self, id: TaskId, completed: bool) -> TaskServiceResult<Task> {
        let mut task = self.require_task(id)?;
        task.is_completed = completed;
        task.updated_at = self.clock.now_ms();
        self.repo.update_task(&task)?;
        info!(
            "event=task_complete module=service status=ok id={} completed={}",
            id, completed
        );

        self.sync_reminder(&task);
        self.refresh_all();
        Ok(task)
    }

    pub fn complete_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.set_completed(id, true)
    }

    /// Deletes a task and cancels its reminder.
    pub fn delete_task(&self, id: TaskId) -> TaskServiceResult<()> {
        self.repo.delete_task(id)?;
        self.reminders.cancel(id);
        info!("event=task_delete module=service status=ok id={}", id);

        self.refresh_all();
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.require_task(id)
    }

    /// Re-registers reminders for open tasks after a process restart.
    ///
    /// Returns the number of reminders scheduled.
    pub fn restore_reminders(&self) -> TaskServiceResult<usize> {
        let tasks = self.repo.list_upcoming_reminders(self.clock.now_ms())?;
        let mut scheduled = 0;
        for task in &tasks {
            if self.sync_reminder(task) {
                scheduled += 1;
            }
        }
        info!(
            "event=reminder_restore module=service status=ok candidates={} scheduled={}",
            tasks.len(),
            scheduled
        );
        Ok(scheduled)
    }

    fn require_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.repo
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }

    /// Returns whether a reminder is pending for `task` afterwards.
    fn sync_reminder(&self, task: &Task) -> bool {
        let item = match ReminderItem::for_task(task) {
            Some(item) if task.wants_reminder(self.clock.now_ms()) => item,
            _ => {
                self.reminders.cancel(task.id);
                return false;
            }
        };

        match self.reminders.schedule(&item) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=reminder_schedule module=service status=error id={} error={}",
                    task.id, err
                );
                false
            }
        }
    }
}
