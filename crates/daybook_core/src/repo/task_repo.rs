//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and list queries over the `tasks` table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before any SQL mutation.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - List order is `due_at` ascending with undated tasks last, then
//!   `created_at ASC, uuid ASC`.

use crate::db::{DbError, SharedConnection};
use crate::model::task::{Task, TaskId, TaskValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{MutexGuard, PoisonError};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    notes,
    due_at,
    remind_at,
    is_completed,
    created_at,
    updated_at
FROM tasks";

const TASK_ORDER_SQL: &str = " ORDER BY due_at IS NULL, due_at ASC, created_at ASC, uuid ASC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter and pagination options for listing tasks.
///
/// `due_from` is inclusive, `due_to` exclusive. Setting either bound
/// excludes undated tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub due_from: Option<i64>,
    pub due_to: Option<i64>,
    pub include_completed: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl TaskListQuery {
    /// Open tasks regardless of due date.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Tasks due in `[from, to)`, completed ones included.
    pub fn due_between(from: i64, to: i64) -> Self {
        Self {
            due_from: Some(from),
            due_to: Some(to),
            include_completed: true,
            ..Self::default()
        }
    }
}

/// Task persistence contract used by services and loaders.
pub trait TaskRepository: Send + Sync + 'static {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Open tasks whose reminder fires strictly after `now_ms`.
    fn list_upcoming_reminders(&self, now_ms: i64) -> RepoResult<Vec<Task>>;
}

/// SQLite-backed task repository over a shared connection.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    conn: SharedConnection,
}

impl SqliteTaskRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        self.conn().execute(
            "INSERT INTO tasks (
                uuid,
                title,
                notes,
                due_at,
                remind_at,
                is_completed,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.id.to_string(),
                task.title.as_str(),
                task.notes.as_str(),
                task.due_at,
                task.remind_at,
                i64::from(task.is_completed),
                task.created_at,
                task.updated_at,
            ],
        )?;

        Ok(task.id)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn().execute(
            "UPDATE tasks
             SET
                title = ?1,
                notes = ?2,
                due_at = ?3,
                remind_at = ?4,
                is_completed = ?5,
                updated_at = ?6
             WHERE uuid = ?7;",
            params![
                task.title.as_str(),
                task.notes.as_str(),
                task.due_at,
                task.remind_at,
                i64::from(task.is_completed),
                task.updated_at,
                task.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_completed {
            sql.push_str(" AND is_completed = 0");
        }
        if let Some(from) = query.due_from {
            sql.push_str(" AND due_at >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = query.due_to {
            sql.push_str(" AND due_at < ?");
            bind_values.push(Value::Integer(to));
        }

        sql.push_str(TASK_ORDER_SQL);

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM tasks WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_upcoming_reminders(&self, now_ms: i64) -> RepoResult<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE is_completed = 0
               AND remind_at IS NOT NULL
               AND remind_at > ?1
             ORDER BY remind_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([now_ms])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.uuid"))
    })?;

    let is_completed = match row.get::<_, i64>("is_completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_completed value `{other}` in tasks.is_completed"
            )));
        }
    };

    let task = Task {
        id,
        title: row.get("title")?,
        notes: row.get("notes")?,
        due_at: row.get("due_at")?,
        remind_at: row.get("remind_at")?,
        is_completed,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    task.validate()?;
    Ok(task)
}
