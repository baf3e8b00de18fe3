//! SQLite-based task store.

use super::{now_string, NewTask, StoreError, TaskFilter, TaskPatch, TaskStore, TaskTiming};
use crate::task::{DayOfWeek, TaskRecord};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    "desc" TEXT,
    day_of_week TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    all_day INTEGER NOT NULL DEFAULT 0,
    is_recurring INTEGER NOT NULL DEFAULT 0,
    is_fixed INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER,
    deadline TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
CREATE INDEX IF NOT EXISTS idx_tasks_user_start ON tasks(user_id, start_time);
CREATE INDEX IF NOT EXISTS idx_tasks_start ON tasks(start_time);
"#;

const SELECT_COLS: &str = r#"id, user_id, title, "desc", day_of_week, start_time, end_time,
 all_day, is_recurring, is_fixed, is_completed, deadline, created_at, updated_at"#;

/// Lexicographically sortable storage format for task timestamps.
const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to create data dir: {}", e)))?;
        let db_path = data_dir.join("tasks.db");

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| StoreError::Backend(format!("Failed to open SQLite database: {}", e)))?;

            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::Backend(format!("Failed to run schema: {}", e)))?;

            // Run migrations for existing databases
            Self::run_migrations(&conn)?;

            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run database migrations for existing databases.
    /// CREATE TABLE IF NOT EXISTS doesn't add columns to existing tables,
    /// so schema changes are handled manually.
    fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
        // 'is_completed' arrived after the initial schema.
        let has_is_completed: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('tasks') WHERE name = 'is_completed'")
            .map_err(|e| StoreError::Backend(format!("Failed to check for is_completed column: {}", e)))?
            .exists([])
            .map_err(|e| StoreError::Backend(format!("Failed to query table info: {}", e)))?;

        if !has_is_completed {
            tracing::info!("Running migration: adding 'is_completed' column to tasks table");
            conn.execute("ALTER TABLE tasks ADD COLUMN is_completed INTEGER", [])
                .map_err(|e| StoreError::Backend(format!("Failed to add is_completed column: {}", e)))?;
        }

        Ok(())
    }
}

fn format_dt(dt: NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DT_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let day: String = row.get(4)?;
    let start: String = row.get(5)?;
    let end: String = row.get(6)?;
    let deadline: Option<String> = row.get(11)?;

    Ok(TaskRecord {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        title: row.get(2)?,
        desc: row.get(3)?,
        day_of_week: DayOfWeek::from_name(&day).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("invalid day_of_week: {}", day).into(),
            )
        })?,
        start_time: parse_dt(5, &start)?,
        end_time: parse_dt(6, &end)?,
        all_day: row.get(7)?,
        is_recurring: row.get(8)?,
        is_fixed: row.get(9)?,
        is_completed: row.get(10)?,
        deadline: deadline.as_deref().map(|s| parse_dt(11, s)).transpose()?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn backend(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("{}: {}", context, e))
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let conn = self.conn.clone();
        let filter = *filter;
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut sql = format!("SELECT {} FROM tasks WHERE user_id = ?", SELECT_COLS);
            let mut bind: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];
            if let Some(day) = filter.day_of_week {
                sql.push_str(" AND day_of_week = ?");
                bind.push(Box::new(day.as_str()));
            }
            if let Some(recurring) = filter.is_recurring {
                sql.push_str(" AND is_recurring = ?");
                bind.push(Box::new(recurring));
            }
            if let Some(fixed) = filter.is_fixed {
                sql.push_str(" AND is_fixed = ?");
                bind.push(Box::new(fixed));
            }
            if let Some(completed) = filter.is_completed {
                // Unset is_completed counts as incomplete.
                sql.push_str(" AND COALESCE(is_completed, 0) = ?");
                bind.push(Box::new(completed));
            }
            sql.push_str(" ORDER BY start_time");

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| backend("Failed to prepare listing", e))?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(bind.iter().map(|b| b.as_ref())),
                    task_from_row,
                )
                .map_err(|e| backend("Failed to list tasks", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| backend("Failed to read task row", e))
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let sql = format!(
                "SELECT {} FROM tasks WHERE user_id = ? AND id = ?",
                SELECT_COLS
            );
            conn.query_row(
                &sql,
                params![user_id.to_string(), id.to_string()],
                task_from_row,
            )
            .optional()
            .map_err(|e| backend("Failed to get task", e))
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn create_task(&self, user_id: Uuid, task: &NewTask) -> Result<TaskRecord, StoreError> {
        let conn = self.conn.clone();
        let task = task.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let now = now_string();
            let record = TaskRecord {
                id: Uuid::new_v4(),
                user_id,
                title: task.title.clone(),
                desc: task.desc.clone(),
                day_of_week: task.day_of_week,
                start_time: task.start_time,
                end_time: task.end_time,
                all_day: task.all_day,
                is_recurring: task.is_recurring,
                is_fixed: task.is_fixed,
                is_completed: task.is_completed,
                deadline: task.deadline,
                created_at: now.clone(),
                updated_at: now,
            };
            conn.execute(
                r#"INSERT INTO tasks
                   (id, user_id, title, "desc", day_of_week, start_time, end_time,
                    all_day, is_recurring, is_fixed, is_completed, deadline, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    record.id.to_string(),
                    record.user_id.to_string(),
                    record.title,
                    record.desc,
                    record.day_of_week.as_str(),
                    format_dt(record.start_time),
                    format_dt(record.end_time),
                    record.all_day,
                    record.is_recurring,
                    record.is_fixed,
                    record.is_completed,
                    record.deadline.map(format_dt),
                    record.created_at,
                    record.updated_at,
                ],
            )
            .map_err(|e| backend("Failed to create task", e))?;
            Ok(record)
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, StoreError> {
        let conn = self.conn.clone();
        let patch = patch.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let sql = format!(
                "SELECT {} FROM tasks WHERE user_id = ? AND id = ?",
                SELECT_COLS
            );
            let mut record = conn
                .query_row(
                    &sql,
                    params![user_id.to_string(), id.to_string()],
                    task_from_row,
                )
                .optional()
                .map_err(|e| backend("Failed to read task for update", e))?
                .ok_or(StoreError::NotFound)?;

            patch.apply(&mut record);
            record.updated_at = now_string();

            conn.execute(
                r#"UPDATE tasks SET
                   title = ?, "desc" = ?, day_of_week = ?, start_time = ?, end_time = ?,
                   all_day = ?, is_recurring = ?, is_fixed = ?, is_completed = ?,
                   deadline = ?, updated_at = ?
                   WHERE id = ?"#,
                params![
                    record.title,
                    record.desc,
                    record.day_of_week.as_str(),
                    format_dt(record.start_time),
                    format_dt(record.end_time),
                    record.all_day,
                    record.is_recurring,
                    record.is_fixed,
                    record.is_completed,
                    record.deadline.map(format_dt),
                    record.updated_at,
                    record.id.to_string(),
                ],
            )
            .map_err(|e| backend("Failed to update task", e))?;
            Ok(record)
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn update_timing(
        &self,
        id: Uuid,
        timing: &TaskTiming,
        expected_updated_at: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let timing = *timing;
        let expected = expected_updated_at.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let now = now_string();
            let changed = match &expected {
                Some(token) => conn
                    .execute(
                        "UPDATE tasks SET day_of_week = ?, start_time = ?, end_time = ?, updated_at = ?
                         WHERE id = ? AND updated_at = ?",
                        params![
                            timing.day_of_week.as_str(),
                            format_dt(timing.start_time),
                            format_dt(timing.end_time),
                            now,
                            id.to_string(),
                            token,
                        ],
                    )
                    .map_err(|e| backend("Failed to update timing", e))?,
                None => conn
                    .execute(
                        "UPDATE tasks SET day_of_week = ?, start_time = ?, end_time = ?, updated_at = ?
                         WHERE id = ?",
                        params![
                            timing.day_of_week.as_str(),
                            format_dt(timing.start_time),
                            format_dt(timing.end_time),
                            now,
                            id.to_string(),
                        ],
                    )
                    .map_err(|e| backend("Failed to update timing", e))?,
            };
            if changed > 0 {
                return Ok(());
            }
            let exists: bool = conn
                .prepare("SELECT 1 FROM tasks WHERE id = ?")
                .map_err(|e| backend("Failed to prepare existence check", e))?
                .exists(params![id.to_string()])
                .map_err(|e| backend("Failed to check task existence", e))?;
            if exists {
                Err(StoreError::Stale)
            } else {
                Err(StoreError::NotFound)
            }
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let deleted = conn
                .execute(
                    "DELETE FROM tasks WHERE user_id = ? AND id = ?",
                    params![user_id.to_string(), id.to_string()],
                )
                .map_err(|e| backend("Failed to delete task", e))?;
            if deleted == 0 {
                Err(StoreError::NotFound)
            } else {
                Ok(())
            }
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }

    async fn list_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let sql = format!(
                "SELECT {} FROM tasks WHERE start_time >= ? AND start_time < ? ORDER BY start_time",
                SELECT_COLS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| backend("Failed to prepare due scan", e))?;
            let rows = stmt
                .query_map(params![format_dt(from), format_dt(to)], task_from_row)
                .map_err(|e| backend("Failed to scan due tasks", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| backend("Failed to read task row", e))
        })
        .await
        .map_err(|e| backend("Task join error", e))?
    }
}
