//! Task storage module with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing and ephemeral
//!   deployments)
//! - `sqlite`: SQLite database (WAL mode)
//!
//! Every read and mutation except the reconciliation writeback and the
//! reminder scan is scoped by the owning user at the query level; a row
//! belonging to another user is indistinguishable from a missing row.

mod memory;
mod sqlite;

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::task::{DayOfWeek, TaskRecord};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matches the `(user_id, id)` pair.
    #[error("task not found")]
    NotFound,
    /// The optimistic `updated_at` check failed: the row changed between the
    /// caller's read and this write.
    #[error("task was modified concurrently")]
    Stale,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Equality filters for task listings. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub day_of_week: Option<DayOfWeek>,
    pub is_recurring: Option<bool>,
    pub is_fixed: Option<bool>,
    pub is_completed: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &TaskRecord) -> bool {
        if let Some(day) = self.day_of_week {
            if task.day_of_week != day {
                return false;
            }
        }
        if let Some(recurring) = self.is_recurring {
            if task.is_recurring != recurring {
                return false;
            }
        }
        if let Some(fixed) = self.is_fixed {
            if task.is_fixed != fixed {
                return false;
            }
        }
        if let Some(completed) = self.is_completed {
            if task.is_completed.unwrap_or(false) != completed {
                return false;
            }
        }
        true
    }
}

/// Field set for task creation.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub desc: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub all_day: bool,
    pub is_recurring: bool,
    pub is_fixed: bool,
    pub is_completed: Option<bool>,
    pub deadline: Option<NaiveDateTime>,
}

/// Partial update. Each `Some` field is written; `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub all_day: Option<bool>,
    pub is_recurring: Option<bool>,
    pub is_fixed: Option<bool>,
    pub is_completed: Option<bool>,
    pub deadline: Option<NaiveDateTime>,
}

impl TaskPatch {
    /// Apply the patch to a record in place (bookkeeping fields excluded).
    pub(crate) fn apply(&self, task: &mut TaskRecord) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(desc) = &self.desc {
            task.desc = Some(desc.clone());
        }
        if let Some(day) = self.day_of_week {
            task.day_of_week = day;
        }
        if let Some(start) = self.start_time {
            task.start_time = start;
        }
        if let Some(end) = self.end_time {
            task.end_time = end;
        }
        if let Some(all_day) = self.all_day {
            task.all_day = all_day;
        }
        if let Some(recurring) = self.is_recurring {
            task.is_recurring = recurring;
        }
        if let Some(fixed) = self.is_fixed {
            task.is_fixed = fixed;
        }
        if let Some(completed) = self.is_completed {
            task.is_completed = Some(completed);
        }
        if let Some(deadline) = self.deadline {
            task.deadline = Some(deadline);
        }
    }
}

/// Timing fields the reconciliation engine is allowed to write back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Task store trait - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// List a user's tasks matching `filter`, ordered by start time.
    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Get a single task by ID, scoped to the owning user.
    async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<TaskRecord>, StoreError>;

    /// Create a new task owned by `user_id`.
    async fn create_task(&self, user_id: Uuid, task: &NewTask) -> Result<TaskRecord, StoreError>;

    /// Apply a partial update to `(user_id, id)` and return the new row.
    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, StoreError>;

    /// Reconciliation writeback: update only the timing fields of a row.
    ///
    /// When `expected_updated_at` is given, the write succeeds only if the
    /// row's `updated_at` still matches (fails with [`StoreError::Stale`]
    /// otherwise).
    async fn update_timing(
        &self,
        id: Uuid,
        timing: &TaskTiming,
        expected_updated_at: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Delete `(user_id, id)`. Fails with [`StoreError::NotFound`] when no
    /// row matches.
    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    /// All tasks (any user) whose `start_time` falls in `[from, to)`.
    /// Read path for the reminder poller.
    async fn list_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<TaskRecord>, StoreError>;
}

/// Task store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStoreKind {
    Memory,
    #[default]
    Sqlite,
}

impl TaskStoreKind {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a task store based on type and configuration.
pub async fn create_task_store(
    kind: TaskStoreKind,
    data_dir: PathBuf,
) -> Result<std::sync::Arc<dyn TaskStore>, StoreError> {
    match kind {
        TaskStoreKind::Memory => Ok(std::sync::Arc::new(MemoryTaskStore::new())),
        TaskStoreKind::Sqlite => {
            let store = SqliteTaskStore::new(data_dir).await?;
            Ok(std::sync::Arc::new(store))
        }
    }
}
