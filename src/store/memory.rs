//! In-memory task store (non-persistent).

use super::{now_string, NewTask, StoreError, TaskFilter, TaskPatch, TaskStore, TaskTiming};
use crate::task::TaskRecord;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub struct MemoryTaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let mut tasks: Vec<TaskRecord> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.start_time);
        Ok(tasks)
    }

    async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self
            .tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn create_task(&self, user_id: Uuid, task: &NewTask) -> Result<TaskRecord, StoreError> {
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
        self.tasks.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .filter(|t| t.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        patch.apply(task);
        task.updated_at = now_string();
        Ok(task.clone())
    }

    async fn update_timing(
        &self,
        id: Uuid,
        timing: &TaskTiming,
        expected_updated_at: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(expected) = expected_updated_at {
            if task.updated_at != expected {
                return Err(StoreError::Stale);
            }
        }
        task.day_of_week = timing.day_of_week;
        task.start_time = timing.start_time;
        task.end_time = timing.end_time;
        task.updated_at = now_string();
        Ok(())
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            Some(t) if t.user_id == user_id => {
                tasks.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn list_starting_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let mut tasks: Vec<TaskRecord> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.start_time >= from && t.start_time < to)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.start_time);
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::testutil::dt;
    use crate::task::DayOfWeek;

    fn new_task(title: &str, start: NaiveDateTime, end: NaiveDateTime) -> NewTask {
        NewTask {
            title: title.to_string(),
            desc: None,
            day_of_week: DayOfWeek::Monday,
            start_time: start,
            end_time: end,
            all_day: false,
            is_recurring: false,
            is_fixed: false,
            is_completed: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_owner() {
        let store = MemoryTaskStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut fixed = new_task("alice fixed", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0));
        fixed.is_fixed = true;
        store.create_task(alice, &fixed).await.unwrap();

        let mut bobs = new_task("bob fixed", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0));
        bobs.is_fixed = true;
        store.create_task(bob, &bobs).await.unwrap();

        let filter = TaskFilter {
            is_fixed: Some(true),
            ..Default::default()
        };
        let tasks = store.list_tasks(alice, &filter).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "alice fixed");
    }

    #[tokio::test]
    async fn get_does_not_leak_other_users_tasks() {
        let store = MemoryTaskStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let created = store
            .create_task(alice, &new_task("t", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)))
            .await
            .unwrap();

        assert!(store.get_task(alice, created.id).await.unwrap().is_some());
        assert!(store.get_task(bob, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_patches_only_present_fields() {
        let store = MemoryTaskStore::new();
        let user = Uuid::new_v4();
        let created = store
            .create_task(user, &new_task("before", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)))
            .await
            .unwrap();

        let patch = TaskPatch {
            title: Some("after".to_string()),
            ..Default::default()
        };
        let updated = store.update_task(user, created.id, &patch).await.unwrap();
        assert_eq!(updated.title, "after");
        assert_eq!(updated.start_time, created.start_time);
    }

    #[tokio::test]
    async fn update_for_wrong_user_is_not_found() {
        let store = MemoryTaskStore::new();
        let user = Uuid::new_v4();
        let created = store
            .create_task(user, &new_task("t", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)))
            .await
            .unwrap();

        let err = store
            .update_task(Uuid::new_v4(), created.id, &TaskPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn timing_update_honors_optimistic_check() {
        let store = MemoryTaskStore::new();
        let user = Uuid::new_v4();
        let created = store
            .create_task(user, &new_task("t", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)))
            .await
            .unwrap();

        let timing = TaskTiming {
            day_of_week: DayOfWeek::Tuesday,
            start_time: dt(2025, 3, 11, 9, 0),
            end_time: dt(2025, 3, 11, 10, 0),
        };

        // Stale token is rejected.
        let err = store
            .update_timing(created.id, &timing, Some("2000-01-01T00:00:00+00:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stale));

        // Fresh token goes through and only timing changes.
        store
            .update_timing(created.id, &timing, Some(&created.updated_at))
            .await
            .unwrap();
        let reread = store.get_task(user, created.id).await.unwrap().unwrap();
        assert_eq!(reread.start_time, dt(2025, 3, 11, 9, 0));
        assert_eq!(reread.day_of_week, DayOfWeek::Tuesday);
        assert_eq!(reread.title, "t");
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let store = MemoryTaskStore::new();
        let user = Uuid::new_v4();
        let created = store
            .create_task(user, &new_task("t", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)))
            .await
            .unwrap();

        let err = store.delete_task(Uuid::new_v4(), created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        store.delete_task(user, created.id).await.unwrap();
        assert!(store.get_task(user, created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn starting_between_is_half_open_and_cross_user() {
        let store = MemoryTaskStore::new();
        store
            .create_task(
                Uuid::new_v4(),
                &new_task("in", dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 10, 0)),
            )
            .await
            .unwrap();
        store
            .create_task(
                Uuid::new_v4(),
                &new_task("at end", dt(2025, 3, 10, 9, 1), dt(2025, 3, 10, 10, 0)),
            )
            .await
            .unwrap();

        let due = store
            .list_starting_between(dt(2025, 3, 10, 9, 0), dt(2025, 3, 10, 9, 1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "in");
    }
}
