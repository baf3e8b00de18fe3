//! Task service: CRUD orchestration and the schedule reconciliation engine.
//!
//! The reconciliation engine drives the rearrangement state machine:
//!
//! ```text
//! PROPOSE -> VALIDATE -> { ACCEPT -> PERSIST | RETRY -> PROPOSE }
//! ```
//!
//! The optimizer is a black box; nothing it returns is persisted until the
//! immutability and conflict passes have run over the proposal. Retries
//! always resubmit the original candidate snapshot, never a conflicting
//! proposal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use thiserror::Error;
use uuid::Uuid;

use crate::optimizer::{scheduling_instructions, OptimizerError, ScheduleOptimizer, TaskSnapshot};
use crate::store::{NewTask, StoreError, TaskFilter, TaskPatch, TaskStore, TaskTiming};
use crate::task::classify::{classify, RearrangeRange};
use crate::task::conflict::find_conflict;
use crate::task::{DayOfWeek, TaskRecord, TaskView};

/// Scheduling and task-management errors surfaced to the API layer.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Task Not Found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("optimizer request failed: {0}")]
    Optimizer(#[from] OptimizerError),
    #[error("no conflict-free schedule found after {attempts} optimizer attempts")]
    SchedulingFailure { attempts: u32 },
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SchedulingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => SchedulingError::NotFound,
            other => SchedulingError::Store(other),
        }
    }
}

/// Tunables for a rearrangement call.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Conflict-retry budget: total optimizer proposals per rearrangement.
    pub max_attempts: u32,
    /// Whether completed tasks stay in the candidate pool.
    pub include_completed: bool,
    /// Minimum gap between consecutive tasks, passed to the optimizer as
    /// guidance (0 = no gap requested).
    pub min_gap_minutes: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            include_completed: false,
            min_gap_minutes: 0,
        }
    }
}

/// Listing parameters for [`TaskService::list_tasks`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskQuery {
    pub day: Option<DayOfWeek>,
    pub is_recurring: Option<bool>,
    pub is_fixed: Option<bool>,
    pub is_completed: Option<bool>,
    /// Reference date for recurring-task projection in the response. Does
    /// not filter rows.
    pub current_date: Option<NaiveDate>,
}

/// Task service over a store and an optimizer gateway.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    optimizer: Arc<dyn ScheduleOptimizer>,
    policy: ReconcilePolicy,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        optimizer: Arc<dyn ScheduleOptimizer>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            store,
            optimizer,
            policy,
        }
    }

    /// List a user's tasks with recurring templates projected onto the week
    /// of `current_date` (today if absent).
    pub async fn list_tasks(
        &self,
        user_id: Uuid,
        query: &TaskQuery,
    ) -> Result<Vec<TaskView>, SchedulingError> {
        let filter = TaskFilter {
            day_of_week: query.day,
            is_recurring: query.is_recurring,
            is_fixed: query.is_fixed,
            is_completed: query.is_completed,
        };
        let reference = query.current_date.unwrap_or_else(today);
        let tasks = self.store.list_tasks(user_id, &filter).await?;
        let mut views: Vec<TaskView> = tasks.iter().map(|t| t.view(reference)).collect();
        views.sort_by_key(|v| v.start_time);
        Ok(views)
    }

    pub async fn get_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        current_date: Option<NaiveDate>,
    ) -> Result<TaskView, SchedulingError> {
        let reference = current_date.unwrap_or_else(today);
        let task = self
            .store
            .get_task(user_id, id)
            .await?
            .ok_or(SchedulingError::NotFound)?;
        Ok(task.view(reference))
    }

    pub async fn create_task(
        &self,
        user_id: Uuid,
        input: NewTask,
    ) -> Result<TaskView, SchedulingError> {
        validate_title(&input.title)?;
        validate_times(input.start_time, input.end_time, input.deadline)?;
        let record = self.store.create_task(user_id, &input).await?;
        Ok(record.view(today()))
    }

    pub async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<TaskView, SchedulingError> {
        let mut merged = self
            .store
            .get_task(user_id, id)
            .await?
            .ok_or(SchedulingError::NotFound)?;
        patch.apply(&mut merged);
        validate_title(&merged.title)?;
        validate_times(merged.start_time, merged.end_time, merged.deadline)?;
        let record = self.store.update_task(user_id, id, &patch).await?;
        Ok(record.view(today()))
    }

    pub async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), SchedulingError> {
        self.store.delete_task(user_id, id).await?;
        Ok(())
    }

    /// Rearrange the user's tasks in `range` around `current_date` into a
    /// conflict-free schedule, via the optimizer gateway.
    ///
    /// Returns the freshly-read, projected views of the user's tasks in the
    /// range - never the raw proposal.
    pub async fn rearrange(
        &self,
        user_id: Uuid,
        range: RearrangeRange,
        current_date: Option<NaiveDate>,
    ) -> Result<Vec<TaskView>, SchedulingError> {
        let reference = current_date.unwrap_or_else(today);
        let all = self.store.list_tasks(user_id, &TaskFilter::default()).await?;
        let mut classified = classify(&all, reference, range);
        if !self.policy.include_completed {
            classified.retain_incomplete();
        }
        let pool = classified.candidate_pool();
        if pool.is_empty() {
            tracing::debug!(%user_id, "no rearrangement candidates in range");
            return self.views_in_range(user_id, reference, range).await;
        }

        // Overlapping fixed tasks cannot be resolved: the engine may not
        // move either one. Fail before spending optimizer budget.
        let fixed: Vec<&TaskRecord> = pool.iter().filter(|t| t.is_fixed).collect();
        if let Some((i, j)) = find_conflict(&fixed) {
            tracing::warn!(
                %user_id,
                a = %fixed[i].title,
                b = %fixed[j].title,
                "fixed tasks overlap; rearrangement cannot resolve this"
            );
            return Err(SchedulingError::SchedulingFailure { attempts: 0 });
        }

        let snapshots: Vec<TaskSnapshot> = pool.iter().map(TaskSnapshot::from_record).collect();
        let instructions = scheduling_instructions(self.policy.min_gap_minutes);

        let mut attempts = 0u32;
        let accepted = loop {
            if attempts >= self.policy.max_attempts {
                tracing::warn!(%user_id, attempts, "conflict-retry budget exhausted");
                return Err(SchedulingError::SchedulingFailure { attempts });
            }
            attempts += 1;
            let proposal = self.optimizer.propose(&snapshots, &instructions).await?;
            let reconciled = reconcile_proposal(&pool, proposal);
            match find_conflict(&reconciled) {
                None => break reconciled,
                Some((i, j)) => {
                    tracing::warn!(
                        %user_id,
                        attempt = attempts,
                        a = %reconciled[i].title,
                        b = %reconciled[j].title,
                        "proposal still conflicts after validation; retrying"
                    );
                }
            }
        };
        tracing::info!(%user_id, attempts, tasks = accepted.len(), "accepted conflict-free proposal");

        self.persist_accepted(user_id, &pool, &accepted).await;
        self.views_in_range(user_id, reference, range).await
    }

    /// Write an accepted proposal back to the store. Failures are reported
    /// per task; one bad row never aborts the batch.
    async fn persist_accepted(
        &self,
        user_id: Uuid,
        pool: &[TaskRecord],
        accepted: &[TaskSnapshot],
    ) {
        let by_id: HashMap<Uuid, &TaskRecord> = pool.iter().map(|t| (t.id, t)).collect();

        let mut writes: Vec<(&TaskSnapshot, Option<String>)> = Vec::new();
        for snapshot in accepted {
            match snapshot.id {
                Some(id) => {
                    let Some(original) = by_id.get(&id) else {
                        continue;
                    };
                    let unchanged = snapshot.day_of_week == original.day_of_week
                        && snapshot.start_time == original.start_time
                        && snapshot.end_time == original.end_time;
                    if !unchanged {
                        writes.push((snapshot, Some(original.updated_at.clone())));
                    }
                }
                None => writes.push((snapshot, None)),
            }
        }

        let results = join_all(
            writes
                .iter()
                .map(|(snapshot, token)| self.persist_one(user_id, snapshot, token.as_deref())),
        )
        .await;

        for ((snapshot, _), result) in writes.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(
                    %user_id,
                    task = %snapshot.title,
                    "failed to persist rearranged task: {}",
                    e
                );
            }
        }
    }

    async fn persist_one(
        &self,
        user_id: Uuid,
        snapshot: &TaskSnapshot,
        expected_updated_at: Option<&str>,
    ) -> Result<(), StoreError> {
        match snapshot.id {
            Some(id) => {
                let timing = TaskTiming {
                    day_of_week: snapshot.day_of_week,
                    start_time: snapshot.start_time,
                    end_time: snapshot.end_time,
                };
                self.store
                    .update_timing(id, &timing, expected_updated_at)
                    .await
            }
            None => {
                let new_task = NewTask {
                    title: snapshot.title.clone(),
                    desc: snapshot.desc.clone(),
                    day_of_week: snapshot.day_of_week,
                    start_time: snapshot.start_time,
                    end_time: snapshot.end_time,
                    all_day: snapshot.all_day,
                    is_recurring: snapshot.is_recurring,
                    is_fixed: snapshot.is_fixed,
                    is_completed: snapshot.is_completed,
                    deadline: snapshot.deadline,
                };
                self.store.create_task(user_id, &new_task).await.map(|_| ())
            }
        }
    }

    async fn views_in_range(
        &self,
        user_id: Uuid,
        reference: NaiveDate,
        range: RearrangeRange,
    ) -> Result<Vec<TaskView>, SchedulingError> {
        let all = self.store.list_tasks(user_id, &TaskFilter::default()).await?;
        let mut views: Vec<TaskView> = all
            .iter()
            .map(|t| t.view(reference))
            .filter(|v| range.contains(v.start_time, reference))
            .collect();
        views.sort_by_key(|v| v.start_time);
        Ok(views)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate_title(title: &str) -> Result<(), SchedulingError> {
    if title.trim().is_empty() {
        return Err(SchedulingError::Validation(
            "title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_times(
    start: NaiveDateTime,
    end: NaiveDateTime,
    deadline: Option<NaiveDateTime>,
) -> Result<(), SchedulingError> {
    if end < start {
        return Err(SchedulingError::Validation(
            "end_time must not be earlier than start_time".to_string(),
        ));
    }
    if let Some(deadline) = deadline {
        if deadline < start {
            return Err(SchedulingError::Validation(
                "deadline must not be earlier than start_time".to_string(),
            ));
        }
    }
    Ok(())
}

/// Immutability pass: correct a raw proposal against the candidate pool.
///
/// - Fixed tasks get their original timing back, whatever the optimizer said.
/// - Movable (non-recurring, non-fixed) tasks proposed earlier than their
///   original start are reverted; tasks may only move later.
/// - Structurally broken edits (end before start) are reverted.
/// - Candidates the proposal dropped are carried forward unchanged; proposed
///   tasks with unknown ids are discarded.
/// - Proposed new tasks (no id) are kept if minimally valid.
///
/// The returned set is what the conflict pass judges.
fn reconcile_proposal(pool: &[TaskRecord], proposal: Vec<TaskSnapshot>) -> Vec<TaskSnapshot> {
    let known: HashSet<Uuid> = pool.iter().map(|t| t.id).collect();

    let mut proposed: HashMap<Uuid, TaskSnapshot> = HashMap::new();
    let mut new_tasks: Vec<TaskSnapshot> = Vec::new();
    for snapshot in proposal {
        match snapshot.id {
            Some(id) if known.contains(&id) => {
                proposed.insert(id, snapshot);
            }
            Some(id) => {
                tracing::warn!(%id, "proposal references an unknown task id; discarding entry");
            }
            None => {
                if snapshot.title.trim().is_empty() || snapshot.end_time < snapshot.start_time {
                    tracing::warn!(title = %snapshot.title, "discarding invalid proposed new task");
                } else {
                    new_tasks.push(snapshot);
                }
            }
        }
    }

    let mut out = Vec::with_capacity(pool.len() + new_tasks.len());
    for original in pool {
        let mut snapshot = match proposed.remove(&original.id) {
            Some(s) => s,
            None => {
                tracing::debug!(task = %original.title, "proposal dropped a candidate; carrying it forward");
                TaskSnapshot::from_record(original)
            }
        };
        if original.is_fixed {
            revert_timing(&mut snapshot, original);
        } else if snapshot.end_time < snapshot.start_time
            || (!original.is_recurring && snapshot.start_time < original.start_time)
        {
            revert_timing(&mut snapshot, original);
        }
        out.push(snapshot);
    }
    out.extend(new_tasks);
    out
}

fn revert_timing(snapshot: &mut TaskSnapshot, original: &TaskRecord) {
    snapshot.day_of_week = original.day_of_week;
    snapshot.start_time = original.start_time;
    snapshot.end_time = original.end_time;
}
