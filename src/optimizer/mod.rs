//! Optimizer gateway for schedule rearrangement.
//!
//! This module provides a trait-based abstraction over the external
//! scheduling optimizer (a function-calling LLM service), with OpenRouter as
//! the primary implementation. One call to [`ScheduleOptimizer::propose`] is
//! one proposal; the output is never trusted until the reconciliation engine
//! has validated it.

pub mod error;
mod openrouter;

pub use error::{classify_http_status, OptimizerError, OptimizerErrorKind, RetryConfig};
pub use openrouter::OpenRouterOptimizer;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::conflict::TimeSpanned;
use crate::task::{DayOfWeek, TaskRecord};

/// Full mutable-field view of a candidate task, as exchanged with the
/// optimizer. `id: None` marks a task the optimizer proposes to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDateTime>,
}

impl TaskSnapshot {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: Some(record.id),
            title: record.title.clone(),
            desc: record.desc.clone(),
            day_of_week: record.day_of_week,
            start_time: record.start_time,
            end_time: record.end_time,
            all_day: record.all_day,
            is_completed: record.is_completed,
            is_recurring: record.is_recurring,
            is_fixed: record.is_fixed,
            deadline: record.deadline,
        }
    }
}

impl TimeSpanned for TaskSnapshot {
    fn span_start(&self) -> NaiveDateTime {
        self.start_time
    }

    fn span_end(&self) -> NaiveDateTime {
        self.end_time
    }
}

/// The structured payload exchanged with the optimizer in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub tasks: Vec<TaskSnapshot>,
}

/// Trait for schedule optimizers.
#[async_trait]
pub trait ScheduleOptimizer: Send + Sync {
    /// Submit one candidate snapshot and receive one proposal.
    async fn propose(
        &self,
        tasks: &[TaskSnapshot],
        instructions: &str,
    ) -> Result<Vec<TaskSnapshot>, OptimizerError>;
}

/// Policy instruction set sent with every proposal request.
///
/// The constraints repeated here are also enforced by the reconciliation
/// engine; the text only steers the optimizer toward proposals that survive
/// validation.
pub fn scheduling_instructions(min_gap_minutes: u32) -> String {
    let mut out = String::from(
        "You are a scheduling assistant. Rearrange the user's tasks into a \
         conflict-free weekly schedule and submit the result with the \
         submit_schedule function.\n\
         Rules:\n\
         - No two tasks may overlap: for any pair, one must end at or before \
           the other starts.\n\
         - Tasks with is_fixed = true must keep their day_of_week, start_time \
           and end_time exactly as given.\n\
         - Tasks with is_recurring = false and is_fixed = false may only move \
           to a later start_time, never earlier.\n\
         - Keep each task's duration unchanged.\n\
         - When a task has a deadline, schedule it to end at or before the \
           deadline.\n\
         - Return every task you were given; preserve the id field untouched.\n",
    );
    if min_gap_minutes > 0 {
        out.push_str(&format!(
            "- Leave at least {} minutes between consecutive tasks.\n",
            min_gap_minutes
        ));
    }
    out
}
