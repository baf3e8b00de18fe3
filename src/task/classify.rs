//! Candidate selection for a rearrangement call.
//!
//! Partitions a user's tasks into the three mutability/recurrence classes
//! the engine works with and applies the day/week range filter. Anything
//! that lands in no class is left untouched by rearrangement.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::projection::{project_onto_week, week_bounds};
use super::TaskRecord;

/// Time window a rearrangement call operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RearrangeRange {
    /// Tasks starting on the reference date.
    Day,
    /// Tasks starting in the Sunday-based week containing the reference date.
    Week,
}

impl RearrangeRange {
    /// Whether a concrete start time falls inside this range around `reference`.
    pub fn contains(self, start: NaiveDateTime, reference: NaiveDate) -> bool {
        match self {
            RearrangeRange::Day => start.date() == reference,
            RearrangeRange::Week => {
                let (first, last) = week_bounds(reference);
                start.date() >= first && start.date() <= last
            }
        }
    }
}

/// The three disjoint candidate classes. Their union is the pool handed to
/// the optimizer.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    /// Non-recurring, non-fixed tasks inside the range. The optimizer may
    /// move these, but only forward.
    pub movable: Vec<TaskRecord>,
    /// Recurring, non-fixed tasks, projected onto the reference week.
    pub recurring: Vec<TaskRecord>,
    /// Recurring, fixed tasks, projected onto the reference week. Immutable
    /// to the optimizer.
    pub recurring_fixed: Vec<TaskRecord>,
}

impl Classified {
    pub fn is_empty(&self) -> bool {
        self.movable.is_empty() && self.recurring.is_empty() && self.recurring_fixed.is_empty()
    }

    /// Union of all three classes.
    pub fn candidate_pool(&self) -> Vec<TaskRecord> {
        let mut pool =
            Vec::with_capacity(self.movable.len() + self.recurring.len() + self.recurring_fixed.len());
        pool.extend(self.movable.iter().cloned());
        pool.extend(self.recurring.iter().cloned());
        pool.extend(self.recurring_fixed.iter().cloned());
        pool
    }

    /// Drop completed tasks from every class.
    pub fn retain_incomplete(&mut self) {
        let incomplete = |t: &TaskRecord| !t.is_completed.unwrap_or(false);
        self.movable.retain(incomplete);
        self.recurring.retain(incomplete);
        self.recurring_fixed.retain(incomplete);
    }
}

/// Partition `tasks` into candidate classes for `range` around `reference`.
///
/// Recurring tasks are reprojected onto the reference week unless their
/// stored dates already sit on the reference date. Non-recurring fixed tasks
/// are never candidates.
pub fn classify(tasks: &[TaskRecord], reference: NaiveDate, range: RearrangeRange) -> Classified {
    let mut out = Classified::default();
    for task in tasks {
        if task.is_recurring {
            let projected = reproject(task, reference);
            if task.is_fixed {
                out.recurring_fixed.push(projected);
            } else {
                out.recurring.push(projected);
            }
        } else if !task.is_fixed && range.contains(task.start_time, reference) {
            out.movable.push(task.clone());
        }
    }
    out
}

fn reproject(task: &TaskRecord, reference: NaiveDate) -> TaskRecord {
    if task.start_time.date() == reference && task.end_time.date() == reference {
        return task.clone();
    }
    let mut projected = task.clone();
    projected.start_time = project_onto_week(task.start_time, task.day_of_week, reference);
    projected.end_time = project_onto_week(task.end_time, task.day_of_week, reference);
    projected
}
