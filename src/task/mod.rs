//! Task domain model.
//!
//! A task is a user-owned calendar entry. Non-recurring tasks occupy one
//! concrete `[start_time, end_time)` slot; recurring tasks store a weekly
//! template (day of week + time of day) that is reprojected onto whichever
//! week a caller asks about. Fixed tasks may never have their timing changed
//! by the rearrangement engine.

pub mod classify;
pub mod conflict;
pub mod projection;
pub mod service;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::conflict::TimeSpanned;
use crate::task::projection::project_onto_week;

/// Day of the week, stored and serialized as the English day name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// All seven days, Sunday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// Sunday-based weekday number (Sunday = 0 .. Saturday = 6).
    pub fn number_from_sunday(self) -> i64 {
        match self {
            DayOfWeek::Sunday => 0,
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }

    /// Parse an English day name. Returns `None` outside the enum domain.
    pub fn from_name(name: &str) -> Option<Self> {
        DayOfWeek::ALL.iter().copied().find(|d| d.as_str() == name)
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub user_id: Uuid,
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
    /// RFC3339, store-managed.
    pub created_at: String,
    /// RFC3339, store-managed. Doubles as the optimistic-concurrency token
    /// for the reconciliation writeback path.
    pub updated_at: String,
}

impl TaskRecord {
    /// API view of this task, with recurring templates projected onto the
    /// week containing `reference`.
    pub fn view(&self, reference: NaiveDate) -> TaskView {
        let (start_time, end_time) = if self.is_recurring {
            (
                project_onto_week(self.start_time, self.day_of_week, reference),
                project_onto_week(self.end_time, self.day_of_week, reference),
            )
        } else {
            (self.start_time, self.end_time)
        };
        TaskView {
            id: self.id,
            title: self.title.clone(),
            desc: self.desc.clone(),
            day_of_week: self.day_of_week,
            start_time,
            end_time,
            all_day: self.all_day,
            is_recurring: self.is_recurring,
            is_fixed: self.is_fixed,
            is_completed: self.is_completed,
            deadline: self.deadline,
            start_time_attributes: TimeParts::from(start_time),
            end_time_attributes: TimeParts::from(end_time),
            deadline_attributes: self.deadline.map(TimeParts::from),
        }
    }
}

impl TimeSpanned for TaskRecord {
    fn span_start(&self) -> NaiveDateTime {
        self.start_time
    }

    fn span_end(&self) -> NaiveDateTime {
        self.end_time
    }
}

/// Decomposed calendar components of a timestamp, for consumers that need
/// them without re-parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl From<NaiveDateTime> for TimeParts {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

/// Task payload returned by the API. Derived from a [`TaskRecord`]; recurring
/// timing is always the projected, week-concrete form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub id: Uuid,
    pub title: String,
    pub desc: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub all_day: bool,
    pub is_recurring: bool,
    pub is_fixed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDateTime>,
    pub start_time_attributes: TimeParts,
    pub end_time_attributes: TimeParts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_attributes: Option<TimeParts>,
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::NaiveDate;

    pub fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    pub fn task(title: &str, start: NaiveDateTime, end: NaiveDateTime) -> TaskRecord {
        TaskRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
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
            created_at: "2025-03-01T00:00:00+00:00".to_string(),
            updated_at: "2025-03-01T00:00:00+00:00".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::dt;
    use super::*;

    #[test]
    fn day_of_week_name_round_trip() {
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::from_name(day.as_str()), Some(day));
        }
        assert_eq!(DayOfWeek::from_name("Mondayy"), None);
        assert_eq!(DayOfWeek::from_name("monday"), None);
    }

    #[test]
    fn day_of_week_serializes_as_name() {
        let json = serde_json::to_string(&DayOfWeek::Wednesday).unwrap();
        assert_eq!(json, "\"Wednesday\"");
        let back: DayOfWeek = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DayOfWeek::Wednesday);
    }

    #[test]
    fn time_parts_decomposition() {
        let parts = TimeParts::from(dt(2025, 3, 8, 9, 30));
        assert_eq!(parts.year, 2025);
        assert_eq!(parts.month, 3);
        assert_eq!(parts.day, 8);
        assert_eq!(parts.hour, 9);
        assert_eq!(parts.minute, 30);
        assert_eq!(parts.second, 0);
    }

    #[test]
    fn view_projects_recurring_tasks() {
        // Template stored on Monday 2025-03-03; viewed from Wednesday 2025-03-12.
        let mut task = testutil::task("standup", dt(2025, 3, 3, 9, 0), dt(2025, 3, 3, 9, 30));
        task.is_recurring = true;
        let view = task.view(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(view.start_time, dt(2025, 3, 10, 9, 0));
        assert_eq!(view.end_time, dt(2025, 3, 10, 9, 30));
        assert_eq!(view.start_time_attributes.day, 10);
    }

    #[test]
    fn view_leaves_non_recurring_tasks_alone() {
        let task = testutil::task("dentist", dt(2025, 3, 3, 9, 0), dt(2025, 3, 3, 10, 0));
        let view = task.view(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(view.start_time, task.start_time);
        assert_eq!(view.end_time, task.end_time);
    }
}
