use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TodoId = i64;

pub const SOMEDAY: &str = "someday";

/// Bucket a todo is filed under: a calendar date or the undated "someday" list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateKey {
    Date(NaiveDate),
    Someday,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid date key {0:?} (expected YYYY-MM-DD or \"someday\")")]
pub struct DateKeyError(pub String);

impl DateKey {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateKey::Date(d) => Some(*d),
            DateKey::Someday => None,
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateKey::Someday => f.write_str(SOMEDAY),
        }
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case(SOMEDAY) {
            return Ok(DateKey::Someday);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(DateKey::Date)
            .map_err(|_| DateKeyError(s.to_string()))
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_date: Option<DateKey>,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Drops sub-millisecond precision, matching what the database keeps.
    pub fn truncate_timestamps(&mut self) {
        self.created_at = self.created_at.trunc_subsecs(3);
        self.completed_at = self.completed_at.map(|ts| ts.trunc_subsecs(3));
    }
}

/// A todo that has not been given an id by a store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_date: Option<DateKey>,
    pub created_at: DateTime<Utc>,
}

impl NewTodo {
    pub fn new(text: impl Into<String>, assigned_date: Option<DateKey>) -> Self {
        NewTodo {
            text: text.into(),
            completed_at: None,
            assigned_date,
            created_at: now(),
        }
    }
}

/// Partial update. `None` leaves a field alone; the nested options set or clear it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub assigned_date: Option<Option<DateKey>>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed_at.is_none() && self.assigned_date.is_none()
    }

    pub fn apply(&self, todo: &mut Todo) {
        if let Some(text) = &self.text {
            todo.text = text.clone();
        }
        if let Some(completed_at) = self.completed_at {
            todo.completed_at = completed_at;
        }
        if let Some(assigned_date) = self.assigned_date {
            todo.assigned_date = assigned_date;
        }
    }
}

/// Returns the trimmed text, or `None` when nothing but whitespace was entered.
pub fn normalize_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Current time at the millisecond precision todos are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_key_parses_dates_and_someday() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!("2024-03-09".parse::<DateKey>(), Ok(DateKey::Date(date)));
        assert_eq!("someday".parse::<DateKey>(), Ok(DateKey::Someday));
        assert_eq!(" Someday ".parse::<DateKey>(), Ok(DateKey::Someday));
        assert!("2024-13-01".parse::<DateKey>().is_err());
        assert!("tomorrow".parse::<DateKey>().is_err());
    }

    #[test]
    fn date_key_displays_iso_dates() {
        let key = DateKey::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(key.to_string(), "2024-01-02");
        assert_eq!(DateKey::Someday.to_string(), "someday");
    }

    #[test]
    fn normalize_rejects_blank_text() {
        assert_eq!(normalize_text("   \t"), None);
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text("  buy milk "), Some("buy milk".to_string()));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut todo = Todo {
            id: 1,
            text: "write report".into(),
            completed_at: None,
            assigned_date: Some(DateKey::Someday),
            created_at: created,
        };
        let patch = TodoPatch {
            text: Some("write the report".into()),
            assigned_date: Some(None),
            ..Default::default()
        };
        patch.apply(&mut todo);
        assert_eq!(todo.text, "write the report");
        assert_eq!(todo.assigned_date, None);
        assert_eq!(todo.completed_at, None);
        assert_eq!(todo.created_at, created);
    }

    #[test]
    fn new_todos_are_stamped_in_whole_milliseconds() {
        let todo = NewTodo::new("stretch", None);
        assert_eq!(todo.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn truncate_timestamps_drops_sub_millisecond_digits() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(218_110_130);
        let mut todo = Todo {
            id: 1,
            text: "x".into(),
            completed_at: Some(created),
            assigned_date: None,
            created_at: created,
        };
        todo.truncate_timestamps();
        assert_eq!(format_timestamp(&todo.created_at), "2024-01-01T09:00:00.218Z");
        assert_eq!(todo.completed_at, Some(todo.created_at));
        assert_eq!(todo.created_at.timestamp_subsec_nanos(), 218_000_000);
    }

    #[test]
    fn timestamps_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(5);
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(format_timestamp(&a), "2024-01-01T09:00:00.000Z");
    }
}
