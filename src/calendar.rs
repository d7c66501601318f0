use crate::model::DateKey;
use chrono::{Datelike, Duration, NaiveDate};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Column index of the someday bucket in week view.
pub const SOMEDAY_COLUMN: usize = 7;
pub const WEEK_COLUMNS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Week {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: [NaiveDate; 7],
}

impl Week {
    /// The seven dates followed by the someday bucket.
    pub fn columns(&self) -> Vec<DateKey> {
        self.days
            .iter()
            .copied()
            .map(DateKey::Date)
            .chain(std::iter::once(DateKey::Someday))
            .collect()
    }

    pub fn label(&self) -> String {
        if self.start.year() == self.end.year() {
            format!(
                "{} – {}",
                self.start.format("%b %-d"),
                self.end.format("%b %-d, %Y")
            )
        } else {
            format!(
                "{} – {}",
                self.start.format("%b %-d, %Y"),
                self.end.format("%b %-d, %Y")
            )
        }
    }
}

/// Monday-anchored week containing `today`, shifted by `week_offset` weeks.
///
/// Offsets that would leave chrono's date range stop at the first or last
/// complete week it can represent.
pub fn compute_week(today: NaiveDate, week_offset: i64) -> Week {
    let earliest = monday_of(NaiveDate::MIN + Duration::days(6));
    let latest = monday_of(NaiveDate::MAX - Duration::days(6));
    let start = Duration::try_weeks(week_offset)
        .and_then(|shift| monday_of(today).checked_add_signed(shift))
        .unwrap_or(if week_offset < 0 { earliest } else { latest })
        .clamp(earliest, latest);
    let mut days = [start; 7];
    for (i, day) in days.iter_mut().enumerate() {
        *day = start + Duration::days(i as i64);
    }
    Week {
        start,
        end: start + Duration::days(6),
        days,
    }
}

/// `anchor` moved by `day_offset` days, saturating at the ends of the calendar.
pub fn compute_day(anchor: NaiveDate, day_offset: i64) -> NaiveDate {
    Duration::try_days(day_offset)
        .and_then(|shift| anchor.checked_add_signed(shift))
        .unwrap_or(if day_offset < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Column holding `today`, or the Monday column when today is not visible.
pub fn index_of_today(columns: &[DateKey], today: NaiveDate) -> usize {
    columns
        .iter()
        .position(|key| *key == DateKey::Date(today))
        .unwrap_or(0)
}

pub fn column_title(columns: &[DateKey], idx: usize) -> &'static str {
    match columns.get(idx) {
        Some(DateKey::Someday) | None => "Someday",
        Some(DateKey::Date(d)) => WEEKDAY_NAMES[d.weekday().num_days_from_monday() as usize],
    }
}
