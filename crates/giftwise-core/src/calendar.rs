//! Month grids, event lookup by day, and days-until arithmetic.
//!
//! All comparisons are by calendar day; nothing here looks at time of day.

use std::fmt;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};

use crate::event::Event;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(anyhow!("month out of range: {month}"));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("year out of range: {year}"))?;
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Moves `delta` months forward (negative moves back). Fails once the
    /// target leaves the supported date range.
    pub fn shift(self, delta: i64) -> anyhow::Result<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month - 1);
        let target = index
            .checked_add(delta)
            .ok_or_else(|| anyhow!("month offset out of range: {delta}"))?;
        let year = i32::try_from(target.div_euclid(12))
            .map_err(|_| anyhow!("month offset out of range: {delta}"))?;
        let month = u32::try_from(target.rem_euclid(12) + 1)
            .map_err(|_| anyhow!("month offset out of range: {delta}"))?;
        Self::new(year, month)
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn day(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.year)
    }
}

/// Number of days in `month` of `year`: the day before the first of the next month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Ok(ym) = YearMonth::new(year, month) else {
        return 0;
    };
    ym.next()
        .first_day()
        .pred_opt()
        .map(|last| last.day())
        .unwrap_or(31)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCell {
    Blank,
    Day(NaiveDate),
}

/// Sunday-first month grid: leading blanks then one cell per day, no trailing padding.
#[derive(Debug, Clone)]
pub struct MonthGrid {
    pub month: YearMonth,
    pub cells: Vec<GridCell>,
}

impl MonthGrid {
    pub fn build(month: YearMonth) -> Self {
        let leading = month.first_day().weekday().num_days_from_sunday() as usize;
        let total = days_in_month(month.year(), month.month());

        let mut cells = Vec::with_capacity(leading + total as usize);
        cells.extend(std::iter::repeat_n(GridCell::Blank, leading));
        cells.extend((1..=total).filter_map(|d| month.day(d)).map(GridCell::Day));

        Self { month, cells }
    }

    pub fn leading_blanks(&self) -> usize {
        self.cells
            .iter()
            .take_while(|c| matches!(c, GridCell::Blank))
            .count()
    }

    /// Rows of seven; the final row may be short.
    pub fn weeks(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(7)
    }
}

pub fn events_on<'a>(events: &'a [Event], day: NaiveDate) -> Vec<&'a Event> {
    events.iter().filter(|e| e.date == day).collect()
}

/// Whole days from `today` to `date`; negative for past dates.
pub fn days_until(today: NaiveDate, date: NaiveDate) -> i64 {
    date.signed_duration_since(today).num_days()
}

pub fn days_until_label(diff_days: i64) -> String {
    match diff_days {
        0 => "Today!".to_string(),
        1 => "Tomorrow!".to_string(),
        d if d < 0 => format!("{} days ago", d.unsigned_abs()),
        d => format!("in {d} days"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Past,
    Urgent,
    Warning,
    Normal,
}

impl Urgency {
    pub fn classify(diff_days: i64) -> Self {
        if diff_days < 0 {
            Self::Past
        } else if diff_days <= 7 {
            Self::Urgent
        } else if diff_days <= 30 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonthBucket<'a> {
    pub label: String,
    pub events: Vec<&'a Event>,
}

/// Sorts events by date (stable) and buckets them under "`Month` `year`" labels.
pub fn group_by_month(events: &[Event]) -> Vec<MonthBucket<'_>> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.date);

    let mut buckets: Vec<MonthBucket<'_>> = Vec::new();
    for event in sorted {
        let label = YearMonth::of(event.date).to_string();
        match buckets.iter_mut().find(|b| b.label == label) {
            Some(bucket) => bucket.events.push(event),
            None => buckets.push(MonthBucket {
                label,
                events: vec![event],
            }),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        GridCell, MonthGrid, Urgency, YearMonth, days_in_month, days_until, days_until_label,
        events_on, group_by_month,
    };
    use crate::event::{Event, Occasion};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(id: u64, recipient: &str, on: NaiveDate) -> Event {
        let mut e = Event::new(recipient.to_string(), Occasion::Birthday, on, None);
        e.id = id;
        e
    }

    #[test]
    fn february_lengths_follow_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn grid_starts_after_weekday_blanks() {
        // May 2024 starts on a Wednesday.
        let grid = MonthGrid::build(YearMonth::new(2024, 5).expect("ym"));
        assert_eq!(grid.leading_blanks(), 3);
        assert_eq!(grid.cells[3], GridCell::Day(date(2024, 5, 1)));
        assert_eq!(grid.cells.len(), 3 + 31);

        // September 2024 starts on a Sunday: no blanks, no padding.
        let sept = MonthGrid::build(YearMonth::new(2024, 9).expect("ym"));
        assert_eq!(sept.leading_blanks(), 0);
        assert_eq!(sept.cells.len(), 30);
        assert_eq!(sept.weeks().count(), 5);
    }

    #[test]
    fn month_navigation_wraps_years() {
        let jan = YearMonth::new(2024, 1).expect("ym");
        assert_eq!(jan.prev(), YearMonth::new(2023, 12).expect("ym"));
        assert_eq!(jan.shift(13).expect("shift"), YearMonth::new(2025, 2).expect("ym"));
        assert_eq!(jan.shift(-1).expect("shift"), jan.prev());
        assert_eq!(jan.shift(-25).expect("shift"), YearMonth::new(2021, 12).expect("ym"));
        assert!(jan.shift(4_000_000).is_err());
        assert!(jan.shift(i64::MIN).is_err());
        assert_eq!(jan.to_string(), "January 2024");
        assert!(YearMonth::new(2024, 0).is_err());
    }

    #[test]
    fn events_match_on_full_date() {
        let events = vec![
            event(1, "Ana", date(2024, 3, 5)),
            event(2, "Bo", date(2023, 3, 5)),
            event(3, "Cy", date(2024, 3, 5)),
        ];
        let hits: Vec<u64> = events_on(&events, date(2024, 3, 5)).iter().map(|e| e.id).collect();
        assert_eq!(hits, vec![1, 3]);
    }

    #[test]
    fn days_until_labels() {
        let today = date(2024, 1, 1);
        assert_eq!(days_until_label(days_until(today, date(2024, 1, 1))), "Today!");
        assert_eq!(days_until_label(days_until(today, date(2024, 1, 2))), "Tomorrow!");
        assert_eq!(days_until_label(days_until(today, date(2024, 1, 4))), "in 3 days");
        assert_eq!(days_until_label(days_until(today, date(2023, 12, 30))), "2 days ago");
    }

    #[test]
    fn urgency_thresholds() {
        assert_eq!(Urgency::classify(-1), Urgency::Past);
        assert_eq!(Urgency::classify(0), Urgency::Urgent);
        assert_eq!(Urgency::classify(7), Urgency::Urgent);
        assert_eq!(Urgency::classify(8), Urgency::Warning);
        assert_eq!(Urgency::classify(30), Urgency::Warning);
        assert_eq!(Urgency::classify(31), Urgency::Normal);
    }

    #[test]
    fn grouping_is_chronological_and_stable() {
        let events = vec![
            event(1, "Late", date(2024, 3, 20)),
            event(2, "Early", date(2024, 1, 5)),
            event(3, "Tie-a", date(2024, 3, 1)),
            event(4, "Tie-b", date(2024, 3, 1)),
            event(5, "Next year", date(2025, 1, 9)),
        ];

        let buckets = group_by_month(&events);
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["January 2024", "March 2024", "January 2025"]);

        let march: Vec<u64> = buckets[1].events.iter().map(|e| e.id).collect();
        assert_eq!(march, vec![3, 4, 1]);
    }
}
