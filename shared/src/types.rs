//! Common types used across the store back-office

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive date range for reports and rollups
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, &'static str> {
        if end < start {
            return Err("Period end must not be before period start");
        }
        Ok(Self { start, end })
    }

    /// The calendar month containing `year`/`month`
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next.pred_opt()?,
        })
    }

    /// The calendar month containing `date`
    pub fn month_of(date: NaiveDate) -> Option<Self> {
        Self::month(date.year(), date.month())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days in the range
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every calendar day in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.num_days()).map(move |offset| start + Duration::days(offset))
    }

    /// Half-open UTC instant window `[start 00:00, end+1 00:00)`
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (start_of_day(self.start), start_of_day(self.end + Duration::days(1)))
    }
}

/// Half-open UTC instant window covering a single calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (start_of_day(date), start_of_day(date + Duration::days(1)))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_range() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.start, date(2024, 2, 1));
        assert_eq!(feb.end, date(2024, 2, 29));
        assert_eq!(feb.num_days(), 29);

        let dec = DateRange::month(2024, 12).unwrap();
        assert_eq!(dec.end, date(2024, 12, 31));
    }

    #[test]
    fn test_days_iterates_inclusive() {
        let range = DateRange::new(date(2024, 1, 30), date(2024, 2, 2)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(
            days,
            vec![date(2024, 1, 30), date(2024, 1, 31), date(2024, 2, 1), date(2024, 2, 2)]
        );
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(DateRange::new(date(2024, 2, 2), date(2024, 2, 1)).is_err());
    }

    #[test]
    fn test_day_bounds_half_open() {
        let (start, end) = day_bounds(date(2024, 3, 10));
        assert_eq!(end - start, Duration::days(1));
        assert_eq!(start.date_naive(), date(2024, 3, 10));
    }
}
