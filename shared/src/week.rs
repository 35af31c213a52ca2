//! ISO-8601 week utilities
//!
//! Calendar weeks drive applicator grouping and the UI week filter, so both
//! the server and the WASM bindings go through these functions.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

/// ISO-8601 week number (1..=53) of a date.
///
/// Shifts the date to the Thursday of its week (Monday = 1 .. Sunday = 7);
/// that Thursday's year owns the week, and the week number is
/// `ceil((days since Jan 1 + 1) / 7)`.
pub fn iso_week(date: NaiveDate) -> u32 {
    let thursday = week_thursday(date);
    let jan_first = NaiveDate::from_ymd_opt(thursday.year(), 1, 1).unwrap_or(thursday);
    let days = (thursday - jan_first).num_days();
    ((days + 1 + 6) / 7) as u32
}

/// ISO week of an instant, taken at midnight of its local calendar day
pub fn iso_week_of<Tz: TimeZone>(at: &DateTime<Tz>) -> u32 {
    iso_week(at.date_naive())
}

/// Year that owns the ISO week of `date` (differs from the calendar year near Jan 1)
pub fn iso_week_year(date: NaiveDate) -> i32 {
    week_thursday(date).year()
}

/// Monday of the ISO week containing `date`
pub fn week_start_date(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().number_from_monday() as i64 - 1;
    date - Duration::days(offset)
}

/// `start + weeks * 7` days, or `None` when the result leaves the supported range
pub fn add_weeks(start: NaiveDate, weeks: i32) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::weeks(weeks as i64))
}

/// `start + days` days, or `None` when out of range
pub fn add_days(start: NaiveDate, days: i64) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::days(days))
}

fn week_thursday(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().number_from_monday() as i64;
    date + Duration::days(4 - weekday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Utc, Weekday};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_boundaries() {
        assert_eq!(iso_week(date(2024, 1, 1)), 1);
        assert_eq!(iso_week(date(2023, 12, 31)), 52);
        assert_eq!(iso_week(date(2024, 12, 29)), 52);
        assert_eq!(iso_week(date(2024, 12, 30)), 1);
        assert_eq!(iso_week_year(date(2024, 12, 30)), 2025);
        assert_eq!(iso_week(date(2021, 1, 3)), 53);
        assert_eq!(iso_week_year(date(2021, 1, 3)), 2020);
        assert_eq!(iso_week(date(2020, 12, 31)), 53);
    }

    #[test]
    fn test_every_day_of_2024_matches_iso() {
        let mut day = date(2024, 1, 1);
        while day.year() == 2024 {
            assert_eq!(iso_week(day), day.iso_week().week(), "{}", day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        assert_eq!(week_start_date(date(2024, 1, 8)), date(2024, 1, 8));
        assert_eq!(week_start_date(date(2024, 1, 14)), date(2024, 1, 8));
        assert_eq!(week_start_date(date(2024, 1, 3)), date(2024, 1, 1));
        assert_eq!(week_start_date(date(2023, 1, 1)), date(2022, 12, 26));
    }

    #[test]
    fn test_iso_week_of_datetime_ignores_time() {
        let late = Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        assert_eq!(iso_week_of(&late), 1);
        assert_eq!(iso_week_of(&early), 2);
    }

    #[test]
    fn test_add_weeks() {
        assert_eq!(add_weeks(date(2024, 1, 1), 1), Some(date(2024, 1, 8)));
        assert_eq!(add_weeks(date(2024, 1, 1), 0), Some(date(2024, 1, 1)));
        assert_eq!(add_weeks(date(2024, 1, 8), -1), Some(date(2024, 1, 1)));
        assert_eq!(add_days(date(2024, 2, 28), 2), Some(date(2024, 3, 1)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_iso_week_matches_chrono(days in 0i64..(365 * 60)) {
            let day = date(1990, 1, 1) + Duration::days(days);
            prop_assert_eq!(iso_week(day), day.iso_week().week());
            prop_assert_eq!(iso_week_year(day), day.iso_week().year());
        }

        #[test]
        fn prop_week_start_shares_week(days in 0i64..(365 * 60)) {
            let day = date(1990, 1, 1) + Duration::days(days);
            let monday = week_start_date(day);
            prop_assert_eq!(monday.weekday(), Weekday::Mon);
            prop_assert_eq!(iso_week(monday), iso_week(day));
            prop_assert!((day - monday).num_days() < 7);
        }
    }
}
