use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::error::ParseError;

/// `<4-digit year><2-digit ISO week>`, as carried by the chart's interval ids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct WeekKey {
    year: i32,
    week: u32,
}

impl WeekKey {
    /// Accepts either `201605` or the element id form `interval-201605`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidWeekKey(s.to_owned());
        let digits = s.strip_prefix("interval-").unwrap_or(s);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = digits[..4].parse().map_err(|_| invalid())?;
        let week = digits[4..].parse().map_err(|_| invalid())?;
        Ok(Self { year, week })
    }

    /// The Monday that starts this ISO week.
    ///
    /// Fails for week numbers the year does not have (0, 54, or 53 in a
    /// 52-week year).
    pub fn monday(self) -> Result<NaiveDate, ParseError> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .ok_or_else(|| ParseError::InvalidWeekKey(format!("{}{:02}", self.year, self.week)))
    }
}

/// Local-time bounds `[date 00:00, date + days 00:00)` used to query results.
pub fn day_window(date: NaiveDate, days: u64) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = date.and_time(NaiveTime::MIN);
    let end = date.checked_add_days(Days::new(days))?.and_time(NaiveTime::MIN);
    Some((start, end))
}
