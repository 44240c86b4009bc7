use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use std::fmt;
use std::str::FromStr;

use crate::error::SlipError;
use crate::holidays;

/// A civil date with no time of day attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay {
    date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Workday,
    Weekend,
    Holiday(&'static str),
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Workday => f.write_str("workday"),
            DayType::Weekend => f.write_str("weekend"),
            DayType::Holiday(title) => f.write_str(title),
        }
    }
}

impl CalendarDay {
    #[cfg(test)]
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_date)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        CalendarDay { date }
    }

    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    #[cfg(test)]
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    #[cfg(test)]
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    #[cfg(test)]
    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn next_day(&self) -> Self {
        Self::from_date(self.date + Duration::days(1))
    }

    pub fn previous_day(&self) -> Self {
        Self::from_date(self.date - Duration::days(1))
    }

    pub fn first_of_month(&self) -> Self {
        Self::from_date(self.date.with_day(1).unwrap_or(self.date))
    }

    pub fn is_after(&self, other: &CalendarDay) -> bool {
        self > other
    }

    pub fn weekday_name(&self) -> &'static str {
        match self.date.weekday() {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn public_holiday(&self) -> Option<&'static str> {
        holidays::lookup(self.date)
    }

    /// Holiday wins over weekend, weekend over workday.
    pub fn day_type(&self) -> DayType {
        if let Some(title) = self.public_holiday() {
            DayType::Holiday(title)
        } else if self.is_weekend() {
            DayType::Weekend
        } else {
            DayType::Workday
        }
    }

    pub fn is_off(&self) -> bool {
        self.day_type() != DayType::Workday
    }

    /// Days from `self` through `last`, both inclusive.
    pub fn through(self, last: CalendarDay) -> impl Iterator<Item = CalendarDay> {
        std::iter::successors(Some(self), |day| Some(day.next_day()))
            .take_while(move |day| *day <= last)
    }
}

// Overflowing components roll forward the way a calendar would:
// month 13 is January of the next year, day 0 is the last day of the
// previous month.
fn normalized(year: i32, month: i64, day: i64) -> Option<NaiveDate> {
    let months = i64::from(year) * 12 + month - 1;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_signed(Duration::days(day - 1))
}

fn has_date_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl FromStr for CalendarDay {
    type Err = SlipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SlipError::InvalidDateFormat(s.to_string());
        if !has_date_shape(s) {
            return Err(invalid());
        }

        let year: i32 = s[0..4].parse().map_err(|_| invalid())?;
        let month: i64 = s[5..7].parse().map_err(|_| invalid())?;
        let day: i64 = s[8..10].parse().map_err(|_| invalid())?;

        normalized(year, month, day)
            .map(Self::from_date)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}
