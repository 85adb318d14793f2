//! Core calendar types: day names, period kinds and errors.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A day of the week as it appears in polls, ledgers and archive columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// All days, Monday first.
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// Lowercase English name, used as the persisted key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
            Day::Saturday => "saturday",
            Day::Sunday => "sunday",
        }
    }

    /// Days since Monday (Monday = 0).
    pub fn offset_from_monday(&self) -> u32 {
        self.weekday().num_days_from_monday()
    }

    /// The chrono weekday for this day.
    pub fn weekday(&self) -> Weekday {
        match self {
            Day::Monday => Weekday::Mon,
            Day::Tuesday => Weekday::Tue,
            Day::Wednesday => Weekday::Wed,
            Day::Thursday => Weekday::Thu,
            Day::Friday => Weekday::Fri,
            Day::Saturday => Weekday::Sat,
            Day::Sunday => Weekday::Sun,
        }
    }

    /// The period kind whose block contains this day.
    pub fn period(&self) -> PeriodKind {
        match self {
            Day::Friday | Day::Saturday | Day::Sunday => PeriodKind::Weekend,
            _ => PeriodKind::Weekday,
        }
    }
}

impl From<Weekday> for Day {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
            Weekday::Sun => Day::Sunday,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Day::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| CalendarError::UnknownDay(s.to_string()))
    }
}

/// A named recurring window of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// Friday, Saturday, Sunday. Resets every Monday 00:00.
    Weekend,
    /// Monday through Thursday. Resets every Friday 00:00.
    Weekday,
}

impl PeriodKind {
    /// Days of the block in calendar order.
    /// Earliest day of the window in calendar order.
    pub fn first_day(&self) -> Day {
        match self {
            PeriodKind::Weekend => Day::Friday,
            PeriodKind::Weekday => Day::Monday,
        }
    }

    pub fn days(&self) -> &'static [Day] {
        match self {
            PeriodKind::Weekend => &[Day::Friday, Day::Saturday, Day::Sunday],
            PeriodKind::Weekday => &[Day::Monday, Day::Tuesday, Day::Wednesday, Day::Thursday],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Weekend => "weekend",
            PeriodKind::Weekday => "weekday",
        }
    }

    /// Whether `day` belongs to this block.
    pub fn contains(&self, day: Day) -> bool {
        self.days().contains(&day)
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekend" => Ok(PeriodKind::Weekend),
            "weekday" => Ok(PeriodKind::Weekday),
            _ => Err(CalendarError::UnknownPeriod(s.to_string())),
        }
    }
}

/// Error types for calendar resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    /// Period name is not one of the known windows
    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    /// Day name is not a weekday name
    #[error("Unknown day: {0}")]
    UnknownDay(String),

    /// Timezone name is not a known IANA zone
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_parse_is_case_insensitive() {
        assert_eq!("Friday".parse::<Day>().unwrap(), Day::Friday);
        assert_eq!(" sunday ".parse::<Day>().unwrap(), Day::Sunday);
        assert!(matches!("funday".parse::<Day>(), Err(CalendarError::UnknownDay(_))));
    }

    #[test]
    fn test_period_days() {
        assert_eq!(PeriodKind::Weekend.days().len(), 3);
        assert_eq!(PeriodKind::Weekday.days().len(), 4);
        assert!(PeriodKind::Weekend.contains(Day::Saturday));
        assert!(!PeriodKind::Weekday.contains(Day::Friday));
        for day in Day::ALL {
            assert!(day.period().contains(day));
        }
        assert_eq!(PeriodKind::Weekend.first_day(), Day::Friday);
        assert_eq!(PeriodKind::Weekday.first_day(), Day::Monday);
    }

    #[test]
    fn test_unknown_period_is_rejected() {
        assert_eq!(
            "fortnight".parse::<PeriodKind>(),
            Err(CalendarError::UnknownPeriod("fortnight".to_string()))
        );
    }

    #[test]
    fn test_day_serde_lowercase() {
        let json = serde_json::to_string(&Day::Thursday).unwrap();
        assert_eq!(json, "\"thursday\"");
    }
}
