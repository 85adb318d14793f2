//! Rolling-period resolution.
//!
//! Turns a reference instant into calendar dates for the two recurring
//! windows. The weekend block is pinned to the ISO week containing the
//! reference date. The weekday block rolls forward to next week as soon as
//! the reference date enters the weekend, so weekday voting re-opens once
//! the current weekend has begun.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::types::{CalendarError, Day, PeriodKind, Result};

/// A resolved block: ordered day names mapped to calendar dates.
///
/// Only built by [`PeriodResolver`], so it always holds every day of its
/// kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDates {
    kind: PeriodKind,
    start: NaiveDate,
    days: Vec<(Day, NaiveDate)>,
}

impl BlockDates {
    /// Which window this is.
    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    /// Days in calendar order.
    pub fn days(&self) -> &[(Day, NaiveDate)] {
        &self.days
    }

    /// Date for a day of this block, if the day belongs to it.
    pub fn date_of(&self, day: Day) -> Option<NaiveDate> {
        self.days.iter().find(|(d, _)| *d == day).map(|(_, date)| *date)
    }

    /// First date of the block.
    pub fn first_date(&self) -> NaiveDate {
        self.start
    }

    /// Local date at whose midnight the block is over.
    pub fn reset_date(&self) -> NaiveDate {
        self.days.last().map_or(self.start, |(_, date)| *date) + TimeDelta::days(1)
    }

    /// ISO week label (`YYYY-Www`) of the block's first day.
    pub fn iso_week(&self) -> String {
        let week = self.first_date().iso_week();
        format!("{:04}-W{:02}", week.year(), week.week())
    }

    /// Ordered `day -> YYYY-MM-DD` pairs.
    pub fn iso_dates(&self) -> Vec<(Day, String)> {
        self.days
            .iter()
            .map(|(day, date)| (*day, date.format("%Y-%m-%d").to_string()))
            .collect()
    }
}

/// Resolves weekly windows in the deployment's timezone.
#[derive(Debug, Clone, Copy)]
pub struct PeriodResolver {
    tz: Tz,
}

impl Default for PeriodResolver {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Berlin)
    }
}

impl PeriodResolver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build a resolver from an IANA timezone name.
    pub fn from_timezone_name(name: &str) -> Result<Self> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))?;
        Ok(Self::new(tz))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Convert an instant from any zone into the deployment zone.
    pub fn localize<Z: TimeZone>(&self, instant: &DateTime<Z>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    /// Interpret an unzoned wall-clock time in the deployment zone.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant.
    /// Times inside a DST gap move forward by one hour.
    pub fn localize_naive(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        if let Some(dt) = self.tz.from_local_datetime(&naive).earliest() {
            return dt;
        }
        let shifted = naive + TimeDelta::hours(1);
        self.tz
            .from_local_datetime(&shifted)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }

    /// Local calendar date of an instant.
    pub fn today<Z: TimeZone>(&self, instant: &DateTime<Z>) -> NaiveDate {
        self.localize(instant).date_naive()
    }

    /// Resolve a block for an instant in any zone.
    pub fn resolve<Z: TimeZone>(&self, kind: PeriodKind, instant: &DateTime<Z>) -> BlockDates {
        Self::resolve_date(kind, self.today(instant))
    }

    /// Resolve a block for an unzoned wall-clock time.
    pub fn resolve_naive(&self, kind: PeriodKind, naive: NaiveDateTime) -> BlockDates {
        Self::resolve_date(kind, self.localize_naive(naive).date_naive())
    }

    /// Resolve a block by period name. Unknown names are rejected.
    pub fn resolve_named<Z: TimeZone>(&self, period: &str, instant: &DateTime<Z>) -> Result<BlockDates> {
        let kind = period.parse::<PeriodKind>()?;
        Ok(self.resolve(kind, instant))
    }

    /// Resolve a block for a local calendar date.
    pub fn resolve_date(kind: PeriodKind, date: NaiveDate) -> BlockDates {
        let monday = date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()));
        let anchor = match kind {
            PeriodKind::Weekend => monday,
            PeriodKind::Weekday => {
                if PeriodKind::Weekend.contains(Day::from(date.weekday())) {
                    monday + TimeDelta::days(7)
                } else {
                    monday
                }
            }
        };

        let days = kind
            .days()
            .iter()
            .map(|day| (*day, anchor + TimeDelta::days(i64::from(day.offset_from_monday()))))
            .collect();

        debug!(kind = %kind, reference = %date, anchor = %anchor, "Resolved period block");
        BlockDates {
            kind,
            start: anchor + TimeDelta::days(i64::from(kind.first_day().offset_from_monday())),
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn iso(block: &BlockDates) -> Vec<(Day, String)> {
        block.iso_dates()
    }

    #[test]
    fn test_weekend_block_is_stable_all_week() {
        let expected = vec![
            (Day::Friday, "2026-01-09".to_string()),
            (Day::Saturday, "2026-01-10".to_string()),
            (Day::Sunday, "2026-01-11".to_string()),
        ];
        for offset in 0..7 {
            let reference = date(2026, 1, 5) + TimeDelta::days(offset);
            let block = PeriodResolver::resolve_date(PeriodKind::Weekend, reference);
            assert_eq!(iso(&block), expected, "reference {reference}");
        }

        let next_monday = PeriodResolver::resolve_date(PeriodKind::Weekend, date(2026, 1, 12));
        assert_eq!(next_monday.date_of(Day::Friday), Some(date(2026, 1, 16)));
    }

    #[test]
    fn test_weekday_block_resets_on_friday() {
        let monday = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2026, 1, 5));
        assert_eq!(
            iso(&monday),
            vec![
                (Day::Monday, "2026-01-05".to_string()),
                (Day::Tuesday, "2026-01-06".to_string()),
                (Day::Wednesday, "2026-01-07".to_string()),
                (Day::Thursday, "2026-01-08".to_string()),
            ]
        );

        let thursday = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2026, 1, 8));
        assert_eq!(thursday, monday);

        for reference in [date(2026, 1, 9), date(2026, 1, 10), date(2026, 1, 11)] {
            let block = PeriodResolver::resolve_date(PeriodKind::Weekday, reference);
            assert_eq!(block.date_of(Day::Monday), Some(date(2026, 1, 12)));
            assert_eq!(block.date_of(Day::Thursday), Some(date(2026, 1, 15)));
        }
    }

    #[test]
    fn test_year_and_month_boundaries() {
        let weekend = PeriodResolver::resolve_date(PeriodKind::Weekend, date(2025, 12, 29));
        assert_eq!(weekend.date_of(Day::Friday), Some(date(2026, 1, 2)));
        assert_eq!(weekend.date_of(Day::Sunday), Some(date(2026, 1, 4)));

        let weekday = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2025, 12, 29));
        assert_eq!(weekday.date_of(Day::Thursday), Some(date(2026, 1, 1)));

        let rolled = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2026, 1, 3));
        assert_eq!(rolled.date_of(Day::Monday), Some(date(2026, 1, 5)));

        let month = PeriodResolver::resolve_date(PeriodKind::Weekend, date(2026, 1, 27));
        assert_eq!(
            iso(&month),
            vec![
                (Day::Friday, "2026-01-30".to_string()),
                (Day::Saturday, "2026-01-31".to_string()),
                (Day::Sunday, "2026-02-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_foreign_zone_is_converted() {
        let resolver = PeriodResolver::default();
        // Sunday 23:30 UTC is already Monday 00:30 in Berlin.
        let instant = Utc.with_ymd_and_hms(2026, 1, 4, 23, 30, 0).unwrap();
        let block = resolver.resolve(PeriodKind::Weekend, &instant);
        assert_eq!(block.date_of(Day::Friday), Some(date(2026, 1, 9)));

        let weekday = resolver.resolve(PeriodKind::Weekday, &instant);
        assert_eq!(weekday.date_of(Day::Monday), Some(date(2026, 1, 5)));
    }

    #[test]
    fn test_naive_instant_uses_deployment_zone() {
        let resolver = PeriodResolver::default();
        let naive = date(2026, 1, 9).and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        let block = resolver.resolve_naive(PeriodKind::Weekday, naive);
        assert_eq!(block.date_of(Day::Monday), Some(date(2026, 1, 12)));

        // 02:30 does not exist on the spring-forward date in Berlin.
        let gap = date(2026, 3, 29).and_time(NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        let localized = resolver.localize_naive(gap);
        assert_eq!(localized.date_naive(), date(2026, 3, 29));
    }

    #[test]
    fn test_resolve_named_rejects_unknown_period() {
        let resolver = PeriodResolver::default();
        let now = Utc::now();
        assert!(resolver.resolve_named("weekend", &now).is_ok());
        assert_eq!(
            resolver.resolve_named("holiday", &now),
            Err(CalendarError::UnknownPeriod("holiday".to_string()))
        );
    }

    #[test]
    fn test_iso_week_label() {
        let block = PeriodResolver::resolve_date(PeriodKind::Weekend, date(2026, 1, 5));
        assert_eq!(block.iso_week(), "2026-W02");

        let across = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2025, 12, 30));
        assert_eq!(across.iso_week(), "2026-W01");
    }

    #[test]
    fn test_first_and_reset_dates() {
        let weekend = PeriodResolver::resolve_date(PeriodKind::Weekend, date(2026, 1, 7));
        assert_eq!(weekend.kind(), PeriodKind::Weekend);
        assert_eq!(weekend.first_date(), date(2026, 1, 9));
        assert_eq!(weekend.reset_date(), date(2026, 1, 12));
        assert_eq!(weekend.days().len(), 3);

        let weekday = PeriodResolver::resolve_date(PeriodKind::Weekday, date(2026, 1, 10));
        assert_eq!(weekday.first_date(), date(2026, 1, 12));
        assert_eq!(weekday.reset_date(), date(2026, 1, 16));
    }

    #[test]
    fn test_unknown_timezone() {
        assert!(PeriodResolver::from_timezone_name("Europe/Berlin").is_ok());
        assert!(matches!(
            PeriodResolver::from_timezone_name("Mars/Olympus"),
            Err(CalendarError::UnknownTimezone(_))
        ));
    }
}
