//! Go/no-go decision for a poll day.
//!
//! Recomputed from current counts and the clock on every call; nothing is
//! cached between calls.

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use poll_calendar::{Day, PeriodResolver};

use crate::ledger::VoteLedger;
use crate::types::{ConcreteSlot, Result, Scope};
use crate::visibility::VisibilitySettings;

/// Counts of the two concrete slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotCounts {
    pub early: u32,
    pub late: u32,
}

/// Final result once the deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    /// The event happens at `slot`
    Go {
        #[serde(serialize_with = "serialize_slot")]
        slot: ConcreteSlot,
        count: u32,
    },
    /// Not enough participants
    NoGo,
}

fn serialize_slot<S: serde::Serializer>(slot: &ConcreteSlot, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(slot.as_str())
}

/// What may be announced for a day right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Announcement {
    /// The day is not today
    NoAnnouncement,
    /// Today, but the deadline has not passed
    Pending { deadline: NaiveTime },
    /// Today, deadline passed
    Resolved { result: Outcome },
}

/// Decides whether an event happens.
#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    threshold: u32,
    resolver: PeriodResolver,
}

impl DecisionEngine {
    pub fn new(threshold: u32, resolver: PeriodResolver) -> Self {
        Self { threshold, resolver }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Pick the outcome from slot counts.
    ///
    /// The later slot wins every tie with the earlier slot, and takes the
    /// event whenever it reaches both the threshold and the earlier count.
    pub fn resolve_counts(&self, counts: SlotCounts) -> Outcome {
        if counts.late >= counts.early.max(self.threshold) {
            Outcome::Go {
                slot: ConcreteSlot::Late,
                count: counts.late,
            }
        } else if counts.early >= self.threshold {
            Outcome::Go {
                slot: ConcreteSlot::Early,
                count: counts.early,
            }
        } else {
            Outcome::NoGo
        }
    }

    /// Decide for a day falling on `date` with the given deadline.
    pub fn decide(&self, date: NaiveDate, deadline: NaiveTime, counts: SlotCounts, now: &DateTime<Tz>) -> Announcement {
        let local = self.resolver.localize(now);
        if local.date_naive() != date {
            return Announcement::NoAnnouncement;
        }
        if local.time() < deadline {
            return Announcement::Pending { deadline };
        }
        Announcement::Resolved {
            result: self.resolve_counts(counts),
        }
    }

    /// Decide for `day` of a scope using current ledger counts.
    pub async fn evaluate(
        &self,
        ledger: &VoteLedger,
        settings: &VisibilitySettings,
        scope: &Scope,
        day: Day,
        now: &DateTime<Tz>,
    ) -> Result<Announcement> {
        let block = self.resolver.resolve(day.period(), now);
        let Some(date) = block.date_of(day) else {
            return Ok(Announcement::NoAnnouncement);
        };

        let tally = ledger.tally(scope, day).await?;
        let counts = SlotCounts {
            early: tally.early,
            late: tally.late,
        };
        let deadline = settings.get(scope, day).deadline;
        let announcement = self.decide(date, deadline, counts, now);

        debug!(
            scope = %scope,
            day = %day,
            early = counts.early,
            late = counts.late,
            announcement = ?announcement,
            "Evaluated decision"
        );
        Ok(announcement)
    }
}
