//! Count visibility: whether raw counts for a day may be shown yet.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use poll_calendar::Day;

use crate::types::Scope;

/// How counts for a day are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Counts are always shown
    AlwaysVisible,
    /// Counts are hidden on the day itself until the deadline
    HiddenUntilDeadline,
    /// As `HiddenUntilDeadline`, but members who are not participating are
    /// always listed by name
    HiddenUntilDeadlineShowNonParticipants,
}

/// Visibility configuration for one (scope, day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySetting {
    pub mode: VisibilityMode,
    #[serde(with = "crate::config::time_of_day")]
    pub deadline: NaiveTime,
}

/// What the rendering layer may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visibility {
    /// Raw counts must not be shown
    pub hide_counts: bool,
    /// Not-participating voters are listed even while counts are hidden
    pub reveal_not_participating: bool,
}

/// Stateless visibility rule.
pub struct VisibilityPolicy;

impl VisibilityPolicy {
    /// Decide visibility of `day` at `now`.
    ///
    /// `now` is read in its own zone, so callers pass a localized instant.
    pub fn evaluate<Z: TimeZone>(setting: &VisibilitySetting, day: Day, now: &DateTime<Z>) -> Visibility {
        let hide_counts = match setting.mode {
            VisibilityMode::AlwaysVisible => false,
            VisibilityMode::HiddenUntilDeadline | VisibilityMode::HiddenUntilDeadlineShowNonParticipants => {
                Day::from(now.weekday()) == day && Self::time_of_day(now) < setting.deadline
            }
        };

        Visibility {
            hide_counts,
            reveal_not_participating: setting.mode == VisibilityMode::HiddenUntilDeadlineShowNonParticipants,
        }
    }

    fn time_of_day<Z: TimeZone>(now: &DateTime<Z>) -> NaiveTime {
        NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second()).unwrap_or_default()
    }
}

/// Per-(scope, day) visibility settings with a configured default.
pub struct VisibilitySettings {
    settings: DashMap<(Scope, Day), VisibilitySetting>,
    default: VisibilitySetting,
}

impl VisibilitySettings {
    pub fn new(default: VisibilitySetting) -> Self {
        Self {
            settings: DashMap::new(),
            default,
        }
    }

    pub fn get(&self, scope: &Scope, day: Day) -> VisibilitySetting {
        self.settings
            .get(&(scope.clone(), day))
            .map(|s| *s)
            .unwrap_or(self.default)
    }

    pub fn set(&self, scope: &Scope, day: Day, setting: VisibilitySetting) {
        debug!(scope = %scope, day = %day, mode = ?setting.mode, deadline = %setting.deadline, "Set visibility");
        self.settings.insert((scope.clone(), day), setting);
    }

    /// Drop every explicit setting of a scope. Returns how many were removed.
    pub fn clear_scope(&self, scope: &Scope) -> usize {
        let before = self.settings.len();
        self.settings.retain(|(s, _), _| s != scope);
        before - self.settings.len()
    }
}
