//! PollEngine: wires the ledger, calendar, visibility, decision, archive
//! and timer components together for one deployment.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use poll_calendar::{BlockDates, Day, PeriodKind, PeriodResolver};

use crate::archive::{ArchiveSnapshotBuilder, InMemoryRowStore, RowStore, Upsert};
use crate::config::PollConfig;
use crate::decision::{Announcement, DecisionEngine};
use crate::ledger::{InMemoryLedgerStore, LedgerStore, VoteLedger};
use crate::timers::{NotificationTimers, TimerKey, TimerPurpose};
use crate::types::{Result, Scope};
use crate::visibility::{Visibility, VisibilityMode, VisibilityPolicy, VisibilitySetting, VisibilitySettings};

/// The poll engine.
///
/// Owns every piece of per-process state (scope locks, visibility settings,
/// pending timers). Dropping it cancels all pending timers.
pub struct PollEngine {
    config: PollConfig,
    resolver: PeriodResolver,
    ledger: Arc<VoteLedger>,
    settings: VisibilitySettings,
    decision: DecisionEngine,
    archive: Arc<ArchiveSnapshotBuilder>,
    timers: NotificationTimers,
}

impl PollEngine {
    /// Create an engine over the given stores.
    pub fn new(config: PollConfig, ledger_store: Arc<dyn LedgerStore>, row_store: Arc<dyn RowStore>) -> Result<Self> {
        config.validate()?;
        let resolver = config.resolver()?;

        info!(
            timezone = %resolver.timezone(),
            threshold = config.decision.threshold,
            "Creating poll engine"
        );

        Ok(Self {
            ledger: Arc::new(VoteLedger::new(ledger_store, config.catalog.clone())),
            settings: VisibilitySettings::new(config.visibility.default_setting()),
            decision: DecisionEngine::new(config.decision.threshold, resolver),
            archive: Arc::new(ArchiveSnapshotBuilder::new(row_store, resolver)),
            timers: NotificationTimers::new(),
            resolver,
            config,
        })
    }

    /// Create an engine backed by in-memory stores.
    pub fn in_memory(config: PollConfig) -> Result<Self> {
        let rows = Arc::new(InMemoryRowStore::new(config.archive.delimiter));
        Self::new(config, Arc::new(InMemoryLedgerStore::new()), rows)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PeriodResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &VisibilitySettings {
        &self.settings
    }

    pub fn archive(&self) -> &ArchiveSnapshotBuilder {
        &self.archive
    }

    pub fn timers(&self) -> &NotificationTimers {
        &self.timers
    }

    /// Current instant in the deployment zone.
    pub fn now(&self) -> DateTime<Tz> {
        self.resolver.localize(&Utc::now())
    }

    /// Dates of the block of `kind` that contains `now`.
    pub fn block(&self, kind: PeriodKind, now: &DateTime<Tz>) -> BlockDates {
        self.resolver.resolve(kind, now)
    }

    /// Whether counts for `day` may be shown at `now`.
    pub fn visibility(&self, scope: &Scope, day: Day, now: &DateTime<Tz>) -> Visibility {
        let setting = self.settings.get(scope, day);
        VisibilityPolicy::evaluate(&setting, day, &self.resolver.localize(now))
    }

    pub fn set_visibility(&self, scope: &Scope, day: Day, setting: VisibilitySetting) {
        self.settings.set(scope, day, setting);
    }

    /// Go/no-go announcement for `day` at `now`.
    pub async fn decide(&self, scope: &Scope, day: Day, now: &DateTime<Tz>) -> Result<Announcement> {
        self.decision
            .evaluate(&self.ledger, &self.settings, scope, day, now)
            .await
    }

    /// Archive the block containing `now` and reset the scope.
    ///
    /// Pending reminders and reveals for the block's days are cancelled
    /// once the reset has happened.
    pub async fn rollover(&self, scope: &Scope, kind: PeriodKind, now: &DateTime<Tz>) -> Result<Upsert> {
        let upsert = self.archive.rollover(&self.ledger, scope, kind, now).await?;
        for day in kind.days() {
            self.timers
                .cancel(&TimerKey::new(scope.clone(), TimerPurpose::Reminder(*day)));
            self.timers
                .cancel(&TimerKey::new(scope.clone(), TimerPurpose::DeadlineReveal(*day)));
        }
        info!(scope = %scope, kind = %kind, upsert = ?upsert, "Rolled over period");
        Ok(upsert)
    }

    /// Run `on_reveal` when counts for `day` become visible.
    ///
    /// Returns `None` when nothing is hidden: the day's mode shows counts
    /// anyway, or the deadline has already passed.
    pub fn schedule_deadline_reveal<F>(&self, scope: &Scope, day: Day, now: &DateTime<Tz>, on_reveal: F) -> Option<u64>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let setting = self.settings.get(scope, day);
        if setting.mode == VisibilityMode::AlwaysVisible {
            return None;
        }
        let date = self.block(day.period(), now).date_of(day)?;
        let reveal_at = self.resolver.localize_naive(date.and_time(setting.deadline));
        if reveal_at <= *now {
            return None;
        }

        let key = TimerKey::new(scope.clone(), TimerPurpose::DeadlineReveal(day));
        Some(self.timers.schedule(key, delay_until(&reveal_at, now), on_reveal))
    }

    /// Schedule the rollover of the block containing `now` at the block's
    /// reset boundary. Failures are logged when the timer fires.
    pub fn schedule_rollover(&self, scope: &Scope, kind: PeriodKind, now: &DateTime<Tz>) -> u64 {
        let block = self.block(kind, now);
        let fire_at = self
            .resolver
            .localize_naive(block.reset_date().and_time(NaiveTime::default()));

        let ledger = Arc::clone(&self.ledger);
        let archive = Arc::clone(&self.archive);
        let task_scope = scope.clone();
        let reference = *now;
        let task = async move {
            if let Err(e) = archive.rollover(&ledger, &task_scope, kind, &reference).await {
                error!(scope = %task_scope, kind = %kind, error = %e, "Scheduled rollover failed");
            }
        };

        info!(scope = %scope, kind = %kind, at = %fire_at, "Scheduled rollover");
        let key = TimerKey::new(scope.clone(), TimerPurpose::Rollover(kind));
        self.timers.schedule(key, delay_until(&fire_at, now), task)
    }

    /// Forget a scope's per-process state: visibility settings, timers and
    /// its mutex when idle.
    ///
    /// The persisted ledger is left alone.
    pub fn close_scope(&self, scope: &Scope) {
        let settings = self.settings.clear_scope(scope);
        let timers = self.timers.cancel_scope(scope);
        let lock_released = self.ledger.release_scope(scope);
        info!(
            scope = %scope,
            settings = settings,
            timers = timers,
            lock_released = lock_released,
            "Closed scope"
        );
    }
}

fn delay_until(at: &DateTime<Tz>, now: &DateTime<Tz>) -> Duration {
    at.signed_duration_since(*now).to_std().unwrap_or(Duration::ZERO)
}
