//! The vote ledger service: sanctioned mutations over per-scope ledgers.
//!
//! Every mutation is a load-modify-save cycle over a scope's whole document.
//! Cycles on the same scope are serialized by a per-scope mutex so that
//! interleaved commands never lose an update.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use poll_calendar::{Day, PeriodKind};

use crate::archive::SnapshotReceipt;
use crate::config::CatalogConfig;
use crate::identity::VoterKey;
use crate::roster::RosterProvider;
use crate::selection::DaySelection;
use crate::types::{MemberId, PollError, Result, Scope, Slot};

use super::document::{DayTally, GuestAddOutcome, GuestRemoveOutcome, Ledger};
use super::store::LedgerStore;

/// Exclusive access to one scope's ledger.
///
/// Held for the duration of a load-modify-save cycle, or across an archive
/// snapshot and the reset that follows it.
pub struct ScopeGuard {
    scope: Scope,
    _lock: OwnedMutexGuard<()>,
}

impl ScopeGuard {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl std::fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard").field("scope", &self.scope).finish()
    }
}

/// Authoritative per-scope vote data.
pub struct VoteLedger {
    store: Arc<dyn LedgerStore>,
    catalog: CatalogConfig,
    locks: DashMap<Scope, Arc<Mutex<()>>>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: CatalogConfig) -> Self {
        Self {
            store,
            catalog,
            locks: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// Acquire the scope's mutex.
    pub async fn lock_scope(&self, scope: &Scope) -> ScopeGuard {
        let lock = self
            .locks
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ScopeGuard {
            scope: scope.clone(),
            _lock: lock.lock_owned().await,
        }
    }

    /// Drop the scope's mutex if nobody holds or awaits it. Returns whether
    /// it was dropped.
    pub fn release_scope(&self, scope: &Scope) -> bool {
        self.locks
            .remove_if(scope, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    /// Number of scopes with a live mutex.
    pub fn locked_scope_count(&self) -> usize {
        self.locks.len()
    }

    /// Load the ledger of the guarded scope.
    pub async fn load_guarded(&self, guard: &ScopeGuard) -> Result<Ledger> {
        Ok(self.store.load(guard.scope()).await?)
    }

    async fn mutate<T>(&self, scope: &Scope, f: impl FnOnce(&mut Ledger) -> T) -> Result<T> {
        let guard = self.lock_scope(scope).await;
        let mut ledger = self.load_guarded(&guard).await?;
        let out = f(&mut ledger);
        self.store.save(scope, &ledger).await?;
        Ok(out)
    }

    fn check_option(&self, day: Day, slot: Slot) -> Result<()> {
        if self.catalog.allows(day, slot) {
            Ok(())
        } else {
            warn!(day = %day, slot = %slot, "Rejected option outside the catalog");
            Err(PollError::InvalidOption { day, slot })
        }
    }

    /// Toggle `slot` on `day` for a member's own ballot.
    pub async fn toggle(&self, scope: &Scope, voter: MemberId, day: Day, slot: Slot) -> Result<DaySelection> {
        self.check_option(day, slot)?;
        let selection = self.mutate(scope, |ledger| ledger.toggle(voter, day, slot)).await?;
        info!(
            scope = %scope,
            voter = voter,
            day = %day,
            slot = %slot,
            selection = ?selection.slots(),
            "Toggled vote"
        );
        Ok(selection)
    }

    /// Register named guests of `owner` for a slot.
    pub async fn add_guest_votes(
        &self,
        scope: &Scope,
        owner: MemberId,
        day: Day,
        slot: Slot,
        names: &[String],
    ) -> Result<GuestAddOutcome> {
        self.check_option(day, slot)?;
        let outcome = self
            .mutate(scope, |ledger| ledger.add_guests(owner, day, slot, names))
            .await?;
        info!(
            scope = %scope,
            owner = owner,
            day = %day,
            slot = %slot,
            added = outcome.added.len(),
            already_present = outcome.already_present.len(),
            "Added guest votes"
        );
        Ok(outcome)
    }

    /// Withdraw named guests of `owner` from a slot.
    pub async fn remove_guest_votes(
        &self,
        scope: &Scope,
        owner: MemberId,
        day: Day,
        slot: Slot,
        names: &[String],
    ) -> Result<GuestRemoveOutcome> {
        self.check_option(day, slot)?;
        let outcome = self
            .mutate(scope, |ledger| ledger.remove_guests(owner, day, slot, names))
            .await?;
        info!(
            scope = %scope,
            owner = owner,
            day = %day,
            slot = %slot,
            removed = outcome.removed.len(),
            not_found = outcome.not_found.len(),
            "Removed guest votes"
        );
        Ok(outcome)
    }

    /// Replace non-voter bookkeeping for every day of `kind` with the
    /// roster members who have not voted.
    pub async fn recompute_non_voters(
        &self,
        scope: &Scope,
        kind: PeriodKind,
        roster: &BTreeSet<MemberId>,
    ) -> Result<()> {
        self.mutate(scope, |ledger| ledger.recompute_non_voters(kind.days(), roster))
            .await?;
        info!(scope = %scope, kind = %kind, roster = roster.len(), "Recomputed non-voters");
        Ok(())
    }

    /// Fetch the channel roster and recompute non-voters from it.
    pub async fn sync_non_voters(
        &self,
        scope: &Scope,
        kind: PeriodKind,
        channel_id: u64,
        roster: &dyn RosterProvider,
    ) -> Result<()> {
        let members: BTreeSet<MemberId> = roster
            .list_non_bot_member_ids(channel_id)
            .await?
            .into_iter()
            .collect();
        self.recompute_non_voters(scope, kind, &members).await
    }

    /// Clear the archived block's days from the scope's ledger.
    ///
    /// Only a successful archive snapshot of the same scope yields a
    /// receipt, and the receipt keeps the scope locked until the reset.
    /// Days of the other block were not archived and are kept.
    pub async fn reset_scope(&self, receipt: SnapshotReceipt) -> Result<()> {
        let kind = receipt.kind();
        let guard = receipt.into_guard();
        let mut ledger = self.load_guarded(&guard).await?;
        ledger.clear_days(kind.days());
        self.store.save(guard.scope(), &ledger).await?;
        info!(scope = %guard.scope(), kind = %kind, "Reset period");
        Ok(())
    }

    /// Snapshot of a scope's ledger.
    pub async fn ledger(&self, scope: &Scope) -> Result<Ledger> {
        let guard = self.lock_scope(scope).await;
        self.load_guarded(&guard).await
    }

    pub async fn selection(&self, scope: &Scope, voter: &VoterKey, day: Day) -> Result<DaySelection> {
        Ok(self.ledger(scope).await?.selection(voter, day))
    }

    pub async fn count_for_slot(&self, scope: &Scope, day: Day, slot: Slot) -> Result<u32> {
        let count = self.ledger(scope).await?.count_for_slot(day, slot);
        debug!(scope = %scope, day = %day, slot = %slot, count = count, "Counted slot");
        Ok(count)
    }

    pub async fn tally(&self, scope: &Scope, day: Day) -> Result<DayTally> {
        Ok(self.ledger(scope).await?.tally(day))
    }

    pub async fn non_voters(&self, scope: &Scope, day: Day) -> Result<BTreeSet<MemberId>> {
        Ok(self.ledger(scope).await?.non_voters_on(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedgerStore;
    use crate::roster::StaticRoster;

    fn ledger_with_store() -> (VoteLedger, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = VoteLedger::new(store.clone(), CatalogConfig::default());
        (ledger, store)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_toggle_persists() {
        let (ledger, store) = ledger_with_store();
        let scope = Scope::channel(1, 10);

        ledger.toggle(&scope, 100, Day::Friday, Slot::EARLY).await.unwrap();
        ledger.toggle(&scope, 100, Day::Friday, Slot::LATE).await.unwrap();
        assert_eq!(ledger.count_for_slot(&scope, Day::Friday, Slot::EARLY).await.unwrap(), 1);
        assert_eq!(ledger.count_for_slot(&scope, Day::Friday, Slot::LATE).await.unwrap(), 1);

        let sel = ledger.toggle(&scope, 100, Day::Friday, Slot::TENTATIVE).await.unwrap();
        assert_eq!(sel.slots(), vec![Slot::TENTATIVE]);
        assert_eq!(store.save_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_option_is_a_no_op() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let catalog = CatalogConfig {
            days: vec![Day::Friday],
            slots: vec![Slot::LATE],
        };
        let ledger = VoteLedger::new(store.clone(), catalog);
        let scope = Scope::Legacy;

        let err = ledger.toggle(&scope, 1, Day::Friday, Slot::EARLY).await.unwrap_err();
        assert!(matches!(err, PollError::InvalidOption { day: Day::Friday, slot: Slot::EARLY }));
        let err = ledger
            .add_guest_votes(&scope, 1, Day::Monday, Slot::LATE, &names(&["Toad"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::InvalidOption { .. }));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let (ledger, _) = ledger_with_store();
        let a = Scope::channel(1, 10);
        let b = Scope::channel(1, 11);

        ledger.toggle(&a, 100, Day::Saturday, Slot::LATE).await.unwrap();
        assert_eq!(ledger.count_for_slot(&a, Day::Saturday, Slot::LATE).await.unwrap(), 1);
        assert_eq!(ledger.count_for_slot(&b, Day::Saturday, Slot::LATE).await.unwrap(), 0);
        assert_eq!(ledger.count_for_slot(&Scope::Legacy, Day::Saturday, Slot::LATE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_guest_votes_count_and_delete() {
        let (ledger, _) = ledger_with_store();
        let scope = Scope::Legacy;

        let outcome = ledger
            .add_guest_votes(&scope, 7, Day::Friday, Slot::EARLY, &names(&["Toad", "Luigi"]))
            .await
            .unwrap();
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(ledger.count_for_slot(&scope, Day::Friday, Slot::EARLY).await.unwrap(), 2);

        ledger
            .remove_guest_votes(&scope, 7, Day::Friday, Slot::EARLY, &names(&["Toad"]))
            .await
            .unwrap();
        assert_eq!(ledger.count_for_slot(&scope, Day::Friday, Slot::EARLY).await.unwrap(), 1);
        let snapshot = ledger.ledger(&scope).await.unwrap();
        assert_eq!(snapshot.guests_of(7), names(&["Luigi"]));
    }

    #[tokio::test]
    async fn test_sync_non_voters_from_roster() {
        let (ledger, _) = ledger_with_store();
        let scope = Scope::channel(3, 30);
        let roster = StaticRoster::new().with_members(30, [100, 200, 300]);

        ledger.toggle(&scope, 100, Day::Friday, Slot::LATE).await.unwrap();
        ledger
            .sync_non_voters(&scope, PeriodKind::Weekend, 30, &roster)
            .await
            .unwrap();
        assert_eq!(
            ledger.non_voters(&scope, Day::Friday).await.unwrap(),
            [200, 300].into_iter().collect()
        );
        assert_eq!(ledger.non_voters(&scope, Day::Monday).await.unwrap(), BTreeSet::new());

        ledger.toggle(&scope, 200, Day::Friday, Slot::EARLY).await.unwrap();
        ledger
            .sync_non_voters(&scope, PeriodKind::Weekend, 30, &roster)
            .await
            .unwrap();
        assert_eq!(
            ledger.non_voters(&scope, Day::Friday).await.unwrap(),
            [300].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_concurrent_toggles_lose_no_updates() {
        let (ledger, _) = ledger_with_store();
        let ledger = Arc::new(ledger);
        let scope = Scope::channel(1, 1);

        let tasks: Vec<_> = (0..50u64)
            .map(|voter| {
                let ledger = Arc::clone(&ledger);
                let scope = scope.clone();
                tokio::spawn(async move { ledger.toggle(&scope, voter, Day::Sunday, Slot::LATE).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(ledger.count_for_slot(&scope, Day::Sunday, Slot::LATE).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_release_scope_only_when_idle() {
        let (ledger, _) = ledger_with_store();
        let scope = Scope::channel(8, 8);

        let guard = ledger.lock_scope(&scope).await;
        assert!(!ledger.release_scope(&scope));
        assert_eq!(ledger.locked_scope_count(), 1);

        drop(guard);
        assert!(ledger.release_scope(&scope));
        assert_eq!(ledger.locked_scope_count(), 0);
        assert!(!ledger.release_scope(&scope));

        ledger.toggle(&scope, 1, Day::Friday, Slot::LATE).await.unwrap();
        assert_eq!(ledger.count_for_slot(&scope, Day::Friday, Slot::LATE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let (ledger, store) = ledger_with_store();
        store.set_available(false);
        let err = ledger
            .toggle(&Scope::Legacy, 1, Day::Friday, Slot::EARLY)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Storage(_)));
    }
}
