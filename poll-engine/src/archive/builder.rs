//! Weekly archive snapshots and the snapshot-then-reset rollover.

use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use poll_calendar::{PeriodKind, PeriodResolver};

use crate::ledger::{Ledger, ScopeGuard, StorageError, VoteLedger};
use crate::types::{PollError, Result, Scope};

use super::schema::{ArchiveRow, SchemaVersion, Upsert};
use super::store::RowStore;

/// Proof that a scope was archived.
///
/// Keeps the scope locked until it is handed to
/// [`VoteLedger::reset_scope`] or dropped, so no vote can slip in between
/// the snapshot and the reset.
#[derive(Debug)]
pub struct SnapshotReceipt {
    id: Uuid,
    kind: PeriodKind,
    week: String,
    upsert: Upsert,
    guard: ScopeGuard,
}

impl SnapshotReceipt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        self.guard.scope()
    }

    /// Block whose days were archived.
    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    /// ISO week of the archived row.
    pub fn week(&self) -> &str {
        &self.week
    }

    pub fn upsert(&self) -> Upsert {
        self.upsert
    }

    pub(crate) fn into_guard(self) -> ScopeGuard {
        self.guard
    }
}

/// Writes one archive row per scope and ISO week.
pub struct ArchiveSnapshotBuilder {
    rows: Arc<dyn RowStore>,
    resolver: PeriodResolver,
}

impl ArchiveSnapshotBuilder {
    pub fn new(rows: Arc<dyn RowStore>, resolver: PeriodResolver) -> Self {
        Self { rows, resolver }
    }

    /// Row store the archive is written to.
    pub fn rows(&self) -> &Arc<dyn RowStore> {
        &self.rows
    }

    /// Aggregate `ledger` over the block of `kind` containing `now`.
    pub fn build_row(&self, ledger: &Ledger, kind: PeriodKind, now: &DateTime<Tz>) -> ArchiveRow {
        let block = self.resolver.resolve(kind, now);
        ArchiveRow::from_ledger(&block, ledger)
    }

    /// Upsert `row` into the scope's table, upgrading its header first.
    pub async fn write_row(&self, scope: &Scope, kind: PeriodKind, row: &ArchiveRow) -> std::result::Result<Upsert, StorageError> {
        let mut table = self.rows.read_table(scope, kind).await?;
        let target = SchemaVersion::CURRENT.header(kind);

        if table.header.is_empty() {
            table.header = target;
        } else {
            let detected = SchemaVersion::detect(kind, &table.header);
            if table.migrate(&target) {
                warn!(
                    scope = %scope,
                    kind = %kind,
                    from = ?detected,
                    rows = table.rows.len(),
                    "Migrated archive header"
                );
            }
        }

        let upsert = table.upsert(row.cells());
        self.rows.write_table(scope, kind, &table).await?;
        Ok(upsert)
    }

    /// Archive the scope's current ledger and return a receipt that keeps
    /// the scope locked.
    ///
    /// `now` selects the block being archived, so it must lie inside the
    /// period that is ending.
    pub async fn snapshot(
        &self,
        ledger: &VoteLedger,
        scope: &Scope,
        kind: PeriodKind,
        now: &DateTime<Tz>,
    ) -> Result<SnapshotReceipt> {
        let guard = ledger.lock_scope(scope).await;
        let fail = |source: StorageError| {
            error!(scope = %scope, kind = %kind, error = %source, "Archive snapshot failed");
            PollError::SnapshotFailed {
                scope: scope.clone(),
                source,
            }
        };

        let current = match ledger.load_guarded(&guard).await {
            Ok(current) => current,
            Err(PollError::Storage(source)) => return Err(fail(source)),
            Err(other) => return Err(other),
        };
        let row = self.build_row(&current, kind, now);
        let upsert = self.write_row(scope, kind, &row).await.map_err(fail)?;

        let receipt = SnapshotReceipt {
            id: Uuid::new_v4(),
            kind,
            week: row.week,
            upsert,
            guard,
        };
        info!(
            scope = %scope,
            kind = %kind,
            week = %receipt.week,
            upsert = ?upsert,
            receipt = %receipt.id,
            "Archived snapshot"
        );
        Ok(receipt)
    }

    /// Archive the period, then clear the block's days from the scope's
    /// ledger.
    ///
    /// A failed snapshot leaves the ledger untouched. Votes on the other
    /// block's days are kept.
    pub async fn rollover(
        &self,
        ledger: &VoteLedger,
        scope: &Scope,
        kind: PeriodKind,
        now: &DateTime<Tz>,
    ) -> Result<Upsert> {
        let receipt = self.snapshot(ledger, scope, kind, now).await?;
        let upsert = receipt.upsert();
        ledger.reset_scope(receipt).await?;
        Ok(upsert)
    }
}
