//! Row-store contract for archive tables.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use poll_calendar::PeriodKind;

use crate::ledger::StorageError;
use crate::types::Scope;

use super::codec::Delimiter;
use super::schema::Table;

/// Header-and-rows persistence, one table per (scope, block kind).
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read a table. A table that was never written is empty.
    async fn read_table(&self, scope: &Scope, kind: PeriodKind) -> Result<Table, StorageError>;

    /// Replace a table.
    async fn write_table(&self, scope: &Scope, kind: PeriodKind, table: &Table) -> Result<(), StorageError>;
}

/// In-process row store holding delimited text documents.
pub struct InMemoryRowStore {
    documents: DashMap<(Scope, PeriodKind), String>,
    delimiter: Delimiter,
    writable: AtomicBool,
}

impl InMemoryRowStore {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            documents: DashMap::new(),
            delimiter,
            writable: AtomicBool::new(true),
        }
    }

    /// Make writes fail, e.g. to simulate a full disk.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Raw document of a table.
    pub fn document(&self, scope: &Scope, kind: PeriodKind) -> Option<String> {
        self.documents.get(&(scope.clone(), kind)).map(|doc| doc.clone())
    }

    /// Seed a raw document, e.g. one written under an older header.
    pub fn insert_document(&self, scope: Scope, kind: PeriodKind, text: impl Into<String>) {
        self.documents.insert((scope, kind), text.into());
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn read_table(&self, scope: &Scope, kind: PeriodKind) -> Result<Table, StorageError> {
        Ok(self
            .document(scope, kind)
            .map(|doc| self.delimiter.decode(&doc))
            .unwrap_or_default())
    }

    async fn write_table(&self, scope: &Scope, kind: PeriodKind, table: &Table) -> Result<(), StorageError> {
        if !self.writable.load(Ordering::SeqCst) {
            return Err(StorageError::Io(format!("archive {scope}/{kind} is read-only")));
        }
        self.documents
            .insert((scope.clone(), kind), self.delimiter.encode(table));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kinds_are_persisted_independently() {
        let store = InMemoryRowStore::new(Delimiter::Comma);
        let scope = Scope::channel(1, 2);
        let table = Table::new(vec!["week".to_string()]);

        store.write_table(&scope, PeriodKind::Weekend, &table).await.unwrap();
        assert_eq!(store.read_table(&scope, PeriodKind::Weekend).await.unwrap(), table);
        assert_eq!(store.read_table(&scope, PeriodKind::Weekday).await.unwrap(), Table::default());
    }

    #[tokio::test]
    async fn test_read_only_store_rejects_writes() {
        let store = InMemoryRowStore::new(Delimiter::Semicolon);
        store.set_writable(false);
        let result = store
            .write_table(&Scope::Legacy, PeriodKind::Weekday, &Table::default())
            .await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
