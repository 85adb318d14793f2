//! Storage contract for ledgers.
//!
//! The engine only needs whole-document load and save per scope. How the
//! document reaches disk is up to the implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::types::Scope;

use super::document::Ledger;

/// Error types for storage contract operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded
    #[error("Corrupt document: {0}")]
    Corrupt(String),

    /// Read or write failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Whole-document persistence for per-scope ledgers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load a scope's ledger. Unknown scopes yield an empty ledger.
    async fn load(&self, scope: &Scope) -> Result<Ledger, StorageError>;

    /// Replace a scope's ledger.
    async fn save(&self, scope: &Scope, ledger: &Ledger) -> Result<(), StorageError>;
}

/// In-process ledger store.
///
/// Keeps each scope's ledger as its serialized JSON document so the
/// persisted form is exercised on every round trip.
pub struct InMemoryLedgerStore {
    documents: DashMap<Scope, String>,
    available: AtomicBool,
    save_count: AtomicU32,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            available: AtomicBool::new(true),
            save_count: AtomicU32::new(0),
        }
    }

    /// Toggle availability; an unavailable store fails every call.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Raw stored document for a scope.
    pub fn document(&self, scope: &Scope) -> Option<String> {
        self.documents.get(scope).map(|doc| doc.clone())
    }

    /// Seed a raw document, e.g. one written by an older release.
    pub fn insert_document(&self, scope: Scope, json: impl Into<String>) {
        self.documents.insert(scope, json.into());
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory store disabled".to_string()))
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self, scope: &Scope) -> Result<Ledger, StorageError> {
        self.check_available()?;
        let Some(doc) = self.document(scope) else {
            return Ok(Ledger::default());
        };
        serde_json::from_str(&doc).map_err(|e| StorageError::Corrupt(format!("{scope}: {e}")))
    }

    async fn save(&self, scope: &Scope, ledger: &Ledger) -> Result<(), StorageError> {
        self.check_available()?;
        let doc = serde_json::to_string(ledger).map_err(|e| StorageError::Io(e.to_string()))?;
        self.documents.insert(scope.clone(), doc);
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Slot;
    use poll_calendar::Day;

    #[tokio::test]
    async fn test_unknown_scope_loads_empty() {
        let store = InMemoryLedgerStore::new();
        let ledger = store.load(&Scope::channel(1, 2)).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryLedgerStore::new();
        let scope = Scope::Legacy;
        let mut ledger = Ledger::default();
        ledger.toggle(5, Day::Monday, Slot::EARLY);

        store.save(&scope, &ledger).await.unwrap();
        assert_eq!(store.load(&scope).await.unwrap(), ledger);
        assert_eq!(store.save_count(), 1);
        assert!(store.document(&scope).unwrap().contains("\"5\""));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let store = InMemoryLedgerStore::new();
        store.insert_document(Scope::Legacy, "{\"bogus_key\":{\"friday\":[\"19:00\"]}}");
        let err = store.load(&Scope::Legacy).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[test]
    fn test_unavailable_store_fails() {
        let store = InMemoryLedgerStore::new();
        store.set_available(false);
        let result = tokio_test::block_on(store.load(&Scope::Legacy));
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
