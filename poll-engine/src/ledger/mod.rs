//! Vote ledger: per-scope vote records, their persisted form, and the
//! service that mutates them.

mod document;
mod service;
mod store;

pub use document::{
    DayTally, GuestAddOutcome, GuestRemoveOutcome, Ledger, LedgerDocument, VoteRecord,
    NON_VOTER_SENTINEL,
};
pub use service::{ScopeGuard, VoteLedger};
pub use store::{InMemoryLedgerStore, LedgerStore, StorageError};
