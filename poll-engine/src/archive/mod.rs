//! Per-week archive of poll results.

mod builder;
mod codec;
mod schema;
mod store;

pub use builder::{ArchiveSnapshotBuilder, SnapshotReceipt};
pub use codec::Delimiter;
pub use schema::{ArchiveRow, SchemaVersion, Table, Upsert, NOT_TRACKED, WEEK_COLUMN};
pub use store::{InMemoryRowStore, RowStore};
