//! Poll Engine - state for recurring weekly availability polls
//!
//! Members of a channel mark which time slots work for them on the days of
//! a weekly block. The engine keeps the votes and decides whether an event
//! happens:
//!
//! - **Vote ledger**: per-scope selections for members and their named
//!   guests, plus bookkeeping of roster members who have not voted
//! - **Visibility**: counts can stay hidden on the day until a deadline
//! - **Decision**: after the deadline, go at 19:00 or 20:30, or no-go
//! - **Archive**: one row per ISO week, written before each reset
//! - **Timers**: cancellable reveal, reminder and rollover timers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       PollEngine                         │
//! │                                                          │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────────────┐  │
//! │  │ VoteLedger │──│  Decision  │  │ VisibilitySettings │  │
//! │  └─────┬──────┘  └────────────┘  └────────────────────┘  │
//! │        │                                                 │
//! │  ┌─────▼──────┐  ┌──────────────────────┐  ┌──────────┐  │
//! │  │LedgerStore │  │ArchiveSnapshotBuilder│──│ RowStore │  │
//! │  └────────────┘  └──────────────────────┘  └──────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Calendar math lives in the `poll-calendar` crate.

pub mod archive;
pub mod config;
pub mod decision;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod roster;
pub mod selection;
pub mod timers;
pub mod types;
pub mod visibility;

// Re-export main types
pub use archive::{ArchiveSnapshotBuilder, SnapshotReceipt};
pub use config::PollConfig;
pub use decision::{Announcement, DecisionEngine, Outcome};
pub use engine::PollEngine;
pub use identity::VoterKey;
pub use ledger::{Ledger, VoteLedger};
pub use selection::DaySelection;
pub use timers::{NotificationTimers, TimerKey, TimerPurpose};
pub use types::*;
pub use visibility::{Visibility, VisibilityMode, VisibilityPolicy, VisibilitySetting};
