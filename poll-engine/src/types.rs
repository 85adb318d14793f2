//! Core types for the poll engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use poll_calendar::{CalendarError, Day};

use crate::ledger::StorageError;
use crate::roster::RosterError;

/// A chat-platform member id.
pub type MemberId = u64;

/// One independent poll instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Ungoverned default scope kept for deployments that predate channel scoping
    Legacy,
    /// A (community, channel) pair
    Channel { community_id: u64, channel_id: u64 },
}

impl Scope {
    pub fn channel(community_id: u64, channel_id: u64) -> Self {
        Scope::Channel {
            community_id,
            channel_id,
        }
    }

    /// Channel id, if this is a channel scope.
    pub fn channel_id(&self) -> Option<u64> {
        match self {
            Scope::Legacy => None,
            Scope::Channel { channel_id, .. } => Some(*channel_id),
        }
    }

    /// Key under which the scope's documents are persisted.
    pub fn storage_key(&self) -> String {
        match self {
            Scope::Legacy => "default".to_string(),
            Scope::Channel {
                community_id,
                channel_id,
            } => format!("{community_id}:{channel_id}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// A concrete time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConcreteSlot {
    /// 19:00
    Early,
    /// 20:30
    Late,
}

impl ConcreteSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcreteSlot::Early => "19:00",
            ConcreteSlot::Late => "20:30",
        }
    }

    /// Suffix used in archive column names.
    pub fn column_suffix(&self) -> &'static str {
        match self {
            ConcreteSlot::Early => "19",
            ConcreteSlot::Late => "2030",
        }
    }
}

/// A mutually exclusive special selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Special {
    Tentative,
    NotParticipating,
}

impl Special {
    pub fn as_str(&self) -> &'static str {
        match self {
            Special::Tentative => "tentative",
            Special::NotParticipating => "not_participating",
        }
    }

    pub fn column_suffix(&self) -> &'static str {
        match self {
            Special::Tentative => "tentative",
            Special::NotParticipating => "notParticipating",
        }
    }
}

/// Any option a voter can pick for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Slot {
    Concrete(ConcreteSlot),
    Special(Special),
}

impl Slot {
    pub const EARLY: Slot = Slot::Concrete(ConcreteSlot::Early);
    pub const LATE: Slot = Slot::Concrete(ConcreteSlot::Late);
    pub const TENTATIVE: Slot = Slot::Special(Special::Tentative);
    pub const NOT_PARTICIPATING: Slot = Slot::Special(Special::NotParticipating);

    pub const ALL: [Slot; 4] = [
        Slot::EARLY,
        Slot::LATE,
        Slot::TENTATIVE,
        Slot::NOT_PARTICIPATING,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Concrete(slot) => slot.as_str(),
            Slot::Special(special) => special.as_str(),
        }
    }

    pub fn column_suffix(&self) -> &'static str {
        match self {
            Slot::Concrete(slot) => slot.column_suffix(),
            Slot::Special(special) => special.column_suffix(),
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Slot::Special(_))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == trimmed)
            .ok_or_else(|| PollError::UnknownSlot(s.to_string()))
    }
}

impl TryFrom<String> for Slot {
    type Error = PollError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.as_str().to_string()
    }
}

/// Error types for the poll engine.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The (day, slot) pair is not offered by the option catalog
    #[error("Invalid option: {slot} is not offered on {day}")]
    InvalidOption { day: Day, slot: Slot },

    /// Slot string is not a known option
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    /// Calendar resolution error
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Storage contract error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Roster provider error
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    /// Persisted identity or document could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Archive snapshot failed; the scope must not be reset
    #[error("Snapshot failed for scope {scope}: {source}")]
    SnapshotFailed {
        scope: Scope,
        #[source]
        source: StorageError,
    },
}

pub type Result<T> = std::result::Result<T, PollError>;
