//! Roster provider contract: who is in a channel.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::MemberId;

/// Error types for roster lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// Channel is unknown to the platform
    #[error("Unknown channel: {0}")]
    UnknownChannel(u64),

    /// Platform request failed
    #[error("Roster request failed: {0}")]
    RequestFailed(String),
}

/// Lists the human members of a channel.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Member ids of everyone in the channel who is not a bot.
    async fn list_non_bot_member_ids(&self, channel_id: u64) -> Result<Vec<MemberId>, RosterError>;
}

/// Fixed rosters, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    channels: HashMap<u64, Vec<MemberId>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the members of a channel.
    pub fn with_members(mut self, channel_id: u64, members: impl IntoIterator<Item = MemberId>) -> Self {
        self.channels.insert(channel_id, members.into_iter().collect());
        self
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn list_non_bot_member_ids(&self, channel_id: u64) -> Result<Vec<MemberId>, RosterError> {
        self.channels
            .get(&channel_id)
            .cloned()
            .ok_or(RosterError::UnknownChannel(channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_roster() {
        let roster = StaticRoster::new().with_members(5, [1, 2]);
        assert_eq!(roster.list_non_bot_member_ids(5).await.unwrap(), vec![1, 2]);
        assert_eq!(
            roster.list_non_bot_member_ids(6).await,
            Err(RosterError::UnknownChannel(6))
        );
    }
}
