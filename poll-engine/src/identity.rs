//! Voter identities and their flat persisted form.
//!
//! Ledgers persist every identity as a single string key. All parsing of
//! those keys happens here:
//!
//! | Identity  | Persisted form            |
//! |-----------|---------------------------|
//! | Real      | `<member>`                |
//! | Guest     | `<owner>_guest_<name>`    |
//! | Non-voter | `_nonvoter_<member>`      |

use std::fmt;
use std::str::FromStr;

use crate::types::{MemberId, PollError, Result};

const GUEST_SEPARATOR: &str = "_guest_";
const NON_VOTER_PREFIX: &str = "_nonvoter_";

/// Who a vote record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoterKey {
    /// A member voting for themselves
    Real(MemberId),
    /// A named guest registered by a member
    Guest { owner: MemberId, name: String },
    /// Bookkeeping entry for a member who has not voted
    NonVoter(MemberId),
}

impl VoterKey {
    pub fn guest(owner: MemberId, name: impl Into<String>) -> Self {
        VoterKey::Guest {
            owner,
            name: name.into(),
        }
    }

    /// The member this identity belongs to.
    pub fn owner(&self) -> MemberId {
        match self {
            VoterKey::Real(id) | VoterKey::NonVoter(id) => *id,
            VoterKey::Guest { owner, .. } => *owner,
        }
    }

    /// Whether this identity casts real ballots.
    pub fn is_ballot(&self) -> bool {
        !matches!(self, VoterKey::NonVoter(_))
    }

    pub fn encode(&self) -> String {
        match self {
            VoterKey::Real(id) => id.to_string(),
            VoterKey::Guest { owner, name } => format!("{owner}{GUEST_SEPARATOR}{name}"),
            VoterKey::NonVoter(id) => format!("{NON_VOTER_PREFIX}{id}"),
        }
    }

    pub fn decode(raw: &str) -> Result<Self> {
        if let Some(id) = raw.strip_prefix(NON_VOTER_PREFIX) {
            return parse_member(id, raw).map(VoterKey::NonVoter);
        }

        if let Some((owner, name)) = raw.split_once(GUEST_SEPARATOR) {
            if name.is_empty() {
                return Err(PollError::Codec(format!("guest key without a name: {raw:?}")));
            }
            let owner = parse_member(owner, raw)?;
            return Ok(VoterKey::guest(owner, name));
        }

        parse_member(raw, raw).map(VoterKey::Real)
    }
}

fn parse_member(id: &str, raw: &str) -> Result<MemberId> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PollError::Codec(format!("invalid voter key: {raw:?}")));
    }
    id.parse::<MemberId>()
        .map_err(|e| PollError::Codec(format!("invalid member id in {raw:?}: {e}")))
}

impl fmt::Display for VoterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for VoterKey {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self> {
        VoterKey::decode(s)
    }
}
