//! The per-scope ledger and its persisted document form.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use poll_calendar::Day;

use crate::identity::VoterKey;
use crate::selection::DaySelection;
use crate::types::{ConcreteSlot, MemberId, PollError, Result, Slot, Special};

/// Placeholder list stored for non-voter entries in the flat document.
pub const NON_VOTER_SENTINEL: &str = "__non_voter__";

/// A voter's selections, keyed by day. Empty days are not stored.
pub type VoteRecord = BTreeMap<Day, DaySelection>;

/// Aggregated counts for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTally {
    pub early: u32,
    pub late: u32,
    pub tentative: u32,
    pub not_participating: u32,
    /// Voters that were tentative earlier in the period and have since decided
    pub was_tentative: u32,
    pub non_voters: u32,
}

impl DayTally {
    pub fn count(&self, slot: Slot) -> u32 {
        match slot {
            Slot::Concrete(ConcreteSlot::Early) => self.early,
            Slot::Concrete(ConcreteSlot::Late) => self.late,
            Slot::Special(Special::Tentative) => self.tentative,
            Slot::Special(Special::NotParticipating) => self.not_participating,
        }
    }
}

/// Result of registering guests for a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestAddOutcome {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
}

/// Result of withdrawing guests from a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestRemoveOutcome {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
}

/// All vote data for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredLedger", into = "LedgerDocument")]
pub struct Ledger {
    /// Real and guest ballots only
    votes: BTreeMap<VoterKey, VoteRecord>,
    /// Members without a ballot, per day
    non_voters: BTreeMap<MemberId, BTreeSet<Day>>,
    /// Identities that picked tentative at some point this period
    was_tentative: BTreeMap<Day, BTreeSet<VoterKey>>,
}

impl Ledger {
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty() && self.non_voters.is_empty() && self.was_tentative.is_empty()
    }

    /// Ballot identities with at least one selection.
    pub fn voters(&self) -> impl Iterator<Item = &VoterKey> {
        self.votes.keys()
    }

    pub fn selection(&self, voter: &VoterKey, day: Day) -> DaySelection {
        self.votes
            .get(voter)
            .and_then(|record| record.get(&day))
            .cloned()
            .unwrap_or_default()
    }

    /// Toggle a slot for a member's own ballot.
    pub fn toggle(&mut self, member: MemberId, day: Day, slot: Slot) -> DaySelection {
        let key = VoterKey::Real(member);
        let next = self.selection(&key, day).toggle(slot);
        self.set_selection(key, day, next.clone());
        next
    }

    /// Register guests of `owner` for a slot.
    ///
    /// A name given twice in one call is added once and then reported as
    /// already present.
    pub fn add_guests(&mut self, owner: MemberId, day: Day, slot: Slot, names: &[String]) -> GuestAddOutcome {
        let mut outcome = GuestAddOutcome::default();

        for name in names {
            let key = VoterKey::guest(owner, name.as_str());
            if self.selection(&key, day).contains(slot) {
                outcome.already_present.push(name.clone());
                continue;
            }
            let next = self.selection(&key, day).with(slot);
            self.set_selection(key, day, next);
            outcome.added.push(name.clone());
        }
        outcome
    }

    /// Withdraw guests of `owner` from a slot. Guests left with no
    /// selections on any day are deleted.
    pub fn remove_guests(&mut self, owner: MemberId, day: Day, slot: Slot, names: &[String]) -> GuestRemoveOutcome {
        let mut outcome = GuestRemoveOutcome::default();

        for name in names {
            let key = VoterKey::guest(owner, name.as_str());
            let current = self.selection(&key, day);
            if !current.contains(slot) {
                outcome.not_found.push(name.clone());
                continue;
            }
            self.set_selection(key, day, current.without(slot));
            outcome.removed.push(name.clone());
        }
        outcome
    }

    /// Guest names registered by `owner`.
    pub fn guests_of(&self, owner: MemberId) -> Vec<String> {
        self.votes
            .keys()
            .filter_map(|key| match key {
                VoterKey::Guest { owner: o, name } if *o == owner => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ballot identities whose selection on `day` includes `slot`.
    pub fn voters_for(&self, day: Day, slot: Slot) -> Vec<&VoterKey> {
        self.votes
            .iter()
            .filter(|(_, record)| record.get(&day).is_some_and(|sel| sel.contains(slot)))
            .map(|(key, _)| key)
            .collect()
    }

    /// Number of ballots (real or guest) that include `slot` on `day`.
    pub fn count_for_slot(&self, day: Day, slot: Slot) -> u32 {
        u32::try_from(self.voters_for(day, slot).len()).unwrap_or(u32::MAX)
    }

    pub fn tally(&self, day: Day) -> DayTally {
        let was_tentative = self.was_tentative.get(&day).map_or(0, |keys| {
            keys.iter()
                .filter(|key| {
                    let current = self.selection(key, day);
                    !current.is_empty() && !current.contains(Slot::TENTATIVE)
                })
                .count()
        });

        DayTally {
            early: self.count_for_slot(day, Slot::EARLY),
            late: self.count_for_slot(day, Slot::LATE),
            tentative: self.count_for_slot(day, Slot::TENTATIVE),
            not_participating: self.count_for_slot(day, Slot::NOT_PARTICIPATING),
            was_tentative: u32::try_from(was_tentative).unwrap_or(u32::MAX),
            non_voters: u32::try_from(self.non_voters_on(day).len()).unwrap_or(u32::MAX),
        }
    }

    /// Members currently recorded as not having voted on `day`.
    pub fn non_voters_on(&self, day: Day) -> BTreeSet<MemberId> {
        self.non_voters
            .iter()
            .filter(|(_, days)| days.contains(&day))
            .map(|(member, _)| *member)
            .collect()
    }

    /// Rebuild non-voter bookkeeping for `days` from the roster.
    ///
    /// A member counts as having voted on a day if they hold a ballot that
    /// day or own a guest that does.
    pub fn recompute_non_voters(&mut self, days: &[Day], roster: &BTreeSet<MemberId>) {
        for day in days {
            let voted: BTreeSet<MemberId> = self
                .votes
                .iter()
                .filter(|(_, record)| record.get(day).is_some_and(|sel| !sel.is_empty()))
                .map(|(key, _)| key.owner())
                .collect();

            for days_missing in self.non_voters.values_mut() {
                days_missing.remove(day);
            }
            for member in roster.difference(&voted) {
                self.non_voters.entry(*member).or_default().insert(*day);
            }
        }
        self.non_voters.retain(|_, days| !days.is_empty());
    }

    /// Forget everything recorded for `days`: ballots, non-voter entries
    /// and tentative history. Other days are kept.
    pub fn clear_days(&mut self, days: &[Day]) {
        for record in self.votes.values_mut() {
            for day in days {
                record.remove(day);
            }
        }
        self.votes.retain(|_, record| !record.is_empty());

        for missing in self.non_voters.values_mut() {
            for day in days {
                missing.remove(day);
            }
        }
        self.non_voters.retain(|_, missing| !missing.is_empty());

        let votes = &self.votes;
        self.was_tentative.retain(|day, keys| {
            keys.retain(|key| votes.contains_key(key));
            !days.contains(day) && !keys.is_empty()
        });
    }

    fn set_selection(&mut self, key: VoterKey, day: Day, selection: DaySelection) {
        if selection.contains(Slot::TENTATIVE) {
            self.was_tentative.entry(day).or_default().insert(key.clone());
        }

        if selection.is_empty() {
            if let Some(record) = self.votes.get_mut(&key) {
                record.remove(&day);
                if record.is_empty() {
                    self.votes.remove(&key);
                    for keys in self.was_tentative.values_mut() {
                        keys.remove(&key);
                    }
                    self.was_tentative.retain(|_, keys| !keys.is_empty());
                }
            }
            return;
        }

        let owner = key.owner();
        self.votes.entry(key).or_default().insert(day, selection);
        self.clear_non_voter(owner, day);
    }

    fn clear_non_voter(&mut self, member: MemberId, day: Day) {
        if let Some(days) = self.non_voters.get_mut(&member) {
            days.remove(&day);
            if days.is_empty() {
                self.non_voters.remove(&member);
            }
        }
    }
}

/// Flat persisted form of a [`Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerDocument {
    /// `voter key -> day -> slots`; non-voters carry the sentinel list
    #[serde(default)]
    pub votes: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// `day -> voter keys`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub was_tentative: BTreeMap<String, Vec<String>>,
}

/// Accepted on load: the current document, or the bare vote map written
/// before history tracking existed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLedger {
    Document(LedgerDocument),
    Flat(BTreeMap<String, BTreeMap<String, Vec<String>>>),
}

impl TryFrom<StoredLedger> for Ledger {
    type Error = PollError;

    fn try_from(stored: StoredLedger) -> Result<Self> {
        match stored {
            StoredLedger::Document(doc) => Ledger::try_from(doc),
            StoredLedger::Flat(votes) => Ledger::try_from(LedgerDocument {
                votes,
                was_tentative: BTreeMap::new(),
            }),
        }
    }
}

impl TryFrom<LedgerDocument> for Ledger {
    type Error = PollError;

    fn try_from(doc: LedgerDocument) -> Result<Self> {
        let mut ledger = Ledger::default();

        for (raw_key, days) in doc.votes {
            let key = VoterKey::decode(&raw_key)?;
            for (raw_day, slots) in days {
                let day: Day = raw_day.parse()?;
                match &key {
                    VoterKey::NonVoter(member) => {
                        if slots.len() != 1 || slots[0] != NON_VOTER_SENTINEL {
                            return Err(PollError::Codec(format!(
                                "non-voter entry {raw_key} holds a real selection on {day}"
                            )));
                        }
                        ledger.non_voters.entry(*member).or_default().insert(day);
                    }
                    _ => {
                        let parsed = slots
                            .iter()
                            .map(|s| s.parse::<Slot>())
                            .collect::<Result<Vec<_>>>()?;
                        let selection = DaySelection::from_slots(&parsed)?;
                        if !selection.is_empty() {
                            ledger.votes.entry(key.clone()).or_default().insert(day, selection);
                        }
                    }
                }
            }
        }

        for (raw_day, keys) in doc.was_tentative {
            let day: Day = raw_day.parse()?;
            for raw_key in keys {
                let key = VoterKey::decode(&raw_key)?;
                if key.is_ballot() {
                    ledger.was_tentative.entry(day).or_default().insert(key);
                }
            }
        }

        Ok(ledger)
    }
}

impl From<Ledger> for LedgerDocument {
    fn from(ledger: Ledger) -> Self {
        let mut votes: BTreeMap<String, BTreeMap<String, Vec<String>>> = ledger
            .votes
            .iter()
            .map(|(key, record)| {
                let days = record
                    .iter()
                    .map(|(day, sel)| {
                        let slots = sel.slots().iter().map(|s| s.as_str().to_string()).collect();
                        (day.as_str().to_string(), slots)
                    })
                    .collect();
                (key.encode(), days)
            })
            .collect();

        for (member, days) in &ledger.non_voters {
            let entry = votes.entry(VoterKey::NonVoter(*member).encode()).or_default();
            for day in days {
                entry.insert(day.as_str().to_string(), vec![NON_VOTER_SENTINEL.to_string()]);
            }
        }

        let was_tentative = ledger
            .was_tentative
            .iter()
            .map(|(day, keys)| (day.as_str().to_string(), keys.iter().map(VoterKey::encode).collect()))
            .collect();

        LedgerDocument { votes, was_tentative }
    }
}
