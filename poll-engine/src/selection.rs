//! Per-(voter, day) selection state and its transitions.
//!
//! A day holds either nothing, a non-empty set of concrete slots, or exactly
//! one special. Mixed states cannot be constructed.

use std::collections::BTreeSet;

use crate::types::{ConcreteSlot, PollError, Result, Slot, Special};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DaySelection {
    #[default]
    Empty,
    /// Invariant: never empty
    Concrete(BTreeSet<ConcreteSlot>),
    Special(Special),
}

impl DaySelection {
    /// Apply a toggle.
    ///
    /// A special clears the day when it is the current selection and
    /// otherwise replaces everything. A concrete slot strips any special and
    /// then flips its own presence.
    pub fn toggle(&self, slot: Slot) -> DaySelection {
        match slot {
            Slot::Special(special) => match self {
                DaySelection::Special(current) if *current == special => DaySelection::Empty,
                _ => DaySelection::Special(special),
            },
            Slot::Concrete(concrete) => {
                let mut slots = self.concrete_slots();
                if !slots.remove(&concrete) {
                    slots.insert(concrete);
                }
                DaySelection::from_concrete(slots)
            }
        }
    }

    /// Ensure `slot` is selected without ever toggling it off.
    pub fn with(&self, slot: Slot) -> DaySelection {
        if self.contains(slot) {
            return self.clone();
        }
        self.toggle(slot)
    }

    /// Ensure `slot` is not selected.
    pub fn without(&self, slot: Slot) -> DaySelection {
        if !self.contains(slot) {
            return self.clone();
        }
        self.toggle(slot)
    }

    pub fn contains(&self, slot: Slot) -> bool {
        match (self, slot) {
            (DaySelection::Concrete(slots), Slot::Concrete(concrete)) => slots.contains(&concrete),
            (DaySelection::Special(current), Slot::Special(special)) => *current == special,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DaySelection::Empty)
    }

    /// Selected slots in catalog order.
    pub fn slots(&self) -> Vec<Slot> {
        match self {
            DaySelection::Empty => Vec::new(),
            DaySelection::Concrete(slots) => slots.iter().copied().map(Slot::Concrete).collect(),
            DaySelection::Special(special) => vec![Slot::Special(*special)],
        }
    }

    /// Rebuild a selection from a persisted list, rejecting mixed states.
    pub fn from_slots(slots: &[Slot]) -> Result<DaySelection> {
        let specials: Vec<Special> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Special(special) => Some(*special),
                Slot::Concrete(_) => None,
            })
            .collect();

        match specials.as_slice() {
            [] => {
                let concrete = slots
                    .iter()
                    .filter_map(|slot| match slot {
                        Slot::Concrete(concrete) => Some(*concrete),
                        Slot::Special(_) => None,
                    })
                    .collect();
                Ok(DaySelection::from_concrete(concrete))
            }
            [special] if slots.len() == 1 => Ok(DaySelection::Special(*special)),
            _ => Err(PollError::Codec(format!(
                "selection mixes a special with other slots: {:?}",
                slots
            ))),
        }
    }

    fn concrete_slots(&self) -> BTreeSet<ConcreteSlot> {
        match self {
            DaySelection::Concrete(slots) => slots.clone(),
            _ => BTreeSet::new(),
        }
    }

    fn from_concrete(slots: BTreeSet<ConcreteSlot>) -> DaySelection {
        if slots.is_empty() {
            DaySelection::Empty
        } else {
            DaySelection::Concrete(slots)
        }
    }
}
