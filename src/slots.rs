//! Expansion of timeslots into unit-capacity sub-slots.
//!
//! Every original slot is split into as many sub-slots as people it should
//! host. With `n` people over `s` slots each slot receives `n / s` sub-slots and
//! the first `n % s` slots (in input order) receive one more, so the total
//! always equals `n` and the cost matrix comes out square.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A timeslot as declared by the problem, before expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalSlot {
    pub id: String,
    pub label: String,
}

impl OriginalSlot {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One assignable unit of an original slot, named `{original}_{k}` with `k`
/// starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSlot {
    id: String,
    origin: usize,
}

impl SubSlot {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Index of the original slot this unit belongs to.
    pub fn origin(&self) -> usize {
        self.origin
    }
}

/// Ordered sub-slots for a slot sequence and population size.
#[derive(Debug, Clone)]
pub struct SlotExpansion {
    sub_slots: Vec<SubSlot>,
    capacities: Vec<usize>,
    origins: HashMap<String, usize>,
}

impl SlotExpansion {
    /// Expands `slots` for `num_people` people.
    ///
    /// Deterministic: identical inputs always produce identical ids in
    /// identical order, so one expansion can be shared by every language
    /// combination of a search.
    pub fn new(slots: &[OriginalSlot], num_people: usize) -> Result<Self> {
        if slots.is_empty() {
            return Err(Error::configuration("cannot expand zero timeslots"));
        }
        if num_people == 0 {
            return Err(Error::configuration("cannot expand timeslots for zero people"));
        }

        let base = num_people / slots.len();
        let mut remainder = num_people % slots.len();

        let mut sub_slots = Vec::with_capacity(num_people);
        let mut capacities = Vec::with_capacity(slots.len());
        for (origin, slot) in slots.iter().enumerate() {
            let mut capacity = base;
            if remainder > 0 {
                capacity += 1;
                remainder -= 1;
            }
            capacities.push(capacity);
            sub_slots.extend((1..=capacity).map(|k| SubSlot {
                id: format!("{}_{}", slot.id, k),
                origin,
            }));
        }

        let origins = sub_slots
            .iter()
            .map(|s| (s.id.clone(), s.origin))
            .collect::<HashMap<_, _>>();
        if origins.len() != sub_slots.len() {
            return Err(Error::configuration(
                "timeslot ids collide after expansion; slot ids must be unique",
            ));
        }

        Ok(Self {
            sub_slots,
            capacities,
            origins,
        })
    }

    pub fn sub_slots(&self) -> &[SubSlot] {
        &self.sub_slots
    }

    pub fn len(&self) -> usize {
        self.sub_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_slots.is_empty()
    }

    /// Number of sub-slots derived from the original slot at `origin`.
    pub fn capacity_of(&self, origin: usize) -> usize {
        self.capacities.get(origin).copied().unwrap_or(0)
    }

    /// Reverse lookup from a sub-slot id to its original slot index.
    pub fn origin_of(&self, sub_slot: &str) -> Option<usize> {
        self.origins.get(sub_slot).copied()
    }
}

/// Drops the `_{k}` suffix of a sub-slot id.
///
/// Original ids may themselves contain underscores, so only the last
/// separator is removed.
pub fn strip_suffix(sub_slot: &str) -> &str {
    sub_slot
        .rsplit_once('_')
        .map_or(sub_slot, |(original, _)| original)
}
