//! Per-person slot and language preferences.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::slots::OriginalSlot;

/// Preference level declared for a slot or a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Preference {
    /// Level 0: assigning here is a hard violation.
    Unacceptable,
    /// Level 1: a soft violation.
    Acceptable,
    /// Level 2: no penalty.
    Preferred,
}

impl Preference {
    pub fn level(self) -> u8 {
        match self {
            Preference::Unacceptable => 0,
            Preference::Acceptable => 1,
            Preference::Preferred => 2,
        }
    }

    /// Cost contribution of this level, given the hard-violation penalty.
    pub fn penalty(self, hard: f64) -> f64 {
        match self {
            Preference::Unacceptable => hard,
            Preference::Acceptable => 1.,
            Preference::Preferred => 0.,
        }
    }
}

impl TryFrom<u8> for Preference {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Preference::Unacceptable),
            1 => Ok(Preference::Acceptable),
            2 => Ok(Preference::Preferred),
            other => Err(Error::configuration(format!(
                "preference level {other} is outside 0..=2"
            ))),
        }
    }
}

impl From<Preference> for u8 {
    fn from(p: Preference) -> u8 {
        p.level()
    }
}

/// Preferences of one person as they arrive from the loader, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPreferences {
    pub slot: HashMap<String, Preference>,
    pub language: HashMap<String, Preference>,
}

/// A person with preferences resolved against the model's slot and
/// language order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    id: String,
    slots: Vec<Preference>,
    languages: Vec<Preference>,
}

impl Person {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Preference for the original slot at index `slot`.
    pub fn slot(&self, slot: usize) -> Preference {
        self.slots[slot]
    }

    /// Preference for the language at index `language`.
    pub fn language(&self, language: usize) -> Preference {
        self.languages[language]
    }

    /// True if every language in `languages` is unacceptable to this person.
    pub fn rejects_all(&self, mut languages: impl Iterator<Item = usize>) -> bool {
        languages.all(|l| self.languages[l] == Preference::Unacceptable)
    }
}

/// Immutable view over every person's preferences.
///
/// People keep the order they were supplied in; that order fixes the rows
/// of every cost matrix built from this model.
#[derive(Debug, Clone)]
pub struct PreferenceModel {
    slots: Vec<OriginalSlot>,
    languages: Vec<String>,
    people: Vec<Person>,
}

impl PreferenceModel {
    /// Resolves and validates raw preferences.
    ///
    /// A person whose slot preferences are all 0 is treated as indifferent
    /// and gets 2 everywhere. This happens here and nowhere else.
    pub fn new<I>(slots: Vec<OriginalSlot>, languages: Vec<String>, people: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, PersonPreferences)>,
    {
        if slots.is_empty() {
            return Err(Error::configuration("no timeslots given"));
        }
        if languages.is_empty() {
            return Err(Error::configuration("no languages given"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = slots.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(Error::configuration(format!(
                "timeslot {:?} is declared twice",
                dup.id
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = languages.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(Error::configuration(format!(
                "language {dup:?} is declared twice"
            )));
        }

        let mut ids = HashSet::new();
        let mut resolved = Vec::new();
        for (id, prefs) in people {
            if !ids.insert(id.clone()) {
                return Err(Error::configuration(format!("person {id:?} is declared twice")));
            }
            resolved.push(Self::resolve(&slots, &languages, id, prefs)?);
        }
        if resolved.is_empty() {
            return Err(Error::configuration("no people given"));
        }

        Ok(Self {
            slots,
            languages,
            people: resolved,
        })
    }

    fn resolve(
        slots: &[OriginalSlot],
        languages: &[String],
        id: String,
        prefs: PersonPreferences,
    ) -> Result<Person> {
        if let Some(unknown) = prefs
            .slot
            .keys()
            .find(|k| !slots.iter().any(|s| &s.id == *k))
        {
            return Err(Error::configuration(format!(
                "person {id:?} rates unknown timeslot {unknown:?}"
            )));
        }

        let mut slot_prefs = slots
            .iter()
            .map(|s| {
                prefs.slot.get(&s.id).copied().ok_or_else(|| {
                    Error::configuration(format!(
                        "person {id:?} has no preference for timeslot {:?}",
                        s.id
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if slot_prefs.iter().all(|p| *p == Preference::Unacceptable) {
            debug!(person = %id, "all timeslots rejected; treating as indifferent");
            slot_prefs.fill(Preference::Preferred);
        }

        let language_prefs = languages
            .iter()
            .map(|l| {
                prefs.language.get(l).copied().ok_or_else(|| {
                    Error::configuration(format!(
                        "person {id:?} has no preference for language {l:?}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Person {
            id,
            slots: slot_prefs,
            languages: language_prefs,
        })
    }

    pub fn slots(&self) -> &[OriginalSlot] {
        &self.slots
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn num_people(&self) -> usize {
        self.people.len()
    }
}
