//! Cost matrices for one language combination.

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::preference::PreferenceModel;
use crate::slots::SlotExpansion;

/// Multiplier of the population size giving the hard-violation penalty.
pub const PENALTY_FACTOR: f64 = 100.;

/// The big-M penalty for a population of `num_people`.
///
/// Soft penalties add up to at most `2 * num_people`, so one hard violation
/// always outweighs any number of soft ones.
pub fn hard_penalty(num_people: usize) -> f64 {
    PENALTY_FACTOR * num_people as f64
}

/// One language per original slot, stored as indices into
/// [`PreferenceModel::languages`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCombination(pub Vec<usize>);

impl LanguageCombination {
    /// Language index assigned to the original slot at `slot`.
    pub fn language_of(&self, slot: usize) -> usize {
        self.0[slot]
    }

    /// Language ids in slot order.
    pub fn names<'m>(&self, model: &'m PreferenceModel) -> Vec<&'m str> {
        self.0
            .iter()
            .map(|&l| model.languages()[l].as_str())
            .collect()
    }
}

/// Builds dense person-by-sub-slot cost matrices.
#[derive(Debug, Clone, Copy)]
pub struct CostMatrixBuilder<'a> {
    model: &'a PreferenceModel,
    expansion: &'a SlotExpansion,
    hard: f64,
}

impl<'a> CostMatrixBuilder<'a> {
    pub fn new(model: &'a PreferenceModel, expansion: &'a SlotExpansion) -> Self {
        Self {
            model,
            expansion,
            hard: hard_penalty(model.num_people()),
        }
    }

    /// The big-M penalty used by this builder.
    pub fn hard_penalty(&self) -> f64 {
        self.hard
    }

    /// Cost of every (person, sub-slot) pair under `combination`.
    ///
    /// Each cell is the slot-preference penalty plus the penalty for the
    /// language the combination gives that sub-slot's original slot.
    pub fn build(&self, combination: &LanguageCombination) -> Result<DMatrix<f64>> {
        let slots = self.model.slots().len();
        if combination.0.len() != slots {
            return Err(Error::configuration(format!(
                "language combination covers {} slots, expected {slots}",
                combination.0.len()
            )));
        }
        let languages = self.model.languages().len();
        if let Some(bad) = combination.0.iter().find(|&&l| l >= languages) {
            return Err(Error::configuration(format!(
                "language index {bad} out of range for {languages} languages"
            )));
        }

        let people = self.model.people();
        let sub_slots = self.expansion.sub_slots();
        Ok(DMatrix::from_fn(people.len(), sub_slots.len(), |i, j| {
            let person = &people[i];
            let origin = sub_slots[j].origin();
            let mut cost = person.slot(origin).penalty(self.hard);
            cost += person
                .language(combination.language_of(origin))
                .penalty(self.hard);
            cost
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::preference::{PersonPreferences, Preference};
    use crate::slots::OriginalSlot;

    fn person(slot: [u8; 2], language: [u8; 2]) -> PersonPreferences {
        let level = |l: u8| Preference::try_from(l).unwrap();
        PersonPreferences {
            slot: [("a".to_string(), level(slot[0])), ("b".to_string(), level(slot[1]))]
                .into_iter()
                .collect(),
            language: [("E".to_string(), level(language[0])), ("G".to_string(), level(language[1]))]
                .into_iter()
                .collect(),
        }
    }

    fn model(people: Vec<PersonPreferences>) -> PreferenceModel {
        PreferenceModel::new(
            vec![OriginalSlot::new("a", "A"), OriginalSlot::new("b", "B")],
            vec!["E".into(), "G".into()],
            people
                .into_iter()
                .enumerate()
                .map(|(i, p)| (format!("p{i}"), p)),
        )
        .unwrap()
    }

    #[test]
    fn penalties_are_additive() {
        let model = model(vec![person([1, 0], [1, 0]), person([2, 1], [2, 2]), person([0, 2], [0, 1])]);
        let expansion = SlotExpansion::new(model.slots(), model.num_people()).unwrap();
        let builder = CostMatrixBuilder::new(&model, &expansion);
        let m = builder.hard_penalty();
        assert_eq!(m, 300.);

        // slot a (2 sub-slots) speaks E, slot b (1 sub-slot) speaks G
        let costs = builder.build(&LanguageCombination(vec![0, 1])).unwrap();
        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(3, 3, &[
            1. + 1., 1. + 1., m + m,
            0. + 0., 0. + 0., 1. + 0.,
            m + m,   m + m,   0. + 1.,
        ]);
        assert_eq!(costs, expected);
    }

    #[test]
    fn hard_violation_dominates_soft_total() {
        let model = model(vec![person([1, 1], [1, 1]), person([1, 1], [1, 1])]);
        let expansion = SlotExpansion::new(model.slots(), model.num_people()).unwrap();
        let builder = CostMatrixBuilder::new(&model, &expansion);
        let costs = builder.build(&LanguageCombination(vec![0, 0])).unwrap();
        let soft_total: f64 = costs.iter().sum();
        assert!(builder.hard_penalty() > soft_total);
    }

    #[test]
    fn mismatched_combination_is_rejected() {
        let model = model(vec![person([2, 2], [2, 2])]);
        let expansion = SlotExpansion::new(model.slots(), model.num_people()).unwrap();
        let builder = CostMatrixBuilder::new(&model, &expansion);
        assert!(builder.build(&LanguageCombination(vec![0])).is_err());
        assert!(builder.build(&LanguageCombination(vec![0, 2])).is_err());
    }

    #[test]
    fn names_follow_slot_order() {
        let model = model(vec![person([2, 2], [2, 2])]);
        assert_eq!(LanguageCombination(vec![1, 0]).names(&model), ["G", "E"]);
    }
}
