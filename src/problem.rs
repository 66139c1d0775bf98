//! Loading benchmark instances from JSON.
//!
//! The format maps timeslot ids to display labels and student ids to their
//! preferences. Key order is significant: it fixes slot order and person
//! order for everything downstream.
//!
//! ```json
//! {
//!   "team_size": 3,
//!   "timeslots": { "MoTu_0": "Monday 10:15-12:00", "WeFr_0": "Wednesday 14:15-16:00" },
//!   "students": {
//!     "S001": { "group": ["S002"], "language": {"E": 2, "G": 0}, "slot": {"MoTu_0": 2, "WeFr_0": 1} }
//!   }
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::preference::{PersonPreferences, PreferenceModel};
use crate::search::SearchConfig;
use crate::slots::OriginalSlot;

#[derive(Debug, Deserialize)]
struct RawProblem {
    timeslots: Map<String, Value>,
    students: Map<String, Value>,
}

/// A parsed but not yet validated instance.
#[derive(Debug, Clone)]
pub struct Problem {
    pub slots: Vec<OriginalSlot>,
    pub people: Vec<(String, PersonPreferences)>,
}

impl Problem {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawProblem = serde_json::from_str(json)?;

        let slots = raw
            .timeslots
            .into_iter()
            .map(|(id, label)| {
                let label = match label {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                OriginalSlot { id, label }
            })
            .collect();

        let people = raw
            .students
            .into_iter()
            .map(|(id, prefs)| {
                serde_json::from_value::<PersonPreferences>(prefs)
                    .map(|p| (id.clone(), p))
                    .map_err(|e| Error::configuration(format!("student {id:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { slots, people })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let problem = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            slots = problem.slots.len(),
            people = problem.people.len(),
            "loaded problem"
        );
        Ok(problem)
    }

    /// Every language rated by anyone, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.people
            .iter()
            .flat_map(|(_, p)| p.language.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Validates the instance into a [`PreferenceModel`], searching the
    /// configured languages or, by default, all of them.
    pub fn into_model(self, config: &SearchConfig) -> Result<PreferenceModel> {
        let languages = match &config.languages {
            Some(languages) => languages.clone(),
            None => self.languages(),
        };
        PreferenceModel::new(self.slots, languages, self.people)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::preference::Preference;

    const SAMPLE: &str = r#"{
        "team_size": 2,
        "timeslots": {"We12_0": "Wednesday 12:15-14:00", "Mo10_0": "Monday 10:15-12:00"},
        "students": {
            "S002": {"group": ["S001"], "language": {"G": 2, "E": 1}, "slot": {"We12_0": 0, "Mo10_0": 0}},
            "S001": {"group": ["S002"], "language": {"E": 2, "G": 0}, "slot": {"We12_0": 1, "Mo10_0": 2}}
        }
    }"#;

    #[test]
    fn keeps_document_order() {
        let problem = Problem::from_json_str(SAMPLE).unwrap();
        let slot_ids = problem.slots.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(slot_ids, ["We12_0", "Mo10_0"]);
        assert_eq!(problem.slots[1].label, "Monday 10:15-12:00");
        let people = problem.people.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>();
        assert_eq!(people, ["S002", "S001"]);
        assert_eq!(problem.languages(), ["E", "G"]);
    }

    #[test]
    fn model_normalizes_on_load() {
        let model = Problem::from_json_str(SAMPLE)
            .unwrap()
            .into_model(&SearchConfig::default())
            .unwrap();
        assert_eq!(model.people()[0].id(), "S002");
        assert_eq!(model.people()[0].slot(0), Preference::Preferred);
        assert_eq!(model.people()[1].slot(0), Preference::Acceptable);
    }

    #[test]
    fn configured_languages_restrict_the_search() {
        let config = SearchConfig {
            languages: Some(vec!["G".into()]),
            ..Default::default()
        };
        let model = Problem::from_json_str(SAMPLE)
            .unwrap()
            .into_model(&config)
            .unwrap();
        assert_eq!(model.languages(), ["G"]);

        let config = SearchConfig {
            languages: Some(vec!["F".into()]),
            ..Default::default()
        };
        let err = Problem::from_json_str(SAMPLE)
            .unwrap()
            .into_model(&config)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn bad_levels_name_the_student() {
        let json = r#"{"timeslots": {"a": "A"}, "students": {"S9": {"slot": {"a": 5}, "language": {}}}}"#;
        match Problem::from_json_str(json) {
            Err(Error::Configuration(msg)) => assert!(msg.contains("S9")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            Problem::from_json_str("{\"timeslots\": 3}"),
            Err(Error::Json(_))
        ));
    }
}
