//! Assigns people to timeslots with a per-slot spoken language.
//!
//! Each timeslot is split into unit sub-slots ([`slots`]), every choice of
//! one language per timeslot is priced as a person-by-sub-slot cost matrix
//! ([`cost`]), and each matrix is solved exactly with the Hungarian method
//! ([`hungarian`]). [`search`] keeps the cheapest combination.
//!
//! ```
//! use slot_hungarian::{CombinationSearch, Problem, SearchConfig};
//!
//! let problem = Problem::from_json_str(r#"{
//!     "timeslots": {"Mo10_0": "Monday 10:15", "Tu12_0": "Tuesday 12:15"},
//!     "students": {
//!         "S001": {"slot": {"Mo10_0": 2, "Tu12_0": 0}, "language": {"E": 2, "G": 0}},
//!         "S002": {"slot": {"Mo10_0": 0, "Tu12_0": 2}, "language": {"E": 0, "G": 2}}
//!     }
//! }"#)?;
//! let config = SearchConfig::default();
//! let model = problem.into_model(&config)?;
//! let solution = CombinationSearch::new(&model, config)?.search()?;
//! assert_eq!(solution.total_cost, 0.);
//! assert_eq!(solution.languages, ["E", "G"]);
//! # Ok::<(), slot_hungarian::Error>(())
//! ```

pub mod cost;
pub mod error;
pub mod hungarian;
pub mod preference;
pub mod problem;
pub mod search;
pub mod slots;

pub use cost::{hard_penalty, CostMatrixBuilder, LanguageCombination};
pub use error::{Error, Result};
pub use hungarian::{hungarian, Allocation, Allocations, Hungarian, Solution};
pub use preference::{Person, PersonPreferences, Preference, PreferenceModel};
pub use problem::Problem;
pub use search::{CombinationSearch, GlobalSolution, Placement, SearchConfig};
pub use slots::{strip_suffix, OriginalSlot, SlotExpansion, SubSlot};
