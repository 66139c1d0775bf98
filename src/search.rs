//! Exhaustive search over language combinations.
//!
//! Every assignment of one language per original slot is turned into a cost
//! matrix and solved exactly; the cheapest one wins. Ties go to the
//! combination enumerated first, so the parallel search reports exactly what
//! the sequential one would.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::cost::{CostMatrixBuilder, LanguageCombination};
use crate::error::{Error, Result};
use crate::hungarian::{Allocations, Hungarian};
use crate::preference::PreferenceModel;
use crate::slots::{strip_suffix, SlotExpansion};

/// Search options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Evaluate combinations on the rayon thread pool.
    pub parallel: bool,
    /// Skip combinations whose hard-violation lower bound already exceeds
    /// the best cost found.
    pub prune: bool,
    /// Languages to search; defaults to every language the people rate.
    pub languages: Option<Vec<String>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            prune: true,
            languages: None,
        }
    }
}

/// Where one person ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub person: String,
    pub sub_slot: String,
    /// Original slot id, i.e. `sub_slot` without its unit suffix.
    pub slot: String,
}

/// The cheapest combination over the whole search.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalSolution {
    /// Language id per original slot, in slot order.
    pub languages: Vec<String>,
    pub placements: Vec<Placement>,
    pub total_cost: f64,
    /// Placements whose cell carries at least one big-M penalty.
    pub hard_violations: usize,
    /// Size of the search space.
    pub combinations: usize,
    pub evaluated: usize,
    pub pruned: usize,
    pub infeasible: usize,
    pub elapsed: Duration,
    #[serde(skip)]
    pub combination: LanguageCombination,
    #[serde(skip)]
    pub allocations: Allocations,
}

#[derive(Debug)]
struct Candidate {
    index: usize,
    combination: LanguageCombination,
    allocations: Allocations,
    total_cost: f64,
    hard_violations: usize,
}

/// Best-so-far record ordered by `(total_cost, index)`.
#[derive(Debug, Default)]
struct Best(Option<Candidate>);

impl Best {
    fn cost(&self) -> Option<f64> {
        self.0.as_ref().map(|c| c.total_cost)
    }

    fn offer(&mut self, candidate: Candidate) {
        let better = match &self.0 {
            None => true,
            Some(best) => {
                candidate.total_cost < best.total_cost
                    || (candidate.total_cost == best.total_cost && candidate.index < best.index)
            }
        };
        if better {
            debug!(
                index = candidate.index,
                cost = candidate.total_cost,
                hard = candidate.hard_violations,
                "new best combination"
            );
            self.0 = Some(candidate);
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    evaluated: AtomicUsize,
    pruned: AtomicUsize,
    infeasible: AtomicUsize,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Drives cost-matrix construction and solving over every combination.
#[derive(Debug)]
pub struct CombinationSearch<'a> {
    model: &'a PreferenceModel,
    expansion: SlotExpansion,
    config: SearchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> CombinationSearch<'a> {
    pub fn new(model: &'a PreferenceModel, config: SearchConfig) -> Result<Self> {
        let expansion = SlotExpansion::new(model.slots(), model.num_people())?;
        Ok(Self {
            model,
            expansion,
            config,
            cancel: None,
        })
    }

    /// Checks `flag` before each combination; once set, the search stops
    /// with [`Error::Cancelled`].
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn expansion(&self) -> &SlotExpansion {
        &self.expansion
    }

    /// Number of language combinations, `|languages| ^ |slots|`.
    pub fn search_space(&self) -> Result<usize> {
        let slots = u32::try_from(self.model.slots().len())
            .map_err(|_| Error::configuration("too many timeslots"))?;
        self.model
            .languages()
            .len()
            .checked_pow(slots)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{} languages over {slots} timeslots overflow the search space",
                    self.model.languages().len()
                ))
            })
    }

    /// The combination at `index` in lexicographic order, with the last
    /// slot varying fastest.
    pub fn combination_at(&self, mut index: usize) -> LanguageCombination {
        let base = self.model.languages().len();
        let mut languages = vec![0; self.model.slots().len()];
        for language in languages.iter_mut().rev() {
            *language = index % base;
            index /= base;
        }
        LanguageCombination(languages)
    }

    pub fn search(&self) -> Result<GlobalSolution> {
        let started = Instant::now();
        let combinations = self.search_space()?;
        let builder = CostMatrixBuilder::new(self.model, &self.expansion);
        info!(
            people = self.model.num_people(),
            slots = self.model.slots().len(),
            languages = self.model.languages().len(),
            combinations,
            parallel = self.config.parallel,
            "searching language combinations"
        );

        let counters = Counters::default();
        let best = if self.config.parallel {
            let best = Mutex::new(Best::default());
            (0..combinations).into_par_iter().try_for_each(|index| {
                let bound = best.lock().unwrap_or_else(PoisonError::into_inner).cost();
                if let Some(candidate) = self.visit(index, bound, &builder, &counters)? {
                    best.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .offer(candidate);
                }
                Ok::<(), Error>(())
            })?;
            best.into_inner().unwrap_or_else(PoisonError::into_inner)
        } else {
            let mut best = Best::default();
            for index in 0..combinations {
                if let Some(candidate) = self.visit(index, best.cost(), &builder, &counters)? {
                    best.offer(candidate);
                }
            }
            best
        };

        let elapsed = started.elapsed();
        let Some(best) = best.0 else {
            warn!(combinations, "no feasible language combination");
            return Err(Error::NoFeasibleSolution { combinations });
        };
        info!(
            cost = best.total_cost,
            hard = best.hard_violations,
            elapsed_ms = elapsed.as_millis() as u64,
            "search finished"
        );

        Ok(self.solution(best, combinations, &counters, elapsed))
    }

    /// Evaluates one combination unless cancelled, pruned or infeasible.
    fn visit(
        &self,
        index: usize,
        bound: Option<f64>,
        builder: &CostMatrixBuilder<'_>,
        counters: &Counters,
    ) -> Result<Option<Candidate>> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(Error::Cancelled {
                evaluated: Counters::get(&counters.evaluated),
            });
        }

        let combination = self.combination_at(index);
        if self.config.prune {
            if let Some(best) = bound {
                let lower = self.lower_bound(&combination, builder.hard_penalty());
                if lower > best {
                    trace!(index, lower, best, "pruned combination");
                    Counters::bump(&counters.pruned);
                    return Ok(None);
                }
            }
        }

        let outcome = self.evaluate(index, combination, builder);
        Counters::bump(&counters.evaluated);
        match outcome {
            Ok(candidate) => Ok(Some(candidate)),
            Err(e) if e.is_recoverable() => {
                warn!(index, error = %e, "skipping combination");
                Counters::bump(&counters.infeasible);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Every person who rejects all languages present in the combination
    /// pays at least one big-M penalty wherever they are placed.
    fn lower_bound(&self, combination: &LanguageCombination, hard: f64) -> f64 {
        let doomed = self
            .model
            .people()
            .iter()
            .filter(|p| p.rejects_all(combination.0.iter().copied()))
            .count();
        doomed as f64 * hard
    }

    fn evaluate(
        &self,
        index: usize,
        combination: LanguageCombination,
        builder: &CostMatrixBuilder<'_>,
    ) -> Result<Candidate> {
        let costs = builder.build(&combination)?;
        let solution = Hungarian::new(&costs).solve();
        if !solution.found {
            return Err(Error::InfeasibleCombination {
                combination: combination
                    .names(self.model)
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        let hard = builder.hard_penalty();
        let cells = solution
            .allocations
            .assignment()
            .map(|a| costs[a])
            .collect::<Vec<_>>();
        let total_cost = cells.iter().sum::<f64>();
        let hard_violations = cells.iter().filter(|&&c| c >= hard).count();
        trace!(index, cost = total_cost, "evaluated combination");

        Ok(Candidate {
            index,
            combination,
            allocations: solution.allocations,
            total_cost,
            hard_violations,
        })
    }

    fn solution(
        &self,
        best: Candidate,
        combinations: usize,
        counters: &Counters,
        elapsed: Duration,
    ) -> GlobalSolution {
        let people = self.model.people();
        let sub_slots = self.expansion.sub_slots();
        let placements = best
            .allocations
            .assignment()
            .map(|(row, col)| {
                let sub_slot = sub_slots[col].id();
                Placement {
                    person: people[row].id().to_string(),
                    sub_slot: sub_slot.to_string(),
                    slot: strip_suffix(sub_slot).to_string(),
                }
            })
            .collect();

        GlobalSolution {
            languages: best
                .combination
                .names(self.model)
                .into_iter()
                .map(String::from)
                .collect(),
            placements,
            total_cost: best.total_cost,
            hard_violations: best.hard_violations,
            combinations,
            evaluated: Counters::get(&counters.evaluated),
            pruned: Counters::get(&counters.pruned),
            infeasible: Counters::get(&counters.infeasible),
            elapsed,
            combination: best.combination,
            allocations: best.allocations,
        }
    }
}
