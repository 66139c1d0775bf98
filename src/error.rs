//! Error types for slot assignment.

use thiserror::Error;

/// Result type for slot assignment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for slot assignment operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or degenerate input. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The solver could not complete a matching for one language combination.
    #[error("language combination {combination:?} admits no complete assignment")]
    InfeasibleCombination {
        /// Language id per original slot.
        combination: Vec<String>,
    },

    /// Every enumerated combination was infeasible or pruned.
    #[error("no feasible solution among {combinations} language combinations")]
    NoFeasibleSolution {
        /// Size of the search space.
        combinations: usize,
    },

    /// The search was cancelled between two combinations.
    #[error("search cancelled after {evaluated} combinations")]
    Cancelled {
        /// Combinations fully evaluated before the flag was seen.
        evaluated: usize,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Whether the search can skip past this error and keep enumerating.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InfeasibleCombination { .. })
    }
}
