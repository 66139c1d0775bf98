//! Slot assignment CLI.
//!
//! Solves one benchmark instance and prints the winning language
//! combination, the assignment and the total cost.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slot_hungarian::{CombinationSearch, Error, Problem, SearchConfig};

#[derive(Parser)]
#[command(name = "slot-hungarian")]
#[command(about = "Assign students to language-tagged timeslots with the Hungarian method")]
struct Cli {
    /// Path to the benchmark file
    benchmark_file: PathBuf,

    /// Search options as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Languages to search (comma-separated, e.g. "E,G")
    #[arg(long, value_delimiter = ',')]
    languages: Option<Vec<String>>,

    /// Evaluate language combinations in parallel
    #[arg(long)]
    parallel: bool,

    /// Evaluate every combination, even those that cannot beat the best
    #[arg(long)]
    no_prune: bool,

    /// Print the solution as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn search_config(&self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SearchConfig::default(),
        };
        if self.languages.is_some() {
            config.languages = self.languages.clone();
        }
        config.parallel |= self.parallel;
        if self.no_prune {
            config.prune = false;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.search_config()?;
    let problem = Problem::from_path(&cli.benchmark_file)
        .with_context(|| format!("loading {}", cli.benchmark_file.display()))?;
    let model = problem.into_model(&config)?;
    info!(languages = ?model.languages(), "model ready");

    let solution = match CombinationSearch::new(&model, config)?.search() {
        Ok(solution) => solution,
        Err(Error::NoFeasibleSolution { combinations }) => {
            println!("No feasible solution among {combinations} language combinations.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
        return Ok(());
    }

    let languages = model
        .slots()
        .iter()
        .zip(&solution.languages)
        .map(|(slot, language)| format!("{}={}", slot.id, language))
        .collect::<Vec<_>>();
    println!("Language combination: {}", languages.join(", "));
    println!("Assignment:");
    for placement in &solution.placements {
        println!("  {} -> {}", placement.person, placement.slot);
    }
    println!("Total cost: {}", solution.total_cost);
    println!("Hard violations: {}", solution.hard_violations);
    println!("Solve time: {:.3}s", solution.elapsed.as_secs_f64());

    Ok(())
}
