//! Invariant analysis CLI.
//!
//! Provides the `solguard` binary. `analyze` runs the full pipeline on a
//! contract source file and emits the markdown report (or the complete
//! outcome as JSON) to stdout or a file.
//!
//! Uses the same `solguard_codegen::analyze()` pipeline end to end, so a
//! scripted run and a library caller see identical behavior.

mod suggest;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use solguard_codegen::{analyze, parse_scenarios, AnalyzeOptions};
use suggest::HttpSuggester;

/// Invariant synthesis and enforcement for smart contracts.
#[derive(Parser)]
#[command(name = "solguard", about = "Invariant synthesis and enforcement for smart contracts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a contract and report its verified invariants.
    Analyze {
        /// Path to the contract source file.
        contract: PathBuf,

        /// JSON file with seed invocation scenarios.
        #[arg(long)]
        scenarios: Option<PathBuf>,

        /// Write the report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Emit the full outcome as JSON instead of markdown.
        #[arg(long)]
        json: bool,

        /// Random seed for scenario generation.
        #[arg(long, default_value_t = 0x5EED)]
        seed: u64,

        /// Number of randomized traces to simulate.
        #[arg(long, default_value_t = 16)]
        iterations: u32,

        /// Statement budget per simulated trace.
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,

        /// Skip the symbolic single-invocation traces.
        #[arg(long)]
        no_symbolic: bool,

        /// OpenAI-compatible base URL for predicate suggestions.
        #[arg(long)]
        suggest_url: Option<String>,

        /// Model name for the suggestion endpoint.
        #[arg(long, requires = "suggest_url", default_value = "gpt-4o-mini")]
        suggest_model: String,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            contract,
            scenarios,
            out,
            json,
            seed,
            iterations,
            max_steps,
            no_symbolic,
            suggest_url,
            suggest_model,
        } => {
            let exit_code = run_analyze(
                &contract,
                scenarios.as_deref(),
                out.as_deref(),
                json,
                seed,
                iterations,
                max_steps,
                no_symbolic,
                suggest_url,
                &suggest_model,
            );
            process::exit(exit_code);
        }
    }
}

/// Execute the analyze subcommand.
///
/// Returns exit code: 0 = at least one invariant holds, 1 = zero invariants
/// survived verification, 2 = parse/analysis failure, 3 = I/O error.
#[allow(clippy::too_many_arguments)]
fn run_analyze(
    contract: &Path,
    scenarios_path: Option<&Path>,
    out: Option<&Path>,
    json: bool,
    seed: u64,
    iterations: u32,
    max_steps: usize,
    no_symbolic: bool,
    suggest_url: Option<String>,
    suggest_model: &str,
) -> i32 {
    let source = match fs::read_to_string(contract) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("Error: failed to read '{}': {}", contract.display(), err);
            return 3;
        }
    };

    let seeds = match scenarios_path {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(t) => t,
                Err(err) => {
                    eprintln!("Error: failed to read '{}': {}", path.display(), err);
                    return 3;
                }
            };
            match parse_scenarios(&text) {
                Ok(s) => s,
                Err(err) => {
                    eprintln!("Error: bad scenario file '{}': {}", path.display(), err);
                    return 3;
                }
            }
        }
        None => Vec::new(),
    };

    let suggester = suggest_url.map(|url| {
        let api_key = std::env::var("SOLGUARD_API_KEY").ok();
        HttpSuggester::new(&url, suggest_model, api_key)
    });

    let options = AnalyzeOptions {
        scenarios: seeds,
        random_seed: seed,
        iterations,
        max_steps,
        symbolic: !no_symbolic,
        suggester: suggester
            .as_ref()
            .map(|s| s as &dyn solguard_analysis::PredicateSuggester),
        ..AnalyzeOptions::default()
    };

    let outcome = match analyze(&source, options) {
        Ok(o) => o,
        Err(err) => {
            eprintln!("Error: {}", err);
            return 2;
        }
    };

    let rendered = if json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("Error: failed to encode outcome: {}", err);
                return 3;
            }
        }
    } else {
        outcome.report.clone()
    };

    match out {
        Some(path) => {
            if let Err(err) = fs::write(path, &rendered) {
                eprintln!("Error: failed to write '{}': {}", path.display(), err);
                return 3;
            }
            println!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    if outcome.any_holds() {
        0
    } else {
        eprintln!("No invariant survived verification.");
        1
    }
}
