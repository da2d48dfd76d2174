//! Enforcement synthesis, report rendering, and the analysis pipeline.
//!
//! This crate sits on top of [`solguard_analysis`]: it turns verified
//! invariants into enforceable Solidity rules, renders the markdown report,
//! and exposes [`analyze`], the single entry point running extraction,
//! simulation, candidate generation, verification, synthesis, and reporting
//! in order.
//!
//! # Modules
//!
//! - [`enforce`] -- enforcement rule synthesis for `Holds` results
//! - [`report`] -- markdown report rendering
//! - [`error`] -- pipeline error types

pub mod enforce;
pub mod error;
pub mod report;

pub use enforce::{synthesize, EnforcementRule, RuleKind};
pub use error::CodegenError;
pub use report::render;

use serde::Serialize;
use tracing::info;

use solguard_analysis::{
    build_traces, extract, symbolic_traces, CandidateGenerator, PredicateSuggester,
    ScenarioConfig, SimConfig, VerificationResult, Verifier,
};
use solguard_core::model::ContractModel;
use solguard_core::snapshot::Invocation;

/// Pipeline knobs. Defaults match the scenario and simulator defaults.
pub struct AnalyzeOptions<'a> {
    /// Caller-provided invocation sequence, run first as its own trace.
    pub scenarios: Vec<Invocation>,
    pub random_seed: u64,
    pub iterations: u32,
    pub calls_per_trace: usize,
    /// Statement budget per simulated trace.
    pub max_steps: usize,
    /// Also run one single-invocation symbolic trace per public function.
    pub symbolic: bool,
    /// External predicate source; `None` keeps the run fully offline.
    pub suggester: Option<&'a dyn PredicateSuggester>,
}

impl Default for AnalyzeOptions<'_> {
    fn default() -> Self {
        let scenario = ScenarioConfig::default();
        AnalyzeOptions {
            scenarios: Vec::new(),
            random_seed: scenario.random_seed,
            iterations: scenario.iterations,
            calls_per_trace: scenario.calls_per_trace,
            max_steps: SimConfig::default().max_steps,
            symbolic: true,
            suggester: None,
        }
    }
}

/// Everything one pipeline run produces. Owned by the caller; nothing is
/// persisted elsewhere.
#[derive(Debug, Serialize)]
pub struct AnalysisOutcome {
    pub model: ContractModel,
    pub results: Vec<VerificationResult>,
    pub rules: Vec<EnforcementRule>,
    /// Rendered markdown report.
    pub report: String,
}

impl AnalysisOutcome {
    /// `true` when at least one invariant survived verification.
    pub fn any_holds(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Runs the full pipeline on one contract source.
pub fn analyze(
    source: &str,
    options: AnalyzeOptions<'_>,
) -> Result<AnalysisOutcome, CodegenError> {
    let model = extract(source)?;
    info!(contract = %model.name, functions = model.functions.len(), "extracted model");

    let sim_config = SimConfig {
        max_steps: options.max_steps,
    };
    let scenario = ScenarioConfig {
        seeds: options.scenarios,
        iterations: options.iterations,
        calls_per_trace: options.calls_per_trace,
        random_seed: options.random_seed,
    };
    let mut traces = build_traces(&model, sim_config, &scenario)?;
    if options.symbolic {
        traces.extend(symbolic_traces(&model, sim_config)?);
    }

    let mut generator = CandidateGenerator::new();
    let mut candidates = generator.generate(&model, &traces);
    if let Some(suggester) = options.suggester {
        for suggestion in suggester.suggest(source, &model)? {
            if let Some(candidate) = generator.admit(suggestion.into_candidate()) {
                candidates.push(candidate);
            }
        }
    }

    let verifier = Verifier::new(&model);
    let results = verifier.verify_all(&candidates, &traces, &mut generator);
    let rules = synthesize(&model, &results);
    let report = report::render(&model, &results, &rules);
    info!(
        candidates = candidates.len(),
        rules = rules.len(),
        "analysis complete"
    );

    Ok(AnalysisOutcome {
        model,
        results,
        rules,
        report,
    })
}

/// Decodes a scenario file: a JSON array of invocations, e.g.
/// `[{"function":"flip","args":[{"Bool":true}],"block_number":7}]`.
pub fn parse_scenarios(json: &str) -> Result<Vec<Invocation>, CodegenError> {
    Ok(serde_json::from_str(json)?)
}
