//! Markdown report rendering.
//!
//! One numbered section per verification result, ordered Holds first, then
//! Violated, then Indeterminate, with candidate order preserved inside each
//! group. Holding invariants include the synthesized Solidity; rejected ones
//! carry their verdict and a one-line counterexample or reason. A trailing
//! "Invariant Enforcement" section collects all synthesized rules into an
//! illustrative guarded contract.

use std::fmt::Write as _;

use solguard_analysis::{Verdict, VerificationResult};
use solguard_core::model::ContractModel;
use solguard_core::snapshot::TraceStep;
use solguard_core::Value;

use crate::enforce::{EnforcementRule, RuleKind};

pub fn render(
    model: &ContractModel,
    results: &[VerificationResult],
    rules: &[EnforcementRule],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Invariant Analysis: {}", model.name);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} candidate invariant(s) verified against simulated traces: \
         {} hold, {} violated, {} indeterminate.",
        results.len(),
        count(results, Verdict::Holds),
        count(results, Verdict::Violated),
        count(results, Verdict::Indeterminate),
    );

    let mut section = 0usize;
    for verdict in [Verdict::Holds, Verdict::Violated, Verdict::Indeterminate] {
        for result in results.iter().filter(|r| r.verdict == verdict) {
            section += 1;
            render_section(&mut out, section, result, rules);
        }
    }

    render_enforcement(&mut out, model, rules);
    out
}

fn count(results: &[VerificationResult], verdict: Verdict) -> usize {
    results.iter().filter(|r| r.verdict == verdict).count()
}

fn render_section(
    out: &mut String,
    section: usize,
    result: &VerificationResult,
    rules: &[EnforcementRule],
) {
    let candidate = &result.candidate;
    let _ = writeln!(out);
    let _ = writeln!(out, "## {}. {}", section, candidate.title);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", candidate.description);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- Function: `{}`\n- Predicate: `{}`\n- Verdict: **{}**",
        candidate.function,
        candidate.predicate,
        verdict_label(result.verdict),
    );
    match result.verdict {
        Verdict::Holds => {
            if let Some(rule) = rules.iter().find(|r| r.candidate == candidate.id) {
                let _ = writeln!(out);
                let _ = writeln!(out, "{}", rule.description);
                let _ = writeln!(out);
                let _ = writeln!(out, "```solidity\n{}\n```", rule.solidity);
            }
        }
        Verdict::Violated => {
            if let Some(step) = &result.counterexample {
                let _ = writeln!(out, "- Counterexample: {}", summarize_step(step));
            }
        }
        Verdict::Indeterminate => {
            if let Some(reason) = &result.reason {
                let _ = writeln!(out, "- Reason: {}", reason);
            }
        }
    }
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Holds => "Holds",
        Verdict::Violated => "Violated",
        Verdict::Indeterminate => "Indeterminate",
    }
}

/// `flip(true) at step 3: consecutiveWins 2 -> 0, lastHash 77 -> 41`
fn summarize_step(step: &TraceStep) -> String {
    let args = step
        .invocation
        .args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let mut changes = Vec::new();
    for (name, pre) in &step.pre.values {
        if let Ok(post) = step.post.get(name) {
            if post != pre {
                changes.push(format!("{} {} -> {}", name, pre, post));
            }
        }
    }
    let delta = if changes.is_empty() {
        "no state change".to_string()
    } else {
        changes.join(", ")
    };
    format!(
        "`{}({})` at step {}: {}",
        step.invocation.function, args, step.pre.seq, delta
    )
}

fn render_enforcement(out: &mut String, model: &ContractModel, rules: &[EnforcementRule]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "## Invariant Enforcement");
    let _ = writeln!(out);
    if rules.is_empty() {
        let _ = writeln!(
            out,
            "No invariant survived verification; nothing to enforce."
        );
        return;
    }

    render_rule_group(
        out,
        "Reentrancy lock",
        rules,
        &[RuleKind::ReentrancyLock],
    );
    render_rule_group(out, "State machine", rules, &[RuleKind::AtomicUpdate]);
    render_rule_group(
        out,
        "Assertions",
        rules,
        &[RuleKind::Precondition, RuleKind::Postcondition],
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "### Consolidated example");
    let _ = writeln!(out);
    let _ = writeln!(out, "```solidity");
    let _ = writeln!(out, "contract Guarded{} {{", model.name);
    for rule in rules {
        for line in rule.solidity.lines() {
            if line.is_empty() {
                let _ = writeln!(out);
            } else {
                let _ = writeln!(out, "    {}", line);
            }
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "```");
}

fn render_rule_group(out: &mut String, heading: &str, rules: &[EnforcementRule], kinds: &[RuleKind]) {
    let matching: Vec<_> = rules.iter().filter(|r| kinds.contains(&r.kind)).collect();
    if matching.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {}", heading);
    let _ = writeln!(out);
    for rule in matching {
        let _ = writeln!(out, "- `{}`: {}", rule.function, rule.description);
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforce::synthesize;
    use solguard_analysis::{
        extract, CandidateGenerator, ScenarioConfig, SimConfig, Verifier,
    };
    use solguard_core::{Invocation, Value};

    const FLIP: &str = r#"
        contract CoinFlip {
            uint256 lastHash;
            uint256 public consecutiveWins;
            function flip(bool guess) public {
                uint256 fresh = uint256(blockhash(block.number - 1));
                if (lastHash == fresh) {
                    revert();
                }
                lastHash = fresh;
                bool side = fresh % 2 == 1;
                if (side == guess) {
                    consecutiveWins++;
                } else {
                    consecutiveWins = 0;
                }
            }
        }
    "#;

    fn report_for(src: &str) -> String {
        let model = extract(src).unwrap();
        let config = ScenarioConfig {
            seeds: vec![
                Invocation::new("flip", vec![Value::Bool(true)]).at_block(5),
                Invocation::new("flip", vec![Value::Bool(true)]).at_block(5),
                Invocation::new("flip", vec![Value::Bool(true)]).at_block(6),
                Invocation::new("flip", vec![Value::Bool(false)]).at_block(8),
            ],
            ..ScenarioConfig::default()
        };
        let traces =
            solguard_analysis::build_traces(&model, SimConfig::default(), &config).unwrap();
        let mut gen = CandidateGenerator::new();
        let candidates = gen.generate(&model, &traces);
        let verifier = Verifier::new(&model);
        let results = verifier.verify_all(&candidates, &traces, &mut gen);
        let rules = synthesize(&model, &results);
        render(&model, &results, &rules)
    }

    #[test]
    fn report_contains_titled_numbered_sections() {
        let report = report_for(FLIP);
        assert!(report.starts_with("# Invariant Analysis: CoinFlip"));
        assert!(report.contains("## 1. "));
        assert!(report.contains("Consecutive Wins Invariant"));
    }

    #[test]
    fn holding_invariants_carry_solidity() {
        let report = report_for(FLIP);
        assert!(report.contains("```solidity"));
        assert!(report.contains("Verdict: **Holds**"));
    }

    #[test]
    fn reentrancy_guard_references_last_hash() {
        let report = report_for(FLIP);
        assert!(report.contains("Last Hash Reentrancy Guard"));
        assert!(report.contains("lastHash"));
    }

    #[test]
    fn enforcement_section_consolidates_rules() {
        let report = report_for(FLIP);
        assert!(report.contains("## Invariant Enforcement"));
        assert!(report.contains("### Consolidated example"));
        assert!(report.contains("contract GuardedCoinFlip {"));
    }

    #[test]
    fn empty_results_render_empty_enforcement() {
        let model = extract(FLIP).unwrap();
        let report = render(&model, &[], &[]);
        assert!(report.contains("nothing to enforce"));
    }

    #[test]
    fn holds_sections_precede_rejections() {
        let report = report_for(FLIP);
        let holds = report.find("Verdict: **Holds**").unwrap();
        if let Some(indet) = report.find("Verdict: **Indeterminate**") {
            assert!(holds < indet);
        }
    }
}
