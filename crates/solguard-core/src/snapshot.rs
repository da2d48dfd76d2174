//! State snapshots and execution traces.
//!
//! A [`StateSnapshot`] maps state variable names to values and is tagged with
//! a monotonically increasing sequence number (simulated call order). Snapshots
//! are never mutated after creation; the simulator produces the post-state of
//! a step by building a fresh snapshot, and that same snapshot becomes the
//! pre-state of the next step, giving trace continuity by construction.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::EnvTerm;
use crate::value::Value;

/// An immutable mapping from state variable name to value at one point in
/// simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Monotonically increasing sequence number (block/call order).
    pub seq: u64,
    /// Variable values in declaration order.
    pub values: IndexMap<String, Value>,
}

impl StateSnapshot {
    pub fn new(seq: u64, values: IndexMap<String, Value>) -> Self {
        StateSnapshot { seq, values }
    }

    pub fn get(&self, name: &str) -> Result<&Value, CoreError> {
        self.values.get(name).ok_or_else(|| CoreError::UnknownVariable {
            name: name.to_string(),
        })
    }

    /// Derives the successor snapshot by applying `writes` on top of this one.
    pub fn advance(&self, writes: IndexMap<String, Value>) -> StateSnapshot {
        let mut values = self.values.clone();
        for (name, value) in writes {
            values.insert(name, value);
        }
        StateSnapshot {
            seq: self.seq + 1,
            values,
        }
    }
}

/// A single function invocation request: name, argument bindings, and the
/// per-call environment. Arguments may be concrete or symbolic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Block number seen by `block.number`/`blockhash`. Derived from the
    /// step sequence number when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl Invocation {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Invocation {
            function: function.into(),
            args,
            block_number: None,
        }
    }

    pub fn at_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    /// Resolves the environment seen by this invocation when executed as step
    /// number `seq`. Both the simulator and the verifier derive the
    /// environment this way, so replaying a trace step reproduces its values.
    pub fn env(&self, seq: u64, symbolic: bool) -> CallEnv {
        CallEnv {
            block_number: self.block_number.unwrap_or(seq + 1),
            symbolic,
        }
    }
}

/// Per-call environment: the values behind `block.*`, `msg.*`, and
/// `blockhash`. Concrete runs derive them deterministically from the block
/// number; symbolic runs hand back opaque symbols instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEnv {
    pub block_number: u64,
    /// When set, every environment term resolves to a named symbol.
    pub symbolic: bool,
}

impl CallEnv {
    pub fn term(&self, term: &EnvTerm) -> Value {
        if self.symbolic {
            return Value::symbol(match term {
                EnvTerm::BlockNumber => "env:block.number".to_string(),
                EnvTerm::BlockTimestamp => "env:block.timestamp".to_string(),
                EnvTerm::MsgValue => "env:msg.value".to_string(),
                EnvTerm::MsgSender => "env:msg.sender".to_string(),
            });
        }
        match term {
            EnvTerm::BlockNumber => Value::Int(self.block_number as i128),
            // 12-second block cadence from a fixed epoch keeps timestamps
            // monotone with block numbers.
            EnvTerm::BlockTimestamp => Value::Int(1_600_000_000 + self.block_number as i128 * 12),
            EnvTerm::MsgValue => Value::Int(0),
            EnvTerm::MsgSender => Value::Int(1),
        }
    }

    /// `blockhash(n)`: a deterministic pseudo-hash of the block number so
    /// concrete simulations are reproducible, distinct across blocks, and
    /// replayable by the verifier.
    pub fn blockhash(&self, arg: &Value) -> Value {
        match arg {
            Value::Int(n) if !self.symbolic => {
                Value::Int((n.wrapping_mul(0x9E37_79B9_7F4A_7C15u64 as i128)) & 0x7FFF_FFFF_FFFF)
            }
            other => Value::symbol(format!("env:blockhash({})", other)),
        }
    }
}

/// One executed step: the invocation plus the states immediately before and
/// after it. Whether the call completed or reverted is recorded so the
/// verifier can skip reverted steps (they leave state untouched).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub invocation: Invocation,
    pub pre: StateSnapshot,
    pub post: StateSnapshot,
    /// `false` when the call reverted (require failure / explicit revert),
    /// in which case `post.values == pre.values`.
    pub completed: bool,
}

/// An ordered, append-only record of executed steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Trace { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Verifies `steps[i].post == steps[i+1].pre` for all adjacent pairs.
    pub fn check_continuity(&self) -> Result<(), CoreError> {
        for (i, pair) in self.steps.windows(2).enumerate() {
            if pair[0].post != pair[1].pre {
                return Err(CoreError::TraceDiscontinuity { step: i });
            }
        }
        Ok(())
    }

    /// The state after the final step, if any step was executed.
    pub fn final_state(&self) -> Option<&StateSnapshot> {
        self.steps.last().map(|s| &s.post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(seq: u64, count: i128) -> StateSnapshot {
        let mut values = IndexMap::new();
        values.insert("count".to_string(), Value::Int(count));
        StateSnapshot::new(seq, values)
    }

    fn step(pre: StateSnapshot, post: StateSnapshot) -> TraceStep {
        TraceStep {
            invocation: Invocation::new("bump", vec![]),
            pre,
            post,
            completed: true,
        }
    }

    #[test]
    fn advance_bumps_seq_and_applies_writes() {
        let s0 = snap(0, 1);
        let mut writes = IndexMap::new();
        writes.insert("count".to_string(), Value::Int(2));
        let s1 = s0.advance(writes);
        assert_eq!(s1.seq, 1);
        assert_eq!(s1.get("count").unwrap(), &Value::Int(2));
        // original untouched
        assert_eq!(s0.get("count").unwrap(), &Value::Int(1));
    }

    #[test]
    fn unknown_variable_lookup_errors() {
        let s = snap(0, 0);
        assert!(matches!(
            s.get("missing"),
            Err(CoreError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn continuity_holds_for_chained_snapshots() {
        let s0 = snap(0, 0);
        let s1 = snap(1, 1);
        let s2 = snap(2, 2);
        let trace = Trace {
            steps: vec![step(s0, s1.clone()), step(s1, s2)],
        };
        assert!(trace.check_continuity().is_ok());
    }

    #[test]
    fn continuity_violation_names_the_step() {
        let trace = Trace {
            steps: vec![step(snap(0, 0), snap(1, 1)), step(snap(1, 99), snap(2, 2))],
        };
        assert_eq!(
            trace.check_continuity(),
            Err(CoreError::TraceDiscontinuity { step: 0 })
        );
    }

    #[test]
    fn invocation_deserializes_from_scenario_json() {
        let json = r#"{ "function": "flip", "args": [{"Bool": true}], "block_number": 7 }"#;
        let inv: Invocation = serde_json::from_str(json).unwrap();
        assert_eq!(inv.function, "flip");
        assert_eq!(inv.args, vec![Value::Bool(true)]);
        assert_eq!(inv.block_number, Some(7));
    }
}
