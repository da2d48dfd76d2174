//! Synthesis and pipeline error types.

use solguard_analysis::AnalysisError;

/// Errors from the analysis pipeline and its input decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Scenario file or suggester payload failed to decode.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] serde_json::Error),

    /// Upstream analysis failure.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
