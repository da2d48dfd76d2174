//! OpenAI-compatible predicate suggestion client.
//!
//! Sends the contract source to a chat-completions endpoint in JSON mode
//! and decodes structured predicate suggestions from the assistant content.
//! All failures map to `AnalysisError::Suggester`; the pipeline treats
//! suggestions as optional input, so a misbehaving provider degrades the
//! run instead of aborting it at the call site.

use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use solguard_analysis::{AnalysisError, PredicateSuggester, Suggestion};
use solguard_core::model::ContractModel;

const PROMPT_HEADER: &str = "\
You analyze smart contracts and propose candidate invariants as structured \
predicates. Respond with a JSON object {\"suggestions\": [...]} where each \
suggestion has: \"function\" (name), \"description\" (one line), and \
\"predicate\" (a predicate tree). Predicate nodes: {\"Atom\": term}, \
{\"Not\": p}, {\"And\": [a, b]}, {\"Or\": [a, b]}. Term nodes: \
{\"Int\": n}, {\"Bool\": b}, {\"Pre\": \"var\"}, {\"Post\": \"var\"}, \
{\"Param\": \"name\"}, or {\"Binary\": {\"op\": \"Eq|Ne|Lt|Le|Gt|Ge|Add|Sub\", \
\"lhs\": term, \"rhs\": term}}. Only reference declared state variables and \
parameters. Contract source follows.";

pub struct HttpSuggester {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpSuggester {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        HttpSuggester {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn chat(&self, user_message: &str) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": PROMPT_HEADER },
                { "role": "user", "content": user_message }
            ],
            "response_format": { "type": "json_object" }
        });

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let started = Instant::now();
        let response = request
            .send()
            .map_err(|err| AnalysisError::Suggester(format!("request failed: {}", err)))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| AnalysisError::Suggester(format!("response read failed: {}", err)))?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            %status,
            "suggestion request complete"
        );
        if !status.is_success() {
            return Err(AnalysisError::Suggester(format!(
                "provider returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|err| AnalysisError::Suggester(format!("response parse failed: {}", err)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                AnalysisError::Suggester("response missing assistant content".to_string())
            })
    }
}

impl PredicateSuggester for HttpSuggester {
    fn suggest(
        &self,
        source: &str,
        model: &ContractModel,
    ) -> Result<Vec<Suggestion>, AnalysisError> {
        let content = self.chat(source)?;
        let payload: SuggestionPayload = serde_json::from_str(&content)
            .map_err(|err| AnalysisError::Suggester(format!("bad suggestion payload: {}", err)))?;

        // drop suggestions for functions the model does not declare
        let mut suggestions = Vec::new();
        for suggestion in payload.suggestions {
            if model.function_by_name(&suggestion.function).is_none() {
                warn!(function = %suggestion.function, "dropping suggestion for unknown function");
                continue;
            }
            suggestions.push(suggestion);
        }
        info!(count = suggestions.len(), "decoded predicate suggestions");
        Ok(suggestions)
    }
}

#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_with_unknown_predicate_shape_fails_decoding() {
        let bad = r#"{"suggestions":[{"function":"f","description":"d","predicate":{"Xor":[]}}]}"#;
        assert!(serde_json::from_str::<SuggestionPayload>(bad).is_err());
    }

    #[test]
    fn payload_without_suggestions_key_is_empty() {
        let payload: SuggestionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.suggestions.is_empty());
    }
}
