//! Gemini agent adapter.
//!
//! Calls the `models/{model}:generateContent` REST endpoint and returns
//! the concatenated text parts of the first candidate.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::AgentError;
use super::trait_def::Agent;
use crate::persona::Persona;

/// Public Gemini API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Agent backed by the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiAgent {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAgent")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiAgent {
    /// Create an agent against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AgentError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create an agent with a custom endpoint root and request timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Request(e.to_string()))?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create an agent from the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, AgentError> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| AgentError::MissingApiKey)?;
        Self::new(key)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

/// Build the `generateContent` request body for a persona.
pub(crate) fn build_request_body(prompt: &str, persona: &Persona) -> Value {
    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }]
    });

    if !persona.instruction.is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{ "text": persona.instruction }]
        });
    }

    if !persona.tools.is_empty() {
        let tools: Vec<Value> = persona
            .tools
            .iter()
            .map(|tool| {
                let mut entry = serde_json::Map::new();
                entry.insert(tool.clone(), json!({}));
                Value::Object(entry)
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(mime) = &persona.response_mime_type {
        generation_config.insert("responseMimeType".to_string(), json!(mime));
    }
    if let Some(schema) = &persona.output_schema {
        generation_config.insert("responseSchema".to_string(), schema.clone());
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    body
}

/// Pull the text out of a `generateContent` response.
pub(crate) fn extract_text(response: &Value) -> Result<String, AgentError> {
    let Some(candidate) = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        let reason = response
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str());
        return match reason {
            Some(reason) => Err(AgentError::Decode(format!("prompt blocked: {reason}"))),
            None => Err(AgentError::EmptyResponse),
        };
    };

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        Err(AgentError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl Agent for GeminiAgent {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, persona: &Persona) -> Result<String, AgentError> {
        let body = build_request_body(prompt, persona);
        debug!(persona = %persona.name, model = %persona.model, "calling generateContent");

        let response = self
            .client
            .post(self.endpoint(&persona.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;

        extract_text(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_prompt_and_instruction() {
        let persona = Persona::new("Neo", "You are Neo.");
        let body = build_request_body("Topic: tea", &persona);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Topic: tea");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are Neo.");
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn body_carries_structured_output_directive() {
        let mut persona = Persona::new("The Oracle", "Judge.");
        persona.response_mime_type = Some("application/json".to_string());
        persona.output_schema = Some(json!({"type": "OBJECT"}));
        let body = build_request_body("verdict?", &persona);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn body_maps_tool_names() {
        let mut persona = Persona::new("Neo", "You are Neo.");
        persona.tools = vec!["google_search".to_string()];
        let body = build_request_body("x", &persona);
        assert_eq!(body["tools"], json!([{ "google_search": {} }]));
    }

    #[test]
    fn extract_joins_text_parts() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "* one\n" }, { "text": "* two" }] }
            }]
        });
        assert_eq!(extract_text(&response).unwrap(), "* one\n* two");
    }

    #[test]
    fn extract_without_candidates_is_empty() {
        assert_eq!(
            extract_text(&json!({"candidates": []})),
            Err(AgentError::EmptyResponse)
        );
    }

    #[test]
    fn extract_reports_block_reason() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(
            extract_text(&response),
            Err(AgentError::Decode("prompt blocked: SAFETY".to_string()))
        );
    }

    #[test]
    fn extract_candidate_without_text() {
        let response = json!({"candidates": [{"finishReason": "MAX_TOKENS"}]});
        assert_eq!(extract_text(&response), Err(AgentError::EmptyResponse));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(GeminiAgent::new("  ").unwrap_err(), AgentError::MissingApiKey);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let agent =
            GeminiAgent::with_options("k", "http://localhost:1234/v1beta/", DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(
            agent.endpoint("gemini-2.0-flash"),
            "http://localhost:1234/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn debug_hides_api_key() {
        let agent = GeminiAgent::new("secret-key").unwrap();
        let debug = format!("{agent:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("GeminiAgent"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let agent = GeminiAgent::with_options(
            "k",
            "http://127.0.0.1:9/v1beta",
            Duration::from_secs(5),
        )
        .unwrap();
        let err = agent
            .generate("hi", &Persona::new("Neo", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Request(_)), "got {err:?}");
    }
}
