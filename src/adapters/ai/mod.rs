//! Classifier boundary: an OpenAI-compatible chat-completions endpoint.
//!
//! The engine calls this twice per message (primary and secondary model) and
//! once more for a review on disagreement. Failures map onto two recoverable
//! error kinds so the batch layer can leave the message unclassified and move
//! on. Which model answers is always an explicit argument; nothing here reads
//! ambient state mid-call.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::{EngineError, Result};

/// One classifier's answer for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub label: String,
    pub confidence: f64,
    pub rationale: String,
}

/// The seam the consensus resolver consumes. Production uses [`AiClient`];
/// tests script this trait directly.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, model: &str, system_prompt: &str, user_prompt: &str)
        -> Result<Verdict>;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelItem>,
}

#[derive(Deserialize)]
struct ModelItem {
    id: String,
}

/// The JSON shape the classifier is instructed to answer with.
#[derive(Deserialize)]
struct RawVerdict {
    label: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

pub struct AiClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::ClassifierUnavailable(format!("HTTP client error: {e}")))?;
        Ok(Self { client, config })
    }

    async fn chat_complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let endpoint = format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "temperature": 0.1,
            "stream": false
        });

        debug!(endpoint = %endpoint, model = %model, "Calling classifier");

        let mut request = self.client.post(&endpoint).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::ClassifierTimeout(self.config.timeout_secs)
            } else {
                EngineError::ClassifierUnavailable(format!("Request failed: {e}"))
            }
        })?;

        if !resp.status().is_success() {
            return Err(EngineError::ClassifierUnavailable(format!(
                "Classifier returned status {}",
                resp.status()
            )));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| {
            EngineError::ClassifierUnavailable(format!("Failed to parse response: {e}"))
        })?;

        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    /// Fetch available model ids from the `/v1/models` endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let endpoint = format!("{}/v1/models", self.config.api_url.trim_end_matches('/'));

        let mut request = self.client.get(&endpoint);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::ClassifierTimeout(self.config.timeout_secs)
            } else {
                EngineError::ClassifierUnavailable(format!("Request failed: {e}"))
            }
        })?;

        let parsed: ModelsResponse = resp.json().await.map_err(|e| {
            EngineError::ClassifierUnavailable(format!("Failed to parse models response: {e}"))
        })?;

        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl Classify for AiClient {
    async fn classify(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Verdict> {
        let content = self.chat_complete(model, system_prompt, user_prompt).await?;
        Ok(parse_verdict(&content))
    }
}

/// Parse a classifier answer. The model is instructed to reply with a single
/// JSON object, but small models wrap it in code fences or prose; extract the
/// first object and fall back to treating the whole reply as a bare label.
pub fn parse_verdict(content: &str) -> Verdict {
    let trimmed = content.trim();

    if let Some(raw) = extract_json_object(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<RawVerdict>(&raw) {
            return Verdict {
                label: parsed.label.trim().to_string(),
                confidence: parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                rationale: parsed.rationale.unwrap_or_default(),
            };
        }
    }

    warn!("Classifier reply was not JSON, using it as a bare label");
    Verdict {
        label: trimmed
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches('"')
            .to_string(),
        confidence: 0.5,
        rationale: trimmed.to_string(),
    }
}

fn extract_json_object(content: &str) -> Option<String> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(content[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let verdict = parse_verdict(
            r#"{"label": "SPAM", "confidence": 0.92, "rationale": "cold marketing"}"#,
        );
        assert_eq!(verdict.label, "SPAM");
        assert_eq!(verdict.confidence, 0.92);
        assert_eq!(verdict.rationale, "cold marketing");
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let verdict = parse_verdict(
            "Sure, here is the classification:\n```json\n{\"label\": \"Interesantes\", \"confidence\": 0.7}\n```",
        );
        assert_eq!(verdict.label, "Interesantes");
        assert_eq!(verdict.confidence, 0.7);
        assert_eq!(verdict.rationale, "");
    }

    #[test]
    fn bare_word_falls_back_to_label() {
        let verdict = parse_verdict("SPAM\n");
        assert_eq!(verdict.label, "SPAM");
        assert_eq!(verdict.confidence, 0.5);
    }

    #[test]
    fn confidence_is_clamped() {
        let verdict = parse_verdict(r#"{"label": "SPAM", "confidence": 3.5}"#);
        assert_eq!(verdict.confidence, 1.0);
    }
}
