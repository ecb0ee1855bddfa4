use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{de::IgnoredAny, Deserialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn, error};

use crate::{config::{GeminiConfig, RetryPolicy, API_KEY_VAR}, prompt::PreparedPrompt};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key not found. Please ensure the {0} environment variable is configured.")]
    MissingApiKey(&'static str),
    #[error("HTTP error: {0}")] Http(String),
    #[error("Request timed out: {0}")] Timeout(String),
    #[error("API returned status {status}: {body}")] Status { status: u16, body: String },
    #[error("Other: {0}")] Other(String),
}

impl GeminiError {
    /// Failures worth a second attempt: connection problems, timeouts, rate limits and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            GeminiError::Http(_) | GeminiError::Timeout(_) => true,
            GeminiError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            GeminiError::MissingApiKey(_) | GeminiError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            GeminiError::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            GeminiError::Http(e.to_string())
        } else {
            GeminiError::Other(e.to_string())
        }
    }
}

/// Narrow seam around the model: prompt triple in, raw text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;
    async fn generate(&self, prompt: &PreparedPrompt) -> Result<String, GeminiError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeminiError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: config.retry.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn perform_api_call(&self, api_key: &str, body: &Value, attempt: u32) -> Result<String, GeminiError> {
        let url = self.endpoint();
        info!(attempt, "🔗 Making request to: {}", url);

        let started = Instant::now();
        let response = self.client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        info!(attempt, elapsed_ms = started.elapsed().as_millis() as u64, "📥 Response status: {}", status);

        let response_text = response.text().await?;
        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Status { status: status.as_u16(), body: response_text });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("Failed to parse response: {e}")))?;

        if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            warn!("⚠️ Prompt blocked by the API: {}", reason);
        }

        let text = extract_text(&parsed);
        if text.is_empty() {
            warn!("⚠️ No text content found in API response");
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &PreparedPrompt) -> Result<String, GeminiError> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingApiKey(API_KEY_VAR))?;
        let body = build_request_body(prompt);

        let mut attempt = 1;
        loop {
            match self.perform_api_call(api_key, &body, attempt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt <= self.retry.max_retries => {
                    let delay = backoff_delay(&self.retry, attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "🔄 Transient failure, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, "❌ Gemini request failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

/// Exponential backoff for the given 1-based attempt, plus up to 20% jitter.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy.backoff.as_millis() as u64;
    let scaled = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = if scaled == 0 { 0 } else { rand::thread_rng().gen_range(0..=scaled / 5) };
    Duration::from_millis(scaled + jitter)
}

pub fn build_request_body(prompt: &PreparedPrompt) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt.user_prompt}]
        }],
        "systemInstruction": {
            "parts": [{"text": prompt.system_instruction}]
        },
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": prompt.schema,
            "candidateCount": 1
        }
    })
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(IgnoredAny),
}

fn extract_text(resp: &GeminiResponse) -> String {
    resp.candidates
        .first()
        .map(|c| {
            c.content.parts.iter()
                .filter_map(|p| match p {
                    Part::Text { text } => Some(text.as_str()),
                    Part::Other(_) => None,
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt;
    use crate::models::GenerationRequest;

    fn config(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(String::from),
            base_url: "http://127.0.0.1:9/v1beta/".into(),
            model: "gemini-2.5-flash".into(),
            timeout: Duration::from_secs(2),
            retry: RetryPolicy { max_retries: 0, backoff: Duration::ZERO },
        }
    }

    fn prepared() -> PreparedPrompt {
        prompt::build(&GenerationRequest { product: "Organic Coffee".into(), ..Default::default() }).unwrap()
    }

    #[test]
    fn request_body_carries_prompt_instruction_and_schema() {
        let p = prepared();
        let body = build_request_body(&p);
        assert_eq!(body["contents"][0]["parts"][0]["text"], p.user_prompt);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], p.system_instruction);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"], p.schema);
    }

    #[test]
    fn endpoint_uses_model_and_trims_base() {
        let client = GeminiClient::new(&config(Some("k"))).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/v1beta/models/gemini-2.5-flash:generateContent");
    }

    #[test]
    fn transient_classification() {
        assert!(GeminiError::Http("reset".into()).is_transient());
        assert!(GeminiError::Timeout("slow".into()).is_transient());
        assert!(GeminiError::Status { status: 429, body: String::new() }.is_transient());
        assert!(GeminiError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!GeminiError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!GeminiError::Status { status: 403, body: String::new() }.is_transient());
        assert!(!GeminiError::MissingApiKey(API_KEY_VAR).is_transient());
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        let policy = RetryPolicy { max_retries: 3, backoff: Duration::from_millis(100) };
        let first = backoff_delay(&policy, 1).as_millis();
        let second = backoff_delay(&policy, 2).as_millis();
        assert!((100..=120).contains(&first), "{first}");
        assert!((200..=240).contains(&second), "{second}");
        let none = RetryPolicy { max_retries: 1, backoff: Duration::ZERO };
        assert_eq!(backoff_delay(&none, 1), Duration::ZERO);
    }

    #[test]
    fn text_parts_of_first_candidate_are_joined() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"inlineData":{"data":"x","mimeType":"image/png"}},{"text":"1}"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed.candidates[0].content.parts[1], Part::Other(_)));
        assert_eq!(extract_text(&parsed), "{\"a\":1}");
        let empty: GeminiResponse = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(extract_text(&empty), "");
        assert_eq!(empty.prompt_feedback.and_then(|f| f.block_reason).as_deref(), Some("SAFETY"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        for key in [None, Some("   ")] {
            let client = GeminiClient::new(&config(key)).unwrap();
            match client.generate(&prepared()).await {
                Err(GeminiError::MissingApiKey(var)) => assert_eq!(var, API_KEY_VAR),
                other => panic!("expected missing key, got {other:?}"),
            }
        }
    }
}
