use std::{sync::Arc, time::Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::GenerationError,
    gemini::TextGenerator,
    models::{EmailSequence, GenerationRequest},
    prompt::{self, PreparedPrompt},
};

/// Request building, the model call and reply validation, in that order.
#[derive(Clone)]
pub struct SequenceGenerator {
    backend: Arc<dyn TextGenerator>,
}

impl SequenceGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self { backend }
    }

    pub fn prepare(&self, req: &GenerationRequest) -> Result<PreparedPrompt, GenerationError> {
        prompt::build(req)
    }

    pub async fn generate(&self, req: &GenerationRequest) -> Result<EmailSequence, GenerationError> {
        let prepared = self.prepare(req)?;
        self.run(&req.product, &prepared).await
    }

    /// Dispatches an already validated prompt. Exactly one backend call per invocation.
    pub async fn run(&self, product: &str, prepared: &PreparedPrompt) -> Result<EmailSequence, GenerationError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%request_id, model = self.backend.model(), "🚀 Generating email sequence for product: {}", product);

        let result = match self.backend.generate(prepared).await {
            Ok(raw) => parse_sequence(&raw),
            Err(e) => Err(GenerationError::from(e)),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(%request_id, elapsed_ms, "✅ Email sequence generated"),
            Err(e) => warn!(%request_id, elapsed_ms, code = e.code(), "❌ Email sequence generation failed: {}", e),
        }
        result
    }
}

/// Turns the raw model reply into a sequence. All-or-nothing: any missing
/// section, missing or mistyped field, or blank subject/body rejects the reply.
pub fn parse_sequence(raw: &str) -> Result<EmailSequence, GenerationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(GenerationError::InvalidStructure("expected a JSON object at the top level".into()));
    }
    let sequence: EmailSequence = serde_json::from_value(value)
        .map_err(|e| GenerationError::InvalidStructure(e.to_string()))?;

    for (position, email) in sequence.iter() {
        if email.subject.trim().is_empty() {
            return Err(GenerationError::InvalidStructure(format!("email_{position} has an empty subject")));
        }
        if email.body.trim().is_empty() {
            return Err(GenerationError::InvalidStructure(format!("email_{position} has an empty body")));
        }
    }
    Ok(sequence)
}
