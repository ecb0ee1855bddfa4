use serde_json::{json, Value};

use crate::{error::GenerationError, models::GenerationRequest};

pub const SYSTEM_INSTRUCTION: &str = "You are an expert email marketing copywriter specializing in onboarding and welcome sequences. Your task is to generate a complete 3-part email sequence based on the user's criteria.

IMPORTANT RULES:
1. The output MUST be a single, valid JSON object that adheres to the provided schema. Do not add any text before or after the JSON.
2. Email bodies must be clean, readable plain text, designed for maximum conversion and engagement. Do not use HTML or Markdown.
3. Incorporate the specified brand voice and content strategy into the copy.";

pub const PRODUCT_REQUIRED: &str = "Newsletter Topic / Product is required.";

/// Everything the model call needs for one generation.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub system_instruction: &'static str,
    pub user_prompt: String,
    pub schema: Value,
}

/// Validates the request and renders the prompt triple. Never touches the network.
pub fn build(req: &GenerationRequest) -> Result<PreparedPrompt, GenerationError> {
    if req.product.trim().is_empty() {
        return Err(GenerationError::Validation(PRODUCT_REQUIRED.into()));
    }
    Ok(PreparedPrompt {
        system_instruction: SYSTEM_INSTRUCTION,
        user_prompt: build_user_prompt(req),
        schema: response_schema(),
    })
}

pub fn build_user_prompt(req: &GenerationRequest) -> String {
    let GenerationRequest { product, goal, tone, content } = req;
    format!(
        "\nPlease generate a 3-part Welcome Email Sequence for the following:\n\n\
         - Newsletter/Brand/Product: \"{product}\"\n\
         - Primary Goal: \"{goal}\"\n\
         - Brand Voice: \"{tone}\"\n\
         - Sequence Content & Strategy:\n  {content}\n"
    )
}

fn email_schema(ordinal: &str, subject_hint: &str, delay_hint: &str) -> Value {
    json!({
        "type": "OBJECT",
        "description": format!("The {ordinal} email in the sequence."),
        "properties": {
            "subject": { "type": "STRING", "description": subject_hint },
            "delay": { "type": "STRING", "description": delay_hint },
            "body": { "type": "STRING", "description": format!("The full plain text body copy for the {ordinal} email.") }
        },
        "required": ["subject", "delay", "body"]
    })
}

/// Structured output schema in the OpenAPI subset Gemini accepts.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "email_1": email_schema(
                "first",
                "The catchy, high-open-rate subject line for Email 1.",
                "The delay before sending this email, e.g., 'Send immediately'.",
            ),
            "email_2": email_schema(
                "second",
                "The catchy subject line for Email 2.",
                "The delay after the first email, e.g., 'Wait 1 day'.",
            ),
            "email_3": email_schema(
                "third",
                "The catchy subject line for Email 3.",
                "The delay after the second email, e.g., 'Wait 3 days'.",
            ),
        },
        "required": ["email_1", "email_2", "email_3"]
    })
}
