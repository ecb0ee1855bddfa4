use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, Utc};

/// Inputs collected from the form at submit time. Only `product` is required.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    /// Missing or `null` reads as empty so the product check reports it.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub product: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default, alias = "toneDescription")]
    pub tone: String,
    #[serde(default, alias = "contentPoints")]
    pub content: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    /// Human readable send delay, e.g. "Send immediately" or "Wait 1 day". No format is enforced.
    pub delay: String,
    pub body: String,
}

/// The fixed welcome / nurture / conversion triple.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmailSequence {
    pub email_1: EmailMessage,
    pub email_2: EmailMessage,
    pub email_3: EmailMessage,
}

impl EmailSequence {
    /// Emails in send order, paired with their 1-based position.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EmailMessage)> {
        [&self.email_1, &self.email_2, &self.email_3]
            .into_iter()
            .enumerate()
            .map(|(i, email)| (i + 1, email))
    }

    pub fn get(&self, position: usize) -> Option<&EmailMessage> {
        match position {
            1 => Some(&self.email_1),
            2 => Some(&self.email_2),
            3 => Some(&self.email_3),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

pub const DEFAULT_GOAL: &str = "Get new subscribers to make their first purchase";
pub const DEFAULT_TONE: &str = "Friendly, Helpful, Enthusiastic";
pub const DEFAULT_CONTENT: &str = "1. Welcome & deliver the promised gift\n2. Share our story and a few practical tips\n3. Make a time-limited offer";

/// Form values and theme preference as they are persisted between sessions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub product: String,
    pub goal: String,
    pub content: String,
    pub tone: String,
    pub theme: Theme,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            product: String::new(),
            goal: DEFAULT_GOAL.to_string(),
            content: DEFAULT_CONTENT.to_string(),
            tone: DEFAULT_TONE.to_string(),
            theme: Theme::Dark,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Requesting,
    Succeeded,
    Failed,
}

/// What `GET /api/sequence` reports about the single generation slot.
#[derive(Debug, Serialize, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<EmailSequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}
