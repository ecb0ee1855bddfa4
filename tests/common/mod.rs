#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use email_sequencer::{
    gemini::{GeminiError, TextGenerator},
    generator::SequenceGenerator,
    prompt::PreparedPrompt,
    routes::AppState,
    session::Session,
    settings::SettingsStore,
};

pub const THREE_EMAILS: &str = r#"{"email_1":{"subject":"Welcome!","delay":"Send immediately","body":"Hi there..."},"email_2":{"subject":"Our Story","delay":"Wait 1 day","body":"..."},"email_3":{"subject":"15% Off","delay":"Wait 3 days","body":"..."}}"#;

pub const TWO_EMAILS: &str = r#"{"email_1":{"subject":"Welcome!","delay":"Send immediately","body":"Hi there..."},"email_2":{"subject":"Our Story","delay":"Wait 1 day","body":"..."}}"#;

/// Replays canned replies in order and remembers every prompt it was given.
pub struct FakeModel {
    replies: Mutex<VecDeque<Result<String, GeminiError>>>,
    prompts: Mutex<Vec<PreparedPrompt>>,
    calls: AtomicUsize,
    gate: Option<Arc<AtomicBool>>,
}

impl FakeModel {
    pub fn replying(replies: Vec<Result<String, GeminiError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    /// Holds every call until the returned flag is set.
    pub fn gated(reply: &str) -> (Arc<Self>, Arc<AtomicBool>) {
        let gate = Arc::new(AtomicBool::new(false));
        let model = Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Ok(reply.to_string())])),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: Some(gate.clone()),
        });
        (model, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<PreparedPrompt> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeModel {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate(&self, prompt: &PreparedPrompt) -> Result<String, GeminiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.clone());
        if let Some(gate) = &self.gate {
            while !gate.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| Err(GeminiError::Other("no scripted reply left".into())))
    }
}

pub fn app_state(model: Arc<FakeModel>, settings_dir: &tempfile::TempDir) -> AppState {
    AppState {
        session: Session::new(),
        generator: SequenceGenerator::new(model),
        settings: Arc::new(SettingsStore::open(settings_dir.path().join("settings.json"))),
    }
}
