use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::gemini::ModelClient;
use super::prompt::Prompt;
use crate::error::RequestError;

/// Answers every prompt with a canned reply and remembers what it was sent.
pub struct FakeClient {
    reply: Result<String, String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl FakeClient {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Every prompt is refused with `reason`.
    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, RequestError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.reply.clone().map_err(RequestError::Blocked)
    }
}

pub const FIVE_QUESTIONS: &str = r#"{
    "type": "quiz",
    "questions": [
        { "text": "1?", "options": ["A", "B", "C", "D"], "answer": "B", "hint": "h1" },
        { "text": "2?", "options": ["A", "B", "C", "D"], "answer": "A", "hint": "h2" },
        { "text": "3?", "options": ["A", "B", "C", "D"], "answer": "D", "hint": "h3" },
        { "text": "4?", "options": ["A", "B", "C", "D"], "answer": "C", "hint": "h4" },
        { "text": "5?", "options": ["A", "B", "C", "D"], "answer": "B", "hint": "h5" }
    ]
}"#;
