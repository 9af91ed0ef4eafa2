pub mod ai_helper;
#[cfg(test)]
pub mod fake;
pub mod gemini;
pub mod parse;
pub mod prompt;
pub mod scoring;

/// What the user asked the tutor to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Explain,
    Quiz,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Explain => "explain",
            Mode::Quiz => "quiz",
        }
    }

    /// Label shown while a request in this mode is pending.
    pub fn pending_label(&self) -> &'static str {
        match self {
            Mode::Explain => "Thinking...",
            Mode::Quiz => "Generating...",
        }
    }
}

/// Raw image bytes together with their MIME type, ready to be inlined into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Everything a single tutor request is built from.
#[derive(Debug, Clone, Default)]
pub struct SessionInput {
    pub interest: String,
    pub image: Option<InlineImage>,
    pub mode: Mode,
}

impl SessionInput {
    pub fn new(mode: Mode, interest: impl Into<String>, image: Option<InlineImage>) -> Self {
        Self {
            interest: interest.into(),
            image,
            mode,
        }
    }
}

/// A decoded model answer. The `type` tag on the wire selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TutorResult {
    Explanation {
        #[serde(default)]
        content: String,
    },
    Quiz {
        #[serde(default)]
        questions: Vec<Question>,
    },
}

impl TutorResult {
    pub fn questions(&self) -> Option<&[Question]> {
        match self {
            TutorResult::Quiz { questions } => Some(questions.as_slice()),
            TutorResult::Explanation { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub answer: String,
    pub hint: String,
}
