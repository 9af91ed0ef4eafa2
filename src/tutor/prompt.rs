use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{InlineImage, Mode, SessionInput};

/// Instruction text plus the optional image that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub image: Option<EncodedImage>,
}

impl Prompt {
    pub fn new(input: &SessionInput) -> Self {
        Self {
            text: build_prompt(input.mode, &input.interest),
            image: input.image.as_ref().map(EncodedImage::encode),
        }
    }
}

/// Base64 payload as the model endpoint expects inline data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn encode(image: &InlineImage) -> Self {
        Self {
            mime_type: image.mime_type.clone(),
            data: STANDARD.encode(&image.bytes),
        }
    }
}

pub fn build_prompt(mode: Mode, interest: &str) -> String {
    match mode {
        Mode::Explain => format!(
            "Analyze this image.
        Explain it using a fun analogy (video games, sports, movies) based on: \"{}\".
        Return only JSON: {{ \"type\": \"explanation\", \"content\": \"The analogy text...\" }}",
            interest
        ),
        Mode::Quiz => format!(
            "Analyze this image.
        Generate a 5-question multiple choice quiz about it for someone interested in: \"{}\".
        Every question has exactly 4 options, and \"answer\" is the full text of the correct option.
        Return only JSON: {{
          \"type\": \"quiz\",
          \"questions\": [
            {{ \"text\": \"Question?\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"answer\": \"The correct option text\", \"hint\": \"Why it's right\" }}
          ]
        }}",
            interest
        ),
    }
}
