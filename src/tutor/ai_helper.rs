use std::sync::Arc;

use log::{debug, info};

use super::gemini::ModelClient;
use super::parse::parse;
use super::prompt::Prompt;
use super::{SessionInput, TutorResult};
use crate::error::TutorError;

pub struct TutorHelper {
    client: Arc<dyn ModelClient>,
}

impl TutorHelper {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Builds the prompt for `input`, sends it and decodes the answer.
    pub async fn ask(&self, input: &SessionInput) -> Result<TutorResult, TutorError> {
        info!(
            "Asking for {} (interest: {:?}, image: {})",
            input.mode.as_str(),
            input.interest,
            input.image.is_some()
        );
        let prompt = Prompt::new(input);
        debug!("Prompt: {:?}", prompt.text);

        let raw = self.client.generate(&prompt).await?;
        debug!("Completion: {:?}", raw);

        Ok(parse(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, RequestError};
    use crate::tutor::fake::{FakeClient, FIVE_QUESTIONS};
    use crate::tutor::{InlineImage, Mode};

    #[tokio::test]
    async fn explain_without_image_sends_text_only() {
        let client = FakeClient::replying(r#"{ "type": "explanation", "content": "GG" }"#);
        let helper = TutorHelper::new(client.clone());

        let result = helper
            .ask(&SessionInput::new(Mode::Explain, "video games", None))
            .await
            .expect("explanation");

        assert_eq!(
            result,
            TutorResult::Explanation {
                content: "GG".to_string()
            }
        );
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].text.contains("video games"));
        assert!(prompts[0].image.is_none());
    }

    #[tokio::test]
    async fn image_is_forwarded_with_the_prompt() {
        let client = FakeClient::replying(r#"{ "type": "explanation", "content": "GG" }"#);
        let helper = TutorHelper::new(client.clone());
        let input = SessionInput::new(
            Mode::Explain,
            "chess",
            Some(InlineImage::new("image/webp", vec![1, 2, 3])),
        );

        helper.ask(&input).await.expect("explanation");

        let image = client.prompts()[0].image.clone().expect("image part");
        assert_eq!(image.mime_type, "image/webp");
        assert_eq!(image.data, "AQID");
    }

    #[tokio::test]
    async fn quiz_keeps_all_five_questions_in_order() {
        let helper = TutorHelper::new(FakeClient::replying(FIVE_QUESTIONS));

        let result = helper
            .ask(&SessionInput::new(Mode::Quiz, "basketball", None))
            .await
            .expect("quiz");

        let questions = result.questions().expect("quiz");
        let texts: Vec<&str> = questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["1?", "2?", "3?", "4?", "5?"]);
        assert_eq!(questions[2].answer, "D");
    }

    #[tokio::test]
    async fn malformed_reply_is_a_parse_error() {
        let helper = TutorHelper::new(FakeClient::replying("Sure! Here is your quiz:"));

        let err = helper
            .ask(&SessionInput::new(Mode::Quiz, "", None))
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::Parse(ParseError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn request_failure_is_passed_through() {
        let helper = TutorHelper::new(FakeClient::failing("SAFETY"));

        let err = helper
            .ask(&SessionInput::new(Mode::Explain, "", None))
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::Request(RequestError::Blocked(_))));
        assert_eq!(err.to_string(), "model refused the prompt: SAFETY");
    }
}
