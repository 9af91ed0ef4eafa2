use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single tutor request. Every kind is terminal for that request.
#[derive(Debug, Error)]
pub enum TutorError {
    /// The uploaded image could not be fetched into memory.
    #[error("could not read the image: {0}")]
    FileRead(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The model call itself failed.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {snippet}")]
    HttpStatus { status: StatusCode, snippet: String },

    #[error("model refused the prompt: {0}")]
    Blocked(String),

    #[error("model returned no text")]
    EmptyResponse,
}

/// The model answered, but not with one of the two known result shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("model response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("model response has no \"type\" field")]
    MissingType,

    #[error("model response has unknown type \"{0}\"")]
    UnknownType(String),

    #[error("model response of type \"{kind}\" is malformed: {reason}")]
    Shape { kind: String, reason: String },
}
