use serde_json::Value;

use super::TutorResult;
use crate::error::ParseError;

/// Decodes the model's JSON text into one of the known result shapes.
///
/// Only the `type` tag is checked; missing fields come through empty and are
/// rendered as they are.
pub fn parse(raw: &str) -> Result<TutorResult, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingType)?
        .to_string();

    match kind.as_str() {
        "explanation" | "quiz" => {
            serde_json::from_value(value).map_err(|e| ParseError::Shape {
                kind,
                reason: e.to_string(),
            })
        }
        _ => Err(ParseError::UnknownType(kind)),
    }
}
