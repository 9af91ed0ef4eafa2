use thiserror::Error;

use crate::tutor::gemini::DEFAULT_API_BASE;

const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng --stdin --stdout";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub speech_command: Vec<String>,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY").ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?;
        let gemini_api_base = var("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let speech_command = var("SPEECH_COMMAND")
            .unwrap_or_else(|| DEFAULT_SPEECH_COMMAND.to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            gemini_api_key,
            gemini_api_base,
            speech_command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(config(&[]), Err(ConfigError::MissingVar("GEMINI_API_KEY")));
        assert_eq!(
            config(&[("GEMINI_API_KEY", "  ")]),
            Err(ConfigError::MissingVar("GEMINI_API_KEY"))
        );
    }

    #[test]
    fn optional_values_fall_back_to_defaults() {
        let cfg = config(&[("GEMINI_API_KEY", "k")]).expect("config");
        assert_eq!(cfg.gemini_api_key, "k");
        assert_eq!(cfg.gemini_api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.speech_command, vec!["espeak-ng", "--stdin", "--stdout"]);
    }

    #[test]
    fn overrides_are_honoured() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_API_BASE", "http://localhost:8080/v1beta"),
            ("SPEECH_COMMAND", "say -o /dev/stdout"),
        ])
        .expect("config");
        assert_eq!(cfg.gemini_api_base, "http://localhost:8080/v1beta");
        assert_eq!(cfg.speech_command, vec!["say", "-o", "/dev/stdout"]);
    }
}
