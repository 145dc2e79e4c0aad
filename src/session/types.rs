use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_LANGUAGE;
use crate::error::SessionError;

/// Opaque token a caller holds in place of a model handle.
///
/// It carries no address and can only be resolved through the session
/// manager that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(Uuid);

impl HandleId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for HandleId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(HandleId)
            .map_err(|_| SessionError::InvalidHandle(format!("'{}' is not a handle token", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOptions {
    #[serde(alias = "gpu")]
    pub use_acceleration: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            use_acceleration: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunOptions {
    pub language: String,
    /// Biases recognition toward expected vocabulary. Empty means none.
    #[serde(alias = "prompt")]
    pub initial_prompt: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            initial_prompt: String::new(),
        }
    }
}

impl RunOptions {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn initial_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.initial_prompt = prompt.into();
        self
    }
}

/// One recognized span of speech. Times are milliseconds from the start of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// In the order the engine produced them.
    pub segments: Vec<Segment>,
    /// Segment texts joined with no separator.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    pub loaded: bool,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn handle_id_round_trips_through_its_string_form() {
        let id = HandleId::new();
        let parsed: HandleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn malformed_token_is_an_invalid_handle() {
        let err = "0xdeadbeef".parse::<HandleId>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn options_accept_legacy_keys() {
        let create: CreateOptions = serde_json::from_str(r#"{"gpu": false}"#).unwrap();
        assert!(!create.use_acceleration);

        let run: RunOptions =
            serde_json::from_str(r#"{"language": "de", "prompt": "Kubernetes"}"#).unwrap();
        assert_eq!(run.language, "de");
        assert_eq!(run.initial_prompt, "Kubernetes");
    }

    #[test]
    fn options_default_when_absent() {
        let create: CreateOptions = serde_json::from_str("{}").unwrap();
        assert!(create.use_acceleration);

        let run: RunOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(run.language, "en");
        assert!(run.initial_prompt.is_empty());
    }
}
