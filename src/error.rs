//! Error taxonomy surfaced to callers of the session layer.
//!
//! Every failure is one of five kinds so the host can tell a malformed call
//! apart from a stale handle, a bad model, or a failed recognition pass.

use serde::Serialize;
use std::fmt;

use crate::engine::EngineError;

/// Stable name for each error kind, used when mapping errors across the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidHandle,
    LoadError,
    UseAfterFreeError,
    RecognitionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidHandle => "InvalidHandle",
            ErrorKind::LoadError => "LoadError",
            ErrorKind::UseAfterFreeError => "UseAfterFreeError",
            ErrorKind::RecognitionError => "RecognitionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed or missing caller input, rejected before any engine call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The reference does not resolve to a registered handle.
    #[error("Invalid context handle: {0}")]
    InvalidHandle(String),

    #[error("Failed to load model: {source_id}: {reason}")]
    LoadError { source_id: String, reason: String },

    /// The handle exists but its model has already been released.
    #[error("Model has been freed: {0}")]
    UseAfterFree(String),

    #[error("Transcription failed: {0}")]
    RecognitionError(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SessionError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            SessionError::LoadError { .. } => ErrorKind::LoadError,
            SessionError::UseAfterFree(_) => ErrorKind::UseAfterFreeError,
            SessionError::RecognitionError(_) => ErrorKind::RecognitionError,
        }
    }

    pub(crate) fn load(source_id: impl Into<String>, err: EngineError) -> Self {
        let reason = match err {
            EngineError::Load { reason, .. } => reason,
            other => other.to_string(),
        };
        SessionError::LoadError {
            source_id: source_id.into(),
            reason,
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Load { path, reason } => SessionError::LoadError {
                source_id: path,
                reason,
            },
            other => SessionError::RecognitionError(other.to_string()),
        }
    }
}

/// Host-facing shape of an error: `{ "kind": ..., "message": ... }`.
impl Serialize for SessionError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SessionError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_names_the_source() {
        let err = SessionError::load(
            "/models/ggml-base.bin",
            EngineError::Load {
                path: "/models/ggml-base.bin".to_string(),
                reason: "no such file".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(err.to_string().contains("/models/ggml-base.bin"));
    }

    #[test]
    fn engine_errors_map_to_session_kinds() {
        let load: SessionError = EngineError::Load {
            path: "a.bin".to_string(),
            reason: "corrupt".to_string(),
        }
        .into();
        assert_eq!(load.kind(), ErrorKind::LoadError);

        let run: SessionError = EngineError::Run { status: -1 }.into();
        assert_eq!(run.kind(), ErrorKind::RecognitionError);
    }

    #[test]
    fn load_error_message_is_engine_neutral() {
        let err = SessionError::LoadError {
            source_id: "model.bin".to_string(),
            reason: "model file not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load model: model.bin: model file not found"
        );
    }

    #[test]
    fn serializes_load_error_for_the_host() {
        let err = SessionError::LoadError {
            source_id: "model.bin".to_string(),
            reason: "corrupt".to_string(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "LoadError");
        assert_eq!(value["message"], "Failed to load model: model.bin: corrupt");
    }

    #[test]
    fn serializes_kind_and_message() {
        let err = SessionError::UseAfterFree("3f1c".to_string());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "UseAfterFreeError");
        assert_eq!(value["message"], "Model has been freed: 3f1c");
    }
}
