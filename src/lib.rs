//! Long-lived speech recognition models behind serialized, exactly-once handles.
//!
//! A model is loaded once into an engine context and reused by many
//! transcription calls. Callers hold opaque [`HandleId`] tokens; every
//! operation on a handle takes that handle's lock, and release is idempotent
//! whether it comes from the caller or from automatic cleanup.
//!
//! # Module Structure
//!
//! - `engine`: the recognition engine capability and its whisper.cpp implementation
//! - `session`: resource handles and the session manager
//! - `commands`: host-facing command table over JSON arguments
//! - `config`: engine defaults and load/recognition settings
//! - `error`: the error taxonomy reported to callers

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;

pub use commands::Addon;
#[cfg(feature = "whisper")]
pub use commands::whisper_addon;
pub use config::{LoadSettings, RecognitionSettings};
pub use engine::{Engine, EngineError};
pub use error::{ErrorKind, SessionError};
pub use session::{
    CreateOptions, HandleId, HandleInfo, OwnedHandle, RunOptions, Segment, SessionManager,
    Transcript,
};
