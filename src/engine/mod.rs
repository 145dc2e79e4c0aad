//! Recognition engine capability.
//!
//! The session layer never touches a model directly. It drives an [`Engine`],
//! which knows how to build a context from a model file, run one full
//! recognition pass over a buffer, and read back the segments of the last
//! pass. The context is owned by a single resource handle and every call on
//! it happens under that handle's lock.
//!
//! # Module Structure
//!
//! - `whisper`: whisper.cpp engine via `whisper-rs` (feature `whisper`)
//! - `testing`: instrumented in-memory engine used by the test suites

#[cfg(feature = "whisper")]
pub mod whisper;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "whisper")]
pub use whisper::{WhisperEngine, WhisperSession};

use crate::config::{LoadSettings, RecognitionSettings};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot load model from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("engine run reported status {status}")]
    Run { status: i32 },

    #[error("segment {index} unavailable: {reason}")]
    Segment { index: usize, reason: String },

    #[error("{0}")]
    Backend(String),
}

/// Per-run inputs handed to [`Engine::run_full`].
#[derive(Debug, Clone, Copy)]
pub struct RunParams<'a> {
    pub settings: &'a RecognitionSettings,
    pub language: &'a str,
    /// Empty means no prompt.
    pub initial_prompt: &'a str,
}

pub trait Engine: Send + Sync + 'static {
    /// Loaded-model state. Owned by exactly one resource handle.
    type Context: Send + 'static;

    fn name(&self) -> &'static str;

    fn load(&self, source: &str, settings: &LoadSettings) -> Result<Self::Context, EngineError>;

    /// Runs recognition over the whole buffer in one pass.
    fn run_full(
        &self,
        context: &mut Self::Context,
        params: &RunParams<'_>,
        samples: &[f32],
    ) -> Result<(), EngineError>;

    // Segment accessors are only meaningful right after a successful
    // `run_full` on the same context, under the same lock.

    fn segment_count(&self, context: &Self::Context) -> Result<usize, EngineError>;

    fn segment_text(&self, context: &Self::Context, index: usize) -> Result<String, EngineError>;

    /// Segment start in centiseconds.
    fn segment_start(&self, context: &Self::Context, index: usize) -> Result<i64, EngineError>;

    /// Segment end in centiseconds.
    fn segment_end(&self, context: &Self::Context, index: usize) -> Result<i64, EngineError>;

    /// Irreversibly tears the context down.
    fn release_context(&self, context: Self::Context) {
        drop(context);
    }
}
