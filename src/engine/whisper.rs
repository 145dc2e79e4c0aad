//! whisper.cpp engine built on `whisper-rs`.
//!
//! `WhisperSession` owns the loaded context together with the decoding state
//! that holds the results of the last pass.

use std::path::Path;
use std::time::Instant;

use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use super::{Engine, EngineError, RunParams};
use crate::config::{LoadSettings, ENGINE_SAMPLE_RATE};

/// Loaded whisper model plus its decoding state.
pub struct WhisperSession {
    // Declared first so the state is dropped before the context.
    state: WhisperState,
    _context: WhisperContext,
    model_path: String,
}

impl Drop for WhisperSession {
    fn drop(&mut self) {
        log::debug!("Whisper context freed: {}", self.model_path);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WhisperEngine;

impl WhisperEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for WhisperEngine {
    type Context = WhisperSession;

    fn name(&self) -> &'static str {
        "whisper"
    }

    fn load(&self, source: &str, settings: &LoadSettings) -> Result<WhisperSession, EngineError> {
        let load_err = |reason: String| EngineError::Load {
            path: source.to_string(),
            reason,
        };

        if !Path::new(source).is_file() {
            return Err(load_err("model file not found".to_string()));
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu = settings.use_acceleration;
        params.flash_attn = settings.flash_attention;

        let started = Instant::now();
        let context = WhisperContext::new_with_params(source, params)
            .map_err(|e| load_err(e.to_string()))?;
        let state = context
            .create_state()
            .map_err(|e| load_err(format!("failed to create decoding state: {}", e)))?;

        log::info!(
            "Successfully loaded whisper model from: {} (gpu requested: {}, {:.1}s)",
            source,
            settings.use_acceleration,
            started.elapsed().as_secs_f64()
        );

        Ok(WhisperSession {
            state,
            _context: context,
            model_path: source.to_string(),
        })
    }

    fn run_full(
        &self,
        session: &mut WhisperSession,
        run: &RunParams<'_>,
        samples: &[f32],
    ) -> Result<(), EngineError> {
        let settings = run.settings;
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(i32::from(settings.threads));
        params.set_language(Some(run.language));
        if !run.initial_prompt.is_empty() {
            params.set_initial_prompt(run.initial_prompt);
        }
        params.set_print_progress(settings.print_progress);
        params.set_print_realtime(settings.print_realtime);
        params.set_print_timestamps(settings.print_timestamps);
        params.set_no_timestamps(settings.no_timestamps);
        params.set_single_segment(settings.single_segment);
        params.set_suppress_blank(settings.suppress_blank);
        params.set_suppress_non_speech_tokens(settings.suppress_non_speech);

        log::debug!(
            "Whisper transcribing {} samples ({:.1}s duration)",
            samples.len(),
            samples.len() as f64 / ENGINE_SAMPLE_RATE as f64
        );

        match session.state.full(params, samples) {
            Ok(0) => Ok(()),
            Ok(status) => Err(EngineError::Run { status }),
            Err(e) => Err(EngineError::Backend(e.to_string())),
        }
    }

    fn segment_count(&self, session: &WhisperSession) -> Result<usize, EngineError> {
        let count = session
            .state
            .full_n_segments()
            .map_err(|e| EngineError::Backend(e.to_string()))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn segment_text(&self, session: &WhisperSession, index: usize) -> Result<String, EngineError> {
        session
            .state
            .full_get_segment_text_lossy(segment_index(index)?)
            .map_err(|e| EngineError::Segment {
                index,
                reason: e.to_string(),
            })
    }

    fn segment_start(&self, session: &WhisperSession, index: usize) -> Result<i64, EngineError> {
        session
            .state
            .full_get_segment_t0(segment_index(index)?)
            .map_err(|e| EngineError::Segment {
                index,
                reason: e.to_string(),
            })
    }

    fn segment_end(&self, session: &WhisperSession, index: usize) -> Result<i64, EngineError> {
        session
            .state
            .full_get_segment_t1(segment_index(index)?)
            .map_err(|e| EngineError::Segment {
                index,
                reason: e.to_string(),
            })
    }
}

fn segment_index(index: usize) -> Result<i32, EngineError> {
    i32::try_from(index).map_err(|_| EngineError::Segment {
        index,
        reason: "index exceeds engine range".to_string(),
    })
}
