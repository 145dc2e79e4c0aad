use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use super::handle::{Lifecycle, ResourceHandle};
use super::types::{CreateOptions, HandleId, HandleInfo, RunOptions, Segment, Transcript};
use crate::config::{
    LoadSettings, RecognitionSettings, CENTISECONDS_TO_MS, DEFAULT_LANGUAGE, ENGINE_SAMPLE_RATE,
};
use crate::engine::{Engine, RunParams};
use crate::error::{Result, SessionError};

/// Issues handle tokens and mediates every operation on the handles behind them.
///
/// The manager spawns no threads. Each operation runs on the caller's thread
/// and blocks for as long as it holds a handle's lock; callers that cannot
/// block should offload (see [`crate::commands::Addon::call_offloaded`]).
pub struct SessionManager<E: Engine> {
    engine: Arc<E>,
    settings: RecognitionSettings,
    handles: DashMap<HandleId, Arc<ResourceHandle<E>>>,
}

impl<E: Engine> SessionManager<E> {
    pub fn new(engine: E) -> Self {
        Self::with_settings(engine, RecognitionSettings::default())
    }

    pub fn with_settings(engine: E, settings: RecognitionSettings) -> Self {
        Self {
            engine: Arc::new(engine),
            settings,
            handles: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn settings(&self) -> &RecognitionSettings {
        &self.settings
    }

    /// Number of handle tokens that still resolve, released or not.
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Loads a model and returns a token for the new live handle.
    ///
    /// Nothing is registered if loading fails.
    pub fn create(&self, model_source: &str, options: &CreateOptions) -> Result<HandleId> {
        if model_source.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "model source must not be empty".to_string(),
            ));
        }

        let load = LoadSettings {
            use_acceleration: options.use_acceleration,
            ..LoadSettings::default()
        };

        log::info!(
            "Loading {} model from {} (acceleration: {})",
            self.engine.name(),
            model_source,
            load.use_acceleration
        );

        let context = self.engine.load(model_source, &load).map_err(|e| {
            log::error!("Failed to load model {}: {}", model_source, e);
            SessionError::load(model_source, e)
        })?;

        let id = HandleId::new();
        let handle = ResourceHandle::new(self.engine.clone(), model_source, context);
        self.handles.insert(id, Arc::new(handle));

        log::info!("Model {} loaded as handle {}", model_source, id);
        Ok(id)
    }

    /// Runs one recognition pass over `samples` on the handle's model.
    ///
    /// Holds the handle's lock from the liveness check through the last
    /// segment read, so concurrent runs on one handle are serialized.
    pub fn run(&self, id: &HandleId, samples: &[f32], options: &RunOptions) -> Result<Transcript> {
        let handle = self.lookup(id)?;
        let mut guard = handle.acquire();
        let context = guard
            .context_mut()
            .ok_or_else(|| SessionError::UseAfterFree(id.to_string()))?;

        if samples.is_empty() {
            log::debug!("Handle {}: empty sample buffer, nothing to transcribe", id);
            return Ok(Transcript::default());
        }

        let language = if options.language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            options.language.as_str()
        };
        let params = RunParams {
            settings: &self.settings,
            language,
            initial_prompt: &options.initial_prompt,
        };

        let started = Instant::now();
        self.engine
            .run_full(context, &params, samples)
            .map_err(|e| {
                log::warn!("Handle {}: recognition failed: {}", id, e);
                SessionError::RecognitionError(e.to_string())
            })?;

        let transcript = read_segments(&*self.engine, context)?;

        log::debug!(
            "Handle {}: transcribed {:.1}s of audio into {} segments in {}ms",
            id,
            samples.len() as f64 / ENGINE_SAMPLE_RATE as f64,
            transcript.segments.len(),
            started.elapsed().as_millis()
        );
        Ok(transcript)
    }

    /// Releases the handle's model. Releasing an already released handle is a no-op.
    pub fn release(&self, id: &HandleId) -> Result<()> {
        let handle = self.lookup(id)?;
        if !handle.teardown() {
            log::debug!("Handle {} already released", id);
        }
        Ok(())
    }

    pub fn inspect(&self, id: &HandleId) -> Result<HandleInfo> {
        let handle = self.lookup(id)?;
        let guard = handle.acquire();
        Ok(HandleInfo {
            loaded: guard.lifecycle() == Lifecycle::Live,
            source: handle.source().to_string(),
        })
    }

    /// Drops the token and tears its handle down. This is the path taken when
    /// the caller's reference is finalized; it may race with [`release`] and
    /// with a run in progress, in which case it waits for the lock.
    ///
    /// Returns false if the token was not registered.
    ///
    /// [`release`]: SessionManager::release
    pub fn dispose(&self, id: &HandleId) -> bool {
        match self.handles.remove(id) {
            Some((_, handle)) => {
                handle.teardown();
                log::debug!("Handle {} disposed", id);
                true
            }
            None => false,
        }
    }

    /// Resolves a token to its handle. The registry shard lock is released
    /// before the caller takes the handle's own lock.
    fn lookup(&self, id: &HandleId) -> Result<Arc<ResourceHandle<E>>> {
        self.handles
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::InvalidHandle(format!("no model handle {}", id)))
    }
}

fn read_segments<E: Engine>(engine: &E, context: &E::Context) -> Result<Transcript> {
    let count = engine.segment_count(context)?;
    let mut transcript = Transcript {
        segments: Vec::with_capacity(count),
        text: String::new(),
    };

    for i in 0..count {
        let text = engine.segment_text(context, i)?;
        let t0 = engine.segment_start(context, i)?;
        let t1 = engine.segment_end(context, i)?;

        transcript.text.push_str(&text);
        transcript.segments.push(Segment {
            text,
            from: t0.saturating_mul(CENTISECONDS_TO_MS),
            to: t1.saturating_mul(CENTISECONDS_TO_MS),
        });
    }

    Ok(transcript)
}

/// A handle token tied to its manager that is disposed when dropped.
pub struct OwnedHandle<E: Engine> {
    manager: Arc<SessionManager<E>>,
    id: HandleId,
}

impl<E: Engine> OwnedHandle<E> {
    pub fn create(
        manager: &Arc<SessionManager<E>>,
        model_source: &str,
        options: &CreateOptions,
    ) -> Result<Self> {
        let id = manager.create(model_source, options)?;
        Ok(Self {
            manager: Arc::clone(manager),
            id,
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn run(&self, samples: &[f32], options: &RunOptions) -> Result<Transcript> {
        self.manager.run(&self.id, samples, options)
    }

    pub fn release(&self) -> Result<()> {
        self.manager.release(&self.id)
    }

    pub fn inspect(&self) -> Result<HandleInfo> {
        self.manager.inspect(&self.id)
    }
}

impl<E: Engine> Drop for OwnedHandle<E> {
    fn drop(&mut self) {
        self.manager.dispose(&self.id);
    }
}
