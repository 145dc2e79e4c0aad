//! Instrumented engine for tests.
//!
//! Produces a scripted list of segments on every run and records each run
//! and segment read in an event log, so tests can check that passes on one
//! context never interleave.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{Engine, EngineError, RunParams};
use crate::config::LoadSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    RunStarted(u64),
    RunFinished(u64),
    SegmentRead(u64),
}

/// What the stub saw on the most recent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRun {
    pub language: String,
    pub initial_prompt: String,
    pub samples: usize,
    pub threads: u16,
}

#[derive(Debug)]
pub struct StubContext {
    pub source: String,
    pub settings: LoadSettings,
    run_id: u64,
    segments: Vec<(String, i64, i64)>,
}

#[derive(Default)]
pub struct StubEngine {
    /// `(text, t0, t1)` in centiseconds, produced by every run.
    script: Mutex<Vec<(String, i64, i64)>>,
    fail_status: Mutex<Option<i32>>,
    run_delay: Mutex<Duration>,
    next_run: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    loads: AtomicUsize,
    runs: AtomicUsize,
    releases: AtomicUsize,
    events: Mutex<Vec<StubEvent>>,
    last_run: Mutex<Option<SeenRun>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments(segments: &[(&str, i64, i64)]) -> Self {
        let engine = Self::new();
        *engine.script.lock().unwrap() = segments
            .iter()
            .map(|(text, t0, t1)| (text.to_string(), *t0, *t1))
            .collect();
        engine
    }

    pub fn set_run_delay(&self, delay: Duration) {
        *self.run_delay.lock().unwrap() = delay;
    }

    pub fn fail_runs_with(&self, status: Option<i32>) {
        *self.fail_status.lock().unwrap() = status;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<StubEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last_run(&self) -> Option<SeenRun> {
        self.last_run.lock().unwrap().clone()
    }

    fn record(&self, event: StubEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Engine for StubEngine {
    type Context = StubContext;

    fn name(&self) -> &'static str {
        "stub"
    }

    fn load(&self, source: &str, settings: &LoadSettings) -> Result<StubContext, EngineError> {
        if !Path::new(source).is_file() {
            return Err(EngineError::Load {
                path: source.to_string(),
                reason: "model file not found".to_string(),
            });
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(StubContext {
            source: source.to_string(),
            settings: *settings,
            run_id: 0,
            segments: Vec::new(),
        })
    }

    fn run_full(
        &self,
        context: &mut StubContext,
        params: &RunParams<'_>,
        samples: &[f32],
    ) -> Result<(), EngineError> {
        let run_id = self.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.record(StubEvent::RunStarted(run_id));

        *self.last_run.lock().unwrap() = Some(SeenRun {
            language: params.language.to_string(),
            initial_prompt: params.initial_prompt.to_string(),
            samples: samples.len(),
            threads: params.settings.threads,
        });

        let delay = *self.run_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let failure = *self.fail_status.lock().unwrap();
        context.run_id = run_id;
        context.segments = match failure {
            Some(_) => Vec::new(),
            None => self.script.lock().unwrap().clone(),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(StubEvent::RunFinished(run_id));

        match failure {
            Some(status) => Err(EngineError::Run { status }),
            None => Ok(()),
        }
    }

    fn segment_count(&self, context: &StubContext) -> Result<usize, EngineError> {
        Ok(context.segments.len())
    }

    fn segment_text(&self, context: &StubContext, index: usize) -> Result<String, EngineError> {
        self.record(StubEvent::SegmentRead(context.run_id));
        let delay = *self.run_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay / 4);
        }
        context
            .segments
            .get(index)
            .map(|(text, _, _)| text.clone())
            .ok_or_else(|| EngineError::Segment {
                index,
                reason: "out of range".to_string(),
            })
    }

    fn segment_start(&self, context: &StubContext, index: usize) -> Result<i64, EngineError> {
        context
            .segments
            .get(index)
            .map(|(_, t0, _)| *t0)
            .ok_or_else(|| EngineError::Segment {
                index,
                reason: "out of range".to_string(),
            })
    }

    fn segment_end(&self, context: &StubContext, index: usize) -> Result<i64, EngineError> {
        context
            .segments
            .get(index)
            .map(|(_, _, t1)| *t1)
            .ok_or_else(|| EngineError::Segment {
                index,
                reason: "out of range".to_string(),
            })
    }

    fn release_context(&self, context: StubContext) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        drop(context);
    }
}

/// Checks that every segment read belongs to the run that most recently
/// finished, and that no run starts before the previous one finished.
pub fn assert_runs_not_interleaved(events: &[StubEvent]) {
    let mut current: Option<u64> = None;
    let mut running = false;
    for event in events {
        match event {
            StubEvent::RunStarted(id) => {
                assert!(!running, "run {} started while another was running", id);
                current = Some(*id);
                running = true;
            }
            StubEvent::RunFinished(id) => {
                assert_eq!(current, Some(*id), "run {} finished out of order", id);
                running = false;
            }
            StubEvent::SegmentRead(id) => {
                assert!(!running, "segment of run {} read during a run", id);
                assert_eq!(current, Some(*id), "segment read from stale run {}", id);
            }
        }
    }
}
