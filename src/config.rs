/// Sample rate the recognition engine expects, in Hz (mono f32 PCM).
pub const ENGINE_SAMPLE_RATE: u32 = 16_000;

/// Language used when a run does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Worker threads handed to the engine for its internal parallelism.
pub const DEFAULT_THREAD_COUNT: u16 = 4;

/// Engine timestamps are in centiseconds; segments are reported in milliseconds.
pub const CENTISECONDS_TO_MS: i64 = 10;

/// Settings applied when constructing an engine context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSettings {
    /// Ask the engine for hardware acceleration; it falls back to CPU on its own.
    pub use_acceleration: bool,
    /// Kept off for compatibility with older GPU backends.
    pub flash_attention: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            use_acceleration: true,
            flash_attention: false,
        }
    }
}

/// Fixed engine settings applied to every recognition pass.
///
/// Decoding is always greedy. The remaining flags control what the engine
/// prints and which segments it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub threads: u16,
    pub print_progress: bool,
    pub print_realtime: bool,
    pub print_timestamps: bool,
    /// Keep timestamps out of the segment text; numeric times are still reported.
    pub no_timestamps: bool,
    pub single_segment: bool,
    pub suppress_blank: bool,
    pub suppress_non_speech: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREAD_COUNT,
            print_progress: false,
            print_realtime: false,
            print_timestamps: false,
            no_timestamps: true,
            single_segment: false,
            suppress_blank: true,
            suppress_non_speech: true,
        }
    }
}
