//! Load a whisper model once and transcribe raw PCM files with it.
//!
//! Input files are 16 kHz mono f32 little-endian PCM, e.g. produced by
//! `ffmpeg -i in.wav -ar 16000 -ac 1 -f f32le out.pcm`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};

use whisper_session::config::DEFAULT_LANGUAGE;
use whisper_session::engine::WhisperEngine;
use whisper_session::{CreateOptions, OwnedHandle, RunOptions, SessionManager};

#[derive(Debug, Parser)]
#[command(name = "whisper-session", version, about)]
struct Cli {
    /// Path to a ggml whisper model
    #[arg(short, long)]
    model: PathBuf,

    /// Raw PCM files to transcribe, in order
    #[arg(required = true)]
    audio: Vec<PathBuf>,

    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Initial prompt biasing recognition toward expected vocabulary
    #[arg(short, long)]
    prompt: Option<String>,

    /// Do not request GPU acceleration
    #[arg(long)]
    no_gpu: bool,

    /// Print each transcript as a JSON line instead of plain text
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let model = cli
        .model
        .to_str()
        .context("model path is not valid UTF-8")?;

    let manager = Arc::new(SessionManager::new(WhisperEngine::new()));
    let handle = OwnedHandle::create(
        &manager,
        model,
        &CreateOptions {
            use_acceleration: !cli.no_gpu,
        },
    )
    .with_context(|| format!("loading {}", cli.model.display()))?;

    let options = RunOptions::default()
        .language(cli.language.clone())
        .initial_prompt(cli.prompt.clone().unwrap_or_default());

    for path in &cli.audio {
        let samples = read_pcm_f32le(path)?;
        log::info!("{}: {} samples", path.display(), samples.len());

        let transcript = handle
            .run(&samples, &options)
            .with_context(|| format!("transcribing {}", path.display()))?;

        if cli.json {
            let line = serde_json::json!({
                "file": path.display().to_string(),
                "segments": transcript.segments,
                "text": transcript.text,
            });
            println!("{}", line);
        } else {
            for segment in &transcript.segments {
                println!(
                    "[{} --> {}] {}",
                    format_ms(segment.from),
                    format_ms(segment.to),
                    segment.text.trim()
                );
            }
        }
    }

    handle.release()?;
    Ok(())
}

fn read_pcm_f32le(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!(
            "{} is not f32 PCM: {} bytes is not a multiple of 4",
            path.display(),
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// `HH:MM:SS.mmm`
fn format_ms(ms: i64) -> String {
    let ms = ms.max(0);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}
