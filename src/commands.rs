//! Host-facing command table.
//!
//! A host runtime hands over loosely typed arguments (JSON values here) and
//! gets JSON back. [`Addon::register`] is the one-time registration step that
//! wires the four operations into a name table; every call validates its
//! arguments before the engine is touched and resolves handle tokens through
//! the session manager.
//!
//! ```text
//! create({ model, useAcceleration? })            -> "<handle>"
//! run("<handle>", { audio, language?, initialPrompt? }) -> { segments, text }
//! release("<handle>")                             -> null
//! inspect("<handle>")                             -> { loaded, source }
//! dispose("<handle>")                             -> true | false
//! ```
//!
//! `dispose` is the host finalizer hook: it releases the handle if needed and
//! forgets the token, returning whether the token was still registered.
//! The legacy command names (`init`, `transcribe`, `free`, `getInfo`) and
//! option keys (`gpu`, `prompt`) are accepted as aliases.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::engine::Engine;
use crate::error::{Result, SessionError};
use crate::session::{CreateOptions, HandleId, RunOptions, SessionManager};

type Command<E> = fn(&SessionManager<E>, &[Value]) -> Result<Value>;

pub struct Addon<E: Engine> {
    manager: Arc<SessionManager<E>>,
    exports: HashMap<&'static str, Command<E>>,
}

impl<E: Engine> Addon<E> {
    pub fn register(manager: Arc<SessionManager<E>>) -> Self {
        let mut exports: HashMap<&'static str, Command<E>> = HashMap::new();
        for (name, alias, command) in [
            ("create", "init", create_model::<E> as Command<E>),
            ("run", "transcribe", run_model::<E> as Command<E>),
            ("release", "free", release_model::<E> as Command<E>),
            ("inspect", "getInfo", inspect_model::<E> as Command<E>),
        ] {
            exports.insert(name, command);
            exports.insert(alias, command);
        }
        exports.insert("dispose", dispose_model::<E> as Command<E>);

        log::debug!(
            "Registered {} commands for {} engine",
            exports.len(),
            manager.engine().name()
        );
        Self { manager, exports }
    }

    pub fn manager(&self) -> &Arc<SessionManager<E>> {
        &self.manager
    }

    /// Registered command names, sorted.
    pub fn exports(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.exports.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Invokes a command on the calling thread. `run` blocks until the engine returns.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let command = self
            .exports
            .get(name)
            .ok_or_else(|| SessionError::InvalidArgument(format!("unknown command '{}'", name)))?;
        command(&self.manager, args)
    }

    /// Invokes a command on tokio's blocking pool, for async hosts that must
    /// not stall their executor on a long recognition pass.
    ///
    /// If the runtime is shutting down and the task never starts, `release`,
    /// `dispose` and `inspect` run inline instead, so a handle is never left
    /// loaded. A cancelled `create` reports `LoadError` and a cancelled `run`
    /// reports `RecognitionError`.
    pub async fn call_offloaded(self: Arc<Self>, name: String, args: Vec<Value>) -> Result<Value> {
        let command = name.clone();
        let inline_args = runs_inline_on_cancel(&command).then(|| args.clone());
        let source = model_source(&command, &args);

        let addon = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || addon.call(&name, &args)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => match inline_args {
                Some(args) => {
                    log::warn!("Blocking pool refused '{}' ({}), running it inline", command, e);
                    self.call(&command, &args)
                }
                None => Err(cancelled(&command, source, e.to_string())),
            },
        }
    }
}

/// Lock-only commands that must still take effect when the blocking pool is gone.
fn runs_inline_on_cancel(command: &str) -> bool {
    matches!(command, "release" | "free" | "dispose" | "inspect" | "getInfo")
}

fn model_source(command: &str, args: &[Value]) -> Option<String> {
    if !matches!(command, "create" | "init") {
        return None;
    }
    args.first()
        .and_then(|options| options.get("model"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn cancelled(command: &str, source: Option<String>, reason: String) -> SessionError {
    let reason = format!("blocking task cancelled: {}", reason);
    match command {
        "create" | "init" => SessionError::LoadError {
            source_id: source.unwrap_or_default(),
            reason,
        },
        "run" | "transcribe" => SessionError::RecognitionError(reason),
        _ => SessionError::InvalidArgument(format!("'{}' was not executed: {}", command, reason)),
    }
}

fn options_arg<'a>(args: &'a [Value], index: usize, expected: &str) -> Result<&'a Map<String, Value>> {
    args.get(index)
        .and_then(Value::as_object)
        .ok_or_else(|| SessionError::InvalidArgument(format!("Expected {}", expected)))
}

fn handle_arg(args: &[Value], index: usize) -> Result<HandleId> {
    match args.get(index) {
        Some(Value::String(token)) => token.parse(),
        Some(other) => Err(SessionError::InvalidHandle(format!(
            "expected handle token, got {}",
            value_type(other)
        ))),
        None => Err(SessionError::InvalidHandle("missing handle argument".to_string())),
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn optional_string(options: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| options.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn create_model<E: Engine>(manager: &SessionManager<E>, args: &[Value]) -> Result<Value> {
    let options = options_arg(args, 0, "options object with 'model' path")?;

    let model = options
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| SessionError::InvalidArgument("Missing 'model' path in options".to_string()))?;

    let mut create = CreateOptions::default();
    for key in ["useAcceleration", "gpu"] {
        if let Some(value) = options.get(key) {
            create.use_acceleration = value.as_bool().ok_or_else(|| {
                SessionError::InvalidArgument(format!(
                    "'{}' must be a boolean, got {}",
                    key,
                    value_type(value)
                ))
            })?;
            break;
        }
    }

    let id = manager.create(model, &create)?;
    Ok(Value::String(id.to_string()))
}

fn run_model<E: Engine>(manager: &SessionManager<E>, args: &[Value]) -> Result<Value> {
    if args.len() < 2 {
        return Err(SessionError::InvalidArgument("Expected (handle, options)".to_string()));
    }
    let options = options_arg(args, 1, "(handle, options)")?;
    let id = handle_arg(args, 0)?;

    let audio = options
        .get("audio")
        .and_then(Value::as_array)
        .ok_or_else(|| SessionError::InvalidArgument("Missing 'audio' sample array in options".to_string()))?;
    let samples = audio
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            sample.as_f64().map(|s| s as f32).ok_or_else(|| {
                SessionError::InvalidArgument(format!(
                    "audio[{}] must be a number, got {}",
                    i,
                    value_type(sample)
                ))
            })
        })
        .collect::<Result<Vec<f32>>>()?;

    // Wrongly typed optional keys fall back to their defaults.
    let mut run = RunOptions::default();
    if let Some(language) = optional_string(options, &["language"]) {
        run.language = language;
    }
    if let Some(prompt) = optional_string(options, &["initialPrompt", "prompt"]) {
        run.initial_prompt = prompt;
    }

    let transcript = manager.run(&id, &samples, &run)?;
    serde_json::to_value(transcript)
        .map_err(|e| SessionError::RecognitionError(format!("failed to encode result: {}", e)))
}

fn release_model<E: Engine>(manager: &SessionManager<E>, args: &[Value]) -> Result<Value> {
    let id = handle_arg(args, 0)?;
    manager.release(&id)?;
    Ok(Value::Null)
}

fn dispose_model<E: Engine>(manager: &SessionManager<E>, args: &[Value]) -> Result<Value> {
    let id = handle_arg(args, 0)?;
    Ok(Value::Bool(manager.dispose(&id)))
}

fn inspect_model<E: Engine>(manager: &SessionManager<E>, args: &[Value]) -> Result<Value> {
    let id = handle_arg(args, 0)?;
    let info = manager.inspect(&id)?;
    Ok(json!({ "loaded": info.loaded, "source": info.source }))
}

#[cfg(feature = "whisper")]
mod global {
    use super::*;
    use crate::engine::WhisperEngine;
    use once_cell::sync::OnceCell;

    static WHISPER_ADDON: OnceCell<Arc<Addon<WhisperEngine>>> = OnceCell::new();

    /// Process-wide whisper command table, registered on first use and kept
    /// until the process exits.
    pub fn whisper_addon() -> Arc<Addon<WhisperEngine>> {
        WHISPER_ADDON
            .get_or_init(|| {
                log::info!("Registering whisper session commands");
                Arc::new(Addon::register(Arc::new(SessionManager::new(
                    WhisperEngine::new(),
                ))))
            })
            .clone()
    }
}

#[cfg(feature = "whisper")]
pub use global::whisper_addon;
