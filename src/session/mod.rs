//! Model handles and the manager that mediates access to them.
//!
//! - `handle`: one engine context behind a mutex, with idempotent teardown
//! - `manager`: create / run / release / inspect over opaque handle tokens
//! - `types`: options, tokens and results exchanged with callers

pub mod handle;
pub mod manager;
pub mod types;

pub use handle::{HandleGuard, Lifecycle, ResourceHandle};
pub use manager::{OwnedHandle, SessionManager};
pub use types::{CreateOptions, HandleId, HandleInfo, RunOptions, Segment, Transcript};
