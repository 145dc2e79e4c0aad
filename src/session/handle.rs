//! A single engine context guarded against concurrent and post-release use.
//!
//! The context lives in an `Option` behind the handle's mutex: `Some` means
//! live, `None` means released. Release takes the context out and hands it to
//! the engine for teardown while the lock is held, so no caller can observe a
//! released handle whose context still exists, or the reverse.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Live,
    Released,
}

/// Exclusive access to a handle's context for the lifetime of the guard.
pub struct HandleGuard<'a, C> {
    slot: MutexGuard<'a, Option<C>>,
}

impl<'a, C> HandleGuard<'a, C> {
    pub fn lifecycle(&self) -> Lifecycle {
        if self.slot.is_some() {
            Lifecycle::Live
        } else {
            Lifecycle::Released
        }
    }

    pub fn context(&self) -> Option<&C> {
        self.slot.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut C> {
        self.slot.as_mut()
    }
}

pub struct ResourceHandle<E: Engine> {
    engine: Arc<E>,
    source: String,
    slot: Mutex<Option<E::Context>>,
}

impl<E: Engine> ResourceHandle<E> {
    pub fn new(engine: Arc<E>, source: impl Into<String>, context: E::Context) -> Self {
        Self {
            engine,
            source: source.into(),
            slot: Mutex::new(Some(context)),
        }
    }

    /// Model path the context was built from. Immutable, so readable without the lock.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Blocks until the handle is free and returns a guard over its context.
    ///
    /// A lock poisoned by a panicking engine call is recovered: the handle's
    /// state is still one of live or released, and teardown must stay possible.
    pub fn acquire(&self) -> HandleGuard<'_, E::Context> {
        let slot = self.slot.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!(
                "Recovering poisoned lock on model handle for {}",
                self.source
            );
            poisoned.into_inner()
        });
        HandleGuard { slot }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.acquire().lifecycle()
    }

    /// Tears the context down if it is still live. Returns whether this call
    /// performed the teardown; later calls are no-ops.
    pub fn teardown(&self) -> bool {
        let mut guard = self.acquire();
        match guard.slot.take() {
            Some(context) => {
                self.engine.release_context(context);
                log::info!("Model unloaded: {}", self.source);
                true
            }
            None => false,
        }
    }
}

impl<E: Engine> Drop for ResourceHandle<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
