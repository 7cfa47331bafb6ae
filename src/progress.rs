// src/progress.rs

//! Progress reporting for pack switches
//!
//! The switch engine announces each phase, the number of components the
//! install phase walks, each component it actually installs, and the final
//! outcome. Every hook defaults to a no-op so a reporter only overrides
//! what it shows.
//!
//! - `SilentProgress`: reports nothing
//! - `LogProgress`: phase changes and tenths of the install phase to tracing
//! - `CallbackProgress`: `ProgressEvent`s to a closure
//!
//! The CLI's progress bar lives in `commands::progress`.

use crate::transaction::SwitchState;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Receives switch progress; shared with the front end, hence `Send + Sync`
pub trait ProgressTracker: Send + Sync {
    /// The engine entered `state`
    fn phase(&self, _state: SwitchState) {}

    /// The current phase will walk `total` components
    fn expect(&self, _total: u64) {}

    /// One component of the current phase is done (installed or skipped)
    fn advance(&self) {}

    /// The installer is about to materialize `component`
    fn installing(&self, _component: &str) {}

    /// The switch committed
    fn finished(&self, _message: &str) {}

    /// The switch failed; `message` is the error the caller receives
    fn failed(&self, _message: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl SilentProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressTracker for SilentProgress {}

/// Counts completed components against the expected total
#[derive(Debug, Default)]
struct Counter {
    done: AtomicU64,
    total: AtomicU64,
}

impl Counter {
    fn reset(&self, total: u64) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Bump the count; returns (before, after, total)
    fn bump(&self) -> (u64, u64, u64) {
        let before = self.done.fetch_add(1, Ordering::Relaxed);
        (before, before + 1, self.total.load(Ordering::Relaxed))
    }
}

/// Writes progress to tracing at info level
#[derive(Debug)]
pub struct LogProgress {
    pack: String,
    counter: Counter,
}

impl LogProgress {
    pub fn new(pack: impl Into<String>) -> Self {
        Self {
            pack: pack.into(),
            counter: Counter::default(),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn phase(&self, state: SwitchState) {
        self.counter.reset(0);
        info!("[{}] {}", self.pack, state);
    }

    fn expect(&self, total: u64) {
        self.counter.reset(total);
    }

    fn advance(&self) {
        let (before, after, total) = self.counter.bump();
        let step = (total / 10).max(1);
        if total > 0 && after / step > before / step {
            info!("[{}] {}/{} components", self.pack, after, total);
        }
    }

    fn installing(&self, component: &str) {
        info!("[{}] installing {}", self.pack, component);
    }

    fn finished(&self, message: &str) {
        info!("[{}] {}", self.pack, message);
    }

    fn failed(&self, message: &str) {
        info!("[{}] failed: {}", self.pack, message);
    }
}

/// What `CallbackProgress` hands to its closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(SwitchState),
    Advanced { done: u64, total: u64 },
    Installing(String),
    Finished(String),
    Failed(String),
}

/// Forwards every hook as a `ProgressEvent`
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    counter: Counter,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            counter: Counter::default(),
        }
    }
}

impl<F> ProgressTracker for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn phase(&self, state: SwitchState) {
        self.counter.reset(0);
        (self.callback)(ProgressEvent::Phase(state));
    }

    fn expect(&self, total: u64) {
        self.counter.reset(total);
    }

    fn advance(&self) {
        let (_, done, total) = self.counter.bump();
        (self.callback)(ProgressEvent::Advanced { done, total });
    }

    fn installing(&self, component: &str) {
        (self.callback)(ProgressEvent::Installing(component.to_string()));
    }

    fn finished(&self, message: &str) {
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }

    fn failed(&self, message: &str) {
        (self.callback)(ProgressEvent::Failed(message.to_string()));
    }
}
