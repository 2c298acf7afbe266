use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    notify: Notify,
}

/// Read side of an [`AbortController`].
///
/// Cloning is cheap; every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired. Returns immediately if it
    /// already has.
    pub async fn aborted(&self) {
        loop {
            // Register interest before checking the flag, otherwise an
            // abort landing in between would never wake us.
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

/// Owner of an [`AbortSignal`]; the only thing able to fire it.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fires the signal. Aborting twice is a no-op.
    pub fn abort(&self) {
        let state = &self.signal.state;
        if !state.aborted.swap(true, Ordering::AcqRel) {
            state.notify.notify_waiters();
        }
    }
}

/// Which of the two sources of an [`AnySignal`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortSource {
    Caller,
    Timer,
}

/// First-to-fire composition of an optional caller signal and a
/// per-attempt timer signal.
///
/// The combined signal counts as aborted as soon as either source is.
/// When both have fired the caller takes precedence.
#[derive(Debug, Clone)]
pub struct AnySignal {
    caller: Option<AbortSignal>,
    timer: AbortSignal,
}

impl AnySignal {
    pub fn new(caller: Option<AbortSignal>, timer: AbortSignal) -> Self {
        Self { caller, timer }
    }

    pub fn caller_aborted(&self) -> bool {
        self.caller.as_ref().map_or(false, AbortSignal::is_aborted)
    }

    pub fn timer_aborted(&self) -> bool {
        self.timer.is_aborted()
    }

    pub fn fired(&self) -> Option<AbortSource> {
        if self.caller_aborted() {
            Some(AbortSource::Caller)
        } else if self.timer_aborted() {
            Some(AbortSource::Timer)
        } else {
            None
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.fired().is_some()
    }

    /// Resolves with the source that fired first.
    pub async fn aborted(&self) -> AbortSource {
        match &self.caller {
            Some(caller) => tokio::select! {
                biased;
                _ = caller.aborted() => AbortSource::Caller,
                _ = self.timer.aborted() => AbortSource::Timer,
            },
            None => {
                self.timer.aborted().await;
                AbortSource::Timer
            }
        }
    }
}
