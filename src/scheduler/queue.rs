//! Coalescing pass queue.
//!
//! One pending slot per pass kind. Triggering a kind that is already
//! pending is a no-op, so a burst of triggers collapses into a single
//! follow-up pass. A trigger that arrives while a pass of that kind is
//! running queues exactly one more run.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Apply,
    Binding,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Apply => "apply",
            PassKind::Binding => "binding",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Pending {
    apply: bool,
    binding: bool,
    closed: bool,
}

impl Pending {
    fn slot(&mut self, kind: PassKind) -> &mut bool {
        match kind {
            PassKind::Apply => &mut self.apply,
            PassKind::Binding => &mut self.binding,
        }
    }

    /// Apply drains before binding.
    fn take(&mut self) -> Option<PassKind> {
        [PassKind::Apply, PassKind::Binding]
            .into_iter()
            .find(|kind| std::mem::take(self.slot(*kind)))
    }
}

#[derive(Debug, Default)]
struct Inner {
    pending: Mutex<Pending>,
    notify: Notify,
}

/// Cloneable handle shared by every trigger source and the executor.
#[derive(Debug, Clone, Default)]
pub struct PassQueue {
    inner: Arc<Inner>,
}

impl PassQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // the guarded data is plain flags; a poisoned lock is still usable
        self.inner.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request a pass. Never blocks. Returns false if a pass of this kind
    /// was already pending or the queue is closed.
    pub fn trigger(&self, kind: PassKind) -> bool {
        let queued = {
            let mut pending = self.lock();
            if pending.closed {
                return false;
            }
            !std::mem::replace(pending.slot(kind), true)
        };

        if queued {
            tracing::debug!(kind = %kind, "Pass queued");
            self.inner.notify.notify_one();
        } else {
            tracing::debug!(kind = %kind, "Pass already pending, coalesced");
        }
        queued
    }

    /// Wait for the next pending pass. `None` once the queue is closed.
    pub async fn next(&self) -> Option<PassKind> {
        loop {
            {
                let mut pending = self.lock();
                if let Some(kind) = pending.take() {
                    return Some(kind);
                }
                if pending.closed {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Stop accepting triggers and drop anything pending.
    pub fn close(&self) {
        {
            let mut pending = self.lock();
            *pending = Pending {
                closed: true,
                ..Pending::default()
            };
        }
        self.inner.notify.notify_one();
    }

    pub fn is_pending(&self, kind: PassKind) -> bool {
        *self.lock().slot(kind)
    }
}
