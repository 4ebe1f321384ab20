use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{ErrorKind, TagcacheResult};

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Deadline and cancellation state for a single cache call.
///
/// Every client operation takes a context. The deadline bounds how long a
/// connection may take to dial and how long the backend may take to answer;
/// a context that is already past its deadline or canceled fails the call
/// before any command is sent.
#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    canceled: Option<Arc<AtomicBool>>,
}

/// Cancels the [`Context`] it was created with, and every clone of it.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Marks the context as canceled. Commands already in flight finish.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }
}

impl Context {
    /// A context without deadline that is never canceled.
    pub fn background() -> Context {
        Context::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Context {
        Context::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Context {
        Context {
            deadline: Some(deadline),
            canceled: None,
        }
    }

    /// Returns a cancelable copy of this context together with its handle.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let canceled = Arc::new(AtomicBool::new(false));
        let ctx = Context {
            deadline: self.deadline,
            canceled: Some(Arc::clone(&canceled)),
        };
        (ctx, CancelHandle { canceled })
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left until the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true once the handle of this context was used.
    pub fn is_canceled(&self) -> bool {
        self.canceled
            .as_ref()
            .is_some_and(|canceled| canceled.load(Ordering::Acquire))
    }

    /// Fails if the context was canceled or its deadline passed.
    pub fn check(&self) -> TagcacheResult<()> {
        if self.is_canceled() {
            fail!((ErrorKind::Canceled, "context canceled"));
        }
        if self.remaining() == Some(Duration::ZERO) {
            fail!((ErrorKind::DeadlineExceeded, "context deadline exceeded"));
        }
        Ok(())
    }

    /// Clamps a configured timeout to the time left in this context. The
    /// result is never zero, socket timeouts reject that.
    pub(crate) fn clamp(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => timeout.min(remaining.max(MIN_TIMEOUT)),
            None => timeout,
        }
    }
}
