use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback)>>,
    sleepers: Mutex<()>,
    wake: Condvar,
}

/// Cooperative cancellation signal shared by every stage of a pipeline
/// (and, one level up, by a session).
///
/// Blocking primitives register a wake-up callback with
/// [`CancellationToken::on_cancel`] so a cancel request unblocks them
/// without polling.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                callbacks: Mutex::new(Vec::new()),
                sleepers: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Set the signal and run every registered callback once.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let _sleepers = self.inner.sleepers.lock();
            self.inner.wake.notify_all();
        }
        let callbacks: Vec<Callback> = self
            .inner
            .callbacks
            .lock()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Run `f` when the token is cancelled (immediately if it already is).
    /// The callback is unregistered when the returned guard drops.
    pub fn on_cancel(&self, f: impl Fn() + Send + Sync + 'static) -> CancelGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(f);
        self.inner.callbacks.lock().push((id, callback.clone()));
        if self.is_cancelled() {
            callback();
        }
        CancelGuard {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// A new token that is cancelled together with this one (but not the
    /// other way round). Keep the guard alive as long as the child is used.
    pub fn child(&self) -> (CancellationToken, CancelGuard) {
        let child = CancellationToken::new();
        let weak = Arc::downgrade(&child.inner);
        let guard = self.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                CancellationToken { inner }.cancel();
            }
        });
        (child, guard)
    }

    /// Sleep for up to `timeout`, returning early on cancellation.
    /// Returns whether the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut sleepers = self.inner.sleepers.lock();
        if self.is_cancelled() {
            return true;
        }
        self.inner.wake.wait_for(&mut sleepers, timeout);
        self.is_cancelled()
    }
}

/// Keeps a cancellation callback registered.
#[must_use = "the callback is removed when the guard is dropped"]
pub struct CancelGuard {
    inner: Weak<Inner>,
    id: u64,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.callbacks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
