use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::cancel::{CancelGuard, CancellationToken};
use super::io::{CommandInput, CommandOutput};

/// Default link capacity in characters.
pub const DEFAULT_CAPACITY: usize = 10_240;

#[derive(Debug, Default)]
struct LinkState {
    queue: VecDeque<char>,
    /// The writing stage has finished.
    upstream_ended: bool,
    /// The reading stage has finished; further writes are dropped.
    downstream_ended: bool,
}

struct Shared {
    state: Mutex<LinkState>,
    readable: Condvar,
    writable: Condvar,
}

impl Shared {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

/// Bounded character FIFO between two adjacent stages.
///
/// The upstream stage sees it as [`CommandOutput`], the downstream stage as
/// [`CommandInput`]. Writers block while the queue is full; readers block
/// while it is empty. Both wake on pipeline cancellation.
pub struct Link {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    capacity: usize,
    window: (Option<u16>, Option<u16>),
    _cancel_wake: CancelGuard,
}

impl Link {
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LinkState::default()),
            readable: Condvar::new(),
            writable: Condvar::new(),
        });
        let weak = Arc::downgrade(&shared);
        let guard = cancel.on_cancel(move || {
            if let Some(shared) = weak.upgrade() {
                shared.wake_all();
            }
        });
        Self {
            shared,
            cancel,
            capacity: capacity.max(1),
            window: (None, None),
            _cancel_wake: guard,
        }
    }

    /// Report this window size to the writing stage.
    pub fn with_window(mut self, width: Option<u16>, height: Option<u16>) -> Self {
        self.window = (width, height);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Characters currently queued.
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the writing side finished.
    pub fn close_upstream(&self) {
        let mut state = self.shared.state.lock();
        state.upstream_ended = true;
        self.shared.readable.notify_all();
    }

    /// Mark the reading side finished; pending and future writes are dropped.
    pub fn close_downstream(&self) {
        let mut state = self.shared.state.lock();
        state.downstream_ended = true;
        state.queue.clear();
        self.shared.writable.notify_all();
    }
}

impl CommandOutput for Link {
    fn is_piped(&self) -> bool {
        true
    }

    fn window_width(&self) -> Option<u16> {
        self.window.0
    }

    fn window_height(&self) -> Option<u16> {
        self.window.1
    }

    fn write(&self, text: &str) -> io::Result<()> {
        let mut state = self.shared.state.lock();
        for c in text.chars() {
            while state.queue.len() >= self.capacity {
                if state.downstream_ended || self.cancel.is_cancelled() {
                    return Ok(());
                }
                self.shared.readable.notify_all();
                self.shared.writable.wait(&mut state);
            }
            if state.downstream_ended || self.cancel.is_cancelled() {
                return Ok(());
            }
            state.queue.push_back(c);
        }
        self.shared.readable.notify_all();
        Ok(())
    }

    /// A pipe cannot clear anything; downstream sees a line break instead.
    fn clear_screen(&self) -> io::Result<()> {
        self.new_line()
    }

    fn end_of_command(&self) -> io::Result<()> {
        self.close_upstream();
        Ok(())
    }
}

impl CommandInput for Link {
    fn is_piped(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        let state = self.shared.state.lock();
        self.cancel.is_cancelled() || (state.upstream_ended && state.queue.is_empty())
    }

    fn flush(&self) {
        let mut state = self.shared.state.lock();
        state.queue.clear();
        self.shared.writable.notify_all();
    }

    fn try_read(&self) -> Option<char> {
        let mut state = self.shared.state.lock();
        let c = state.queue.pop_front();
        if c.is_some() {
            self.shared.writable.notify_all();
        }
        c
    }

    fn read_char(&self) -> Option<char> {
        let mut state = self.shared.state.lock();
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(c) = state.queue.pop_front() {
                self.shared.writable.notify_all();
                return Some(c);
            }
            if state.upstream_ended {
                return None;
            }
            self.shared.readable.wait(&mut state);
        }
    }

    fn end_of_input(&self) {
        self.close_downstream();
    }
}
