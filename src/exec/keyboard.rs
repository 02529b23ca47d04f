use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::cancel::CancellationToken;
use super::chain::InputPump;
use crate::terminal::Key;

/// Per-stage queue of raw key presses. Filled from the terminal while the
/// pipeline runs, whether or not the stage ever looks at it.
#[derive(Debug, Default)]
pub struct KeyboardBuffer {
    keys: Mutex<VecDeque<Key>>,
}

impl KeyboardBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, keys: &[Key]) {
        self.keys.lock().extend(keys.iter().copied());
    }

    pub fn pop(&self) -> Option<Key> {
        self.keys.lock().pop_front()
    }

    pub fn clear(&self) {
        self.keys.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A stage's view of its keyboard buffer, able to pull fresh keys from the
/// terminal.
pub struct Keyboard<'a> {
    pub(crate) buffer: &'a KeyboardBuffer,
    pub(crate) pump: Option<&'a InputPump>,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) poll: Duration,
}

impl Keyboard<'_> {
    /// Next key if one is pending. Never blocks.
    pub fn try_read(&self) -> Option<Key> {
        if let Some(key) = self.buffer.pop() {
            return Some(key);
        }
        if let Some(pump) = self.pump {
            pump.pump();
        }
        self.buffer.pop()
    }

    /// Block for the next key; `None` on cancellation.
    pub fn read(&self) -> Option<Key> {
        loop {
            if let Some(key) = self.try_read() {
                return Some(key);
            }
            if self.pump.is_none() || self.cancel.wait_timeout(self.poll) {
                return None;
            }
        }
    }

    /// Collect typed characters up to Enter.
    pub fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        loop {
            match self.read()? {
                Key::Char('\n') | Key::Char('\r') => return Some(line),
                Key::Char(c) => line.push(c),
                _ => {}
            }
        }
    }

    /// Forget keys typed so far.
    pub fn flush(&self) {
        if let Some(pump) = self.pump {
            pump.pump();
        }
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_fifo() {
        let buffer = KeyboardBuffer::new();
        buffer.push(&[Key::Char('a'), Key::Up]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pop(), Some(Key::Char('a')));
        assert_eq!(buffer.pop(), Some(Key::Up));
        assert!(buffer.is_empty());
    }

    #[test]
    fn line_from_buffered_keys() {
        let buffer = KeyboardBuffer::new();
        buffer.push(&[Key::Char('h'), Key::Left, Key::Char('i'), Key::Char('\r')]);
        let cancel = CancellationToken::new();
        let keyboard = Keyboard {
            buffer: &buffer,
            pump: None,
            cancel: &cancel,
            poll: Duration::from_millis(1),
        };
        assert_eq!(keyboard.read_line().as_deref(), Some("hi"));
        assert_eq!(keyboard.read(), None);
    }
}
