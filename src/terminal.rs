//! The terminal boundary: what the engine needs from a console, a network
//! terminal or a test double. Protocol bytes never cross this trait.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::exec::CancellationToken;

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character; Enter arrives as `'\n'` or `'\r'`.
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

/// Terminal colors the engine asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    #[default]
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    /// ANSI SGR foreground code.
    pub fn ansi_code(&self) -> u8 {
        match self {
            Color::Black => 30,
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
            Color::Magenta => 35,
            Color::Cyan => 36,
            Color::White => 37,
        }
    }
}

/// Result of a blocking line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A completed line, without its terminator.
    Line(String),
    /// Up or Down was pressed; the partial line is discarded.
    Recall(Key),
    /// The terminal went away or the read was cancelled.
    Closed,
}

/// A terminal endpoint attached to one session.
///
/// Implementations handle the line editor (echo, cursor movement) and the
/// transport. Writes receive text whose line breaks already use
/// [`Terminal::line_termination`].
pub trait Terminal: Send {
    fn terminal_type(&self) -> &str {
        "dumb"
    }

    fn line_termination(&self) -> &str {
        "\r\n"
    }

    fn encoding(&self) -> &str {
        "utf-8"
    }

    fn window_width(&self) -> Option<u16> {
        None
    }

    fn window_height(&self) -> Option<u16> {
        None
    }

    /// Keys received since the last call. Never blocks.
    fn read_keys(&mut self) -> io::Result<Vec<Key>>;

    /// Block until a full line is entered, starting from `initial` as the
    /// editable text. Implementations should return [`LineEvent::Closed`]
    /// once `cancel` is set.
    fn read_line(&mut self, initial: &str, cancel: &CancellationToken) -> io::Result<LineEvent>;

    /// Like [`Terminal::read_line`] but without echoing what is typed.
    fn read_secret(&mut self, cancel: &CancellationToken) -> io::Result<LineEvent> {
        self.read_line("", cancel)
    }

    /// Drop any keys typed ahead.
    fn flush_input(&mut self) -> io::Result<()> {
        self.read_keys().map(|_| ())
    }

    fn write(&mut self, text: &str) -> io::Result<()>;

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let line = format!("{text}{}", self.line_termination());
        self.write(&line)
    }

    fn clear_screen(&mut self) -> io::Result<()>;

    /// Switch the foreground color; `None` restores the default.
    fn set_color(&mut self, color: Option<Color>) -> io::Result<()>;

    /// Called before a pipeline starts producing output.
    fn begin_output(&mut self) {}

    /// Called after a pipeline has written everything.
    fn end_output(&mut self) {}

    /// Receives the handle used to report a cancel request (Ctrl-C).
    fn attach_interrupt(&mut self, _interrupt: Interrupt) {}
}

/// A terminal shared by the session loop and the running pipeline.
pub type SharedTerminal = Arc<Mutex<Box<dyn Terminal>>>;

pub fn shared(terminal: Box<dyn Terminal>) -> SharedTerminal {
    Arc::new(Mutex::new(terminal))
}

/// Cancel-request handle given to a terminal. Triggering it cancels the
/// pipeline that is currently running in the session, if any.
#[derive(Clone, Default)]
pub struct Interrupt {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns whether a pipeline was running.
    pub fn trigger(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                log::info!("cancel requested by terminal");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn arm(&self, token: CancellationToken) {
        *self.current.lock() = Some(token);
    }

    pub(crate) fn disarm(&self) {
        *self.current.lock() = None;
    }
}

/// Normalize `\n` line breaks in `text` to `termination`.
pub fn with_line_termination(text: &str, termination: &str) -> String {
    if termination == "\n" {
        return text.replace('\r', "");
    }
    text.replace('\r', "").replace('\n', termination)
}
