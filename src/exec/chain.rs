//! The pipeline's own endpoints: the first stage's input, the last stage's
//! output, and the sink that receives all error text at the end.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::cancel::CancellationToken;
use super::encoding;
use super::io::{CommandInput, CommandOutput, ErrorOutput};
use super::keyboard::KeyboardBuffer;
use crate::error::ShellError;
use crate::parse::redirect::expand;
use crate::terminal::{Color, Key, SharedTerminal, with_line_termination};

/// An output redirect file, shared when output and error output are joined.
pub type SharedFile = Arc<Mutex<BufWriter<File>>>;

/// Pulls pending keys from the terminal and hands them to every stage's
/// keyboard buffer, and to the first stage's input when that reads from the
/// terminal.
pub struct InputPump {
    terminal: SharedTerminal,
    keyboards: Vec<Arc<KeyboardBuffer>>,
    text: Option<Arc<Mutex<VecDeque<char>>>>,
}

impl InputPump {
    pub fn new(
        terminal: SharedTerminal,
        keyboards: Vec<Arc<KeyboardBuffer>>,
        text: Option<Arc<Mutex<VecDeque<char>>>>,
    ) -> Self {
        Self {
            terminal,
            keyboards,
            text,
        }
    }

    /// Move whatever the terminal has buffered. Returns whether any key
    /// arrived.
    pub fn pump(&self) -> bool {
        // held across distribution so concurrent pumps keep key order
        let mut terminal = self.terminal.lock();
        let keys = match terminal.read_keys() {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("terminal key read failed: {e}");
                return false;
            }
        };
        if keys.is_empty() {
            return false;
        }
        for keyboard in &self.keyboards {
            keyboard.push(&keys);
        }
        if let Some(text) = &self.text {
            let mut queue = text.lock();
            for key in &keys {
                if let Key::Char(c) = key {
                    queue.push_back(if *c == '\r' { '\n' } else { *c });
                }
            }
        }
        true
    }
}

/// Input of the first stage.
pub enum ChainInput {
    /// Typed text from the terminal.
    Terminal {
        queue: Arc<Mutex<VecDeque<char>>>,
        pump: Arc<InputPump>,
        cancel: CancellationToken,
        poll: Duration,
    },
    /// Contents of an input redirect file, read up front.
    Redirected {
        queue: Mutex<VecDeque<char>>,
        cancel: CancellationToken,
    },
    /// The null device: always ended.
    Null,
}

impl ChainInput {
    pub fn redirected(text: &str, cancel: CancellationToken) -> Self {
        ChainInput::Redirected {
            queue: Mutex::new(text.chars().collect()),
            cancel,
        }
    }
}

impl CommandInput for ChainInput {
    fn is_piped(&self) -> bool {
        !matches!(self, ChainInput::Terminal { .. })
    }

    fn is_ended(&self) -> bool {
        match self {
            ChainInput::Terminal { cancel, .. } => cancel.is_cancelled(),
            ChainInput::Redirected { queue, cancel } => {
                cancel.is_cancelled() || queue.lock().is_empty()
            }
            ChainInput::Null => true,
        }
    }

    fn flush(&self) {
        match self {
            ChainInput::Terminal { queue, pump, .. } => {
                pump.pump();
                queue.lock().clear();
            }
            ChainInput::Redirected { queue, .. } => queue.lock().clear(),
            ChainInput::Null => {}
        }
    }

    fn try_read(&self) -> Option<char> {
        match self {
            ChainInput::Terminal { queue, pump, .. } => {
                if let Some(c) = queue.lock().pop_front() {
                    return Some(c);
                }
                pump.pump();
                queue.lock().pop_front()
            }
            ChainInput::Redirected { queue, .. } => queue.lock().pop_front(),
            ChainInput::Null => None,
        }
    }

    fn read_char(&self) -> Option<char> {
        match self {
            ChainInput::Terminal {
                queue,
                pump,
                cancel,
                poll,
            } => loop {
                if cancel.is_cancelled() {
                    return None;
                }
                if let Some(c) = queue.lock().pop_front() {
                    return Some(c);
                }
                if !pump.pump() && cancel.wait_timeout(*poll) {
                    return None;
                }
            },
            ChainInput::Redirected { queue, cancel } => {
                if cancel.is_cancelled() {
                    return None;
                }
                queue.lock().pop_front()
            }
            ChainInput::Null => None,
        }
    }
}

/// Read and decode an input redirect file.
pub fn load_input(path: &str) -> Result<String, ShellError> {
    let bytes = std::fs::read(expand(path)).map_err(|source| ShellError::InputUnreadable {
        path: path.to_string(),
        source,
    })?;
    encoding::decode(&bytes).ok_or_else(|| ShellError::InputUndecodable {
        path: path.to_string(),
    })
}

/// Open an output redirect file, truncating unless `append`.
pub fn open_output(path: &str, append: bool) -> Result<SharedFile, ShellError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(expand(path))
        .map_err(|source| ShellError::OutputUnwritable {
            path: path.to_string(),
            source,
        })?;
    log::debug!("opened redirect file {path} (append: {append})");
    Ok(Arc::new(Mutex::new(BufWriter::new(file))))
}

/// Where the pipeline's regular output (or its error text) goes.
#[derive(Clone)]
pub enum Sink {
    Terminal(SharedTerminal),
    File(SharedFile),
    Null,
}

impl Sink {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Sink::Terminal(_))
    }

    pub fn flush(&self) -> io::Result<()> {
        match self {
            Sink::File(file) => file.lock().flush(),
            _ => Ok(()),
        }
    }

    /// Write all error text, colored when it goes to the terminal.
    pub fn write_errors(&self, text: &str, color: Color) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        match self {
            Sink::Terminal(terminal) => {
                let mut terminal = terminal.lock();
                let text = with_line_termination(text, terminal.line_termination());
                terminal.set_color(Some(color))?;
                let written = terminal.write(&text);
                terminal.set_color(None)?;
                written
            }
            Sink::File(file) => file.lock().write_all(text.as_bytes()),
            Sink::Null => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct OutputState {
    wrote: bool,
    line_terminated: bool,
    cleared_last: bool,
}

/// Output of the last stage.
pub struct ChainOutput {
    sink: Sink,
    line_termination: String,
    window: (Option<u16>, Option<u16>),
    state: Mutex<OutputState>,
}

impl ChainOutput {
    pub fn new(sink: Sink) -> Self {
        let (line_termination, window) = match &sink {
            Sink::Terminal(terminal) => {
                let terminal = terminal.lock();
                (
                    terminal.line_termination().to_string(),
                    (terminal.window_width(), terminal.window_height()),
                )
            }
            _ => ("\n".to_string(), (None, None)),
        };
        Self {
            sink,
            line_termination,
            window,
            state: Mutex::new(OutputState::default()),
        }
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// The last thing done to this output was clearing the screen.
    pub fn cleared_last(&self) -> bool {
        self.state.lock().cleared_last
    }
}

impl CommandOutput for ChainOutput {
    fn is_piped(&self) -> bool {
        !self.sink.is_terminal()
    }

    fn window_width(&self) -> Option<u16> {
        self.window.0
    }

    fn window_height(&self) -> Option<u16> {
        self.window.1
    }

    fn line_termination(&self) -> &str {
        &self.line_termination
    }

    fn write(&self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        match &self.sink {
            Sink::Terminal(terminal) => terminal
                .lock()
                .write(&with_line_termination(text, &self.line_termination))?,
            Sink::File(file) => file.lock().write_all(text.as_bytes())?,
            Sink::Null => {}
        }
        let mut state = self.state.lock();
        state.wrote = true;
        state.line_terminated = text.ends_with('\n');
        state.cleared_last = false;
        Ok(())
    }

    fn clear_screen(&self) -> io::Result<()> {
        if let Sink::Terminal(terminal) = &self.sink {
            terminal.lock().clear_screen()?;
        }
        let mut state = self.state.lock();
        state.wrote = false;
        state.line_terminated = true;
        state.cleared_last = true;
        Ok(())
    }

    fn end_of_command(&self) -> io::Result<()> {
        let unterminated = {
            let state = self.state.lock();
            state.wrote && !state.line_terminated
        };
        if unterminated {
            self.new_line()?;
        }
        self.sink.flush()
    }
}

/// Per-stage error text, held until the pipeline drains it.
#[derive(Debug, Default)]
pub struct ErrorQueue {
    text: Mutex<String>,
    window: (Option<u16>, Option<u16>),
}

impl ErrorQueue {
    pub fn new(window: (Option<u16>, Option<u16>)) -> Self {
        Self {
            text: Mutex::new(String::new()),
            window,
        }
    }

    pub fn drain(&self) -> String {
        std::mem::take(&mut *self.text.lock())
    }
}

impl ErrorOutput for ErrorQueue {
    fn window_width(&self) -> Option<u16> {
        self.window.0
    }

    fn window_height(&self) -> Option<u16> {
        self.window.1
    }

    fn write(&self, text: &str) -> io::Result<()> {
        self.text.lock().push_str(text);
        Ok(())
    }

    fn end_of_error_output(&self) -> io::Result<()> {
        let mut text = self.text.lock();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(())
    }
}
