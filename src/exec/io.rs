//! Narrow I/O capabilities handed to command bodies through their context.

use std::io;

/// Text a stage reads: the previous stage's output, a redirected file, or
/// the terminal.
pub trait CommandInput: Send + Sync {
    /// Input comes from another stage or a file rather than the terminal.
    fn is_piped(&self) -> bool;

    /// No more text will ever arrive.
    fn is_ended(&self) -> bool;

    /// Discard whatever is queued.
    fn flush(&self);

    /// One character if one is queued. Never blocks.
    fn try_read(&self) -> Option<char>;

    /// Block for one character; `None` once the input has ended or the
    /// pipeline was cancelled.
    fn read_char(&self) -> Option<char>;

    /// Stage-completion hook: the reading stage is done and anything still
    /// written to this input may be dropped.
    fn end_of_input(&self) {}

    /// Block for the next available text (at least one character).
    fn read(&self) -> Option<String> {
        let first = self.read_char()?;
        let mut text = String::from(first);
        while let Some(c) = self.try_read() {
            text.push(c);
        }
        Some(text)
    }

    /// Block for one line, without its terminator (`\r` is stripped). A
    /// partial last line is returned as is; `None` only when nothing is left.
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        loop {
            match self.read_char() {
                Some('\n') => return Some(line),
                Some('\r') => {}
                Some(c) => line.push(c),
                None if line.is_empty() => return None,
                None => return Some(line),
            }
        }
    }

    /// Everything until the input ends.
    fn read_to_end(&self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.read() {
            text.push_str(&chunk);
        }
        text
    }
}

/// Where a stage writes its regular output.
pub trait CommandOutput: Send + Sync {
    /// Output goes to another stage or a file rather than the terminal.
    fn is_piped(&self) -> bool;

    fn window_width(&self) -> Option<u16> {
        None
    }

    fn window_height(&self) -> Option<u16> {
        None
    }

    fn line_termination(&self) -> &str {
        "\n"
    }

    fn write(&self, text: &str) -> io::Result<()>;

    fn write_line(&self, text: &str) -> io::Result<()> {
        self.write(text)?;
        self.new_line()
    }

    fn new_line(&self) -> io::Result<()> {
        self.write(self.line_termination())
    }

    fn clear_screen(&self) -> io::Result<()>;

    /// Stage-completion hook run by the pipeline after the command body
    /// returns.
    fn end_of_command(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Where a stage writes error text. Queued and shown after the pipeline's
/// regular output.
pub trait ErrorOutput: Send + Sync {
    fn window_width(&self) -> Option<u16> {
        None
    }

    fn window_height(&self) -> Option<u16> {
        None
    }

    fn line_termination(&self) -> &str {
        "\n"
    }

    fn write(&self, text: &str) -> io::Result<()>;

    fn write_line(&self, text: &str) -> io::Result<()> {
        self.write(text)?;
        self.new_line()
    }

    fn new_line(&self) -> io::Result<()> {
        self.write(self.line_termination())
    }

    /// Error text is never shown in place, so there is nothing to clear.
    fn clear_screen(&self) -> io::Result<()> {
        Ok(())
    }

    /// Stage-completion hook: terminate any unfinished line.
    fn end_of_error_output(&self) -> io::Result<()> {
        Ok(())
    }
}
