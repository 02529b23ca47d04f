use std::fs;
use std::io;
use std::path::Path;

use crate::terminal::Key;

/// Default number of remembered lines.
pub const DEFAULT_LENGTH: usize = 20;

/// Bounded list of entered lines, oldest first. Re-entering a line moves it
/// to the end instead of storing it twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    max_len: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl History {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
        }
    }

    /// Remember `line` (trimmed). Blank lines are ignored.
    pub fn record(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.max_len == 0 {
            return;
        }
        if let Some(existing) = self.entries.iter().position(|e| e == line) {
            self.entries.remove(existing);
        }
        while self.entries.len() >= self.max_len {
            self.entries.remove(0);
        }
        self.entries.push(line.to_string());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a JSON array of lines. A missing file is an empty history.
    pub fn load(path: &Path, max_len: usize) -> io::Result<Self> {
        let mut history = Self::new(max_len);
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(history),
            Err(e) => return Err(e),
        };
        let lines: Vec<String> = serde_json::from_str(&text)?;
        for line in &lines {
            history.record(line);
        }
        Ok(history)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, text)
    }
}

/// Position while paging through history with Up and Down. Starts one
/// past the newest entry.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    pub fn new(history: &History) -> Self {
        Self {
            index: history.len(),
        }
    }

    /// Line to edit after `key`: Up walks toward the oldest entry and stops
    /// there, Down walks back and yields an empty line past the newest.
    pub fn step(&mut self, history: &History, key: Key) -> String {
        if history.is_empty() {
            return String::new();
        }
        match key {
            Key::Up => self.index = self.index.saturating_sub(1),
            Key::Down if self.index < history.len() => self.index += 1,
            _ => {}
        }
        history.entries.get(self.index).cloned().unwrap_or_default()
    }
}
