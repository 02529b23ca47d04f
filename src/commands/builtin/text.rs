use std::fs;
use std::io::Write;
use std::path::Path;

use regex::{Regex, RegexBuilder};

use crate::commands::{Call, Command, Schema, Signature, convert};
use crate::error::CommandError;
use crate::exec::Context;
use crate::exec::chain::{load_input, open_output};
use crate::parse::redirect::expand;
use crate::terminal::Key;

/// Shown by `more` when a page is full.
pub(crate) const MORE_PROMPT: &str = "-- More -- ";

const DEFAULT_WIDTH: u16 = 80;
const DEFAULT_HEIGHT: u16 = 25;

pub struct Echo;

impl Command for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Write the given text."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(Schema::root().optional("text", "Text to write.", convert::text()))
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        ctx.output()
            .write_line(call.arguments.text("text").unwrap_or_default())?;
        Ok(())
    }
}

/// Reverses each input line.
pub struct Reverse;

impl Command for Reverse {
    fn name(&self) -> &str {
        "reverse"
    }

    fn description(&self) -> &str {
        "Write every input line reversed."
    }

    fn execute(&self, ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
        while let Some(line) = ctx.input().read_line() {
            let reversed: String = line.chars().rev().collect();
            ctx.output().write_line(&reversed)?;
        }
        if ctx.is_cancelled() {
            return Err(CommandError::Cancelled);
        }
        Ok(())
    }
}

/// Copies input to output as it arrives.
pub struct Passthrough;

impl Command for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn description(&self) -> &str {
        "Copy input to output unchanged."
    }

    fn execute(&self, ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
        while let Some(chunk) = ctx.input().read() {
            ctx.output().write(&chunk)?;
        }
        Ok(())
    }
}

/// Copies input to a file and on to output.
pub struct Tee;

impl Command for Tee {
    fn name(&self) -> &str {
        "tee"
    }

    fn description(&self) -> &str {
        "Write input to a file and pass it on unchanged."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(
            Schema::root()
                .required("file", "File to write to.", convert::text())
                .flag("append", "Append to the file instead of replacing it."),
        )
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let path = call.arguments.text("file").unwrap_or_default();
        if path.trim().is_empty() {
            return Err(CommandError::msg("Missing file path."));
        }
        let expanded = expand(path);
        if let Some(dir) = Path::new(&expanded).parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = open_output(path, call.options.is_set("append"))?;
        while let Some(text) = ctx.input().read() {
            file.lock().write_all(text.as_bytes())?;
            ctx.output().write(&text)?;
        }
        file.lock().flush()?;
        if ctx.is_cancelled() {
            return Err(CommandError::Cancelled);
        }
        Ok(())
    }
}

/// Keeps the lines matching any of a set of patterns.
pub struct Grep;

impl Command for Grep {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Write the input lines that match a pattern."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(
            Schema::root()
                .required(
                    "patterns",
                    "Regular expressions, separated by '\\|'.",
                    convert::text(),
                )
                .flag("i", "Ignore case.")
                .flag("v", "Keep the lines that do not match."),
        )
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let patterns = call.arguments.text("patterns").unwrap_or_default();
        let invert = call.options.is_set("v");
        let regexes = compile_patterns(patterns, call.options.is_set("i"))?;

        while let Some(line) = ctx.input().read_line() {
            if regexes.iter().any(|r| r.is_match(&line)) != invert {
                ctx.output().write_line(&line)?;
            }
        }
        if ctx.is_cancelled() {
            return Err(CommandError::Cancelled);
        }
        Ok(())
    }
}

fn compile_patterns(patterns: &str, ignore_case: bool) -> Result<Vec<Regex>, CommandError> {
    patterns
        .split("\\|")
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|e| CommandError::msg(format!("Invalid pattern '{pattern}': {e}")))
        })
        .collect()
}

/// Pages a file or piped input, one screen at a time.
pub struct More;

enum Advance {
    Page,
    Line,
    Quit,
}

impl Command for More {
    fn name(&self) -> &str {
        "more"
    }

    fn description(&self) -> &str {
        "Show a file or piped input one screen at a time."
    }

    fn signature(&self) -> Signature {
        Signature::new().root(Schema::root().optional("file", "File to show.", convert::text()))
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError> {
        let contents = match call.arguments.text("file") {
            Some(path) => Some(load_input(path)?),
            None if !ctx.input().is_piped() => {
                return Err(CommandError::msg(
                    "Without a file argument a piped input is expected for this command.",
                ));
            }
            None => None,
        };
        let mut file_lines = contents.as_deref().map(str::lines);
        let mut next_line = || match file_lines.as_mut() {
            Some(lines) => lines.next().map(str::to_string),
            None => ctx.input().read_line(),
        };

        let output = ctx.output();
        // piped or redirected: copied through unpaged
        if output.is_piped() {
            while let Some(line) = next_line() {
                output.write_line(&line)?;
            }
            return Ok(());
        }

        let width = usize::from(output.window_width().unwrap_or(DEFAULT_WIDTH));
        let page = usize::from(output.window_height().unwrap_or(DEFAULT_HEIGHT))
            .saturating_sub(1)
            .max(1);
        let mut budget = page;
        while let Some(line) = next_line() {
            for row in wrap(&line, width.saturating_sub(1).max(1)) {
                if budget == 0 {
                    budget = match wait_for_key(ctx)? {
                        Advance::Page => page,
                        Advance::Line => 1,
                        Advance::Quit => return Ok(()),
                    };
                }
                output.write_line(&row)?;
                budget -= 1;
            }
        }
        if ctx.is_cancelled() {
            return Err(CommandError::Cancelled);
        }
        Ok(())
    }
}

/// Printable rows of at most `width` characters. Other whitespace becomes a
/// space; control characters are dropped.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|row| row.iter().collect()).collect()
}

/// Backspaces over the prompt, blanks it, and backs up again.
fn erase_prompt() -> String {
    let n = MORE_PROMPT.chars().count();
    format!("{0}{1}{0}", "\u{8}".repeat(n), " ".repeat(n))
}

fn wait_for_key(ctx: &Context) -> Result<Advance, CommandError> {
    let keyboard = ctx.keyboard();
    keyboard.flush();
    ctx.output().write(MORE_PROMPT)?;
    let advance = loop {
        match keyboard.read() {
            None => return Err(CommandError::Cancelled),
            Some(Key::Char(' ')) => break Advance::Page,
            Some(Key::Char('\r' | '\n')) => break Advance::Line,
            Some(Key::Char('q' | 'Q')) => break Advance::Quit,
            Some(_) => {}
        }
    };
    ctx.output().write(&erase_prompt())?;
    Ok(advance)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::super::harness::{Screen, run, runtime_on, screen};
    use super::*;
    use crate::session::SessionControl;

    #[test]
    fn echo_writes_line() {
        assert_eq!(screen("echo hello"), "hello\n\n");
    }

    #[test]
    fn echo_without_text() {
        assert_eq!(screen("echo"), "\n\n");
    }

    #[test]
    fn echo_quoted_text_kept_whole() {
        assert_eq!(screen("echo \"a  b\""), "a  b\n\n");
    }

    #[test]
    fn reverse_each_line() {
        assert_eq!(screen("echo abc | reverse"), "cba\n\n");
    }

    #[test]
    fn passthrough_chain() {
        assert_eq!(screen("echo xyz | passthrough | passthrough"), "xyz\n\n");
    }

    #[test]
    fn double_reverse_restores() {
        assert_eq!(screen("echo abc | reverse | reverse"), "abc\n\n");
    }

    #[test]
    fn extra_argument_rejected() {
        let out = screen("echo a b");
        assert!(out.starts_with("echo: "), "{out}");
    }

    // ── tee ──

    #[test]
    fn tee_writes_screen_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        assert_eq!(
            screen(&format!("echo a | tee \"{}\"", path.display())),
            "a\n\n"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn tee_mid_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mid.txt");
        assert_eq!(
            screen(&format!("echo abc | tee \"{}\" | reverse", path.display())),
            "cba\n\n"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc\n");
    }

    #[test]
    fn tee_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "one\n").unwrap();
        screen(&format!("echo two | tee -append \"{}\"", path.display()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    // ── grep ──

    #[test]
    fn grep_filters_lines() {
        assert_eq!(screen("echo abc | grep b"), "abc\n\n");
        assert_eq!(screen("echo abc | grep x"), "\n");
    }

    #[test]
    fn grep_ignore_case() {
        assert_eq!(screen("echo ABC | grep b"), "\n");
        assert_eq!(screen("echo ABC | grep -i b"), "ABC\n\n");
    }

    #[test]
    fn grep_invert_and_alternatives() {
        assert_eq!(screen("echo abc | grep -v b"), "\n");
        assert_eq!(screen("echo abc | grep \"x\\|c\""), "abc\n\n");
    }

    #[test]
    fn grep_bad_pattern() {
        let out = screen("echo abc | grep \"(\"");
        assert!(out.starts_with("grep: Invalid pattern '(':"), "{out}");
    }

    // ── more ──

    #[test]
    fn more_pages_on_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("six.txt");
        std::fs::write(&path, "1\n2\n3\n4\n5\n6\n").unwrap();

        let text = Arc::new(Mutex::new(String::new()));
        let mut terminal = Screen::new(text.clone());
        terminal.height = Some(3);
        terminal.keys = vec![Key::Char('\r'), Key::Char(' '), Key::Char('q')];
        let runtime = runtime_on(terminal, Arc::new(SessionControl::detached()));

        let report = run(&runtime, &format!("more \"{}\"", path.display()));
        assert!(report.succeeded());
        let p = format!("{MORE_PROMPT}{}", erase_prompt());
        assert_eq!(*text.lock(), format!("1\n2\n{p}3\n{p}4\n5\n{p}\n\n"));
    }

    #[test]
    fn more_short_input_needs_no_key() {
        assert_eq!(screen("echo abc | more"), "abc\n\n");
    }

    #[test]
    fn more_without_input() {
        assert_eq!(
            screen("more"),
            "more: Without a file argument a piped input is expected for this command.\n\n"
        );
    }

    #[test]
    fn wrap_splits_long_lines() {
        assert_eq!(wrap("abcde", 2), vec!["ab", "cd", "e"]);
        assert_eq!(wrap("a\tb", 10), vec!["a b"]);
        assert_eq!(wrap("", 4), vec![String::new()]);
    }
}
