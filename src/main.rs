//! pipeshell: a line-mode console session on stdin/stdout.
//!
//! Usage:
//!   pipeshell                 interactive session with the built-in commands
//!   pipeshell -c "<line>"     run one line and exit (status 1 if it failed)
//!   pipeshell --dump-config   print the merged configuration as TOML

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pipeshell::Host;
use pipeshell::config::Config;
use pipeshell::exec::CancellationToken;
use pipeshell::terminal::{Color, Interrupt, Key, LineEvent, Terminal};

const POLL: Duration = Duration::from_millis(50);

/// Line-buffered console. A reader thread forwards stdin lines; a line that
/// arrives while a pipeline runs is handed over as key presses. Ctrl-C
/// cancels the running pipeline instead of the process.
struct Console {
    lines: Receiver<String>,
    closed: bool,
    stdout: io::Stdout,
    interrupt: Arc<Mutex<Option<Interrupt>>>,
}

impl Console {
    fn start() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new().name("stdin".into()).spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
        let interrupt = Arc::new(Mutex::new(None));
        watch_interrupts(interrupt.clone())?;
        Ok(Self {
            lines: rx,
            closed: false,
            stdout: io::stdout(),
            interrupt,
        })
    }
}

#[cfg(unix)]
fn watch_interrupts(slot: Arc<Mutex<Option<Interrupt>>>) -> io::Result<()> {
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT])?;
    thread::Builder::new().name("signals".into()).spawn(move || {
        for _ in signals.forever() {
            let cancelled = slot.lock().as_ref().is_some_and(Interrupt::trigger);
            if !cancelled {
                log::debug!("interrupt with no running pipeline");
            }
        }
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn watch_interrupts(_slot: Arc<Mutex<Option<Interrupt>>>) -> io::Result<()> {
    Ok(())
}

impl Terminal for Console {
    fn terminal_type(&self) -> &str {
        "console"
    }

    fn line_termination(&self) -> &str {
        "\n"
    }

    fn read_keys(&mut self) -> io::Result<Vec<Key>> {
        let mut keys = Vec::new();
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    keys.extend(line.chars().map(Key::Char));
                    keys.push(Key::Char('\n'));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        Ok(keys)
    }

    fn read_line(&mut self, initial: &str, cancel: &CancellationToken) -> io::Result<LineEvent> {
        // no line editor: a recalled line is shown and has to be retyped
        if !initial.is_empty() {
            self.write(&format!("[{initial}] "))?;
        }
        while !self.closed {
            if cancel.is_cancelled() {
                return Ok(LineEvent::Closed);
            }
            match self.lines.recv_timeout(POLL) {
                Ok(line) => return Ok(LineEvent::Line(line)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.closed = true,
            }
        }
        Ok(LineEvent::Closed)
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.stdout.write_all(text.as_bytes())?;
        self.stdout.flush()
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.write("\x1b[2J\x1b[H")
    }

    fn set_color(&mut self, color: Option<Color>) -> io::Result<()> {
        match color {
            Some(c) => self.write(&format!("\x1b[{}m", c.ansi_code())),
            None => self.write("\x1b[0m"),
        }
    }

    fn attach_interrupt(&mut self, interrupt: Interrupt) {
        *self.interrupt.lock() = Some(interrupt);
    }
}

fn usage() {
    eprintln!("usage: pipeshell [-c <line>] [--dump-config]");
}

fn main() {
    let config = Config::load();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let line = match args.first().map(String::as_str) {
        None => None,
        Some("--dump-config") => {
            match config.to_toml() {
                Ok(text) => print!("{text}"),
                Err(e) => {
                    eprintln!("pipeshell: could not render config: {e}");
                    std::process::exit(1);
                }
            }
            return;
        }
        Some("-c") => match args.get(1) {
            Some(line) => Some(line.clone()),
            None => {
                usage();
                std::process::exit(2);
            }
        },
        Some("-h" | "--help") => {
            usage();
            return;
        }
        Some(other) => {
            eprintln!("pipeshell: unknown argument '{other}'");
            usage();
            std::process::exit(2);
        }
    };

    pipeshell::logging::init(&config.logging);

    let host = match Host::new(config) {
        Ok(host) => host,
        Err(e) => {
            eprintln!("pipeshell: {e}");
            std::process::exit(1);
        }
    };
    let console = match Console::start() {
        Ok(console) => console,
        Err(e) => {
            eprintln!("pipeshell: could not read stdin: {e}");
            std::process::exit(1);
        }
    };

    let session = host.open_session(Box::new(console));
    match line {
        Some(line) => {
            let report = session.process_line(&line);
            std::process::exit(if report.succeeded() { 0 } else { 1 });
        }
        None => session.run(),
    }
}
