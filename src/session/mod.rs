//! The session loop: prompt, read a line with history recall, expand
//! variables, build and run its pipeline, repeat until the session ends.

/// Process-wide environment variable store.
pub mod env;
/// `%NAME%` expansion.
pub mod expand;
/// Bounded command history with optional JSON persistence.
pub mod history;

pub use env::Environment;
pub use expand::expand_variables;
pub use history::{Cursor, History};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::error::ShellError;
use crate::exec::{CancellationToken, Pipeline, PipelineReport, PipelineSettings, Runtime, invocation};
use crate::parse::{self, NULL_DEVICE};
use crate::terminal::{Interrupt, LineEvent, SharedTerminal, Terminal};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Login,
    Running,
    Ending,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not started",
            SessionState::Login => "login",
            SessionState::Running => "running",
            SessionState::Ending => "ending",
            SessionState::Ended => "ended",
        }
    }
}

/// Optional login dialog run before the first prompt.
pub trait Login: Send + Sync {
    fn wants_user_name(&self) -> bool {
        true
    }

    fn wants_password(&self) -> bool {
        true
    }

    fn authenticate(&self, user_name: Option<&str>, password: Option<&str>) -> bool;
}

/// The part of a session other threads may touch: its state, history,
/// cancellation signal and interrupt handle.
pub struct SessionControl {
    id: u64,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    history: Mutex<History>,
    interrupt: Interrupt,
    terminal_type: String,
    window: (Option<u16>, Option<u16>),
}

impl SessionControl {
    fn new(history: History, terminal: &dyn Terminal) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(SessionState::NotStarted),
            cancel: CancellationToken::new(),
            history: Mutex::new(history),
            interrupt: Interrupt::new(),
            terminal_type: terminal.terminal_type().to_string(),
            window: (terminal.window_width(), terminal.window_height()),
        }
    }

    /// A control block not attached to any terminal, for contexts built
    /// outside a session.
    pub fn detached() -> Self {
        Self {
            id: 0,
            state: Mutex::new(SessionState::NotStarted),
            cancel: CancellationToken::new(),
            history: Mutex::new(History::default()),
            interrupt: Interrupt::new(),
            terminal_type: String::new(),
            window: (None, None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Move from `from` to `to`; fails when an end was requested meanwhile.
    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    pub fn window(&self) -> (Option<u16>, Option<u16>) {
        self.window
    }

    /// Cancelled when the session ends hard; every pipeline's signal is a
    /// child of this one.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().entries().to_vec()
    }

    /// Ask the session to end. Soft: after the current line. Hard: the
    /// running pipeline and any pending terminal read are cancelled too.
    pub fn terminate(&self, hard: bool) {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Ended {
                *state = SessionState::Ending;
            }
        }
        log::info!("session {} asked to end (hard: {hard})", self.id);
        if hard {
            self.cancel.cancel();
        }
    }

    pub fn end_requested(&self) -> bool {
        matches!(self.state(), SessionState::Ending | SessionState::Ended)
    }

    pub fn is_ended(&self) -> bool {
        self.state() == SessionState::Ended
    }
}

/// Every session a host has opened.
#[derive(Clone, Default)]
pub struct SessionDirectory {
    sessions: Arc<Mutex<Vec<Arc<SessionControl>>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, control: Arc<SessionControl>) {
        let mut sessions = self.sessions.lock();
        sessions.retain(|s| !s.is_ended());
        sessions.push(control);
    }

    /// Sessions that have not ended, by id.
    pub fn list(&self) -> Vec<Arc<SessionControl>> {
        let mut sessions: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .filter(|s| !s.is_ended())
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    pub fn find(&self, id: u64) -> Option<Arc<SessionControl>> {
        self.sessions.lock().iter().find(|s| s.id() == id).cloned()
    }

    /// Returns whether a live session with this id existed.
    pub fn terminate(&self, id: u64, hard: bool) -> bool {
        match self.find(id) {
            Some(session) if !session.is_ended() => {
                session.terminate(hard);
                true
            }
            _ => false,
        }
    }
}

/// Per-session settings, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub prompt: String,
    pub show_session_id: bool,
    pub start_info: Vec<String>,
    pub history_length: usize,
    pub history_file: Option<PathBuf>,
    pub null_device: String,
    pub pipeline: PipelineSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            show_session_id: true,
            start_info: Vec::new(),
            history_length: history::DEFAULT_LENGTH,
            history_file: None,
            null_device: NULL_DEVICE.to_string(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let history_file = config.session.history_file.trim();
        Self {
            prompt: config.session.prompt.clone(),
            show_session_id: config.session.show_session_id,
            start_info: config.session.start_info.clone(),
            history_length: config.session.history_length,
            history_file: (!history_file.is_empty())
                .then(|| PathBuf::from(parse::redirect::expand(history_file))),
            null_device: config.pipeline.null_device.clone(),
            pipeline: PipelineSettings::from(&config.pipeline),
        }
    }
}

/// One interactive session on one terminal.
pub struct Session {
    control: Arc<SessionControl>,
    terminal: SharedTerminal,
    registry: Arc<CommandRegistry>,
    env: Environment,
    sessions: SessionDirectory,
    settings: SessionSettings,
    login: Option<Arc<dyn Login>>,
}

impl Session {
    pub fn new(
        mut terminal: Box<dyn Terminal>,
        registry: Arc<CommandRegistry>,
        env: Environment,
        settings: SessionSettings,
    ) -> Self {
        let history = match &settings.history_file {
            Some(path) => History::load(path, settings.history_length).unwrap_or_else(|e| {
                log::warn!("could not load history from {}: {e}", path.display());
                History::new(settings.history_length)
            }),
            None => History::new(settings.history_length),
        };
        let control = Arc::new(SessionControl::new(history, terminal.as_ref()));
        terminal.attach_interrupt(control.interrupt().clone());
        Self {
            control,
            terminal: crate::terminal::shared(terminal),
            registry,
            env,
            sessions: SessionDirectory::new(),
            settings,
            login: None,
        }
    }

    pub fn with_login(mut self, login: Arc<dyn Login>) -> Self {
        self.login = Some(login);
        self
    }

    /// Share a host's session list; this session is added to it.
    pub fn with_directory(mut self, sessions: SessionDirectory) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn id(&self) -> u64 {
        self.control.id()
    }

    pub fn control(&self) -> Arc<SessionControl> {
        self.control.clone()
    }

    pub fn terminal(&self) -> SharedTerminal {
        self.terminal.clone()
    }

    /// Run until the user exits, the terminal closes or the session is
    /// terminated.
    pub fn run(self) {
        let id = self.id();
        log::info!("session {id} started");
        self.sessions.add(self.control.clone());
        self.control
            .advance(SessionState::NotStarted, SessionState::Login);

        if self.settings.show_session_id {
            self.write_line(&format!("Session ID: {id}"));
            self.write_line("");
        }

        let admitted = match self.login.clone() {
            Some(login) => self.log_in(login.as_ref()),
            None => true,
        };

        if admitted && self.control.advance(SessionState::Login, SessionState::Running) {
            for line in &self.settings.start_info {
                self.write_line(line);
            }
            if !self.settings.start_info.is_empty() {
                self.write_line("");
            }

            while self.control.state() == SessionState::Running {
                match self.read_command_line() {
                    Some(line) => {
                        self.process_line(&line);
                    }
                    None => break,
                }
            }
        }

        self.control.set_state(SessionState::Ending);
        if let Some(path) = &self.settings.history_file {
            let history = self.control.history.lock().clone();
            if let Err(e) = history.save(path) {
                log::warn!("could not save history to {}: {e}", path.display());
            }
        }
        self.control.set_state(SessionState::Ended);
        log::info!("session {id} ended");
    }

    /// Run one line as if it had been typed at the prompt.
    pub fn process_line(&self, raw: &str) -> PipelineReport {
        let line = raw.trim();
        if line.is_empty() {
            return PipelineReport::default();
        }
        self.control.history.lock().record(line);

        let expanded = expand_variables(line, |name| self.env.get(name));
        log::debug!("session {}: {expanded}", self.id());
        let runtime = self.runtime();
        let pipeline = match self.prepare(&expanded, runtime.clone()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::debug!("line rejected: {e}");
                Pipeline::for_error(e, runtime)
            }
        };

        let interrupt = self.control.interrupt();
        interrupt.arm(pipeline.cancellation().clone());
        let report = pipeline.run();
        interrupt.disarm();
        report
    }

    fn prepare(&self, line: &str, runtime: Runtime) -> Result<Pipeline, ShellError> {
        let parsed = parse::parse_with(line, &self.settings.null_device)?;
        let stages = invocation::build(&self.registry, &parsed)?;
        Pipeline::open(stages, &parsed.redirects, runtime)
    }

    fn runtime(&self) -> Runtime {
        Runtime {
            terminal: self.terminal.clone(),
            session: self.control.clone(),
            env: self.env.clone(),
            registry: self.registry.clone(),
            sessions: self.sessions.clone(),
            settings: self.settings.pipeline.clone(),
        }
    }

    /// Prompt and read one line, paging through history on Up/Down.
    /// `None` once the terminal is gone or the session was cancelled.
    fn read_command_line(&self) -> Option<String> {
        self.write(&self.settings.prompt);
        let history = self.control.history.lock().clone();
        let mut cursor = Cursor::new(&history);
        let mut initial = String::new();
        loop {
            let event = self
                .terminal
                .lock()
                .read_line(&initial, self.control.cancellation());
            match event {
                Ok(LineEvent::Line(line)) => return Some(line),
                Ok(LineEvent::Recall(key)) => initial = cursor.step(&history, key),
                Ok(LineEvent::Closed) => return None,
                Err(e) => {
                    log::warn!("session {}: terminal read failed: {e}", self.id());
                    return None;
                }
            }
        }
    }

    fn log_in(&self, login: &dyn Login) -> bool {
        let user_name = if login.wants_user_name() {
            self.write("User name: ");
            match self.read_plain(false) {
                Some(name) => Some(name),
                None => return false,
            }
        } else {
            None
        };
        let password = if login.wants_password() {
            self.write("Password: ");
            let Some(password) = self.read_plain(true) else {
                return false;
            };
            self.write_line("");
            Some(password)
        } else {
            None
        };

        if login.authenticate(user_name.as_deref(), password.as_deref()) {
            log::info!("session {} logged in", self.id());
            self.write_line("");
            true
        } else {
            log::warn!("session {} failed to log in", self.id());
            self.write_line("User authentication failed!");
            false
        }
    }

    fn read_plain(&self, secret: bool) -> Option<String> {
        loop {
            let mut terminal = self.terminal.lock();
            let cancel = self.control.cancellation();
            let event = if secret {
                terminal.read_secret(cancel)
            } else {
                terminal.read_line("", cancel)
            };
            match event {
                Ok(LineEvent::Line(line)) => return Some(line),
                Ok(LineEvent::Recall(_)) => {}
                Ok(LineEvent::Closed) | Err(_) => return None,
            }
        }
    }

    fn write(&self, text: &str) {
        if let Err(e) = self.terminal.lock().write(text) {
            log::warn!("session {}: terminal write failed: {e}", self.id());
        }
    }

    fn write_line(&self, text: &str) {
        if let Err(e) = self.terminal.lock().write_line(text) {
            log::warn!("session {}: terminal write failed: {e}", self.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{Color, Key};
    use std::collections::VecDeque;

    struct Script {
        events: VecDeque<LineEvent>,
        screen: Arc<Mutex<String>>,
    }

    impl Terminal for Script {
        fn line_termination(&self) -> &str {
            "\n"
        }

        fn read_keys(&mut self) -> std::io::Result<Vec<Key>> {
            Ok(Vec::new())
        }

        fn read_line(&mut self, initial: &str, _: &CancellationToken) -> std::io::Result<LineEvent> {
            let event = self.events.pop_front().unwrap_or(LineEvent::Closed);
            if let LineEvent::Line(line) = &event {
                self.screen.lock().push_str(&format!("[{initial}]{line}\n"));
            }
            Ok(event)
        }

        fn write(&mut self, text: &str) -> std::io::Result<()> {
            self.screen.lock().push_str(text);
            Ok(())
        }

        fn clear_screen(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn set_color(&mut self, _: Option<Color>) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(events: Vec<LineEvent>) -> (Session, Arc<Mutex<String>>) {
        let screen = Arc::new(Mutex::new(String::new()));
        let terminal = Script {
            events: events.into(),
            screen: screen.clone(),
        };
        let settings = SessionSettings {
            show_session_id: false,
            ..SessionSettings::default()
        };
        let session = Session::new(
            Box::new(terminal),
            Arc::new(CommandRegistry::new()),
            Environment::new(),
            settings,
        );
        (session, screen)
    }

    #[test]
    fn ids_are_unique() {
        let (a, _) = session(Vec::new());
        let (b, _) = session(Vec::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn closed_terminal_ends_session() {
        let (session, _) = session(Vec::new());
        let control = session.control();
        session.run();
        assert_eq!(control.state(), SessionState::Ended);
    }

    #[test]
    fn recall_fills_initial_text() {
        let (session, screen) = session(vec![
            LineEvent::Line("first".into()),
            LineEvent::Recall(Key::Up),
            LineEvent::Line("again".into()),
        ]);
        let control = session.control();
        session.run();
        assert!(screen.lock().contains("[first]again"));
        assert_eq!(control.history(), vec!["first".to_string(), "again".to_string()]);
    }

    #[test]
    fn unknown_command_rendered_and_session_continues() {
        let (session, screen) = session(vec![LineEvent::Line("nope".into())]);
        session.run();
        assert!(screen.lock().contains("Unknown command 'nope'.\n"));
    }

    #[test]
    fn terminate_before_start_skips_loop() {
        let (session, screen) = session(vec![LineEvent::Line("nope".into())]);
        session.control().terminate(false);
        session.run();
        assert!(!screen.lock().contains("nope"));
    }

    struct Fixed;

    impl Login for Fixed {
        fn authenticate(&self, user: Option<&str>, password: Option<&str>) -> bool {
            user == Some("ada") && password == Some("secret")
        }
    }

    #[test]
    fn failed_login_ends_session() {
        let (session, screen) = session(vec![
            LineEvent::Line("ada".into()),
            LineEvent::Line("wrong".into()),
            LineEvent::Line("nope".into()),
        ]);
        session.with_login(Arc::new(Fixed)).run();
        let screen = screen.lock();
        assert!(screen.contains("User authentication failed!"));
        assert!(!screen.contains("Unknown command"));
    }

    #[test]
    fn history_saved_on_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let (mut session, _) = session(vec![LineEvent::Line("nope".into())]);
        session.settings.history_file = Some(path.clone());
        session.run();
        assert_eq!(History::load(&path, 5).unwrap().entries(), ["nope"]);
    }
}
