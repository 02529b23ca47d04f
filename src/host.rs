use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::commands::{Command, CommandGroup, CommandRegistry, builtin};
use crate::config::Config;
use crate::error::ShellError;
use crate::session::{Environment, Session, SessionControl, SessionDirectory, SessionSettings};
use crate::terminal::Terminal;

/// Owns what all sessions of one process share: the command registry, the
/// environment, the configuration and the list of open sessions.
///
/// Commands registered after a session was opened are only seen by sessions
/// opened later.
pub struct Host {
    config: Config,
    registry: Arc<CommandRegistry>,
    env: Environment,
    sessions: SessionDirectory,
}

impl Host {
    /// A host with the built-ins `config` enables and an environment seeded
    /// from the process.
    pub fn new(config: Config) -> Result<Self, ShellError> {
        let mut registry = CommandRegistry::new();
        let added = builtin::register_builtins(&mut registry, &config.commands)?;
        log::info!("host ready with {added} built-in command(s)");
        Ok(Self {
            config,
            registry: Arc::new(registry),
            env: Environment::from_process(),
            sessions: SessionDirectory::new(),
        })
    }

    /// Replace the environment every session shares.
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn register(
        &mut self,
        group: &CommandGroup,
        command: impl Command + 'static,
    ) -> Result<(), ShellError> {
        Arc::make_mut(&mut self.registry).register(group, command)
    }

    /// Create a session on `terminal`. Call [`Session::run`] to start it.
    pub fn open_session(&self, terminal: Box<dyn Terminal>) -> Session {
        Session::new(
            terminal,
            self.registry.clone(),
            self.env.clone(),
            SessionSettings::from_config(&self.config),
        )
        .with_directory(self.sessions.clone())
    }

    /// Open a session and run it on its own thread.
    pub fn spawn(&self, terminal: Box<dyn Terminal>) -> io::Result<(Arc<SessionControl>, JoinHandle<()>)> {
        let session = self.open_session(terminal);
        let control = session.control();
        let handle = thread::Builder::new()
            .name(format!("session-{}", session.id()))
            .spawn(move || session.run())?;
        Ok((control, handle))
    }

    /// Live sessions, by id.
    pub fn sessions(&self) -> Vec<Arc<SessionControl>> {
        self.sessions.list()
    }

    /// End a session from outside. Returns whether it was still open.
    pub fn terminate_session(&self, id: u64, hard: bool) -> bool {
        self.sessions.terminate(id, hard)
    }
}
