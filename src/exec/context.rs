use std::sync::Arc;
use std::time::Duration;

use super::cancel::CancellationToken;
use super::chain::{ChainInput, ChainOutput, ErrorQueue, InputPump, Sink};
use super::io::{CommandInput, CommandOutput, ErrorOutput};
use super::keyboard::{Keyboard, KeyboardBuffer};
use crate::commands::CommandRegistry;
use crate::parse::Token;
use crate::session::{Environment, SessionControl, SessionDirectory};

/// Everything a command body can reach while it runs: its input, output and
/// error output, the pipeline's cancellation signal, its keyboard buffer and
/// the session it runs in.
pub struct Context {
    session: Arc<SessionControl>,
    env: Environment,
    registry: Arc<CommandRegistry>,
    sessions: SessionDirectory,
    cancel: CancellationToken,
    command_name: String,
    raw_text: String,
    tokens: Vec<Token>,
    index: usize,
    stage_count: usize,
    input: Arc<dyn CommandInput>,
    output: Arc<dyn CommandOutput>,
    error_output: Arc<ErrorQueue>,
    keyboard: Arc<KeyboardBuffer>,
    pump: Option<Arc<InputPump>>,
    poll: Duration,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the whole pipeline this stage belongs to.
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// The command name as typed.
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Zero-based position of this stage in the pipeline.
    pub fn chain_index(&self) -> usize {
        self.index
    }

    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.stage_count
    }

    pub fn input(&self) -> &dyn CommandInput {
        self.input.as_ref()
    }

    pub fn output(&self) -> &dyn CommandOutput {
        self.output.as_ref()
    }

    pub fn error_output(&self) -> &dyn ErrorOutput {
        self.error_output.as_ref()
    }

    pub(crate) fn input_handle(&self) -> &Arc<dyn CommandInput> {
        &self.input
    }

    pub(crate) fn output_handle(&self) -> &Arc<dyn CommandOutput> {
        &self.output
    }

    pub(crate) fn error_queue(&self) -> &Arc<ErrorQueue> {
        &self.error_output
    }

    /// Raw key presses typed while this pipeline runs.
    pub fn keyboard(&self) -> Keyboard<'_> {
        Keyboard {
            buffer: &self.keyboard,
            pump: self.pump.as_deref(),
            cancel: &self.cancel,
            poll: self.poll,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Every live session of the host.
    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }

    /// This session's command history, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.session.history()
    }

    /// End the session after the current line. `hard` also cancels the
    /// running pipeline.
    pub fn terminate_session(&self, hard: bool) {
        self.session.terminate(hard);
    }

    /// Sleep unless cancelled first. Returns `false` when cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        !self.cancel.wait_timeout(duration)
    }
}

/// Assembles a [`Context`]. Anything not set falls back to a detached
/// session, empty input and discarded output.
pub struct ContextBuilder {
    session: Option<Arc<SessionControl>>,
    env: Option<Environment>,
    registry: Option<Arc<CommandRegistry>>,
    sessions: Option<SessionDirectory>,
    cancel: Option<CancellationToken>,
    command_name: String,
    raw_text: String,
    tokens: Vec<Token>,
    index: usize,
    stage_count: usize,
    input: Option<Arc<dyn CommandInput>>,
    output: Option<Arc<dyn CommandOutput>>,
    error_output: Option<Arc<ErrorQueue>>,
    keyboard: Option<Arc<KeyboardBuffer>>,
    pump: Option<Arc<InputPump>>,
    poll: Duration,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            session: None,
            env: None,
            registry: None,
            sessions: None,
            cancel: None,
            command_name: String::new(),
            raw_text: String::new(),
            tokens: Vec::new(),
            index: 0,
            stage_count: 1,
            input: None,
            output: None,
            error_output: None,
            keyboard: None,
            pump: None,
            poll: Duration::from_millis(20),
        }
    }
}

impl ContextBuilder {
    pub fn session(mut self, session: Arc<SessionControl>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn registry(mut self, registry: Arc<CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn sessions(mut self, sessions: SessionDirectory) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn command(mut self, name: &str, raw_text: &str, tokens: Vec<Token>) -> Self {
        self.command_name = name.to_string();
        self.raw_text = raw_text.to_string();
        self.tokens = tokens;
        self
    }

    pub fn position(mut self, index: usize, stage_count: usize) -> Self {
        self.index = index;
        self.stage_count = stage_count.max(index + 1);
        self
    }

    pub fn input(mut self, input: Arc<dyn CommandInput>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn output(mut self, output: Arc<dyn CommandOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn error_output(mut self, error_output: Arc<ErrorQueue>) -> Self {
        self.error_output = Some(error_output);
        self
    }

    pub fn keyboard(mut self, keyboard: Arc<KeyboardBuffer>, pump: Option<Arc<InputPump>>) -> Self {
        self.keyboard = Some(keyboard);
        self.pump = pump;
        self
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn build(self) -> Context {
        Context {
            session: self.session.unwrap_or_else(|| Arc::new(SessionControl::detached())),
            env: self.env.unwrap_or_default(),
            registry: self.registry.unwrap_or_default(),
            sessions: self.sessions.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
            command_name: self.command_name,
            raw_text: self.raw_text,
            tokens: self.tokens,
            index: self.index,
            stage_count: self.stage_count,
            input: self.input.unwrap_or_else(|| Arc::new(ChainInput::Null)),
            output: self
                .output
                .unwrap_or_else(|| Arc::new(ChainOutput::new(Sink::Null))),
            error_output: self.error_output.unwrap_or_default(),
            keyboard: self.keyboard.unwrap_or_default(),
            pump: self.pump,
            poll: self.poll,
        }
    }
}
