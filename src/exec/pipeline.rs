//! Runs one parsed line: opens redirects, wires stages through links, runs
//! every stage on its own thread and renders errors once all have finished.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::cancel::{CancelGuard, CancellationToken};
use super::chain::{ChainInput, ChainOutput, ErrorQueue, InputPump, Sink, load_input, open_output};
use super::context::Context;
use super::invocation::{Invocation, Stage, StageError};
use super::io::{CommandInput, CommandOutput, ErrorOutput};
use super::link::{DEFAULT_CAPACITY, Link};
use crate::commands::{Call, CommandRegistry, RegisteredCommand};
use crate::error::{CommandError, ShellError, render_error};
use crate::parse::{InputSource, OutputTarget, RedirectSpec, resolve};
use crate::session::{Environment, SessionControl, SessionDirectory};
use crate::terminal::{Color, SharedTerminal};

/// Tunables taken from the `[pipeline]` config section.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub link_capacity: usize,
    /// How often blocked terminal reads look for new keys.
    pub poll_interval: Duration,
    pub error_color: Color,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            link_capacity: DEFAULT_CAPACITY,
            poll_interval: Duration::from_millis(20),
            error_color: Color::Red,
        }
    }
}

/// What every pipeline of a session shares.
#[derive(Clone)]
pub struct Runtime {
    pub terminal: SharedTerminal,
    pub session: Arc<SessionControl>,
    pub env: Environment,
    pub registry: Arc<CommandRegistry>,
    pub sessions: SessionDirectory,
    pub settings: PipelineSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Constructing,
    Running,
    Draining,
    Ended,
}

/// Summary of a finished pipeline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Rendered error lines, in the order they were shown.
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

enum FirstInput {
    Terminal,
    Text(String),
    Null,
}

/// One executed line.
pub struct Pipeline {
    state: PipelineState,
    invocations: Vec<Invocation>,
    input: FirstInput,
    output: Sink,
    error_sink: Sink,
    runtime: Runtime,
    cancel: CancellationToken,
    _session_link: CancelGuard,
}

impl Pipeline {
    /// Validate and open the line's redirects. Input files are read and
    /// decoded here; output files are created or truncated.
    pub fn open(
        invocations: Vec<Invocation>,
        redirects: &[RedirectSpec],
        runtime: Runtime,
    ) -> Result<Self, ShellError> {
        let resolved = resolve(redirects)?;
        let terminal = Sink::Terminal(runtime.terminal.clone());

        let input = match &resolved.input {
            None => FirstInput::Terminal,
            Some(InputSource::Null) => FirstInput::Null,
            Some(InputSource::File(path)) => FirstInput::Text(load_input(path)?),
        };
        let output = match &resolved.output {
            None => terminal.clone(),
            Some(target) => open_sink(target)?,
        };
        let error_sink = match &resolved.error_output {
            _ if resolved.shared => output.clone(),
            None => terminal,
            Some(target) => open_sink(target)?,
        };

        Ok(Self::assemble(invocations, input, output, error_sink, runtime))
    }

    /// A one-stage pipeline that reports `error` through the normal error
    /// path.
    pub fn for_error(error: ShellError, runtime: Runtime) -> Self {
        let terminal = Sink::Terminal(runtime.terminal.clone());
        Self::assemble(
            vec![Invocation::failed(error)],
            FirstInput::Null,
            terminal.clone(),
            terminal,
            runtime,
        )
    }

    fn assemble(
        invocations: Vec<Invocation>,
        input: FirstInput,
        output: Sink,
        error_sink: Sink,
        runtime: Runtime,
    ) -> Self {
        let (cancel, session_link) = runtime.session.cancellation().child();
        Self {
            state: PipelineState::Constructing,
            invocations,
            input,
            output,
            error_sink,
            runtime,
            cancel,
            _session_link: session_link,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The signal shared by every stage of this pipeline.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Run every stage to completion and flush error text.
    pub fn run(mut self) -> PipelineReport {
        self.state = PipelineState::Running;
        let terminal = self.runtime.terminal.clone();
        let settings = self.runtime.settings.clone();
        let stage_count = self.invocations.len();
        log::info!("running pipeline with {stage_count} stage(s)");

        let window = {
            let mut terminal = terminal.lock();
            terminal.begin_output();
            if matches!(self.input, FirstInput::Terminal) {
                if let Err(e) = terminal.flush_input() {
                    log::warn!("could not flush terminal input: {e}");
                }
            }
            (terminal.window_width(), terminal.window_height())
        };

        let text_queue = matches!(self.input, FirstInput::Terminal)
            .then(|| Arc::new(Mutex::new(VecDeque::new())));
        let pump = Arc::new(InputPump::new(
            terminal.clone(),
            self.invocations.iter().map(|i| i.keyboard.clone()).collect(),
            text_queue.clone(),
        ));

        let first_input: Arc<dyn CommandInput> = match (&self.input, text_queue) {
            (FirstInput::Text(text), _) => Arc::new(ChainInput::redirected(text, self.cancel.clone())),
            (FirstInput::Terminal, Some(queue)) => Arc::new(ChainInput::Terminal {
                queue,
                pump: pump.clone(),
                cancel: self.cancel.clone(),
                poll: settings.poll_interval,
            }),
            _ => Arc::new(ChainInput::Null),
        };
        let last_output = Arc::new(ChainOutput::new(self.output.clone()));

        let links: Vec<Arc<Link>> = (1..stage_count)
            .map(|_| {
                Arc::new(
                    Link::new(settings.link_capacity, self.cancel.clone())
                        .with_window(window.0, window.1),
                )
            })
            .collect();

        let contexts: Vec<Context> = self
            .invocations
            .iter()
            .enumerate()
            .map(|(i, invocation)| {
                let input: Arc<dyn CommandInput> = match i {
                    0 => first_input.clone(),
                    _ => links[i - 1].clone(),
                };
                let output: Arc<dyn CommandOutput> = match links.get(i) {
                    Some(link) => link.clone(),
                    None => last_output.clone(),
                };
                Context::builder()
                    .session(self.runtime.session.clone())
                    .env(self.runtime.env.clone())
                    .registry(self.runtime.registry.clone())
                    .sessions(self.runtime.sessions.clone())
                    .cancellation(self.cancel.clone())
                    .command(&invocation.name, &invocation.raw_text, invocation.tokens.clone())
                    .position(i, stage_count)
                    .input(input)
                    .output(output)
                    .error_output(Arc::new(ErrorQueue::new(window)))
                    .keyboard(invocation.keyboard.clone(), Some(pump.clone()))
                    .poll_interval(settings.poll_interval)
                    .build()
            })
            .collect();

        let entries: Vec<Option<Arc<RegisteredCommand>>> = self
            .invocations
            .iter()
            .map(|i| match &i.stage {
                Stage::Command { entry, .. } => Some(entry.clone()),
                Stage::Failed(_) => None,
            })
            .collect();

        let outcome = Outcome::default();
        thread::scope(|scope| {
            for (index, invocation) in std::mem::take(&mut self.invocations).into_iter().enumerate() {
                let stage = StageRun {
                    index,
                    contexts: &contexts,
                    entries: &entries,
                    outcome: &outcome,
                };
                let spawned = thread::Builder::new()
                    .name(format!("stage-{index}"))
                    .spawn_scoped(scope, move || stage.run(invocation));
                if let Err(e) = spawned {
                    log::warn!("could not start stage {index}: {e}");
                    stage.fail_to_start(e);
                }
            }
        });

        self.state = PipelineState::Draining;
        let report = self.drain(&contexts, outcome, last_output.cleared_last());
        self.state = PipelineState::Ended;
        report
    }

    fn drain(&self, contexts: &[Context], outcome: Outcome, cleared_last: bool) -> PipelineReport {
        let mut text = String::new();
        for ctx in contexts {
            text.push_str(&ctx.error_queue().drain());
        }

        let mut failures = outcome.failures.into_inner();
        failures.sort_by_key(|(index, _)| *index);
        let mut errors: Vec<String> = failures.iter().flat_map(|(_, f)| f.render()).collect();

        let cancelled = outcome.cancelled.into_inner();
        if let Some(index) = cancelled {
            // a hard session end cancels everything; nobody is left to read it
            if self.runtime.session.cancellation().is_cancelled() {
                log::info!("pipeline cancelled by session end");
            } else {
                let name = contexts.get(index).map(|c| c.command_name());
                errors.extend(render_error(name, &CommandError::Cancelled));
            }
        }
        for line in &errors {
            text.push_str(line);
            text.push('\n');
        }

        let color = self.runtime.settings.error_color;
        if let Err(e) = self.error_sink.write_errors(&text, color) {
            log::warn!("could not write error output: {e}");
        }
        if let Err(e) = self.error_sink.flush() {
            log::warn!("could not flush error output: {e}");
        }

        let mut terminal = self.runtime.terminal.lock();
        if self.output.is_terminal() && !cleared_last {
            let termination = terminal.line_termination().to_string();
            if let Err(e) = terminal.write(&termination) {
                log::warn!("could not terminate output: {e}");
            }
        }
        terminal.end_output();

        PipelineReport {
            errors,
            cancelled: cancelled.is_some(),
        }
    }
}

fn open_sink(target: &OutputTarget) -> Result<Sink, ShellError> {
    match target {
        OutputTarget::Null => Ok(Sink::Null),
        OutputTarget::File { path, append } => Ok(Sink::File(open_output(path, *append)?)),
    }
}

#[derive(Default)]
struct Outcome {
    failures: Mutex<Vec<(usize, StageError)>>,
    /// First stage that ended after cancellation was requested.
    cancelled: Mutex<Option<usize>>,
}

#[derive(Clone, Copy)]
struct StageRun<'p> {
    index: usize,
    contexts: &'p [Context],
    entries: &'p [Option<Arc<RegisteredCommand>>],
    outcome: &'p Outcome,
}

impl StageRun<'_> {
    fn ctx(&self) -> &Context {
        &self.contexts[self.index]
    }

    fn run(self, invocation: Invocation) {
        let ctx = self.ctx();
        let result = match invocation.stage {
            Stage::Failed(error) => Err(CommandError::from(error)),
            Stage::Command { entry, binding } => {
                let call = Call {
                    schema: binding.schema(&entry.signature),
                    arguments: &binding.arguments,
                    options: &binding.options,
                    raw_text: &invocation.raw_text,
                };
                catch_unwind(AssertUnwindSafe(|| entry.command.execute(ctx, &call)))
                    .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(payload))))
            }
        };
        self.complete(result);
    }

    fn fail_to_start(self, error: std::io::Error) {
        self.complete(Err(CommandError::Io(error)));
    }

    /// Stage bookkeeping: close this stage's ends of its links so neighbours
    /// see it finished, then route any failure downstream.
    fn complete(self, result: Result<(), CommandError>) {
        let ctx = self.ctx();
        if let Err(e) = ctx.output_handle().end_of_command() {
            log::warn!("stage {} output could not be finished: {e}", self.index);
        }
        ctx.input_handle().end_of_input();
        if let Err(e) = ctx.error_queue().end_of_error_output() {
            log::warn!("stage {} error output could not be finished: {e}", self.index);
        }

        if ctx.is_cancelled() {
            let mut first = self.outcome.cancelled.lock();
            if first.is_none_or(|i| self.index < i) {
                *first = Some(self.index);
            }
            log::warn!("stage {} ({}) ended after cancellation", self.index, ctx.command_name());
            return;
        }
        let Err(error) = result else {
            return;
        };
        log::warn!("stage {} ({}) failed: {error}", self.index, ctx.command_name());

        let failed = &self.entries[self.index];
        let mut error = StageError {
            command: failed.as_ref().map(|_| ctx.command_name().to_string()),
            raw_text: ctx.raw_text().to_string(),
            error,
        };
        for next in self.index + 1..self.contexts.len() {
            let Some(entry) = &self.entries[next] else {
                continue;
            };
            match entry.command.upstream_error(&self.contexts[next], error) {
                Some(relayed) => error = relayed,
                None => {
                    log::debug!("stage {next} swallowed an upstream error");
                    return;
                }
            }
        }
        self.outcome.failures.lock().push((self.index, error));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
