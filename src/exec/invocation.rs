use std::sync::Arc;

use super::keyboard::KeyboardBuffer;
use crate::commands::{Binding, CommandRegistry, RegisteredCommand, bind};
use crate::error::{CommandError, ParseError, ShellError};
use crate::parse::{CommandLine, Segment, Token, TokenKind, split_arguments};

/// What a pipeline stage will run.
pub enum Stage {
    /// A resolved command with its bound arguments.
    Command {
        entry: Arc<RegisteredCommand>,
        binding: Binding,
    },
    /// The line could not be turned into commands; running this stage just
    /// reports the error.
    Failed(ShellError),
}

/// One pipeline stage ready to run.
pub struct Invocation {
    pub stage: Stage,
    /// Command name as typed, empty for a failed stage.
    pub name: String,
    pub raw_text: String,
    pub position: usize,
    pub tokens: Vec<Token>,
    pub keyboard: Arc<KeyboardBuffer>,
}

impl Invocation {
    /// A single stage that fails with `error` when run.
    pub fn failed(error: ShellError) -> Self {
        Self {
            stage: Stage::Failed(error),
            name: String::new(),
            raw_text: String::new(),
            position: 0,
            tokens: Vec::new(),
            keyboard: Arc::new(KeyboardBuffer::new()),
        }
    }

    /// Name used when rendering this stage's errors.
    pub fn display_name(&self) -> Option<&str> {
        match self.stage {
            Stage::Command { .. } => Some(&self.name),
            Stage::Failed(_) => None,
        }
    }
}

/// A failure travelling down the pipeline toward the error sink.
#[derive(Debug)]
pub struct StageError {
    /// Command that raised it, `None` for errors found before execution.
    pub command: Option<String>,
    pub raw_text: String,
    pub error: CommandError,
}

impl StageError {
    /// `"<command>: <message>"` lines.
    pub fn render(&self) -> Vec<String> {
        crate::error::render_error(self.command.as_deref(), &self.error)
    }
}

/// Resolve and bind every segment of a parsed line.
pub fn build(registry: &CommandRegistry, line: &CommandLine) -> Result<Vec<Invocation>, ShellError> {
    if line.segments.is_empty() {
        return Err(ParseError::NoCommands.into());
    }
    line.segments
        .iter()
        .map(|segment| build_one(registry, segment))
        .collect()
}

fn build_one(registry: &CommandRegistry, segment: &Segment) -> Result<Invocation, ShellError> {
    let first = segment
        .tokens
        .first()
        .filter(|t| t.kind == TokenKind::Value)
        .ok_or(ParseError::MissingCommand {
            position: segment.position,
        })?;

    let entry = registry.resolve(&first.text)?;
    let raw = split_arguments(&segment.tokens)?;
    let binding = bind(&entry.signature, raw).map_err(|source| ShellError::Bind {
        command: first.text.clone(),
        source,
    })?;

    Ok(Invocation {
        name: first.text.clone(),
        stage: Stage::Command { entry, binding },
        raw_text: segment.text.clone(),
        position: segment.position,
        tokens: segment.tokens.clone(),
        keyboard: Arc::new(KeyboardBuffer::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Call, Command, CommandGroup, Schema, Signature, convert};
    use crate::exec::Context;
    use crate::parse::parse;

    struct Greet;

    impl Command for Greet {
        fn name(&self) -> &str {
            "greet"
        }

        fn description(&self) -> &str {
            "Say hello."
        }

        fn signature(&self) -> Signature {
            Signature::new().root(Schema::root().required("name", "Who.", convert::text()))
        }

        fn execute(&self, _ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(&CommandGroup::core("sys", "System"), Greet)
            .unwrap();
        registry
    }

    #[test]
    fn stages_bound_in_order() {
        let line = parse("greet bob | sys.greet alice").unwrap();
        let stages = build(&registry(), &line).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].name, "sys.greet");
        assert_eq!(stages[1].raw_text, "sys.greet alice");
        let Stage::Command { binding, .. } = &stages[0].stage else {
            panic!("expected a command stage");
        };
        assert_eq!(binding.arguments.text("name"), Some("bob"));
    }

    #[test]
    fn bind_failure_names_command() {
        let line = parse("GREET").unwrap();
        let Err(err) = build(&registry(), &line) else {
            panic!("expected a bind error");
        };
        assert_eq!(err.to_string(), "GREET: Missing 1 required argument.");
    }

    #[test]
    fn option_first_is_missing_command() {
        let line = parse("-x").unwrap();
        let Err(err) = build(&registry(), &line) else {
            panic!("expected missing command");
        };
        assert_eq!(err.to_string(), "Missing command at position 1.");
    }

    #[test]
    fn unknown_command_surfaces() {
        let line = parse("greet a | nope").unwrap();
        let Err(err) = build(&registry(), &line) else {
            panic!("expected unknown command");
        };
        assert!(matches!(err, ShellError::UnknownCommand(name) if name == "nope"));
    }
}
