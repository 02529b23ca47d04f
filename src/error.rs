//! Error taxonomy shared by the parser, binder, pipeline and command bodies.

use std::io;

use thiserror::Error;

/// Syntax errors from the tokenizer, grouping pass, redirect resolver and
/// raw option split. Every variant except [`ParseError::EmptyLine`] carries
/// the 1-based position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty command line.")]
    EmptyLine,
    #[error("No commands to execute.")]
    NoCommands,
    #[error("Found quote character in token at position {position}.")]
    StrayQuote { position: usize },
    #[error("Missing end of quoted token '{token}' at position {position}.")]
    UnterminatedQuote { token: String, position: usize },
    #[error(
        "Input/output redirects must be after commands - error at token '{token}', position {position}."
    )]
    RedirectBeforeCommand { token: String, position: usize },
    #[error("Redirect '{operator}' needs a source/target - error at position {position}.")]
    MissingRedirectTarget { operator: String, position: usize },
    #[error(
        "Redirect '{operator}' can only have one source/target - error at token '{token}', position {position}."
    )]
    ExtraRedirectTarget {
        operator: String,
        token: String,
        position: usize,
    },
    #[error("Redirect '{operator}' has an empty source/target - error at position {position}.")]
    EmptyRedirectTarget { operator: String, position: usize },
    #[error("There can be only one redirect of each type - error at position {position}.")]
    DuplicateRedirect { position: usize },
    #[error("Cannot redirect {stream} to itself (did you mean '2> &1' or '> &2'?) - error at position {position}.")]
    SelfAlias { stream: &'static str, position: usize },
    #[error(
        "Attempt to redirect {stream} to the same as the {other}, but no {other} redirect exists - error at position {position}."
    )]
    MissingAliasTarget {
        stream: &'static str,
        other: &'static str,
        position: usize,
    },
    #[error("Mismatch in redirect rewrite/append - error at position {position}.")]
    AppendMismatch { position: usize },
    #[error("Unknown redirect target '{target}' (should be '&1' or '&2') - error at position {position}.")]
    UnknownAlias { target: String, position: usize },
    #[error("Input cannot be redirected from '{source_text}' - error at position {position}.")]
    InvalidInputSource { source_text: String, position: usize },
    #[error(
        "Output and error output can only be redirected to the same file by using '2> &1' or '> &2' - error at position {position}."
    )]
    SameFile { position: usize },
    #[error("Unexpected token '{token}' at position {position}.")]
    UnexpectedToken { token: String, position: usize },
    #[error("Duplicate option '{token}' at position {position}.")]
    DuplicateOption { token: String, position: usize },
    #[error("Missing command at position {position}.")]
    MissingCommand { position: usize },
}

impl ParseError {
    /// 1-based character position the error refers to, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::EmptyLine | ParseError::NoCommands => None,
            ParseError::StrayQuote { position }
            | ParseError::UnterminatedQuote { position, .. }
            | ParseError::RedirectBeforeCommand { position, .. }
            | ParseError::MissingRedirectTarget { position, .. }
            | ParseError::ExtraRedirectTarget { position, .. }
            | ParseError::EmptyRedirectTarget { position, .. }
            | ParseError::DuplicateRedirect { position }
            | ParseError::SelfAlias { position, .. }
            | ParseError::MissingAliasTarget { position, .. }
            | ParseError::AppendMismatch { position }
            | ParseError::UnknownAlias { position, .. }
            | ParseError::InvalidInputSource { position, .. }
            | ParseError::SameFile { position }
            | ParseError::UnexpectedToken { position, .. }
            | ParseError::DuplicateOption { position, .. }
            | ParseError::MissingCommand { position } => Some(*position),
        }
    }
}

/// A schema-driven binding failure. Messages name the selected subcommand
/// when there is one (`Missing 1 required add argument.`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("A subcommand must be provided.")]
    MissingSubcommand,
    #[error("Unknown subcommand '{name}'. Possible subcommands:\n{listing}")]
    UnknownSubcommand { name: String, listing: String },
    #[error("Missing {count} required {}argument{}.", qualifier(.subcommand), plural(.count))]
    MissingArguments {
        subcommand: Option<String>,
        count: usize,
    },
    #[error("{count} too many {}arguments.", qualifier(.subcommand))]
    TooManyArguments {
        subcommand: Option<String>,
        count: usize,
    },
    #[error("Missing required {}option '-{name}'.", qualifier(.subcommand))]
    MissingOption {
        subcommand: Option<String>,
        name: String,
    },
    #[error("{} '-{name}' is missing a value.", option_label(.subcommand))]
    MissingValue {
        subcommand: Option<String>,
        name: String,
    },
    #[error("{} '-{name}' is not supposed to have a value.", option_label(.subcommand))]
    UnexpectedValue {
        subcommand: Option<String>,
        name: String,
    },
    #[error("Unexpected {}option '-{name}'.", qualifier(.subcommand))]
    UnexpectedOption {
        subcommand: Option<String>,
        name: String,
    },
    /// A converter rejected a value; `name` is the parameter name or `-option`.
    #[error("{name}: {message}")]
    Conversion { name: String, message: String },
}

fn qualifier(subcommand: &Option<String>) -> String {
    match subcommand {
        Some(name) => format!("{name} "),
        None => String::new(),
    }
}

fn option_label(subcommand: &Option<String>) -> String {
    match subcommand {
        Some(name) => format!("{name} option"),
        None => "Option".to_string(),
    }
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

/// Anything that stops a line before its pipeline runs.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{command}: {source}")]
    Bind {
        command: String,
        #[source]
        source: BindError,
    },
    #[error("Unknown command '{0}'.")]
    UnknownCommand(String),
    #[error("A command named '{0}' is already registered.")]
    DuplicateCommand(String),
    #[error("Ambiguous command '{name}' - please qualify. Possible commands:\n{listing}")]
    AmbiguousCommand { name: String, listing: String },
    #[error("Could not find or read command input file '{path}'.")]
    InputUnreadable {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not decode text in command input file '{path}'.")]
    InputUndecodable { path: String },
    #[error("Could not open redirect file '{path}': {source}")]
    OutputUnwritable {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure raised by a command body (or carried by a synthetic stage).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Setup(#[from] ShellError),
    #[error("Command cancelled.")]
    Cancelled,
    #[error("Command panicked: {0}")]
    Panicked(String),
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Aggregate(Vec<CommandError>),
}

impl CommandError {
    /// Plain-text error, the common case for command bodies.
    pub fn msg(message: impl Into<String>) -> Self {
        CommandError::Message(message.into())
    }

    /// One message per leaf error, aggregates flattened in order.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CommandError::Aggregate(inner) => inner.iter().flat_map(|e| e.messages()).collect(),
            other => vec![other.to_string()],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandError::Cancelled)
    }
}

impl From<BindError> for CommandError {
    fn from(e: BindError) -> Self {
        CommandError::Message(e.to_string())
    }
}

/// Render an error as `"<command>: <message>"` lines. Without a command
/// name (synthetic stages) the bare messages are used.
pub fn render_error(command: Option<&str>, error: &CommandError) -> Vec<String> {
    error
        .messages()
        .into_iter()
        .map(|message| match command {
            Some(name) if !name.is_empty() => format!("{name}: {message}"),
            _ => message,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_reported() {
        assert_eq!(ParseError::StrayQuote { position: 3 }.position(), Some(3));
        assert_eq!(ParseError::EmptyLine.position(), None);
    }

    #[test]
    fn argument_counts_pluralize() {
        let one = BindError::MissingArguments {
            subcommand: None,
            count: 1,
        };
        assert_eq!(one.to_string(), "Missing 1 required argument.");
        let two = BindError::MissingArguments {
            subcommand: Some("add".into()),
            count: 2,
        };
        assert_eq!(two.to_string(), "Missing 2 required add arguments.");
        let extra = BindError::TooManyArguments {
            subcommand: None,
            count: 1,
        };
        assert_eq!(extra.to_string(), "1 too many arguments.");
    }

    #[test]
    fn option_messages_qualified() {
        let e = BindError::MissingValue {
            subcommand: Some("add".into()),
            name: "x".into(),
        };
        assert_eq!(e.to_string(), "add option '-x' is missing a value.");
        let e = BindError::UnexpectedOption {
            subcommand: None,
            name: "x".into(),
        };
        assert_eq!(e.to_string(), "Unexpected option '-x'.");
    }

    #[test]
    fn aggregate_renders_one_line_each() {
        let err = CommandError::Aggregate(vec![
            CommandError::msg("first"),
            CommandError::Aggregate(vec![CommandError::msg("second")]),
        ]);
        assert_eq!(
            render_error(Some("grep"), &err),
            vec!["grep: first".to_string(), "grep: second".to_string()]
        );
    }

    #[test]
    fn anonymous_render_is_bare() {
        let err = CommandError::from(ShellError::UnknownCommand("nope".into()));
        assert_eq!(render_error(None, &err), vec!["Unknown command 'nope'.".to_string()]);
    }

    #[test]
    fn bind_error_prefixed_with_command() {
        let err = ShellError::Bind {
            command: "echo".into(),
            source: BindError::MissingArguments {
                subcommand: None,
                count: 1,
            },
        };
        assert_eq!(err.to_string(), "echo: Missing 1 required argument.");
    }
}
