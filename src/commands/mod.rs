//! Commands: the trait a host implements, the registry that resolves typed
//! names to commands, and the declarative schema/binder machinery.
//!
//! A command belongs to a [`CommandGroup`]. It is reachable by its plain
//! name and by `prefix.name`; commands of the core group additionally
//! answer to `.name`. Lookup is case-insensitive and a name shared by
//! several commands is ambiguous.

/// Binding raw arguments against a signature.
pub mod bind;
/// Built-in commands shipped with the engine.
pub mod builtin;
/// Help text generation from signatures.
pub mod help;
/// Declarative parameter/option schemas and bound value sets.
pub mod schema;

pub use bind::{Binding, bind};
pub use schema::{ArgumentSet, OptionSet, Schema, Signature, convert};

use std::sync::Arc;

use crate::error::{CommandError, ShellError};
use crate::exec::{Context, StageError};

/// What a command body receives besides its context.
#[derive(Clone, Copy)]
pub struct Call<'a> {
    /// Schema the arguments were bound against.
    pub schema: &'a Schema,
    pub arguments: &'a ArgumentSet,
    pub options: &'a OptionSet,
    /// This stage's source text, for commands that re-parse it.
    pub raw_text: &'a str,
}

impl Call<'_> {
    /// Selected subcommand name, `None` for the root schema.
    pub fn subcommand(&self) -> Option<&str> {
        self.schema
            .is_subcommand()
            .then(|| self.schema.name())
    }
}

/// A command the engine can run as a pipeline stage.
///
/// Bodies run on their own thread, concurrently with the rest of the
/// pipeline, and must observe the context's cancellation at every blocking
/// point they own.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description used in listings.
    fn description(&self) -> &str;

    /// Accepted arguments and options. The default takes nothing.
    fn signature(&self) -> Signature {
        Signature::new()
    }

    /// Full help text.
    fn help(&self, signature: &Signature) -> String {
        help::render(self.name(), self.description(), signature)
    }

    fn execute(&self, ctx: &Context, call: &Call<'_>) -> Result<(), CommandError>;

    /// Called when the previous stage failed. Return the error to have it
    /// shown after the pipeline's output, or `None` to swallow it.
    fn upstream_error(&self, _ctx: &Context, error: StageError) -> Option<StageError> {
        Some(error)
    }
}

/// A named set of commands sharing a qualifying prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGroup {
    pub prefix: String,
    pub name: String,
    /// Core commands are also reachable as `.name`.
    pub is_core: bool,
}

impl CommandGroup {
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            name: name.to_string(),
            is_core: false,
        }
    }

    pub fn core(prefix: &str, name: &str) -> Self {
        Self {
            is_core: true,
            ..Self::new(prefix, name)
        }
    }
}

/// A command together with its group and its normalized signature.
pub struct RegisteredCommand {
    pub command: Arc<dyn Command>,
    pub group: CommandGroup,
    pub signature: Signature,
}

impl RegisteredCommand {
    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub fn qualified_name(&self) -> String {
        if self.group.prefix.is_empty() {
            self.name().to_string()
        } else {
            format!("{}.{}", self.group.prefix, self.name())
        }
    }

    /// Every name this command answers to.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![self.name().to_string()];
        if !self.group.prefix.is_empty() {
            names.push(self.qualified_name());
        }
        if self.group.is_core {
            names.push(format!(".{}", self.name()));
        }
        names
    }

    fn answers_to(&self, name: &str) -> bool {
        self.names().iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn help(&self) -> String {
        self.command.help(&self.signature)
    }
}

impl std::fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("name", &self.qualified_name())
            .finish()
    }
}

/// All commands a host makes available to its sessions.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: Vec<Arc<RegisteredCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command to `group`. Fails when the qualified name is taken.
    pub fn register(
        &mut self,
        group: &CommandGroup,
        command: impl Command + 'static,
    ) -> Result<(), ShellError> {
        self.register_arc(group, Arc::new(command))
    }

    pub fn register_arc(
        &mut self,
        group: &CommandGroup,
        command: Arc<dyn Command>,
    ) -> Result<(), ShellError> {
        let entry = RegisteredCommand {
            signature: command.signature().normalized(),
            command,
            group: group.clone(),
        };
        let qualified = entry.qualified_name();
        if self
            .commands
            .iter()
            .any(|c| c.qualified_name().eq_ignore_ascii_case(&qualified))
        {
            return Err(ShellError::DuplicateCommand(qualified));
        }
        log::debug!("registered command {qualified}");
        self.commands.push(Arc::new(entry));
        Ok(())
    }

    /// Find the single command answering to `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<RegisteredCommand>, ShellError> {
        let matches: Vec<&Arc<RegisteredCommand>> =
            self.commands.iter().filter(|c| c.answers_to(name)).collect();
        match matches.as_slice() {
            [] => Err(ShellError::UnknownCommand(name.to_string())),
            [one] => Ok(Arc::clone(one)),
            many => Err(ShellError::AmbiguousCommand {
                name: name.to_string(),
                listing: listing(many.iter().map(|c| c.as_ref())),
            }),
        }
    }

    /// Commands ordered by qualified name.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCommand> {
        let mut sorted: Vec<&RegisteredCommand> = self.commands.iter().map(|c| c.as_ref()).collect();
        sorted.sort_by_key(|c| c.qualified_name().to_lowercase());
        sorted.into_iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Aligned `qualified-name  description` lines, sorted by name.
pub fn listing<'a>(commands: impl Iterator<Item = &'a RegisteredCommand>) -> String {
    let mut rows: Vec<(String, &str)> = commands
        .map(|c| (c.qualified_name(), c.command.description()))
        .collect();
    rows.sort_by_key(|(name, _)| name.to_lowercase());
    let width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(name, desc)| format!("  {name:<width$}  {desc}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    impl Command for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            self.1
        }

        fn execute(&self, _ctx: &Context, _call: &Call<'_>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        let core = CommandGroup::core("sys", "System");
        let files = CommandGroup::new("fs", "Files");
        registry.register(&core, Named("list", "List sessions.")).unwrap();
        registry.register(&files, Named("list", "List files.")).unwrap();
        registry.register(&files, Named("copy", "Copy a file.")).unwrap();
        registry
    }

    #[test]
    fn plain_name_case_insensitive() {
        let r = registry();
        assert_eq!(r.resolve("COPY").unwrap().qualified_name(), "fs.copy");
    }

    #[test]
    fn qualified_names_disambiguate() {
        let r = registry();
        assert_eq!(r.resolve("fs.list").unwrap().qualified_name(), "fs.list");
        assert_eq!(r.resolve("sys.list").unwrap().qualified_name(), "sys.list");
        assert_eq!(r.resolve(".list").unwrap().qualified_name(), "sys.list");
        assert!(r.resolve(".copy").is_err());
    }

    #[test]
    fn shared_name_is_ambiguous() {
        let err = registry().resolve("list").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ambiguous command 'list' - please qualify. Possible commands:\n  \
             fs.list   List files.\n  sys.list  List sessions."
        );
    }

    #[test]
    fn unknown_command() {
        let err = registry().resolve("nope").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command 'nope'.");
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut r = registry();
        let err = r
            .register(&CommandGroup::new("fs", "Files"), Named("Copy", "Again."))
            .unwrap_err();
        assert!(matches!(err, ShellError::DuplicateCommand(name) if name == "fs.Copy"));
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn iteration_sorted() {
        let names: Vec<String> = registry().iter().map(|c| c.qualified_name()).collect();
        assert_eq!(names, vec!["fs.copy", "fs.list", "sys.list"]);
    }
}
