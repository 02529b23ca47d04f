//! Commands every host gets unless its configuration disables them.
//!
//! They live in the core group, so besides `echo` and `sys.echo` each also
//! answers to `.echo` when a host command shadows the plain name.

mod diag;
mod env;
mod shell;
mod text;

pub use diag::{Sleep, Throw};
pub use env::Env;
pub use shell::{Cls, Exit, Help, History, SessionList};
pub use text::{Echo, Grep, More, Passthrough, Reverse, Tee};

use std::sync::Arc;

use super::{Command, CommandGroup, CommandRegistry};
use crate::config::CommandsConfig;
use crate::error::ShellError;

/// The core group built-ins are registered under.
pub fn group(config: &CommandsConfig) -> CommandGroup {
    CommandGroup::core(&config.group_prefix, "System")
}

/// Every built-in, enabled or not.
pub fn all() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(Cls),
        Arc::new(Echo),
        Arc::new(Env),
        Arc::new(Exit),
        Arc::new(Grep),
        Arc::new(Help),
        Arc::new(History),
        Arc::new(More),
        Arc::new(Passthrough),
        Arc::new(Reverse),
        Arc::new(SessionList),
        Arc::new(Sleep),
        Arc::new(Tee),
        Arc::new(Throw),
    ]
}

/// Register the built-ins `config` does not disable. Returns how many were
/// added.
pub fn register_builtins(
    registry: &mut CommandRegistry,
    config: &CommandsConfig,
) -> Result<usize, ShellError> {
    let group = group(config);
    let mut added = 0;
    for command in all() {
        if config
            .disabled
            .iter()
            .any(|d| d.eq_ignore_ascii_case(command.name()))
        {
            log::debug!("built-in '{}' disabled by config", command.name());
            continue;
        }
        registry.register_arc(&group, command)?;
        added += 1;
    }
    Ok(added)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn registers_everything_by_default() {
        let mut registry = CommandRegistry::new();
        let added = register_builtins(&mut registry, &Config::default_config().commands).unwrap();
        assert_eq!(added, all().len());
        assert_eq!(registry.resolve("sys.echo").unwrap().name(), "echo");
        assert_eq!(registry.resolve(".ECHO").unwrap().name(), "echo");
    }

    #[test]
    fn disabled_commands_skipped() {
        let mut config = Config::default_config().commands;
        config.disabled = vec!["Throw".into(), "sleep".into()];
        let mut registry = CommandRegistry::new();
        let added = register_builtins(&mut registry, &config).unwrap();
        assert_eq!(added, all().len() - 2);
        assert!(registry.resolve("throw").is_err());
        assert!(registry.resolve("echo").is_ok());
    }

    #[test]
    fn custom_prefix() {
        let mut config = Config::default_config().commands;
        config.group_prefix = "core".into();
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry, &config).unwrap();
        assert!(registry.resolve("core.help").is_ok());
        assert!(registry.resolve("sys.help").is_err());
    }

    #[test]
    fn registering_twice_is_rejected() {
        let config = Config::default_config().commands;
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry, &config).unwrap();
        assert!(matches!(
            register_builtins(&mut registry, &config),
            Err(ShellError::DuplicateCommand(_))
        ));
    }
}
