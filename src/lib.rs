//! pipeshell: an embeddable interactive command shell engine.
//!
//! A host registers typed commands; each terminal that connects gets a
//! session that reads lines, expands `%NAME%` variables, parses pipes and
//! redirects, binds arguments against each command's declared signature and
//! runs the stages concurrently, one thread per stage, connected by bounded
//! text links. Errors are collected and shown after the regular output.
//!
//! # Architecture
//!
//! - **[`parse`]**: Tokenizer, pipe/redirect splitting, option extraction.
//! - **[`commands`]**: Command trait, registry with qualified names, schemas, binder, help, built-ins.
//! - **[`exec`]**: Pipeline runtime: stage threads, links, cancellation, error routing, keyboard input.
//! - **[`session`]**: Session loop, history, environment, variable expansion.
//! - **[`host`]**: Shared registry/environment and the list of open sessions.
//! - **[`terminal`]**: The terminal endpoint abstraction sessions talk to.
//! - **[`config`]**: Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]**: File logging through the `log` facade.

/// Command trait, registry, schemas, binding and built-in commands.
pub mod commands;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types for parsing, binding and command execution.
pub mod error;
/// Pipeline execution: stages, links, cancellation, error routing.
pub mod exec;
/// Host: everything sessions of one process share.
pub mod host;
/// File logger setup.
pub mod logging;
/// Command line parsing: tokens, pipe segments, redirects, options.
pub mod parse;
/// Sessions: the read/expand/run loop, history and environment.
pub mod session;
/// Terminal endpoint abstraction.
pub mod terminal;

pub use host::Host;
