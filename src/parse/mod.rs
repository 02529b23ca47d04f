//! Command-line parsing: tokenizer, pipe/redirect grouping, redirect
//! resolution and the raw argument split used by the binder.

pub mod options;
pub mod redirect;
pub mod tokenize;
pub mod types;

pub use options::{RawArguments, RawOption, split_arguments};
pub use redirect::{InputSource, OutputTarget, ResolvedRedirects, resolve};
pub use tokenize::{group, tokenize};
pub use types::{CommandLine, Endpoint, RedirectKind, RedirectSpec, Segment, Token, TokenKind};

use crate::error::ParseError;

/// Default reserved word for the null device.
pub const NULL_DEVICE: &str = "null";

/// Tokenize and group a line using the default null-device word.
pub fn parse(line: &str) -> Result<CommandLine, ParseError> {
    parse_with(line, NULL_DEVICE)
}

/// Tokenize and group a line with a custom null-device word.
pub fn parse_with(line: &str, null_word: &str) -> Result<CommandLine, ParseError> {
    let tokens = tokenize(line)?;
    group(line, tokens, null_word)
}
