//! Types produced by the tokenizer and consumed by the binder and pipeline.

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Plain or quoted word.
    Value,
    /// Unquoted word starting with `-` or `/`.
    OptionName,
    /// `=`
    EqualSign,
    /// `|`
    Pipe,
    /// `<`, `>`, `>>`, `1>`, `1>>`, `2>`, `2>>`
    Redirect,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Value => "value",
            TokenKind::OptionName => "option name",
            TokenKind::EqualSign => "equal sign",
            TokenKind::Pipe => "pipe",
            TokenKind::Redirect => "redirect",
        }
    }
}

/// One token of a command line. `position` is the 1-based character offset
/// of the token's first character (the opening quote for quoted tokens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
    /// Whether the token was written in double quotes.
    pub quoted: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
            quoted: false,
        }
    }

    pub(crate) fn quoted(text: impl Into<String>, position: usize) -> Self {
        Self {
            kind: TokenKind::Value,
            text: text.into(),
            position,
            quoted: true,
        }
    }
}

/// Tokens of one pipeline stage (or one redirect) plus the source text
/// they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub tokens: Vec<Token>,
    /// Position of the first token.
    pub position: usize,
    /// Trimmed substring of the line covering this segment.
    pub text: String,
}

/// Which stream a redirect applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Input,
    Output,
    ErrorOutput,
}

impl RedirectKind {
    /// Human-readable stream name used in error messages.
    pub fn stream_name(&self) -> &'static str {
        match self {
            RedirectKind::Input => "input",
            RedirectKind::Output => "output",
            RedirectKind::ErrorOutput => "error output",
        }
    }
}

/// Where a redirect points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A file path, as written.
    Path(String),
    /// `&1`: the same place as the output redirect.
    SameAsOutput,
    /// `&2`: the same place as the error output redirect.
    SameAsErrorOutput,
    /// The reserved null word: discard output, empty input.
    Null,
}

/// A single redirect as written on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSpec {
    pub kind: RedirectKind,
    pub append: bool,
    pub endpoint: Endpoint,
    /// Position of the operator token.
    pub position: usize,
}

/// Result of tokenizing and grouping one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// Pipeline stages in order.
    pub segments: Vec<Segment>,
    /// Redirects in the order written.
    pub redirects: Vec<RedirectSpec>,
}
