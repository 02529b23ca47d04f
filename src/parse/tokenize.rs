use super::types::{CommandLine, Endpoint, RedirectKind, RedirectSpec, Segment, Token, TokenKind};
use crate::error::ParseError;

/// Lexer state. The digit and redirect states are one-character lookaheads
/// for the multi-character operators `1>`, `1>>`, `2>`, `2>>`, `>>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Unquoted,
    Quoted,
    /// Inside a quoted token, just saw `"`: either `""` or the closing quote.
    QuotedPendingQuote,
    /// A token that started with `1` or `2`.
    Digit,
    /// Saw `1>` or `2>`.
    DigitRedirect,
    /// Saw `>`.
    Redirect,
}

/// Whether the current character was consumed or must be fed again in the
/// new state.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Consumed,
    Reprocess,
}

#[derive(Debug)]
struct Lexer {
    state: State,
    buf: String,
    start: usize,
    tokens: Vec<Token>,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_control()
}

fn is_operator(c: char) -> bool {
    matches!(c, '=' | '|' | '<' | '>')
}

impl Lexer {
    fn new() -> Self {
        Self {
            state: State::Normal,
            buf: String::new(),
            start: 0,
            tokens: Vec::new(),
        }
    }

    fn begin(&mut self, state: State, c: Option<char>, pos: usize) {
        self.state = state;
        self.start = pos;
        self.buf.clear();
        if let Some(c) = c {
            self.buf.push(c);
        }
    }

    fn emit(&mut self, kind: TokenKind) {
        let text = std::mem::take(&mut self.buf);
        self.tokens.push(Token::new(kind, text, self.start));
        self.state = State::Normal;
    }

    fn emit_word(&mut self) {
        let kind = if self.buf.starts_with('-') || self.buf.starts_with('/') {
            TokenKind::OptionName
        } else {
            TokenKind::Value
        };
        self.emit(kind);
    }

    fn emit_quoted(&mut self) {
        let text = std::mem::take(&mut self.buf);
        self.tokens.push(Token::quoted(text, self.start));
        self.state = State::Normal;
    }

    fn step(&mut self, c: char, pos: usize) -> Result<Step, ParseError> {
        match self.state {
            State::Normal => {
                match c {
                    c if is_separator(c) => {}
                    '"' => self.begin(State::Quoted, None, pos),
                    '=' => self.tokens.push(Token::new(TokenKind::EqualSign, "=", pos)),
                    '|' => self.tokens.push(Token::new(TokenKind::Pipe, "|", pos)),
                    '<' => self.tokens.push(Token::new(TokenKind::Redirect, "<", pos)),
                    '>' => self.begin(State::Redirect, Some('>'), pos),
                    '1' | '2' => self.begin(State::Digit, Some(c), pos),
                    _ => self.begin(State::Unquoted, Some(c), pos),
                }
                Ok(Step::Consumed)
            }
            State::Unquoted => {
                if is_separator(c) {
                    self.emit_word();
                    Ok(Step::Consumed)
                } else if c == '"' {
                    Err(ParseError::StrayQuote { position: pos })
                } else if is_operator(c) {
                    self.emit_word();
                    Ok(Step::Reprocess)
                } else {
                    self.buf.push(c);
                    Ok(Step::Consumed)
                }
            }
            State::Quoted => {
                if c == '"' {
                    self.state = State::QuotedPendingQuote;
                } else {
                    self.buf.push(c);
                }
                Ok(Step::Consumed)
            }
            State::QuotedPendingQuote => {
                if c == '"' {
                    self.buf.push('"');
                    self.state = State::Quoted;
                    Ok(Step::Consumed)
                } else {
                    self.emit_quoted();
                    Ok(Step::Reprocess)
                }
            }
            State::Digit => {
                if c == '>' {
                    self.buf.push('>');
                    self.state = State::DigitRedirect;
                    Ok(Step::Consumed)
                } else {
                    // plain word that happens to start with a digit
                    self.state = State::Unquoted;
                    Ok(Step::Reprocess)
                }
            }
            State::DigitRedirect | State::Redirect => {
                if c == '>' {
                    self.buf.push('>');
                    self.emit(TokenKind::Redirect);
                    Ok(Step::Consumed)
                } else {
                    self.emit(TokenKind::Redirect);
                    Ok(Step::Reprocess)
                }
            }
        }
    }

    fn finish(mut self) -> Result<Vec<Token>, ParseError> {
        match self.state {
            State::Normal => {}
            State::Unquoted | State::Digit => self.emit_word(),
            State::Quoted => {
                return Err(ParseError::UnterminatedQuote {
                    token: format!("\"{}", self.buf),
                    position: self.start,
                });
            }
            State::QuotedPendingQuote => self.emit_quoted(),
            State::DigitRedirect | State::Redirect => self.emit(TokenKind::Redirect),
        }
        Ok(self.tokens)
    }
}

/// Split one line into positioned tokens.
///
/// Positions are 1-based character offsets. A blank line is an error.
pub fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let chars: Vec<char> = line.chars().collect();
    let mut lexer = Lexer::new();
    let mut i = 0;
    while i < chars.len() {
        if lexer.step(chars[i], i + 1)? == Step::Consumed {
            i += 1;
        }
    }
    lexer.finish()
}

/// Group tokens into pipeline segments and redirect specs.
///
/// Redirects must follow every piped segment. Each redirect operator takes
/// exactly one following word; an unquoted `null_word` becomes
/// [`Endpoint::Null`], unquoted `&1`/`&2` become aliases.
pub fn group(line: &str, tokens: Vec<Token>, null_word: &str) -> Result<CommandLine, ParseError> {
    let mut stages: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut redirect_groups: Vec<Vec<Token>> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::Pipe => {
                if !redirect_groups.is_empty() {
                    return Err(ParseError::RedirectBeforeCommand {
                        token: token.text,
                        position: token.position,
                    });
                }
                if !current.is_empty() {
                    stages.push(std::mem::take(&mut current));
                }
            }
            TokenKind::Redirect => redirect_groups.push(vec![token]),
            _ => match redirect_groups.last_mut() {
                Some(group) => group.push(token),
                None => current.push(token),
            },
        }
    }
    if !current.is_empty() {
        stages.push(current);
    }

    let chars: Vec<char> = line.chars().collect();
    let first_redirect = redirect_groups.first().map(|g| g[0].position);
    let mut segments = Vec::with_capacity(stages.len());
    for (i, tokens) in stages.iter().enumerate() {
        let start = tokens[0].position;
        let end = stages
            .get(i + 1)
            .map(|next| next[0].position)
            .or(first_redirect)
            .unwrap_or(chars.len() + 1);
        segments.push(Segment {
            position: start,
            text: source_text(&chars, start, end),
            tokens: tokens.clone(),
        });
    }

    let redirects = redirect_groups
        .into_iter()
        .map(|group| redirect_spec(group, null_word))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "grouped line into {} segment(s) and {} redirect(s)",
        segments.len(),
        redirects.len()
    );
    Ok(CommandLine {
        segments,
        redirects,
    })
}

/// Trimmed text from `start` up to (not including) `end`, both 1-based.
/// Pipe characters between stages are dropped.
fn source_text(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len() + 1);
    let text: String = chars[start - 1..end - 1].iter().collect();
    text.trim().trim_end_matches('|').trim_end().to_string()
}

fn redirect_spec(group: Vec<Token>, null_word: &str) -> Result<RedirectSpec, ParseError> {
    let operator = &group[0];
    if let Some(extra) = group.get(2) {
        return Err(ParseError::ExtraRedirectTarget {
            operator: operator.text.clone(),
            token: extra.text.clone(),
            position: extra.position,
        });
    }
    let target = match group.get(1) {
        Some(t) if matches!(t.kind, TokenKind::Value | TokenKind::OptionName) => t,
        _ => {
            return Err(ParseError::MissingRedirectTarget {
                operator: operator.text.clone(),
                position: operator.position,
            });
        }
    };

    let (kind, append) = match operator.text.as_str() {
        "<" => (RedirectKind::Input, false),
        ">" | "1>" => (RedirectKind::Output, false),
        ">>" | "1>>" => (RedirectKind::Output, true),
        "2>" => (RedirectKind::ErrorOutput, false),
        "2>>" => (RedirectKind::ErrorOutput, true),
        _ => {
            return Err(ParseError::UnexpectedToken {
                token: operator.text.clone(),
                position: operator.position,
            });
        }
    };

    let endpoint = if target.quoted {
        if target.text.is_empty() {
            return Err(ParseError::EmptyRedirectTarget {
                operator: operator.text.clone(),
                position: operator.position,
            });
        }
        Endpoint::Path(target.text.clone())
    } else if target.text.eq_ignore_ascii_case(null_word) {
        Endpoint::Null
    } else if target.text == "&1" {
        Endpoint::SameAsOutput
    } else if target.text == "&2" {
        Endpoint::SameAsErrorOutput
    } else if target.text.starts_with('&') {
        return Err(ParseError::UnknownAlias {
            target: target.text.clone(),
            position: target.position,
        });
    } else {
        Endpoint::Path(target.text.clone())
    };

    Ok(RedirectSpec {
        kind,
        append,
        endpoint,
        position: operator.position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<(TokenKind, String, usize)> {
        tokenize(line)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text, t.position))
            .collect()
    }

    fn v(text: &str, pos: usize) -> (TokenKind, String, usize) {
        (TokenKind::Value, text.to_string(), pos)
    }

    fn r(text: &str, pos: usize) -> (TokenKind, String, usize) {
        (TokenKind::Redirect, text.to_string(), pos)
    }

    #[test]
    fn empty_line_rejected() {
        assert_eq!(tokenize("   "), Err(ParseError::EmptyLine));
        assert_eq!(tokenize(""), Err(ParseError::EmptyLine));
    }

    #[test]
    fn simple_words() {
        assert_eq!(toks("A  BC d"), vec![v("A", 1), v("BC", 4), v("d", 7)]);
    }

    #[test]
    fn quoted_option_value() {
        assert_eq!(
            toks(r#"A -B="C D""#),
            vec![
                v("A", 1),
                (TokenKind::OptionName, "-B".into(), 3),
                (TokenKind::EqualSign, "=".into(), 5),
                v("C D", 6),
            ]
        );
    }

    #[test]
    fn slash_option_with_spaced_equals() {
        assert_eq!(
            toks("A /B = C"),
            vec![
                v("A", 1),
                (TokenKind::OptionName, "/B".into(), 3),
                (TokenKind::EqualSign, "=".into(), 6),
                v("C", 8),
            ]
        );
    }

    #[test]
    fn lone_dash_is_option_name() {
        assert_eq!(toks("A - B")[1], (TokenKind::OptionName, "-".into(), 3));
    }

    #[test]
    fn quoted_dash_is_value() {
        assert_eq!(toks(r#"A "-B""#)[1], v("-B", 3));
    }

    #[test]
    fn doubled_quote_is_literal() {
        assert_eq!(toks(r#"say "a ""b"" c""#)[1], v(r#"a "b" c"#, 5));
    }

    #[test]
    fn empty_quoted_token_kept() {
        let tokens = tokenize(r#"A """#).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "");
        assert!(tokens[1].quoted);
    }

    #[test]
    fn digit_inside_word_is_not_redirect() {
        assert_eq!(toks("A1>X"), vec![v("A1", 1), r(">", 3), v("X", 4)]);
    }

    #[test]
    fn other_digit_not_redirect() {
        assert_eq!(toks("A 3>X"), vec![v("A", 1), v("3", 3), r(">", 4), v("X", 5)]);
    }

    #[test]
    fn error_redirect_operator() {
        assert_eq!(toks("A 2>X"), vec![v("A", 1), r("2>", 3), v("X", 5)]);
        assert_eq!(toks("A 2>>X"), vec![v("A", 1), r("2>>", 3), v("X", 6)]);
        assert_eq!(toks("A 1>> X"), vec![v("A", 1), r("1>>", 3), v("X", 7)]);
    }

    #[test]
    fn plain_digits_are_values() {
        assert_eq!(toks("A 1 22"), vec![v("A", 1), v("1", 3), v("22", 5)]);
        assert_eq!(toks("A 2"), vec![v("A", 1), v("2", 3)]);
    }

    #[test]
    fn digit_then_pipe() {
        assert_eq!(
            toks("A 1|B"),
            vec![
                v("A", 1),
                v("1", 3),
                (TokenKind::Pipe, "|".into(), 4),
                v("B", 5)
            ]
        );
    }

    #[test]
    fn append_and_input_redirects() {
        assert_eq!(
            toks("A>>out <in"),
            vec![v("A", 1), r(">>", 2), v("out", 4), r("<", 8), v("in", 9)]
        );
    }

    #[test]
    fn stray_quote_in_word() {
        assert_eq!(
            tokenize(r#"ab"c""#),
            Err(ParseError::StrayQuote { position: 3 })
        );
    }

    #[test]
    fn unterminated_quote() {
        assert_eq!(
            tokenize(r#"A "bc"#),
            Err(ParseError::UnterminatedQuote {
                token: "\"bc".into(),
                position: 3
            })
        );
    }

    #[test]
    fn control_characters_separate() {
        assert_eq!(toks("A\tB"), vec![v("A", 1), v("B", 3)]);
    }

    #[test]
    fn positions_match_offsets() {
        let line = r#"cmd -a=1 "x y" | next > "o f""#;
        let chars: Vec<char> = line.chars().collect();
        for token in tokenize(line).unwrap() {
            let c = chars[token.position - 1];
            if token.quoted {
                assert_eq!(c, '"');
            } else {
                assert_eq!(Some(c), token.text.chars().next());
            }
        }
    }

    // ── Grouping ──

    fn parsed(line: &str) -> Result<CommandLine, ParseError> {
        group(line, tokenize(line)?, "null")
    }

    #[test]
    fn pipe_and_output_redirect() {
        let line = parsed("cmd1 | cmd2 > out.txt").unwrap();
        assert_eq!(line.segments.len(), 2);
        assert_eq!(line.segments[0].text, "cmd1");
        assert_eq!(line.segments[1].text, "cmd2");
        assert_eq!(line.segments[1].position, 8);
        assert_eq!(
            line.redirects,
            vec![RedirectSpec {
                kind: RedirectKind::Output,
                append: false,
                endpoint: Endpoint::Path("out.txt".into()),
                position: 13,
            }]
        );
    }

    #[test]
    fn segment_text_keeps_quotes() {
        let line = parsed(r#"echo "a | b"|rev"#).unwrap();
        assert_eq!(line.segments[0].text, r#"echo "a | b""#);
        assert_eq!(line.segments[1].text, "rev");
    }

    #[test]
    fn only_pipes_yield_no_segments() {
        assert!(parsed("|").unwrap().segments.is_empty());
        assert!(parsed("||").unwrap().segments.is_empty());
        assert!(parsed(" | ").unwrap().segments.is_empty());
    }

    #[test]
    fn leading_and_trailing_pipes_ignored() {
        let line = parsed("|A|").unwrap();
        assert_eq!(line.segments.len(), 1);
        assert_eq!(line.segments[0].tokens[0].position, 2);
        assert_eq!(line.segments[0].text, "A");
    }

    #[test]
    fn pipe_after_redirect_rejected() {
        assert_eq!(
            parsed("A>X|B"),
            Err(ParseError::RedirectBeforeCommand {
                token: "|".into(),
                position: 4
            })
        );
    }

    #[test]
    fn redirect_needs_target() {
        assert_eq!(
            parsed("A >"),
            Err(ParseError::MissingRedirectTarget {
                operator: ">".into(),
                position: 3
            })
        );
        assert!(matches!(
            parsed("A > ="),
            Err(ParseError::MissingRedirectTarget { .. })
        ));
    }

    #[test]
    fn redirect_single_target() {
        assert_eq!(
            parsed("A > B C"),
            Err(ParseError::ExtraRedirectTarget {
                operator: ">".into(),
                token: "C".into(),
                position: 7
            })
        );
    }

    #[test]
    fn null_word_and_aliases() {
        let line = parsed(r#"A > null 2> &1 < "null""#).unwrap();
        assert_eq!(line.redirects[0].endpoint, Endpoint::Null);
        assert_eq!(line.redirects[1].endpoint, Endpoint::SameAsOutput);
        assert_eq!(line.redirects[1].kind, RedirectKind::ErrorOutput);
        assert_eq!(line.redirects[2].endpoint, Endpoint::Path("null".into()));
    }

    #[test]
    fn absolute_path_target() {
        let line = parsed("A > /tmp/out.txt").unwrap();
        assert_eq!(
            line.redirects[0].endpoint,
            Endpoint::Path("/tmp/out.txt".into())
        );
    }

    #[test]
    fn unknown_alias_rejected() {
        assert!(matches!(
            parsed("A > &3"),
            Err(ParseError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn empty_quoted_target_rejected() {
        assert!(matches!(
            parsed(r#"A > """#),
            Err(ParseError::EmptyRedirectTarget { .. })
        ));
    }
}
