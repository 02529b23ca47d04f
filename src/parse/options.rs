use super::types::{Token, TokenKind};
use crate::error::ParseError;

/// An option as written: name without its leading `-`/`/`, and the value
/// when written as `-name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub name: String,
    pub value: Option<String>,
    pub position: usize,
}

/// A stage's words after the command name, split into positional values
/// and options. Not yet checked against any schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArguments {
    pub positional: Vec<String>,
    pub options: Vec<RawOption>,
}

impl RawArguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.options.is_empty()
    }
}

/// Split a segment's tokens into positional values and options, skipping
/// the first token (the command name).
pub fn split_arguments(tokens: &[Token]) -> Result<RawArguments, ParseError> {
    let mut raw = RawArguments::default();
    let mut i = 1;

    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Value => {
                raw.positional.push(token.text.clone());
                i += 1;
            }
            TokenKind::OptionName => {
                if token.text.chars().count() == 1 {
                    return Err(unexpected(token));
                }
                let name: String = token.text.chars().skip(1).collect();
                if raw
                    .options
                    .iter()
                    .any(|o| o.name.eq_ignore_ascii_case(&name))
                {
                    return Err(ParseError::DuplicateOption {
                        token: token.text.clone(),
                        position: token.position,
                    });
                }

                let value = match tokens.get(i + 1) {
                    Some(eq) if eq.kind == TokenKind::EqualSign => match tokens.get(i + 2) {
                        Some(v) if matches!(v.kind, TokenKind::Value | TokenKind::OptionName) => {
                            i += 3;
                            Some(v.text.clone())
                        }
                        _ => return Err(unexpected(eq)),
                    },
                    _ => {
                        i += 1;
                        None
                    }
                };
                raw.options.push(RawOption {
                    name,
                    value,
                    position: token.position,
                });
            }
            TokenKind::EqualSign | TokenKind::Pipe | TokenKind::Redirect => {
                return Err(unexpected(token));
            }
        }
    }

    Ok(raw)
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.text.clone(),
        position: token.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::tokenize::tokenize;

    fn split(line: &str) -> Result<RawArguments, ParseError> {
        split_arguments(&tokenize(line).unwrap())
    }

    #[test]
    fn positional_and_flags() {
        let raw = split("cmd a -f b /g").unwrap();
        assert_eq!(raw.positional, vec!["a", "b"]);
        assert_eq!(raw.options.len(), 2);
        assert_eq!(raw.options[0].name, "f");
        assert_eq!(raw.options[0].value, None);
        assert_eq!(raw.options[1].name, "g");
    }

    #[test]
    fn valued_option_with_spaces() {
        let raw = split("cmd /name = value").unwrap();
        assert_eq!(raw.options[0].name, "name");
        assert_eq!(raw.options[0].value.as_deref(), Some("value"));
        assert!(raw.positional.is_empty());
    }

    #[test]
    fn negative_number_as_value() {
        let raw = split("cmd -n=-5").unwrap();
        assert_eq!(raw.options[0].value.as_deref(), Some("-5"));
    }

    #[test]
    fn dangling_equals() {
        assert_eq!(
            split("cmd -x ="),
            Err(ParseError::UnexpectedToken {
                token: "=".into(),
                position: 8
            })
        );
    }

    #[test]
    fn stray_equals() {
        assert_eq!(
            split("cmd a = b"),
            Err(ParseError::UnexpectedToken {
                token: "=".into(),
                position: 7
            })
        );
    }

    #[test]
    fn lone_dash_rejected() {
        assert_eq!(
            split("cmd - b"),
            Err(ParseError::UnexpectedToken {
                token: "-".into(),
                position: 5
            })
        );
    }

    #[test]
    fn duplicate_option_rejected() {
        assert!(matches!(
            split("cmd -a /A"),
            Err(ParseError::DuplicateOption { .. })
        ));
    }

    #[test]
    fn command_name_skipped() {
        assert!(split("-cmd").unwrap().is_empty());
    }
}
