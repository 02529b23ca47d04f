use super::types::{Endpoint, RedirectKind, RedirectSpec};
use crate::error::ParseError;

/// Where the first stage reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(String),
    Null,
}

/// Where the last stage (or the error stream) writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File { path: String, append: bool },
    Null,
}

/// Validated redirects for one line, ready to be opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRedirects {
    pub input: Option<InputSource>,
    pub output: Option<OutputTarget>,
    pub error_output: Option<OutputTarget>,
    /// Output and error output were joined with `&1`/`&2` and must share
    /// one open file handle.
    pub shared: bool,
}

fn concrete(endpoint: &Endpoint, append: bool) -> Option<OutputTarget> {
    match endpoint {
        Endpoint::Path(path) => Some(OutputTarget::File {
            path: path.clone(),
            append,
        }),
        Endpoint::Null => Some(OutputTarget::Null),
        Endpoint::SameAsOutput | Endpoint::SameAsErrorOutput => None,
    }
}

/// Check redirect specs and turn them into open instructions.
///
/// At most one spec per kind. `> &2` and `2> &1` alias the other stream,
/// which must exist, be concrete and agree on append mode. The same path for
/// both streams is only allowed through an alias.
pub fn resolve(specs: &[RedirectSpec]) -> Result<ResolvedRedirects, ParseError> {
    let mut input = None;
    let mut output = None;
    let mut error_output = None;

    for spec in specs {
        let slot = match spec.kind {
            RedirectKind::Input => &mut input,
            RedirectKind::Output => &mut output,
            RedirectKind::ErrorOutput => &mut error_output,
        };
        if slot.is_some() {
            return Err(ParseError::DuplicateRedirect {
                position: spec.position,
            });
        }
        *slot = Some(spec);
    }

    let mut resolved = ResolvedRedirects::default();

    if let Some(spec) = input {
        resolved.input = Some(match &spec.endpoint {
            Endpoint::Path(path) => InputSource::File(path.clone()),
            Endpoint::Null => InputSource::Null,
            Endpoint::SameAsOutput | Endpoint::SameAsErrorOutput => {
                return Err(ParseError::InvalidInputSource {
                    source_text: alias_text(&spec.endpoint).to_string(),
                    position: spec.position,
                });
            }
        });
    }

    if let Some(out) = output
        && out.endpoint == Endpoint::SameAsOutput
    {
        return Err(ParseError::SelfAlias {
            stream: RedirectKind::Output.stream_name(),
            position: out.position,
        });
    }
    if let Some(err) = error_output
        && err.endpoint == Endpoint::SameAsErrorOutput
    {
        return Err(ParseError::SelfAlias {
            stream: RedirectKind::ErrorOutput.stream_name(),
            position: err.position,
        });
    }

    match (output, error_output) {
        (Some(out), Some(err)) if out.endpoint == Endpoint::SameAsErrorOutput => {
            let target = alias_target(out, err)?;
            resolved.output = Some(target.clone());
            resolved.error_output = Some(target);
            resolved.shared = true;
        }
        (Some(out), Some(err)) if err.endpoint == Endpoint::SameAsOutput => {
            let target = alias_target(err, out)?;
            resolved.output = Some(target.clone());
            resolved.error_output = Some(target);
            resolved.shared = true;
        }
        (out, err) => {
            if let Some(spec) = out {
                resolved.output = Some(concrete(&spec.endpoint, spec.append).ok_or(
                    ParseError::MissingAliasTarget {
                        stream: RedirectKind::Output.stream_name(),
                        other: RedirectKind::ErrorOutput.stream_name(),
                        position: spec.position,
                    },
                )?);
            }
            if let Some(spec) = err {
                resolved.error_output = Some(concrete(&spec.endpoint, spec.append).ok_or(
                    ParseError::MissingAliasTarget {
                        stream: RedirectKind::ErrorOutput.stream_name(),
                        other: RedirectKind::Output.stream_name(),
                        position: spec.position,
                    },
                )?);
            }
            if let (
                Some(OutputTarget::File { path: a, .. }),
                Some(OutputTarget::File { path: b, .. }),
                Some(spec),
            ) = (&resolved.output, &resolved.error_output, err)
                && expand(a) == expand(b)
            {
                return Err(ParseError::SameFile {
                    position: spec.position,
                });
            }
        }
    }

    Ok(resolved)
}

/// Resolve `alias` (which points at `target`'s stream) to `target`'s endpoint.
fn alias_target(alias: &RedirectSpec, target: &RedirectSpec) -> Result<OutputTarget, ParseError> {
    let resolved = concrete(&target.endpoint, target.append).ok_or(ParseError::MissingAliasTarget {
        stream: alias.kind.stream_name(),
        other: target.kind.stream_name(),
        position: alias.position,
    })?;
    if alias.append != target.append {
        return Err(ParseError::AppendMismatch {
            position: alias.position,
        });
    }
    Ok(resolved)
}

fn alias_text(endpoint: &Endpoint) -> &'static str {
    match endpoint {
        Endpoint::SameAsOutput => "&1",
        Endpoint::SameAsErrorOutput => "&2",
        _ => "",
    }
}

/// Redirect paths may start with `~`.
pub fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}
