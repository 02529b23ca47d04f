//! Match a stage's raw arguments against a command's [`Signature`].

use std::collections::BTreeMap;
use std::sync::Arc;

use super::schema::{ArgumentSet, OptionSet, OptionSpec, Schema, Signature, Value};
use crate::error::BindError;
use crate::parse::{RawArguments, RawOption};

/// Outcome of binding: the selected schema and the typed values.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Lowercase name of the selected subcommand, `None` for the root schema.
    pub subcommand: Option<String>,
    pub arguments: ArgumentSet,
    pub options: OptionSet,
}

impl Binding {
    /// The schema this binding was produced from.
    pub fn schema<'a>(&self, signature: &'a Signature) -> &'a Schema {
        let found = match &self.subcommand {
            Some(name) => signature.find(name),
            None => signature.root_schema(),
        };
        found.unwrap_or(&EMPTY_ROOT)
    }
}

/// Pick the schema for these arguments. A leading positional matching a
/// subcommand name selects it and is consumed.
fn select<'s>(
    signature: &'s Signature,
    mut raw: RawArguments,
) -> Result<(&'s Schema, RawArguments), BindError> {
    if !signature.subcommands().is_empty() {
        if let Some(schema) = raw.positional.first().and_then(|first| signature.find(first)) {
            raw.positional.remove(0);
            return Ok((schema, raw));
        }
        if signature.root_schema().is_none() {
            return match raw.positional.first() {
                None => Err(BindError::MissingSubcommand),
                Some(name) => Err(BindError::UnknownSubcommand {
                    name: name.clone(),
                    listing: subcommand_listing(signature),
                }),
            };
        }
    }

    match signature.root_schema() {
        Some(root) => Ok((root, raw)),
        // a signature with neither root nor subcommands acts as an empty root
        None => Ok((&EMPTY_ROOT, raw)),
    }
}

static EMPTY_ROOT: Schema = Schema::EMPTY;

/// Aligned `name  description` lines for every subcommand.
pub fn subcommand_listing(signature: &Signature) -> String {
    let width = signature
        .subcommands()
        .iter()
        .map(|s| s.name().len())
        .max()
        .unwrap_or(0);
    signature
        .subcommands()
        .iter()
        .map(|s| format!("  {:<width$}  {}", s.name(), s.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bind raw arguments to the signature's matching schema.
pub fn bind(signature: &Signature, raw: RawArguments) -> Result<Binding, BindError> {
    let (schema, raw) = select(signature, raw)?;
    let subcommand = schema.is_subcommand().then(|| schema.name().to_string());

    let arguments = bind_arguments(schema, &subcommand, &raw.positional)?;
    let options = bind_options(schema, &subcommand, raw.options)?;

    log::debug!(
        "bound {} argument(s) and {} option(s) to schema '{}'",
        arguments.len(),
        options.len(),
        schema.name()
    );
    Ok(Binding {
        subcommand,
        arguments,
        options,
    })
}

fn bind_arguments(
    schema: &Schema,
    subcommand: &Option<String>,
    positional: &[String],
) -> Result<ArgumentSet, BindError> {
    let required = schema.required_params().len();
    let optional = schema.optional_params().len();

    if positional.len() < required {
        return Err(BindError::MissingArguments {
            subcommand: subcommand.clone(),
            count: required - positional.len(),
        });
    }
    if positional.len() > required + optional {
        return Err(BindError::TooManyArguments {
            subcommand: subcommand.clone(),
            count: positional.len() - required - optional,
        });
    }

    let mut arguments = ArgumentSet::default();
    for (param, text) in schema.params().zip(positional) {
        let value = (param.convert)(text).map_err(|message| BindError::Conversion {
            name: param.name.clone(),
            message,
        })?;
        arguments.insert(&param.name, value);
    }
    Ok(arguments)
}

fn bind_options(
    schema: &Schema,
    subcommand: &Option<String>,
    given: Vec<RawOption>,
) -> Result<OptionSet, BindError> {
    let mut remaining: BTreeMap<String, RawOption> = given
        .into_iter()
        .map(|o| (o.name.to_lowercase(), o))
        .collect();
    let mut options = OptionSet::default();

    for (name, spec) in schema.required_option_map() {
        let Some(raw) = remaining.remove(name) else {
            return Err(BindError::MissingOption {
                subcommand: subcommand.clone(),
                name: name.clone(),
            });
        };
        options.insert(name, convert_option(spec, subcommand, raw)?);
    }

    for (name, spec) in schema.optional_option_map() {
        if let Some(raw) = remaining.remove(name) {
            options.insert(name, convert_option(spec, subcommand, raw)?);
        }
    }

    if let Some(unexpected) = remaining.into_values().min_by_key(|o| o.position) {
        return Err(BindError::UnexpectedOption {
            subcommand: subcommand.clone(),
            name: unexpected.name,
        });
    }
    Ok(options)
}

fn convert_option(
    spec: &OptionSpec,
    subcommand: &Option<String>,
    raw: RawOption,
) -> Result<Value, BindError> {
    match (&spec.convert, raw.value) {
        (Some(convert), Some(text)) => convert(&text).map_err(|message| BindError::Conversion {
            name: format!("-{}", spec.name),
            message,
        }),
        (Some(_), None) => Err(BindError::MissingValue {
            subcommand: subcommand.clone(),
            name: spec.name.clone(),
        }),
        (None, Some(_)) => Err(BindError::UnexpectedValue {
            subcommand: subcommand.clone(),
            name: spec.name.clone(),
        }),
        (None, None) => Ok(Arc::new(true)),
    }
}
