//! Declarative command schemas: positional parameters, options and
//! subcommand variants, each value paired with its own converter.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A converted argument or option value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Turns the raw text of an argument into a typed [`Value`].
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Ready-made converters.
pub mod convert {
    use super::*;

    /// Keep the text as a `String`.
    pub fn text() -> Converter {
        Arc::new(|s: &str| Ok::<Value, String>(Arc::new(s.to_string())))
    }

    /// Parse with [`FromStr`], reporting the parse error text.
    pub fn parsed<T>() -> Converter
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        Arc::new(|s: &str| {
            s.parse::<T>()
                .map(|v| Arc::new(v) as Value)
                .map_err(|e| e.to_string())
        })
    }

    /// Wrap an arbitrary fallible conversion.
    pub fn with<T, F>(f: F) -> Converter
    where
        T: Send + Sync + 'static,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        Arc::new(move |s: &str| f(s).map(|v| Arc::new(v) as Value))
    }
}

/// A positional parameter.
#[derive(Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub(crate) convert: Converter,
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A named option. Flags have no value and bind to `true`.
#[derive(Clone)]
pub struct OptionSpec {
    pub name: String,
    pub description: String,
    pub(crate) convert: Option<Converter>,
}

impl OptionSpec {
    pub fn has_value(&self) -> bool {
        self.convert.is_some()
    }
}

impl fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSpec")
            .field("name", &self.name)
            .field("has_value", &self.has_value())
            .finish_non_exhaustive()
    }
}

/// One argument shape of a command: either the no-subcommand variant
/// (empty name) or a named subcommand.
///
/// Names are stored lowercase. Builder methods panic on declaration
/// mistakes (duplicate names, a required parameter after an optional one),
/// which are programming errors in the command, not user input errors.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    description: String,
    required_params: Vec<ParameterSpec>,
    optional_params: Vec<ParameterSpec>,
    required_options: BTreeMap<String, OptionSpec>,
    optional_options: BTreeMap<String, OptionSpec>,
}

impl Schema {
    pub(crate) const EMPTY: Schema = Schema {
        name: String::new(),
        description: String::new(),
        required_params: Vec::new(),
        optional_params: Vec::new(),
        required_options: BTreeMap::new(),
        optional_options: BTreeMap::new(),
    };

    /// The no-subcommand variant.
    pub fn root() -> Self {
        Self::default()
    }

    /// A named subcommand variant.
    ///
    /// # Panics
    /// If `name` is empty or contains whitespace.
    pub fn subcommand(name: &str, description: &str) -> Self {
        assert!(
            !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control()),
            "invalid subcommand name '{name}'"
        );
        Self {
            name: name.to_lowercase(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    fn assert_new_param(&self, name: &str) {
        assert!(
            !self.params().any(|p| p.name == name),
            "parameter '{name}' declared twice"
        );
    }

    fn assert_new_option(&self, name: &str) {
        assert!(
            !self.required_options.contains_key(name) && !self.optional_options.contains_key(name),
            "option '{name}' declared twice"
        );
    }

    /// Declare a required positional parameter.
    ///
    /// # Panics
    /// If an optional parameter was already declared, or the name is taken.
    pub fn required(mut self, name: &str, description: &str, convert: Converter) -> Self {
        let name = name.to_lowercase();
        assert!(
            self.optional_params.is_empty(),
            "required parameter '{name}' declared after an optional one"
        );
        self.assert_new_param(&name);
        self.required_params.push(ParameterSpec {
            name,
            description: description.to_string(),
            convert,
        });
        self
    }

    /// Declare an optional positional parameter.
    pub fn optional(mut self, name: &str, description: &str, convert: Converter) -> Self {
        let name = name.to_lowercase();
        self.assert_new_param(&name);
        self.optional_params.push(ParameterSpec {
            name,
            description: description.to_string(),
            convert,
        });
        self
    }

    /// Declare an option that must be given with a value.
    pub fn required_option(mut self, name: &str, description: &str, convert: Converter) -> Self {
        let name = name.to_lowercase();
        self.assert_new_option(&name);
        self.required_options.insert(
            name.clone(),
            OptionSpec {
                name,
                description: description.to_string(),
                convert: Some(convert),
            },
        );
        self
    }

    /// Declare an option that may be given with a value.
    pub fn option(mut self, name: &str, description: &str, convert: Converter) -> Self {
        let name = name.to_lowercase();
        self.assert_new_option(&name);
        self.optional_options.insert(
            name.clone(),
            OptionSpec {
                name,
                description: description.to_string(),
                convert: Some(convert),
            },
        );
        self
    }

    /// Declare a value-less flag option.
    pub fn flag(mut self, name: &str, description: &str) -> Self {
        let name = name.to_lowercase();
        self.assert_new_option(&name);
        self.optional_options.insert(
            name.clone(),
            OptionSpec {
                name,
                description: description.to_string(),
                convert: None,
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_subcommand(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn required_params(&self) -> &[ParameterSpec] {
        &self.required_params
    }

    pub fn optional_params(&self) -> &[ParameterSpec] {
        &self.optional_params
    }

    /// All parameters, required first.
    pub fn params(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.required_params.iter().chain(self.optional_params.iter())
    }

    pub fn required_options(&self) -> impl Iterator<Item = &OptionSpec> {
        self.required_options.values()
    }

    pub fn optional_options(&self) -> impl Iterator<Item = &OptionSpec> {
        self.optional_options.values()
    }

    pub(crate) fn required_option_map(&self) -> &BTreeMap<String, OptionSpec> {
        &self.required_options
    }

    pub(crate) fn optional_option_map(&self) -> &BTreeMap<String, OptionSpec> {
        &self.optional_options
    }
}

/// Every schema a command accepts.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    root: Option<Schema>,
    subcommands: Vec<Schema>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the no-subcommand schema.
    ///
    /// # Panics
    /// If one was already set, or `schema` is a named subcommand.
    pub fn root(mut self, schema: Schema) -> Self {
        assert!(!schema.is_subcommand(), "root schema must not have a name");
        assert!(self.root.is_none(), "root schema declared twice");
        self.root = Some(schema);
        self
    }

    /// Add a named subcommand schema.
    ///
    /// # Panics
    /// If the name is already taken.
    pub fn subcommand(mut self, schema: Schema) -> Self {
        assert!(schema.is_subcommand(), "subcommand schema needs a name");
        assert!(
            self.find(schema.name()).is_none(),
            "subcommand '{}' declared twice",
            schema.name()
        );
        self.subcommands.push(schema);
        self
    }

    /// Fill in the implicit empty root when nothing was declared.
    pub fn normalized(mut self) -> Self {
        if self.root.is_none() && self.subcommands.is_empty() {
            self.root = Some(Schema::root());
        }
        self
    }

    pub fn root_schema(&self) -> Option<&Schema> {
        self.root.as_ref()
    }

    pub fn subcommands(&self) -> &[Schema] {
        &self.subcommands
    }

    /// Case-insensitive subcommand lookup.
    pub fn find(&self, name: &str) -> Option<&Schema> {
        self.subcommands
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Ordered, case-insensitive name to value mapping produced by the binder.
#[derive(Clone, Default)]
pub struct ValueSet {
    entries: Vec<(String, Value)>,
}

/// Bound positional arguments.
pub type ArgumentSet = ValueSet;
/// Bound options.
pub type OptionSet = ValueSet;

impl ValueSet {
    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.entries.push((name.to_lowercase(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    /// Names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Typed lookup by name; `None` if absent or of another type.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.raw(name)?.downcast_ref::<T>()
    }

    /// Typed lookup by binding position.
    pub fn get_index<T: Any>(&self, index: usize) -> Option<&T> {
        self.entries.get(index)?.1.downcast_ref::<T>()
    }

    /// Shorthand for values bound with [`convert::text`].
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get::<String>(name).map(String::as_str)
    }

    /// Whether a flag (or any option) was given.
    pub fn is_set(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
