use super::schema::{Schema, Signature};

/// One-line usage for a schema:
/// `name sub -req=<value> [-opt=<value>] [-flag] <req> [<opt>]`.
pub fn synopsis(command: &str, schema: &Schema) -> String {
    let mut parts = vec![command.to_string()];
    if schema.is_subcommand() {
        parts.push(schema.name().to_string());
    }
    for option in schema.required_options() {
        parts.push(format!("-{}=<value>", option.name));
    }
    for option in schema.optional_options() {
        if option.has_value() {
            parts.push(format!("[-{}=<value>]", option.name));
        } else {
            parts.push(format!("[-{}]", option.name));
        }
    }
    for param in schema.required_params() {
        parts.push(format!("<{}>", param.name));
    }
    for param in schema.optional_params() {
        parts.push(format!("[<{}>]", param.name));
    }
    parts.join(" ")
}

fn aligned(rows: &[(String, String)]) -> Vec<String> {
    let width = rows.iter().map(|(n, _)| n.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(name, description)| {
            format!("  {name:<width$}  {description}")
                .trim_end()
                .to_string()
        })
        .collect()
}

fn push_unique(rows: &mut Vec<(String, String)>, name: String, description: &str) {
    if !rows.iter().any(|(n, _)| *n == name) {
        rows.push((name, description.to_string()));
    }
}

/// Full help text for a command: description, usage lines, parameter,
/// option and subcommand listings.
pub fn render(command: &str, description: &str, signature: &Signature) -> String {
    let schemas: Vec<&Schema> = signature
        .root_schema()
        .into_iter()
        .chain(signature.subcommands())
        .collect();

    let mut lines = vec![description.to_string(), String::new(), "Usage:".to_string()];
    for schema in &schemas {
        lines.push(format!("  {}", synopsis(command, schema)));
    }

    let mut params = Vec::new();
    let mut options = Vec::new();
    for schema in &schemas {
        for param in schema.params() {
            push_unique(&mut params, format!("<{}>", param.name), &param.description);
        }
        for option in schema.required_options().chain(schema.optional_options()) {
            push_unique(&mut options, format!("-{}", option.name), &option.description);
        }
    }

    if !params.is_empty() {
        lines.push(String::new());
        lines.push("Parameters:".to_string());
        lines.extend(aligned(&params));
    }
    if !options.is_empty() {
        lines.push(String::new());
        lines.push("Options:".to_string());
        lines.extend(aligned(&options));
    }
    if !signature.subcommands().is_empty() {
        let subs: Vec<(String, String)> = signature
            .subcommands()
            .iter()
            .map(|s| (s.name().to_string(), s.description().to_string()))
            .collect();
        lines.push(String::new());
        lines.push("Subcommands:".to_string());
        lines.extend(aligned(&subs));
    }
    lines.join("\n")
}
