//! `%NAME%` environment-variable expansion applied to each entered line
//! before it is tokenized.

/// Replace every `%NAME%` in `line` with `lookup(NAME)`. Unknown names
/// expand to nothing, `%%` is a literal `%`, and an unterminated `%NAME`
/// at the end of the line is kept as written.
pub fn expand_variables(line: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut name: Option<String> = None;

    for c in line.chars() {
        match (c, name.as_mut()) {
            ('%', None) => name = Some(String::new()),
            ('%', Some(pending)) => {
                if pending.is_empty() {
                    out.push('%');
                } else {
                    out.push_str(&lookup(pending.as_str()).unwrap_or_default());
                }
                name = None;
            }
            (c, Some(pending)) => pending.push(c),
            (c, None) => out.push(c),
        }
    }
    if let Some(pending) = name {
        out.push('%');
        out.push_str(&pending);
    }
    out
}
