//! LaTeX escaping for untrusted text fields.

use minijinja::Value;

/// Applied top to bottom. Backslash goes first so the backslashes introduced by
/// later replacements are not escaped again; caret goes last because its
/// replacement introduces braces.
const REPLACEMENTS: [(char, &str); 10] = [
    ('\\', r"\textbackslash "),
    ('&', r"\&"),
    ('%', r"\%"),
    ('$', r"\$"),
    ('#', r"\#"),
    ('_', r"\_"),
    ('{', r"\{"),
    ('}', r"\}"),
    ('~', r"\textasciitilde "),
    ('^', r"\^{}"),
];

/// Escapes LaTeX-significant characters. `None` yields the empty string.
pub fn escape(value: Option<&str>) -> String {
    let Some(text) = value else {
        return String::new();
    };

    REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (raw, escaped)| {
            if acc.contains(*raw) {
                acc.replace(*raw, escaped)
            } else {
                acc
            }
        })
}

/// Escapes a template value. None and undefined become empty; everything else is
/// coerced to text first.
pub fn escape_value(value: &Value) -> String {
    if value.is_none() || value.is_undefined() {
        return String::new();
    }
    match value.as_str() {
        Some(s) => escape(Some(s)),
        None => escape(Some(&value.to_string())),
    }
}
