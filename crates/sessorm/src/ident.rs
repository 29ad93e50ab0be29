//! Identifier resolution and backtick quoting.
//!
//! Identifiers may carry an alias (`"users AS u"` or `"users u"`) and may be
//! dotted (`"u.id"`). Every dot segment is quoted separately; `*` is never
//! quoted.
//!
//! # Example
//! ```ignore
//! use sessorm::ident::{quote_identifier, resolve_identifier};
//!
//! assert_eq!(resolve_identifier("tb2 AS t2"), ("tb2".into(), "t2".into()));
//! assert_eq!(quote_identifier("t.*"), "`t`.*");
//! assert_eq!(quote_identifier("tb2 AS t2"), "`tb2` AS `t2`");
//! ```

/// Split an identifier into `(name, alias)`.
///
/// - `"name AS alias"` (keyword matched case-insensitively)
/// - `"name alias"` (split on the first space)
/// - `"name"`: alias equals name
pub fn resolve_identifier(identifier: &str) -> (String, String) {
    let identifier = identifier.trim();

    // ASCII lowercasing keeps byte offsets aligned with the input.
    let lowered = identifier.to_ascii_lowercase();
    if let Some(pos) = lowered.find(" as ") {
        let name = identifier[..pos].trim();
        let alias = identifier[pos + 4..].trim();
        return (name.to_string(), alias.to_string());
    }

    if let Some((name, alias)) = identifier.split_once(' ') {
        return (name.trim().to_string(), alias.trim().to_string());
    }

    (identifier.to_string(), identifier.to_string())
}

/// Quote a single segment. `*` and already-quoted segments pass through.
pub fn quote_segment(segment: &str) -> String {
    let segment = segment.trim();
    if segment == "*" {
        return segment.to_string();
    }
    if segment.len() >= 2 && segment.starts_with('`') && segment.ends_with('`') {
        return segment.to_string();
    }
    format!("`{segment}`")
}

/// Quote each dot segment of a (possibly qualified) name.
pub fn quote_dotted(name: &str) -> String {
    name.split('.')
        .map(quote_segment)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote an identifier, rendering an alias as `` `name` AS `alias` ``.
pub fn quote_identifier(identifier: &str) -> String {
    let (name, alias) = resolve_identifier(identifier);
    let quoted = quote_dotted(&name);
    if alias == name {
        quoted
    } else {
        format!("{quoted} AS {}", quote_segment(&alias))
    }
}

/// Quote a table reference for FROM / JOIN / UPDATE / INSERT positions.
pub fn quote_table(table: &str) -> String {
    quote_identifier(table)
}

/// The name that qualifies columns of `table`: its alias if it has one.
pub fn table_alias(table: &str) -> String {
    resolve_identifier(table).1
}
