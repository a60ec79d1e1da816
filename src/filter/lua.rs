//! Helpers for assembling Lua script text.

use std::fmt::Write;

/// Quote a string as a double-quoted Lua string literal.
pub fn lua_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\{:03}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Lua expression reading a (possibly nested) field of `record`.
///
/// Nested lookups yield `nil` as soon as an intermediate value is not a table.
pub fn field_accessor(path: &[String]) -> String {
    match path {
        [single] => format!("record[{}]", lua_quote(single)),
        _ => {
            let keys = path
                .iter()
                .map(|segment| lua_quote(segment))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "(function(v) for _, k in ipairs({{{keys}}}) do if type(v) ~= \"table\" then return nil end v = v[k] end return v end)(record)"
            )
        }
    }
}

/// Lua expression that is true when the marker field `key` is set.
pub fn marker_is_set(key: &str) -> String {
    format!("(record[{}] ~= nil)", lua_quote(key))
}

/// Lua expression that is true when the marker field `key` is absent.
pub fn marker_is_unset(key: &str) -> String {
    format!("(record[{}] == nil)", lua_quote(key))
}
