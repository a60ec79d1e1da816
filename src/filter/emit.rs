//! Wraps compiled filters into complete stage lists.
//!
//! Stages run inside a shared envelope: the record is nested under a
//! container field, marker fields are set next to it, a `grep` keeps or drops
//! records by marker, the markers are removed, and the record is lifted back.

use super::Filter;
use crate::fluentbit::Stage;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::LazyLock;

/// Prefix of every marker field this crate sets on a record
pub const MATCH_PREFIX: &str = "__match_";

static NON_ALPHANUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid non-alphanumeric regex"));

/// Lua loop deleting every marker field left on the record
const CLEANUP_LUA: &str = r#"
for k, v in pairs(record) do
  if string.match(k, "^__match_.+") then
    record[k] = nil
  end
end
"#;

/// Marker field used for all filters compiled together for `tag`
pub fn tag_match_key(tag: &str) -> String {
    format!("{MATCH_PREFIX}{}", NON_ALPHANUMERIC_RE.replace_all(tag, "_"))
}

/// Stage list for a set of filters sharing one nest/grep/lift envelope.
///
/// Every filter sets the same marker when it matches, each under its own
/// scope for intermediate markers. With `exclude` set, records matching any
/// filter are dropped; otherwise only matching records are kept. An empty
/// filter list still yields the envelope.
pub fn all_components(tag: &str, filters: &[Filter], exclude: bool) -> Vec<Stage> {
    let parity = if exclude { "Exclude" } else { "Regex" };
    let key = tag_match_key(tag);

    let mut stages = vec![Stage::nest(tag)];
    for (i, filter) in filters.iter().enumerate() {
        stages.extend(filter.inner_components(tag, &key, &format!("{key}_{i}")));
    }
    stages.push(Stage::filter("grep", tag).with(parity, format!("{key} 1")));
    stages.push(Stage::filter("modify", tag).with("Remove_wildcard", key.as_str()));
    stages.push(Stage::lift(tag));

    log::debug!(
        "compiled {} filter(s) for tag {tag} into {} stages ({parity})",
        filters.len(),
        stages.len()
    );
    stages
}

/// Stages (if any) and Lua code setting one boolean local per named filter.
///
/// Names are visited in key order, so the positional marker `__match_<i>` of
/// each filter is stable across runs.
pub fn all_fluent_config(tag: &str, filters: &BTreeMap<String, Filter>) -> (Vec<Stage>, String) {
    let mut inner = Vec::new();
    let mut lua = String::new();

    for (i, (name, filter)) in filters.iter().enumerate() {
        let key = format!("{MATCH_PREFIX}{i}");
        let (stages, expr) = filter.inner_fluent_config(tag, &key);
        inner.extend(stages);
        let _ = writeln!(lua, "local {name} = {expr}");
    }

    if inner.is_empty() {
        log::debug!(
            "{} named filter(s) for tag {tag} need no stages",
            filters.len()
        );
        return (Vec::new(), lua);
    }

    let mut stages = Vec::with_capacity(inner.len() + 2);
    stages.push(Stage::nest(tag));
    stages.extend(inner);
    stages.push(Stage::lift(tag));
    lua.push_str(CLEANUP_LUA);

    log::debug!(
        "{} named filter(s) for tag {tag} compiled into {} stages",
        filters.len(),
        stages.len()
    );
    (stages, lua)
}
