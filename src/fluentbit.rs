use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Section kind of every stage this crate emits
pub const FILTER_KIND: &str = "FILTER";

/// Container field that holds the original record inside a nest/lift envelope
pub const NEST_UNDER: &str = "record";

/// One section of a Fluent Bit pipeline: a kind plus its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub kind: String,
    pub config: BTreeMap<String, String>,
}

impl Stage {
    /// Create a `[FILTER]` stage for the given plugin name and tag
    pub fn filter(name: &str, tag: &str) -> Self {
        let mut config = BTreeMap::new();
        config.insert("Name".to_string(), name.to_string());
        config.insert("Match".to_string(), tag.to_string());
        Stage {
            kind: FILTER_KIND.to_string(),
            config,
        }
    }

    /// Add an option, replacing any previous value for the same key
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Plugin name of the stage (`nest`, `grep`, `modify`, ...)
    pub fn name(&self) -> Option<&str> {
        self.get("Name")
    }

    /// Wrap every top-level field of `tag` records under [`NEST_UNDER`]
    pub fn nest(tag: &str) -> Self {
        Stage::filter("nest", tag)
            .with("Operation", "nest")
            .with("Nest_under", NEST_UNDER)
            .with("Wildcard", "*")
    }

    /// Undo [`Stage::nest`]
    pub fn lift(tag: &str) -> Self {
        Stage::filter("nest", tag)
            .with("Operation", "lift")
            .with("Nested_under", NEST_UNDER)
    }

    pub fn is_nest(&self) -> bool {
        self.name() == Some("nest") && self.get("Operation") == Some("nest")
    }

    pub fn is_lift(&self) -> bool {
        self.name() == Some("nest") && self.get("Operation") == Some("lift")
    }

    /// Render as a classic configuration section.
    ///
    /// `Name` and `Match` come first, the remaining options follow in key order.
    pub fn render(&self) -> String {
        let width = self.config.keys().map(String::len).max().unwrap_or(0);
        let mut out = format!("[{}]\n", self.kind);

        let leading = ["Name", "Match"];
        let ordered = leading
            .iter()
            .filter_map(|k| self.config.get_key_value(*k))
            .chain(
                self.config
                    .iter()
                    .filter(|(k, _)| !leading.contains(&k.as_str())),
            );

        for (key, value) in ordered {
            let _ = writeln!(out, "    {key:<width$} {value}");
        }
        out
    }
}

/// Render a list of stages, separating sections with a blank line
pub fn render_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(Stage::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_and_lift_pair() {
        let nest = Stage::nest("app.log");
        let lift = Stage::lift("app.log");

        assert!(nest.is_nest());
        assert!(!nest.is_lift());
        assert!(lift.is_lift());
        assert_eq!(nest.get("Nest_under"), Some("record"));
        assert_eq!(lift.get("Nested_under"), Some("record"));
        assert_eq!(nest.get("Wildcard"), Some("*"));
        assert_eq!(lift.get("Wildcard"), None);
    }

    #[test]
    fn test_render_puts_name_and_match_first() {
        let stage = Stage::filter("modify", "app.log").with("Remove_wildcard", "__match_app_log");

        assert_eq!(
            stage.render(),
            "[FILTER]\n    Name            modify\n    Match           app.log\n    Remove_wildcard __match_app_log\n"
        );
    }

    #[test]
    fn test_render_stages_separates_sections() {
        let rendered = render_stages(&[Stage::nest("a"), Stage::lift("a")]);
        assert_eq!(rendered.matches("[FILTER]").count(), 2);
        assert!(rendered.contains("\n\n[FILTER]\n"));
    }

    #[test]
    fn test_with_replaces_existing_value() {
        let stage = Stage::filter("grep", "a").with("Regex", "x 1").with("Regex", "y 1");
        assert_eq!(stage.get("Regex"), Some("y 1"));
        assert_eq!(stage.config.len(), 3);
    }
}
