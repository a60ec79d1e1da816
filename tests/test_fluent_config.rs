use fluent_filter::filter::{Filter, all_fluent_config};
use regex::Regex;
use std::collections::BTreeMap;

fn named(pairs: &[(&str, &str)]) -> BTreeMap<String, Filter> {
    pairs
        .iter()
        .map(|(name, text)| (name.to_string(), Filter::new(text).expect("valid filter")))
        .collect()
}

fn lua_expr(text: &str, key: &str) -> String {
    Filter::new(text)
        .expect("valid filter")
        .expression()
        .fluent_config("app.log", key)
        .1
}

const CLEANUP_LOOP: &str = r#"
for k, v in pairs(record) do
  if string.match(k, "^__match_.+") then
    record[k] = nil
  end
end
"#;

#[test]
fn test_plain_filters_skip_the_envelope() {
    let filters = named(&[("a", r#"severity = "ERROR""#), ("b", "message:*")]);
    let (stages, lua) = all_fluent_config("app.log", &filters);

    assert!(stages.is_empty());
    assert_eq!(
        lua,
        format!(
            "local a = {}\nlocal b = {}\n",
            lua_expr(r#"severity = "ERROR""#, "__match_0"),
            lua_expr("message:*", "__match_1"),
        )
    );
    assert!(!lua.contains("pairs(record)"));
}

#[test]
fn test_regex_filter_adds_shared_envelope_and_cleanup() {
    let filters = named(&[
        ("a", r#"message =~ "fail""#),
        ("b", r#"path =~ "^/api" AND code >= 500"#),
    ]);
    let (stages, lua) = all_fluent_config("app.log", &filters);

    let names: Vec<_> = stages.iter().filter_map(|s| s.name()).collect();
    assert_eq!(names, vec!["nest", "modify", "modify", "nest"]);
    assert!(stages[0].is_nest());
    assert!(stages[3].is_lift());
    assert_eq!(stages.iter().filter(|s| s.is_nest()).count(), 1);
    assert_eq!(stages.iter().filter(|s| s.is_lift()).count(), 1);

    assert_eq!(stages[1].get("Set"), Some("__match_0 1"));
    assert_eq!(stages[2].get("Set"), Some("__match_1_0 1"));

    assert!(lua.starts_with("local a = (record[\"__match_0\"] ~= nil)\nlocal b = "));
    assert!(lua.ends_with(CLEANUP_LOOP));
}

#[test]
fn test_names_are_visited_in_lexicographic_order() {
    let mut filters = BTreeMap::new();
    filters.insert("zeta".to_string(), Filter::new("z =~ z").unwrap());
    filters.insert("alpha".to_string(), Filter::new("a =~ a").unwrap());
    let (stages, lua) = all_fluent_config("t", &filters);

    assert_eq!(
        stages[1].get("Condition"),
        Some("Key_value_matches $record['a'] a")
    );
    assert_eq!(stages[1].get("Set"), Some("__match_0 1"));
    assert_eq!(stages[2].get("Set"), Some("__match_1 1"));

    let alpha = lua.find("local alpha").unwrap();
    let zeta = lua.find("local zeta").unwrap();
    assert!(alpha < zeta);
}

#[test]
fn test_output_is_reproducible() {
    let pairs = [
        ("errors", r#"severity = ERROR OR message =~ "panic""#),
        ("slow", "latency > 1.5"),
        ("noisy", r#"NOT logger:health"#),
    ];
    assert_eq!(
        all_fluent_config("app", &named(&pairs)),
        all_fluent_config("app", &named(&pairs))
    );
}

#[test]
fn test_cleanup_removes_only_marker_fields() {
    let filters = named(&[("a", "x =~ y")]);
    let (_, lua) = all_fluent_config("app", &filters);

    let pattern = Regex::new(r#"string\.match\(k, "([^"]+)"\)"#)
        .unwrap()
        .captures(&lua)
        .expect("cleanup loop present")[1]
        .to_string();
    let cleanup = Regex::new(&pattern).unwrap();

    for removed in ["__match_0", "__match_12", "__match_0_1_2", "__match_app_log"] {
        assert!(cleanup.is_match(removed), "{removed} should be removed");
    }
    for kept in ["record", "severity", "__match_", "my__match_0", "_match_0"] {
        assert!(!cleanup.is_match(kept), "{kept} should be kept");
    }
}

#[test]
fn test_empty_map_yields_nothing() {
    let (stages, lua) = all_fluent_config("app", &BTreeMap::new());
    assert!(stages.is_empty());
    assert!(lua.is_empty());
}
