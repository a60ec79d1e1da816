use fluent_filter::config::{ConfigError, load_config_from_path};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_job_config() {
    let file = write_config(
        r#"
tag = "app.log"
exclude = true

[filters]
errors = 'severity = "ERROR"'
slow = "latency > 2"
"#,
    );

    let config = load_config_from_path(file.path()).expect("valid config");
    assert_eq!(config.tag, "app.log");
    assert!(config.exclude);
    assert_eq!(config.filters.len(), 2);

    let filters = config.compile_filters().expect("valid filters");
    let names: Vec<_> = filters.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["errors", "slow"]);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = load_config_from_path(std::path::Path::new("/nonexistent/job.toml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let file = write_config("tag = [unclosed");
    let err = load_config_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_filter_names_must_be_lua_identifiers() {
    let file = write_config(
        r#"
[filters]
"not-valid" = "a = 1"
"#,
    );
    let config = load_config_from_path(file.path()).unwrap();
    assert!(matches!(
        config.compile_filters(),
        Err(ConfigError::InvalidName(name)) if name == "not-valid"
    ));
}

#[test]
fn test_invalid_filter_reports_its_name() {
    let file = write_config(
        r#"
[filters]
broken = "a = (b"
bare = "jsonPayload.message"
"#,
    );
    let config = load_config_from_path(file.path()).unwrap();
    let err = config.compile_filters().unwrap_err();

    // Names are checked in order, so the bare field is reported first.
    assert!(matches!(&err, ConfigError::InvalidFilter { name, .. } if name == "bare"));
    assert!(err.to_string().contains("Not an expression"));
}
