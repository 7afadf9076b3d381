use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_empty_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config, Config::default());
    assert!(!config.check.strict);
}

#[test]
fn test_parse_full_config() {
    let content = r#"
[check]
strict = true

[diagnostics]
disable = ["E1002"]

[diagnostics.severity]
E1001 = "warning"
"#;

    let config = Config::parse(content).unwrap();
    assert!(config.check.strict);
    assert!(config.is_disabled("E1002"));
    assert!(!config.is_disabled("E1001"));
    assert_eq!(config.severity_for("E1001", Severity::Error), Severity::Warning);
    assert_eq!(config.severity_for("E1007", Severity::Error), Severity::Error);
}

#[test]
fn test_parse_rejects_unknown_keys() {
    let err = Config::parse("[check]\npedantic = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_parse_rejects_unknown_severity() {
    assert!(Config::parse("[diagnostics.severity]\nE1001 = \"fatal\"\n").is_err());
}

#[test]
fn test_discover_walks_up() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "[check]\nstrict = true\n").unwrap();
    let nested = dir.path().join("src").join("pkg");
    std::fs::create_dir_all(&nested).unwrap();

    assert_eq!(Config::find(&nested), Some(dir.path().join(CONFIG_FILE)));
    let config = Config::discover(&nested).unwrap();
    assert!(config.check.strict);
}

#[test]
fn test_discover_without_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::discover(dir.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().starts_with("failed to read"));
}
