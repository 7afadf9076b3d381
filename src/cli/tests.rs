use super::*;
use crate::diagnostics::Severity;
use crate::parser::SourceFile;
use crate::typechecker::Type;
use clap::Parser as _;
use pretty_assertions::assert_eq;

fn source(text: &str) -> SourceFile {
    SourceFile::new(PathBuf::from("test.py"), text.to_string())
}

#[test]
fn test_check_source_reports_type_error() {
    let bag = check_source(&source("x = 5 + \"string\"\n"), &Config::default());
    assert_eq!(bag.len(), 1);
    let diagnostic = &bag.diagnostics()[0];
    assert_eq!(diagnostic.code, "E1001");
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.span.start_line, 1);
    assert!(diagnostic.message.starts_with("You cannot add an int, 5, and a str, 'string'."));
    assert!(diagnostic.notes[0].message.contains("dyntype explain E1001"));
}

#[test]
fn test_check_source_maps_error_kinds_to_codes() {
    let text = "\
def add(a, b):
    return a + b

add(1)
y = missing
";
    let bag = check_source(&source(text), &Config::default());
    let codes: Vec<&str> = bag.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["E1007", "E1002"]);
}

#[test]
fn test_check_source_clean_file() {
    let bag = check_source(&source("def f(x):\n    return x\n\ny = f(1)\n"), &Config::default());
    assert!(bag.is_empty());
}

#[test]
fn test_check_source_syntax_error_skips_inference() {
    let bag = check_source(&source("def f(x)\n    return x\n"), &Config::default());
    assert!(bag.has_errors());
    assert!(bag.diagnostics().iter().all(|d| d.code.starts_with("E0")));
}

#[test]
fn test_check_source_respects_config() {
    let config = Config::parse("[diagnostics]\ndisable = [\"E1002\"]\n\n[diagnostics.severity]\nE1001 = \"warning\"\n").unwrap();
    let bag = check_source(&source("x = 1 + \"a\"\ny = missing\n"), &config);
    assert_eq!(bag.len(), 1);
    assert_eq!(bag.error_count(), 0);
    assert_eq!(bag.warning_count(), 1);
}

#[test]
fn test_check_json_output_snapshot() {
    let bag = check_source(&source("def f(n: int) -> int:\n    return n\n\nf(\"a\")\n"), &Config::default());
    insta::assert_json_snapshot!(bag.diagnostics()[0], @r###"
    {
      "code": "E1016",
      "severity": "error",
      "message": "In the Call node in line 4, there was an error in calling the annotated function \"f\":\nin parameter (1), the annotated type is int but was given an object of type str.\n",
      "span": {
        "file": "test.py",
        "start": 36,
        "end": 42,
        "start_line": 4,
        "start_col": 1,
        "end_line": 4,
        "end_col": 7
      },
      "notes": [
        {
          "message": "Argument type mismatch; run `dyntype explain E1016` for details"
        }
      ]
    }
    "###);
}

#[test]
fn test_summary_failure_rules() {
    let clean = CheckSummary {
        files: 2,
        errors: 0,
        warnings: 0,
    };
    let warned = CheckSummary { warnings: 1, ..clean };
    let failed = CheckSummary { errors: 1, ..clean };
    assert!(!clean.failed(true));
    assert!(!warned.failed(false));
    assert!(warned.failed(true));
    assert!(failed.failed(false));
}

#[test]
fn test_collect_sources_walks_directories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("pkg")).unwrap();
    std::fs::write(dir.path().join("b.py"), "").unwrap();
    std::fs::write(dir.path().join("a.py"), "").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "").unwrap();
    std::fs::write(dir.path().join("pkg").join("c.py"), "").unwrap();

    let files = collect_sources(&[dir.path().to_path_buf()]).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
        .collect();
    assert_eq!(names, vec!["a.py", "b.py", "pkg/c.py"]);
}

#[test]
fn test_collect_sources_keeps_explicit_files() {
    // Named files are checked whatever their extension
    let files = collect_sources(&[PathBuf::from("script.txt")]).unwrap();
    assert_eq!(files, vec![PathBuf::from("script.txt")]);
}

#[test]
fn test_load_config_prefers_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(crate::config::CONFIG_FILE), "[check]\nstrict = false\n").unwrap();
    let explicit = dir.path().join("other.toml");
    std::fs::write(&explicit, "[check]\nstrict = true\n").unwrap();

    let config = load_config(Some(&explicit), &[dir.path().to_path_buf()]).unwrap();
    assert!(config.check.strict);
    let discovered = load_config(None, &[dir.path().join("main.py")]).unwrap();
    assert!(!discovered.check.strict);
}

#[test]
fn test_explain_known_code() {
    let text = get_error_explanation("E1001").unwrap();
    assert!(text.contains("Incompatible types"));
}

#[test]
fn test_explain_unknown_code() {
    assert!(get_error_explanation("E9999").is_none());
}

#[test]
fn test_explain_all_error_codes() {
    for (code, title) in crate::diagnostics::error_codes::ALL {
        let text = get_error_explanation(code).unwrap_or_else(|| panic!("Missing explanation for {}", code));
        assert!(text.starts_with(&format!("{code}: {title}")), "{code}");
    }
}

#[test]
fn test_render_bindings() {
    let bindings = vec![
        ("f".to_string(), Type::callable(vec![Type::int()], Type::int())),
        ("x".to_string(), Type::str()),
    ];
    assert_eq!(render_bindings(&bindings), "f: Callable[[int], int]\nx: str\n");
}

#[test]
fn test_cli_parses_check_flags() {
    let cli = Cli::try_parse_from(["dyntype", "-vv", "check", "src", "--json", "--strict"]).unwrap();
    assert_eq!(cli.verbose, 2);
    match cli.command {
        Command::Check {
            paths, json, strict, config,
        } => {
            assert_eq!(paths, vec![PathBuf::from("src")]);
            assert!(json);
            assert!(strict);
            assert!(config.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_cli_check_defaults_to_current_directory() {
    let cli = Cli::try_parse_from(["dyntype", "check"]).unwrap();
    assert!(matches!(cli.command, Command::Check { ref paths, .. } if paths == &[PathBuf::from(".")]));
}
