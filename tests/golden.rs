//! Golden file tests for checker output stability
//!
//! Each `.py` file under `tests/golden/<dir>` is checked and its rendered
//! diagnostics are compared against the sibling `.expected` file.

use std::fs;
use std::path::Path;

use dyntype::cli::check_source;
use dyntype::config::Config;
use dyntype::parser::SourceFile;

/// Run all golden tests in a directory
fn run_golden_tests(dir: &str) {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join(dir);

    let mut entries: Vec<_> = fs::read_dir(&test_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|e| e == "py"))
        .collect();
    entries.sort();
    assert!(!entries.is_empty(), "no golden files in {:?}", test_dir);

    for path in entries {
        run_single_golden_test(&path);
    }
}

fn run_single_golden_test(path: &Path) {
    let content = fs::read_to_string(path).unwrap();
    let expected_path = path.with_extension("expected");
    let expected = fs::read_to_string(&expected_path)
        .unwrap_or_else(|e| panic!("missing {:?}: {}", expected_path, e));

    // Render with the bare file name so output does not depend on the checkout
    let name = path.file_name().unwrap();
    let source = SourceFile::new(name.into(), content.clone());
    let bag = check_source(&source, &Config::default());
    let actual = bag.format_text(&content);

    assert_eq!(
        actual.trim_end(),
        expected.trim_end(),
        "golden output mismatch for {:?}",
        path
    );
}

#[test]
fn golden_syntax_tests() {
    run_golden_tests("syntax");
}

#[test]
fn golden_typecheck_tests() {
    run_golden_tests("typecheck");
}
