use super::*;
use pretty_assertions::assert_eq;

fn span(start: usize, end: usize, line: usize, start_col: usize, end_col: usize) -> Span {
    Span::new(PathBuf::from("test.py"), start, end, line, start_col, line, end_col)
}

#[test]
fn test_diagnostic_json() {
    let diag = Diagnostic::error(types::INCOMPATIBLE_TYPES)
        .message("You cannot add an int, 5, and a str, 'a'.")
        .span(span(0, 7, 1, 1, 8))
        .build();

    let json = diag.to_json();
    assert!(json.contains("E1001"));
    assert!(json.contains("You cannot add"));
    assert!(json.contains("\"severity\":\"error\""));
}

#[test]
fn test_span_merge_orders_endpoints() {
    let left = Span::new(PathBuf::from("test.py"), 10, 20, 1, 11, 1, 21);
    let right = Span::new(PathBuf::from("test.py"), 15, 30, 1, 16, 2, 5);

    let merged = right.merge(&left);
    assert_eq!(merged.start, 10);
    assert_eq!(merged.end, 30);
    assert_eq!(merged.start_col, 11);
    assert_eq!(merged.end_line, 2);
    assert_eq!(merged.end_col, 5);
}

#[test]
fn test_severity_override() {
    let diag = Diagnostic::with_severity(types::UNKNOWN_IDENTIFIER, Severity::Warning)
        .message("name 'x' is not defined")
        .build();
    assert!(!diag.is_error());
    assert_eq!(diag.severity, Severity::Warning);
}

#[test]
fn test_human_readable_multiline_message() {
    let diag = Diagnostic::error(types::ARGUMENT_TYPE_MISMATCH)
        .message("first line\nsecond line\n")
        .span(span(0, 3, 1, 1, 4))
        .note(Note::new("a note"))
        .build();

    let output = diag.to_human_readable("foo(1)");
    assert!(output.starts_with("error[E1016]: first line\n"));
    assert!(output.contains("   | second line\n"));
    assert!(output.contains("  1 | foo(1)"));
    assert!(output.contains("^^^"));
    assert!(output.contains("= note: a note"));
}

#[test]
fn test_diagnostic_bag_counts() {
    let mut bag = DiagnosticBag::new();
    assert!(bag.is_empty());

    bag.push(Diagnostic::error("E1001").message("error").build());
    bag.push(Diagnostic::warning("E1002").message("warning").build());

    assert_eq!(bag.len(), 2);
    assert!(bag.has_errors());
    assert!(bag.has_warnings());
    assert_eq!(bag.error_count(), 1);
    assert_eq!(bag.warning_count(), 1);
}

#[test]
fn test_diagnostic_bag_merge_and_json() {
    let mut bag = DiagnosticBag::from(Diagnostic::error("E0001").message("bad token").build());
    let mut other = DiagnosticBag::new();
    other.push(Diagnostic::warning("E1002").message("unknown").build());
    bag.merge(other);

    let parsed: Vec<Diagnostic> = serde_json::from_str(&bag.to_json()).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].code, "E0001");
    assert_eq!(parsed[1].severity, Severity::Warning);
}

#[test]
fn test_every_code_has_a_title() {
    assert_eq!(title(types::WRONG_ARGUMENT_COUNT), Some("Wrong number of arguments"));
    assert_eq!(title("E9999"), None);
    let mut codes: Vec<_> = ALL.iter().map(|(c, _)| *c).collect();
    codes.dedup();
    assert_eq!(codes.len(), ALL.len());
}
