//! Handler for the `dyntype check` subcommand.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::Config;
use crate::diagnostics::{
    error_codes::{self, types},
    Diagnostic, DiagnosticBag, Note, Severity,
};
use crate::parser::{parse_source_file, SourceFile};
use crate::typechecker::{infer_module, ErrorKind, TypeErrorSite};

use super::{collect_sources, CliError};

/// Totals over every checked file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl CheckSummary {
    /// Whether the run should exit non-zero
    pub fn failed(&self, strict: bool) -> bool {
        self.errors > 0 || (strict && self.warnings > 0)
    }

    fn add(&mut self, bag: &DiagnosticBag) {
        self.files += 1;
        self.errors += bag.error_count();
        self.warnings += bag.warning_count();
    }
}

/// Diagnostic code for an inference error kind
fn code_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unification => types::INCOMPATIBLE_TYPES,
        ErrorKind::NameResolution => types::UNKNOWN_IDENTIFIER,
        ErrorKind::Arity => types::WRONG_ARGUMENT_COUNT,
        ErrorKind::ParameterType => types::ARGUMENT_TYPE_MISMATCH,
    }
}

fn to_diagnostic(site: &TypeErrorSite, config: &Config) -> Option<Diagnostic> {
    let code = code_for(site.kind());
    if config.is_disabled(code) {
        return None;
    }
    let severity = config.severity_for(code, Severity::Error);
    let mut builder = Diagnostic::with_severity(code, severity)
        .message(site.message())
        .span(site.span.clone());
    if let Some(title) = error_codes::title(code) {
        builder = builder.note(Note::new(format!(
            "{title}; run `dyntype explain {code}` for details"
        )));
    }
    Some(builder.build())
}

/// Parse and infer one source file, returning every diagnostic it produces.
///
/// Syntax errors stop the file before inference.
pub fn check_source(source: &SourceFile, config: &Config) -> DiagnosticBag {
    let module = match parse_source_file(source) {
        Ok(module) => module,
        Err(bag) => return bag,
    };
    let inference = infer_module(&module);
    debug!(
        file = %source.path().display(),
        errors = inference.errors().len(),
        "inferred module"
    );

    let mut bag = DiagnosticBag::new();
    for site in inference.errors() {
        if let Some(diagnostic) = to_diagnostic(site, config) {
            bag.push(diagnostic);
        }
    }
    bag
}

pub(super) fn run_check(paths: &[PathBuf], config: &Config, json: bool) -> Result<CheckSummary, CliError> {
    let files = collect_sources(paths)?;
    info!(count = files.len(), "checking files");

    let mut summary = CheckSummary::default();
    for path in &files {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
        let source = SourceFile::new(path.clone(), content);
        let bag = check_source(&source, config);

        for diagnostic in bag.diagnostics() {
            if json {
                println!("{}", diagnostic.to_json());
            } else {
                eprintln!("{}", diagnostic.to_human_readable(source.content()));
            }
        }
        summary.add(&bag);
    }

    let strict = config.check.strict;
    print_summary(&summary, strict);
    Ok(summary)
}

fn print_summary(summary: &CheckSummary, strict: bool) {
    if summary.failed(strict) {
        let mut parts = Vec::new();
        if summary.errors > 0 {
            parts.push(format!("{} error(s)", summary.errors));
        }
        if summary.warnings > 0 {
            if strict {
                parts.push(format!(
                    "{} warning(s) [treated as errors with --strict]",
                    summary.warnings
                ));
            } else {
                parts.push(format!("{} warning(s)", summary.warnings));
            }
        }
        eprintln!("\nChecked {} file(s), found {}", summary.files, parts.join(", "));
    } else if summary.warnings > 0 {
        println!(
            "Checked {} file(s), no errors ({} warning(s))",
            summary.files, summary.warnings
        );
    } else {
        println!("Checked {} file(s), no errors found", summary.files);
    }
}
