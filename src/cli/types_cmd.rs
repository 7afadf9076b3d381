//! Handler for the `dyntype types` subcommand.

use std::path::Path;

use crate::parser::parse_file;
use crate::typechecker::{infer_module, Type};

use super::CliError;

/// Module-level bindings as `name: type` lines
pub fn render_bindings(bindings: &[(String, Type)]) -> String {
    bindings
        .iter()
        .map(|(name, ty)| format!("{name}: {ty}\n"))
        .collect()
}

pub(super) fn run_types(path: &Path) -> Result<(), CliError> {
    let (module, source) = match parse_file(path) {
        Ok(parsed) => parsed,
        Err(bag) => {
            let content = std::fs::read_to_string(path).unwrap_or_default();
            eprintln!("{}", bag.format_text(&content));
            return Err(CliError::Syntax(path.display().to_string()));
        }
    };

    let inference = infer_module(&module);
    print!("{}", render_bindings(&inference.module_bindings()));
    for site in inference.errors() {
        eprintln!("{}:{}: {}", source.path().display(), site.span.start_line, site.message());
    }
    Ok(())
}
