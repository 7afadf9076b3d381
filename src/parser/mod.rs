//! Front-end for the Python teaching subset
//!
//! This module provides:
//! - Lexer (tokens plus indentation layout)
//! - Parser (AST construction)
//! - AST definitions
//! - Span tracking

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod span;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::Parser;
pub use span::SourceFile;

use crate::diagnostics::{error_codes::syntax, Diagnostic, DiagnosticBag, Span};
use std::path::Path;

/// Parse a file from disk
pub fn parse_file(path: &Path) -> Result<(Module, SourceFile), DiagnosticBag> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DiagnosticBag::from(
            Diagnostic::error(syntax::UNREADABLE_FILE)
                .message(format!("Could not read file: {}", e))
                .span(Span::file(path))
                .build(),
        )
    })?;
    let source = SourceFile::new(path.to_path_buf(), content);
    let module = parse_source_file(&source)?;
    Ok((module, source))
}

/// Parse source code into an AST
pub fn parse_source(source: &str, path: &Path) -> Result<Module, DiagnosticBag> {
    let source_file = SourceFile::new(path.to_path_buf(), source.to_string());
    parse_source_file(&source_file)
}

pub fn parse_source_file(source: &SourceFile) -> Result<Module, DiagnosticBag> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_module()
}

#[cfg(test)]
mod tests;
