//! dyntype
//!
//! Unification-based type inference for a small teaching subset of Python.
//! Source is parsed into an AST, every node is given a type variable, and the
//! variables are solved with a union-find store. Type errors are reported
//! once, at the node where they originate, with a human-readable message.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod parser;
pub mod typechecker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::diagnostics::{Diagnostic, Severity, Span};
    pub use crate::parser::ast::*;
    pub use crate::typechecker::{infer_module, Type, TypeInference};
}
