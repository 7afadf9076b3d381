//! Error code definitions

/// Syntax/parsing errors (E0xxx)
pub mod syntax {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNTERMINATED_STRING: &str = "E0002";
    pub const INVALID_NUMBER: &str = "E0003";
    pub const INCONSISTENT_INDENT: &str = "E0004";
    pub const UNEXPECTED_EOF: &str = "E0008";
    pub const UNREADABLE_FILE: &str = "E0100";
}

/// Type errors (E1xxx)
pub mod types {
    pub const INCOMPATIBLE_TYPES: &str = "E1001";
    pub const UNKNOWN_IDENTIFIER: &str = "E1002";
    pub const WRONG_ARGUMENT_COUNT: &str = "E1007";
    pub const ARGUMENT_TYPE_MISMATCH: &str = "E1016";
}

/// Every code together with its one-line title, in numeric order.
pub const ALL: &[(&str, &str)] = &[
    (syntax::UNEXPECTED_TOKEN, "Unexpected token"),
    (syntax::UNTERMINATED_STRING, "Unterminated string literal"),
    (syntax::INVALID_NUMBER, "Invalid numeric literal"),
    (syntax::INCONSISTENT_INDENT, "Inconsistent indentation"),
    (syntax::UNEXPECTED_EOF, "Unexpected end of file"),
    (syntax::UNREADABLE_FILE, "Source file could not be read"),
    (types::INCOMPATIBLE_TYPES, "Incompatible types"),
    (types::UNKNOWN_IDENTIFIER, "Unknown identifier"),
    (types::WRONG_ARGUMENT_COUNT, "Wrong number of arguments"),
    (types::ARGUMENT_TYPE_MISMATCH, "Argument type mismatch"),
];

/// Look up the title of a code
pub fn title(code: &str) -> Option<&'static str> {
    ALL.iter().find(|(c, _)| *c == code).map(|(_, t)| *t)
}
