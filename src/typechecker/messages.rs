//! Rendering of type error messages.
//!
//! Messages name the node kind and its line, the types involved and, for
//! calls, every parameter that did not match.

use super::types::Type;
use crate::parser::ast::BinaryOp;
use std::fmt::Write;

/// An operand as it appears in a message: its type and its source text
#[derive(Debug, Clone)]
pub struct Operand<'a> {
    pub ty: &'a Type,
    pub text: String,
}

impl Operand<'_> {
    fn describe(&self) -> String {
        format!("{}, {}", self.ty.with_article(), self.text)
    }
}

/// One argument that failed to unify with its parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMismatch {
    /// 1-based parameter position
    pub index: usize,
    pub expected: Type,
    pub found: Type,
    /// The argument's type was inferred rather than read off a literal
    pub found_inferred: bool,
}

fn object_of(ty: &Type, inferred: bool) -> String {
    if inferred {
        format!("an object of inferred type {}", ty.type_name())
    } else {
        format!("an object of type {}", ty.type_name())
    }
}

fn cast_hint(left: &Type, right: &Type) -> Option<&'static str> {
    let names = (left.type_name(), right.type_name());
    match (names.0.as_str(), names.1.as_str()) {
        ("int", "str") | ("str", "int") => {
            Some("Perhaps you wanted to cast the integer into a string or vice versa?")
        }
        ("float", "str") | ("str", "float") => {
            Some("Perhaps you wanted to cast the float into a string or vice versa?")
        }
        _ => None,
    }
}

/// `You cannot add an int, 5, and a str, 'string'. Perhaps ...`
pub fn binop_message(op: BinaryOp, left: &Operand<'_>, right: &Operand<'_>) -> String {
    incompatible_pair(op.verb(), left, right)
}

/// Ordering comparison between incompatible operands
pub fn compare_message(left: &Operand<'_>, right: &Operand<'_>) -> String {
    incompatible_pair("compare", left, right)
}

fn incompatible_pair(verb: &str, left: &Operand<'_>, right: &Operand<'_>) -> String {
    let mut msg = format!(
        "You cannot {} {}, and {}.",
        verb,
        left.describe(),
        right.describe()
    );
    if let Some(hint) = cast_hint(left.ty, right.ty) {
        msg.push(' ');
        msg.push_str(hint);
    }
    msg
}

pub fn unary_message(symbol: &str, operand: &Operand<'_>) -> String {
    format!(
        "You cannot apply the unary operator {} to {}.",
        symbol.trim(),
        operand.describe()
    )
}

pub fn subscript_message(value: &Operand<'_>, index: &Operand<'_>) -> String {
    format!("You cannot index {} with {}.", value.describe(), index.describe())
}

pub fn iterate_message(line: usize, iterable: &Operand<'_>) -> String {
    format!(
        "In the For node in line {}, you cannot iterate over {}.",
        line,
        iterable.describe()
    )
}

fn call_header(line: usize, name: &str, annotated: bool) -> String {
    format!(
        "In the Call node in line {}, there was an error in calling the {}function \"{}\":\n",
        line,
        if annotated { "annotated " } else { "" },
        name
    )
}

/// Wrong number of arguments, for any kind of callee
pub fn call_arity_message(line: usize, name: &str, expected: usize, given: usize) -> String {
    let mut msg = call_header(line, name, false);
    let _ = write!(
        msg,
        "the function was expecting {} argument{}, but was given {}.",
        expected,
        if expected == 1 { "" } else { "s" },
        given
    );
    msg
}

/// Every mismatching parameter of an annotated function, one line each
pub fn annotated_call_message(line: usize, name: &str, mismatches: &[ParamMismatch]) -> String {
    let mut msg = call_header(line, name, true);
    for m in mismatches {
        let _ = writeln!(
            msg,
            "in parameter ({}), the annotated type is {} but was given {}.",
            m.index,
            m.expected.type_name(),
            object_of(&m.found, m.found_inferred)
        );
    }
    msg
}

/// Mismatching parameters of an unannotated function or builtin.
///
/// `expected_inferred` says whether the parameter types were inferred from
/// the function body or declared by a builtin signature.
pub fn call_message(
    line: usize,
    name: &str,
    mismatches: &[ParamMismatch],
    expected_inferred: bool,
) -> String {
    let mut msg = call_header(line, name, false);
    for m in mismatches {
        let _ = writeln!(
            msg,
            "in parameter ({}), the function was expecting {} but was given {}.",
            m.index,
            object_of(&m.expected, expected_inferred),
            object_of(&m.found, m.found_inferred)
        );
    }
    msg
}

pub fn not_callable_message(line: usize, name: &str, ty: &Type) -> String {
    format!(
        "In the Call node in line {}, \"{}\" is not callable: it is {}.",
        line,
        name,
        ty.with_article()
    )
}

pub fn unresolved_name_message(line: usize, name: &str) -> String {
    format!(
        "In the Name node in line {}, the name \"{}\" is not defined.",
        line, name
    )
}

/// Re-binding that contradicts the variable's earlier type.
///
/// `node` is the statement kind doing the binding (`Assign`, `For`, ...).
pub fn assignment_message(
    node: &str,
    line: usize,
    name: &str,
    previous: &Type,
    value: &Operand<'_>,
) -> String {
    format!(
        "In the {} node in line {}, the variable \"{}\" was inferred to be {} but is now assigned {}.",
        node,
        line,
        name,
        previous.with_article(),
        value.describe()
    )
}

/// A value that cannot be split across several targets
pub fn unpack_message(node: &str, line: usize, value: &Operand<'_>, targets: usize) -> String {
    format!(
        "In the {} node in line {}, you cannot unpack {} into {} targets.",
        node,
        line,
        value.describe(),
        targets
    )
}

pub fn return_message(line: usize, function: &str, expected: &Type, value: &Operand<'_>, annotated: bool) -> String {
    format!(
        "In the Return node in line {}, the function \"{}\" {} {} but this statement returns {}.",
        line,
        function,
        if annotated { "is annotated to return" } else { "was inferred to return" },
        expected.with_article(),
        value.describe()
    )
}
