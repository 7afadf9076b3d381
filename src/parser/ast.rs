//! Abstract Syntax Tree definitions for the Python teaching subset
//!
//! All AST nodes include:
//! - Unique node ID
//! - Source span
//! - Node-specific data

use crate::diagnostics::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Generate a new unique node ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: NodeId,
    pub span: Span,
    pub body: Vec<Stmt>,
}

/// `def name(params) -> returns: body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<Expr>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    /// True when any parameter or the return carries an annotation
    pub fn is_annotated(&self) -> bool {
        self.returns.is_some() || self.params.iter().any(|p| p.annotation.is_some())
    }
}

/// `class Name(bases): body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// A function or lambda parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// `name=value` in a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub value: Expr,
}

/// One imported name, optionally renamed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name bound in the importing scope
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return {
        id: NodeId,
        span: Span,
        value: Option<Expr>,
    },
    /// `a = b = value`
    Assign {
        id: NodeId,
        span: Span,
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        id: NodeId,
        span: Span,
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        id: NodeId,
        span: Span,
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    Expr {
        id: NodeId,
        span: Span,
        expr: Expr,
    },
    If {
        id: NodeId,
        span: Span,
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        id: NodeId,
        span: Span,
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        id: NodeId,
        span: Span,
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `import a.b as c` (module is None) or `from m import x as y`
    Import {
        id: NodeId,
        span: Span,
        module: Option<String>,
        names: Vec<Alias>,
    },
    Assert {
        id: NodeId,
        span: Span,
        test: Expr,
        msg: Option<Expr>,
    },
    Pass {
        id: NodeId,
        span: Span,
    },
    Break {
        id: NodeId,
        span: Span,
    },
    Continue {
        id: NodeId,
        span: Span,
    },
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::FunctionDef(def) => def.id,
            Stmt::ClassDef(def) => def.id,
            Stmt::Return { id, .. }
            | Stmt::Assign { id, .. }
            | Stmt::AnnAssign { id, .. }
            | Stmt::AugAssign { id, .. }
            | Stmt::Expr { id, .. }
            | Stmt::If { id, .. }
            | Stmt::While { id, .. }
            | Stmt::For { id, .. }
            | Stmt::Import { id, .. }
            | Stmt::Assert { id, .. }
            | Stmt::Pass { id, .. }
            | Stmt::Break { id, .. }
            | Stmt::Continue { id, .. } => *id,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Stmt::FunctionDef(def) => &def.span,
            Stmt::ClassDef(def) => &def.span,
            Stmt::Return { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AnnAssign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Pass { span, .. }
            | Stmt::Break { span, .. }
            | Stmt::Continue { span, .. } => span,
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }

    /// Type store key of the operator
    pub fn dunder(self) -> &'static str {
        match self {
            BinaryOp::Add => "__add__",
            BinaryOp::Sub => "__sub__",
            BinaryOp::Mul => "__mul__",
            BinaryOp::Div => "__truediv__",
            BinaryOp::FloorDiv => "__floordiv__",
            BinaryOp::Mod => "__mod__",
            BinaryOp::Pow => "__pow__",
        }
    }

    /// Verb used in messages: "You cannot add ..."
    pub fn verb(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "subtract",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            BinaryOp::FloorDiv => "floor divide",
            BinaryOp::Mod => "take the modulo of",
            BinaryOp::Pow => "exponentiate",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => PREC_SUM,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => PREC_TERM,
            BinaryOp::Pow => PREC_POWER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not ",
        }
    }

    pub fn dunder(self) -> Option<&'static str> {
        match self {
            UnaryOp::Neg => Some("__neg__"),
            UnaryOp::Pos => Some("__pos__"),
            UnaryOp::Not => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }

    /// Ordering comparisons are checked through the type store
    pub fn dunder(self) -> Option<&'static str> {
        match self {
            CompareOp::Lt => Some("__lt__"),
            CompareOp::Le => Some("__le__"),
            CompareOp::Gt => Some("__gt__"),
            CompareOp::Ge => Some("__ge__"),
            _ => None,
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Int {
        id: NodeId,
        span: Span,
        value: i64,
    },
    Float {
        id: NodeId,
        span: Span,
        value: f64,
    },
    Str {
        id: NodeId,
        span: Span,
        value: String,
    },
    Bool {
        id: NodeId,
        span: Span,
        value: bool,
    },
    NoneLit {
        id: NodeId,
        span: Span,
    },
    Name {
        id: NodeId,
        span: Span,
        name: String,
    },
    BinOp {
        id: NodeId,
        span: Span,
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    UnaryOp {
        id: NodeId,
        span: Span,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        id: NodeId,
        span: Span,
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `left op1 c1 op2 c2 ...`
    Compare {
        id: NodeId,
        span: Span,
        left: Box<Expr>,
        comparisons: Vec<(CompareOp, Expr)>,
    },
    Call {
        id: NodeId,
        span: Span,
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        id: NodeId,
        span: Span,
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        id: NodeId,
        span: Span,
        value: Box<Expr>,
        index: Box<Expr>,
    },
    List {
        id: NodeId,
        span: Span,
        elts: Vec<Expr>,
    },
    Tuple {
        id: NodeId,
        span: Span,
        elts: Vec<Expr>,
    },
    Dict {
        id: NodeId,
        span: Span,
        entries: Vec<(Expr, Expr)>,
    },
    /// `body if test else orelse`
    IfExp {
        id: NodeId,
        span: Span,
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        id: NodeId,
        span: Span,
        params: Vec<Param>,
        body: Box<Expr>,
    },
}

const PREC_LAMBDA: u8 = 1;
const PREC_IFEXP: u8 = 2;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_NOT: u8 = 5;
const PREC_COMPARE: u8 = 6;
const PREC_SUM: u8 = 7;
const PREC_TERM: u8 = 8;
const PREC_UNARY: u8 = 9;
const PREC_POWER: u8 = 10;
const PREC_ATOM: u8 = 11;

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Int { id, .. }
            | Expr::Float { id, .. }
            | Expr::Str { id, .. }
            | Expr::Bool { id, .. }
            | Expr::NoneLit { id, .. }
            | Expr::Name { id, .. }
            | Expr::BinOp { id, .. }
            | Expr::UnaryOp { id, .. }
            | Expr::BoolOp { id, .. }
            | Expr::Compare { id, .. }
            | Expr::Call { id, .. }
            | Expr::Attribute { id, .. }
            | Expr::Subscript { id, .. }
            | Expr::List { id, .. }
            | Expr::Tuple { id, .. }
            | Expr::Dict { id, .. }
            | Expr::IfExp { id, .. }
            | Expr::Lambda { id, .. } => *id,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Float { span, .. }
            | Expr::Str { span, .. }
            | Expr::Bool { span, .. }
            | Expr::NoneLit { span, .. }
            | Expr::Name { span, .. }
            | Expr::BinOp { span, .. }
            | Expr::UnaryOp { span, .. }
            | Expr::BoolOp { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Call { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::List { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Dict { span, .. }
            | Expr::IfExp { span, .. }
            | Expr::Lambda { span, .. } => span,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Int { .. }
                | Expr::Float { .. }
                | Expr::Str { .. }
                | Expr::Bool { .. }
                | Expr::NoneLit { .. }
        )
    }

    /// Python `repr` of a literal
    pub fn literal_repr(&self) -> Option<String> {
        match self {
            Expr::Int { value, .. } => Some(value.to_string()),
            Expr::Float { value, .. } => Some(float_repr(*value)),
            Expr::Str { value, .. } => Some(str_repr(value)),
            Expr::Bool { value, .. } => Some(if *value { "True" } else { "False" }.to_string()),
            Expr::NoneLit { .. } => Some("None".to_string()),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Lambda { .. } => PREC_LAMBDA,
            Expr::IfExp { .. } => PREC_IFEXP,
            Expr::BoolOp { op: BoolOp::Or, .. } => PREC_OR,
            Expr::BoolOp { op: BoolOp::And, .. } => PREC_AND,
            Expr::UnaryOp { op: UnaryOp::Not, .. } => PREC_NOT,
            Expr::Compare { .. } => PREC_COMPARE,
            Expr::BinOp { op, .. } => op.precedence(),
            Expr::UnaryOp { .. } => PREC_UNARY,
            Expr::Int { value, .. } if *value < 0 => PREC_UNARY,
            _ => PREC_ATOM,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_bare(f)?;
            write!(f, ")")
        } else {
            self.fmt_bare(f)
        }
    }

    fn fmt_bare(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int { .. } | Expr::Float { .. } | Expr::Str { .. } | Expr::Bool { .. } | Expr::NoneLit { .. } => {
                f.write_str(&self.literal_repr().unwrap_or_default())
            }
            Expr::Name { name, .. } => f.write_str(name),
            Expr::BinOp {
                left, op, right, ..
            } => {
                let prec = op.precedence();
                let (left_min, right_min) = if *op == BinaryOp::Pow {
                    (prec + 1, PREC_UNARY)
                } else {
                    (prec, prec + 1)
                };
                left.fmt_prec(f, left_min)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_prec(f, right_min)
            }
            Expr::UnaryOp { op, operand, .. } => {
                f.write_str(op.symbol())?;
                operand.fmt_prec(f, self.precedence())
            }
            Expr::BoolOp {
                op, left, right, ..
            } => {
                let prec = self.precedence();
                left.fmt_prec(f, prec)?;
                write!(f, " {} ", op.keyword())?;
                right.fmt_prec(f, prec + 1)
            }
            Expr::Compare {
                left, comparisons, ..
            } => {
                left.fmt_prec(f, PREC_COMPARE + 1)?;
                for (op, right) in comparisons {
                    write!(f, " {} ", op.symbol())?;
                    right.fmt_prec(f, PREC_COMPARE + 1)?;
                }
                Ok(())
            }
            Expr::Call {
                func,
                args,
                keywords,
                ..
            } => {
                func.fmt_prec(f, PREC_ATOM)?;
                f.write_str("(")?;
                let mut first = true;
                for arg in args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", arg)?;
                }
                for kw in keywords {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}={}", kw.name, kw.value)?;
                }
                f.write_str(")")
            }
            Expr::Attribute { value, attr, .. } => {
                value.fmt_prec(f, PREC_ATOM)?;
                write!(f, ".{}", attr)
            }
            Expr::Subscript { value, index, .. } => {
                value.fmt_prec(f, PREC_ATOM)?;
                match index.as_ref() {
                    Expr::Tuple { elts, .. } if !elts.is_empty() => {
                        f.write_str("[")?;
                        write_comma_separated(f, elts)?;
                        f.write_str("]")
                    }
                    other => write!(f, "[{}]", other),
                }
            }
            Expr::List { elts, .. } => {
                f.write_str("[")?;
                write_comma_separated(f, elts)?;
                f.write_str("]")
            }
            Expr::Tuple { elts, .. } => {
                f.write_str("(")?;
                write_comma_separated(f, elts)?;
                if elts.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Expr::Dict { entries, .. } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Expr::IfExp {
                test, body, orelse, ..
            } => {
                body.fmt_prec(f, PREC_IFEXP + 1)?;
                f.write_str(" if ")?;
                test.fmt_prec(f, PREC_IFEXP + 1)?;
                f.write_str(" else ")?;
                orelse.fmt_prec(f, PREC_IFEXP)
            }
            Expr::Lambda { params, body, .. } => {
                f.write_str("lambda")?;
                for (i, param) in params.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    f.write_str(&param.name)?;
                }
                f.write_str(": ")?;
                body.fmt_prec(f, PREC_LAMBDA)
            }
        }
    }
}

impl fmt::Display for Expr {
    /// Renders the expression as Python source
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_bare(f)
    }
}

fn write_comma_separated(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn float_repr(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    format!("{:?}", value)
}

fn str_repr(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
