//! Type terms produced by inference.
//!
//! The set of variants is closed: primitives (including user class
//! instances), the built-in parametric containers, callables, type variable
//! references and the error sentinel.

use std::fmt;

/// Type variable identifier, an index into the constraint store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub u32);

impl TypeVar {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~T{}", self.0)
    }
}

/// A type term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// `int`, `float`, `str`, `bool`, `None` or a class instance
    Primitive(String),
    /// `List[T]`, `Dict[K, V]`, `Tuple[A, B, ...]`
    Parametric(String, Vec<Type>),
    /// Ordered parameter types plus a return type
    Callable { params: Vec<Type>, ret: Box<Type> },
    /// Reference to a type variable
    Var(TypeVar),
    /// Terminal error state carrying the rendered diagnostic
    Error(TypeError),
}

/// Category of a type error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Two concrete terms cannot be equated
    Unification,
    /// Wrong number of call arguments
    Arity,
    /// An argument does not match its parameter
    ParameterType,
    /// A name is not bound in any enclosing scope
    NameResolution,
}

/// Payload of `Type::Error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TypeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unification(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unification, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message)
    }

    pub fn parameter_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParameterType, message)
    }

    pub fn name_resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameResolution, message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub const INT: &str = "int";
pub const FLOAT: &str = "float";
pub const STR: &str = "str";
pub const BOOL: &str = "bool";
pub const NONE: &str = "None";
pub const LIST: &str = "List";
pub const DICT: &str = "Dict";
pub const TUPLE: &str = "Tuple";

impl Type {
    pub fn primitive(name: impl Into<String>) -> Self {
        Type::Primitive(name.into())
    }

    pub fn int() -> Self {
        Type::primitive(INT)
    }

    pub fn float() -> Self {
        Type::primitive(FLOAT)
    }

    pub fn str() -> Self {
        Type::primitive(STR)
    }

    pub fn bool() -> Self {
        Type::primitive(BOOL)
    }

    pub fn none() -> Self {
        Type::primitive(NONE)
    }

    pub fn list(elem: Type) -> Self {
        Type::Parametric(LIST.to_string(), vec![elem])
    }

    pub fn dict(key: Type, value: Type) -> Self {
        Type::Parametric(DICT.to_string(), vec![key, value])
    }

    pub fn tuple(elems: Vec<Type>) -> Self {
        Type::Parametric(TUPLE.to_string(), elems)
    }

    pub fn callable(params: Vec<Type>, ret: Type) -> Self {
        Type::Callable {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error(_))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn as_error(&self) -> Option<&TypeError> {
        match self {
            Type::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Name used in messages: `int`, `List`, `function`, ...
    ///
    /// Unsolved variables read as `Any` so messages never show `~Tn`.
    pub fn type_name(&self) -> String {
        match self {
            Type::Primitive(name) => name.clone(),
            Type::Parametric(name, args) => format!("{}[{}]", name, type_names(args)),
            Type::Callable { params, ret } => {
                format!("Callable[[{}], {}]", type_names(params), ret.type_name())
            }
            Type::Var(_) => "Any".to_string(),
            Type::Error(_) => "error".to_string(),
        }
    }

    /// Type name preceded by its indefinite article, e.g. `an int`.
    pub fn with_article(&self) -> String {
        let name = self.type_name();
        format!("{} {}", article(&name), name)
    }
}

fn type_names(types: &[Type]) -> String {
    types.iter().map(Type::type_name).collect::<Vec<_>>().join(", ")
}

/// Indefinite article for a type name
pub fn article(name: &str) -> &'static str {
    match name.chars().next() {
        Some(c) if "aeiouAEIOU".contains(c) => "an",
        _ => "a",
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(name) => f.write_str(name),
            Type::Parametric(name, args) => {
                write!(f, "{}[", name)?;
                write_list(f, args)?;
                f.write_str("]")
            }
            Type::Callable { params, ret } => {
                f.write_str("Callable[[")?;
                write_list(f, params)?;
                write!(f, "], {}]", ret)
            }
            Type::Var(v) => write!(f, "{}", v),
            Type::Error(e) => write!(f, "TypeError({})", e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested() {
        let ty = Type::callable(
            vec![Type::list(Type::int()), Type::dict(Type::str(), Type::Var(TypeVar(3)))],
            Type::tuple(vec![Type::float(), Type::none()]),
        );
        insta::assert_snapshot!(ty.to_string(), @"Callable[[List[int], Dict[str, ~T3]], Tuple[float, None]]");
    }

    #[test]
    fn test_articles() {
        assert_eq!(Type::int().with_article(), "an int");
        assert_eq!(Type::str().with_article(), "a str");
        assert_eq!(Type::float().with_article(), "a float");
        assert_eq!(Type::primitive("Animal").with_article(), "an Animal");
    }

    #[test]
    fn test_type_name_hides_variables() {
        let ty = Type::callable(vec![Type::Var(TypeVar(1))], Type::list(Type::Var(TypeVar(2))));
        assert_eq!(ty.type_name(), "Callable[[Any], List[Any]]");
        assert_eq!(Type::dict(Type::str(), Type::int()).type_name(), "Dict[str, int]");
    }
}
