//! Builtin operator and function signatures.
//!
//! Operators are keyed by their dunder names. Every name maps to an ordered
//! list of overloads, and a call picks the first overload whose parameters
//! unify with the arguments.

use super::constraints::{TypeConstraints, UnifyError};
use super::types::{Type, TypeVar, DICT, LIST};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// A parameter or return type inside a signature template.
///
/// Generic placeholders are replaced by fresh type variables every time the
/// signature is instantiated.
#[derive(Debug, Clone, PartialEq)]
pub enum SigType {
    Concrete(Type),
    Generic(&'static str),
    Parametric(&'static str, Vec<SigType>),
}

impl SigType {
    fn instantiate(&self, store: &mut TypeConstraints, generics: &mut HashMap<&'static str, Type>) -> Type {
        match self {
            SigType::Concrete(ty) => ty.clone(),
            SigType::Generic(name) => generics.entry(*name).or_insert_with(|| store.fresh()).clone(),
            SigType::Parametric(name, args) => Type::Parametric(
                (*name).to_string(),
                args.iter().map(|a| a.instantiate(store, generics)).collect(),
            ),
        }
    }
}

impl From<Type> for SigType {
    fn from(ty: Type) -> Self {
        SigType::Concrete(ty)
    }
}

/// One overload
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<SigType>,
    pub ret: SigType,
    /// Type of any extra positional arguments
    pub rest: Option<SigType>,
}

impl Signature {
    pub fn new(params: Vec<SigType>, ret: SigType) -> Self {
        Self {
            params,
            ret,
            rest: None,
        }
    }

    pub fn variadic(rest: SigType, ret: SigType) -> Self {
        Self {
            params: Vec::new(),
            ret,
            rest: Some(rest),
        }
    }

    /// Signature of a user definition; its variables are shared, not copied
    pub fn from_types(params: Vec<Type>, ret: Type) -> Self {
        Self::new(params.into_iter().map(SigType::from).collect(), ret.into())
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        match self.rest {
            Some(_) => arg_count >= self.params.len(),
            None => arg_count == self.params.len(),
        }
    }

    /// Number of fixed parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Concrete parameter types for a call with `arg_count` arguments, and the return type
    pub fn instantiate(&self, store: &mut TypeConstraints, arg_count: usize) -> (Vec<Type>, Type) {
        let mut generics = HashMap::new();
        let mut params: Vec<Type> = self
            .params
            .iter()
            .map(|p| p.instantiate(store, &mut generics))
            .collect();
        if let Some(rest) = &self.rest {
            while params.len() < arg_count {
                params.push(rest.instantiate(store, &mut generics));
            }
        }
        let ret = self.ret.instantiate(store, &mut generics);
        (params, ret)
    }

    /// Unify the arguments against this overload, committing only on success
    pub fn apply(&self, store: &mut TypeConstraints, args: &[Type]) -> Result<Type, UnifyError> {
        store.transaction(|s| {
            let (params, ret) = self.instantiate(s, args.len());
            for (param, arg) in params.iter().zip(args) {
                s.unify(param, arg)?;
            }
            Ok(ret)
        })
    }
}

/// Outcome of overload selection
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The first viable overload's return type
    Matched(Type),
    /// No overload takes this many arguments; `expected` is the arity closest to the call
    ArityMismatch { expected: usize },
    /// Overloads of the right arity exist but none unifies; `params` are the first one's
    NoMatch { params: Vec<Type> },
    /// Nothing is registered under the name
    Unknown,
}

/// Builtin signature table, built once per process
#[derive(Debug, Default)]
pub struct BuiltinSignatures {
    entries: HashMap<&'static str, Vec<Signature>>,
}

impl BuiltinSignatures {
    /// The shared table
    pub fn shared() -> Arc<BuiltinSignatures> {
        static TABLE: OnceLock<Arc<BuiltinSignatures>> = OnceLock::new();
        TABLE.get_or_init(|| Arc::new(Self::seed())).clone()
    }

    pub fn get(&self, name: &str) -> Option<&[Signature]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    fn add(&mut self, name: &'static str, signature: Signature) {
        self.entries.entry(name).or_default().push(signature);
    }

    fn seed() -> Self {
        let mut table = Self::default();

        let int = || SigType::Concrete(Type::int());
        let float = || SigType::Concrete(Type::float());
        let str_ = || SigType::Concrete(Type::str());
        let boolean = || SigType::Concrete(Type::bool());
        let none = || SigType::Concrete(Type::none());
        let t = || SigType::Generic("T");
        let u = || SigType::Generic("U");
        let k = || SigType::Generic("K");
        let v = || SigType::Generic("V");
        let list = |elem: SigType| SigType::Parametric(LIST, vec![elem]);
        let dict = |key: SigType, value: SigType| SigType::Parametric(DICT, vec![key, value]);
        let sig = |params: Vec<SigType>, ret: SigType| Signature::new(params, ret);

        // int,int stays first so untyped operands settle on int
        let numeric = |table: &mut Self, name: &'static str| {
            table.add(name, sig(vec![int(), int()], int()));
            table.add(name, sig(vec![float(), float()], float()));
            table.add(name, sig(vec![int(), float()], float()));
            table.add(name, sig(vec![float(), int()], float()));
        };

        numeric(&mut table, "__add__");
        table.add("__add__", sig(vec![str_(), str_()], str_()));
        table.add("__add__", sig(vec![list(t()), list(t())], list(t())));

        numeric(&mut table, "__sub__");

        numeric(&mut table, "__mul__");
        table.add("__mul__", sig(vec![str_(), int()], str_()));
        table.add("__mul__", sig(vec![int(), str_()], str_()));
        table.add("__mul__", sig(vec![list(t()), int()], list(t())));
        table.add("__mul__", sig(vec![int(), list(t())], list(t())));

        for (l, r) in [(int(), int()), (float(), float()), (int(), float()), (float(), int())] {
            table.add("__truediv__", sig(vec![l, r], float()));
        }

        numeric(&mut table, "__floordiv__");
        numeric(&mut table, "__mod__");
        table.add("__mod__", sig(vec![str_(), t()], str_()));
        numeric(&mut table, "__pow__");

        for name in ["__lt__", "__le__", "__gt__", "__ge__"] {
            table.add(name, sig(vec![int(), int()], boolean()));
            table.add(name, sig(vec![float(), float()], boolean()));
            table.add(name, sig(vec![int(), float()], boolean()));
            table.add(name, sig(vec![float(), int()], boolean()));
            table.add(name, sig(vec![str_(), str_()], boolean()));
            table.add(name, sig(vec![list(t()), list(t())], boolean()));
        }
        for name in ["__eq__", "__ne__"] {
            table.add(name, sig(vec![t(), u()], boolean()));
        }

        for name in ["__neg__", "__pos__"] {
            table.add(name, sig(vec![int()], int()));
            table.add(name, sig(vec![float()], float()));
        }

        table.add("__getitem__", sig(vec![list(t()), int()], t()));
        table.add("__getitem__", sig(vec![dict(k(), v()), k()], v()));
        table.add("__getitem__", sig(vec![str_(), int()], str_()));

        table.add("__iter__", sig(vec![list(t())], t()));
        table.add("__iter__", sig(vec![str_()], str_()));
        table.add("__iter__", sig(vec![dict(k(), v())], k()));

        table.add("len", sig(vec![str_()], int()));
        table.add("len", sig(vec![list(t())], int()));
        table.add("len", sig(vec![dict(k(), v())], int()));

        table.add("abs", sig(vec![int()], int()));
        table.add("abs", sig(vec![float()], float()));

        for (name, ret) in [("str", str_()), ("int", int()), ("float", float()), ("bool", boolean())] {
            table.add(name, sig(vec![t()], ret.clone()));
            table.add(name, sig(vec![], ret));
        }

        table.add("print", Signature::variadic(t(), none()));

        table.add("range", sig(vec![int()], list(int())));
        table.add("range", sig(vec![int(), int()], list(int())));
        table.add("range", sig(vec![int(), int(), int()], list(int())));

        for name in ["max", "min"] {
            table.add(name, sig(vec![int(), int()], int()));
            table.add(name, sig(vec![float(), float()], float()));
            table.add(name, sig(vec![int(), float()], float()));
            table.add(name, sig(vec![float(), int()], float()));
            table.add(name, sig(vec![str_(), str_()], str_()));
            table.add(name, sig(vec![list(t())], t()));
        }

        table.add("sum", sig(vec![list(int())], int()));
        table.add("sum", sig(vec![list(float())], float()));

        table.add("round", sig(vec![float()], int()));
        table.add("round", sig(vec![float(), int()], float()));
        table.add("round", sig(vec![int()], int()));

        table.add("input", sig(vec![], str_()));
        table.add("input", sig(vec![str_()], str_()));

        table
    }
}

/// Builtin signatures plus the user definitions seen during one pass.
///
/// User definitions are keyed by the variable their definition binds, so two
/// functions of the same name in different scopes never collide, and a
/// definition never hides a builtin it does not shadow lexically.
#[derive(Debug, Clone)]
pub struct TypeStore {
    builtins: Arc<BuiltinSignatures>,
    user: HashMap<TypeVar, Signature>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    pub fn new() -> Self {
        Self {
            builtins: BuiltinSignatures::shared(),
            user: HashMap::new(),
        }
    }

    /// Builtin overloads registered under `name`
    pub fn lookup(&self, name: &str) -> &[Signature] {
        self.builtins.get(name).unwrap_or(&[])
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.get(name).is_some()
    }

    /// Record the signature of the definition bound to `var`, replacing any
    /// earlier one
    pub fn register_function(&mut self, var: TypeVar, params: Vec<Type>, ret: Type) {
        self.user.insert(var, Signature::from_types(params, ret));
    }

    /// Signature of the definition bound to `var`
    pub fn definition(&self, var: TypeVar) -> Option<&Signature> {
        self.user.get(&var)
    }

    /// Definition variables with a recorded signature
    pub fn definitions(&self) -> impl Iterator<Item = (TypeVar, &Signature)> + '_ {
        self.user.iter().map(|(var, sig)| (*var, sig))
    }

    /// Pick the first builtin overload of `name` that accepts `args`
    pub fn select(&self, name: &str, args: &[Type], store: &mut TypeConstraints) -> Selection {
        select_overload(self.lookup(name), args, store)
    }
}

/// First-viable overload selection over an explicit candidate list
pub fn select_overload(candidates: &[Signature], args: &[Type], store: &mut TypeConstraints) -> Selection {
    if candidates.is_empty() {
        return Selection::Unknown;
    }

    let mut shaped = candidates.iter().filter(|s| s.accepts(args.len())).peekable();
    let Some(reported) = shaped.peek().copied() else {
        // Ties go to the earlier overload
        let expected = candidates
            .iter()
            .map(Signature::arity)
            .min_by_key(|arity| arity.abs_diff(args.len()))
            .unwrap_or_default();
        return Selection::ArityMismatch { expected };
    };

    for (index, signature) in shaped.enumerate() {
        match signature.apply(store, args) {
            Ok(ret) => {
                trace!(index, "overload selected");
                return Selection::Matched(store.resolve_type(&ret));
            }
            Err(err) => trace!(index, %err, "overload rejected"),
        }
    }

    let (params, _) = reported.instantiate(store, args.len());
    Selection::NoMatch {
        params: params.iter().map(|p| store.probe_type(p)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_prefers_int() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        let a = constraints.fresh();
        let b = constraints.fresh();
        let selection = store.select("__add__", &[a.clone(), b.clone()], &mut constraints);
        assert_eq!(selection, Selection::Matched(Type::int()));
        assert_eq!(constraints.resolve_type(&a), Type::int());
        assert_eq!(constraints.resolve_type(&b), Type::int());
    }

    #[test]
    fn test_mixed_numeric_and_str() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        assert_eq!(
            store.select("__add__", &[Type::int(), Type::float()], &mut constraints),
            Selection::Matched(Type::float())
        );
        assert_eq!(
            store.select("__mul__", &[Type::str(), Type::int()], &mut constraints),
            Selection::Matched(Type::str())
        );
        assert_eq!(
            store.select("__add__", &[Type::int(), Type::str()], &mut constraints),
            Selection::NoMatch {
                params: vec![Type::int(), Type::int()]
            }
        );
    }

    #[test]
    fn test_generic_list_overloads() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        let selection = store.select(
            "__getitem__",
            &[Type::list(Type::str()), Type::int()],
            &mut constraints,
        );
        assert_eq!(selection, Selection::Matched(Type::str()));

        let Selection::Matched(ret) = store.select(
            "__add__",
            &[Type::list(Type::int()), Type::list(Type::int())],
            &mut constraints,
        ) else {
            panic!("list concatenation should match");
        };
        assert_eq!(constraints.resolve_type(&ret), Type::list(Type::int()));
    }

    #[test]
    fn test_variadic_print_and_arity() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        assert_eq!(
            store.select("print", &[Type::int(), Type::str(), Type::float()], &mut constraints),
            Selection::Matched(Type::none())
        );
        assert_eq!(store.select("print", &[], &mut constraints), Selection::Matched(Type::none()));
        assert_eq!(
            store.select("range", &[], &mut constraints),
            Selection::ArityMismatch { expected: 1 }
        );
        assert_eq!(store.select("nope", &[], &mut constraints), Selection::Unknown);
    }

    #[test]
    fn test_failed_overloads_leave_no_bindings() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        let arg = constraints.fresh_tvar();
        constraints.unify_var(arg, &Type::list(Type::bool())).unwrap();
        let selection = store.select("sum", &[Type::Var(arg)], &mut constraints);
        assert!(matches!(selection, Selection::NoMatch { .. }));
        assert_eq!(constraints.resolve(arg), Type::list(Type::bool()));
    }

    #[test]
    fn test_arity_mismatch_reports_closest_overload() {
        let store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        let args = vec![Type::int(); 5];
        assert_eq!(
            store.select("range", &args, &mut constraints),
            Selection::ArityMismatch { expected: 3 }
        );
        assert_eq!(
            store.select("round", &vec![Type::float(); 4], &mut constraints),
            Selection::ArityMismatch { expected: 2 }
        );
        // 1 and 3 are equally close to 2; the earlier overload wins
        let tied = vec![
            Signature::from_types(vec![Type::int()], Type::int()),
            Signature::from_types(vec![Type::int(); 3], Type::int()),
        ];
        assert_eq!(
            select_overload(&tied, &[Type::int(), Type::int()], &mut constraints),
            Selection::ArityMismatch { expected: 1 }
        );
    }

    #[test]
    fn test_user_definitions_keyed_by_variable() {
        let mut store = TypeStore::new();
        let mut constraints = TypeConstraints::new();
        let outer = constraints.fresh_tvar();
        let inner = constraints.fresh_tvar();
        store.register_function(outer, vec![Type::int()], Type::str());
        store.register_function(inner, vec![], Type::none());
        assert_eq!(store.definition(outer).map(Signature::arity), Some(1));
        assert_eq!(store.definition(inner).map(Signature::arity), Some(0));

        store.register_function(outer, vec![Type::int(), Type::int()], Type::str());
        assert_eq!(store.definition(outer).map(Signature::arity), Some(2));
        assert_eq!(store.definitions().count(), 2);

        // Builtins are untouched by user definitions
        assert_eq!(store.lookup("len").len(), 3);
        assert!(store.is_builtin("len"));
    }

    #[test]
    fn test_builtins_are_shared() {
        let a = BuiltinSignatures::shared();
        let b = BuiltinSignatures::shared();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.get("__iter__").is_some());
    }
}
