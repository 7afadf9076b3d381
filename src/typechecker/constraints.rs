//! Union-find constraint store.
//!
//! Every type variable is a slot in one arena. A slot either points at a
//! parent slot or is the root of its class; only roots carry a term. When a
//! unification between two concrete terms fails through a class, the root is
//! bound to an error term instead of aborting the pass.

use super::types::{Type, TypeError, TypeVar};
use tracing::trace;

#[derive(Debug, Clone)]
struct Slot {
    parent: TypeVar,
    rank: u8,
    term: Option<Type>,
}

impl Slot {
    fn root(var: TypeVar) -> Self {
        Self {
            parent: var,
            rank: 0,
            term: None,
        }
    }
}

/// Why a unification failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnifyError {
    #[error("cannot unify {} with {}", .expected.type_name(), .found.type_name())]
    Mismatch { expected: Type, found: Type },

    #[error("expected a callable with {expected} parameters but found one with {found}")]
    Arity { expected: usize, found: usize },

    #[error("{} would have to contain itself", .ty.type_name())]
    Occurs { var: TypeVar, ty: Type },
}

/// Observable state of a type variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarState {
    Unconstrained,
    BoundToVariable,
    BoundToTerm,
    BoundToError,
}

/// Arena of type variables with union-find classes
#[derive(Debug, Clone, Default)]
pub struct TypeConstraints {
    slots: Vec<Slot>,
    /// Prior contents of every slot written inside an open transaction
    trail: Vec<(usize, Slot)>,
    depth: usize,
}

impl TypeConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh, unconstrained type variable
    pub fn fresh_tvar(&mut self) -> TypeVar {
        let var = TypeVar(self.slots.len() as u32);
        self.slots.push(Slot::root(var));
        var
    }

    /// A fresh variable wrapped as a term
    pub fn fresh(&mut self) -> Type {
        Type::Var(self.fresh_tvar())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, var: TypeVar) -> &Slot {
        &self.slots[var.index()]
    }

    fn slot_mut(&mut self, var: TypeVar) -> &mut Slot {
        let index = var.index();
        if self.depth > 0 {
            self.trail.push((index, self.slots[index].clone()));
        }
        &mut self.slots[index]
    }

    /// Representative of `var`'s class without compressing
    pub fn root(&self, var: TypeVar) -> TypeVar {
        self.find_root(var)
    }

    fn find_root(&self, var: TypeVar) -> TypeVar {
        let mut current = var;
        while self.slot(current).parent != current {
            current = self.slot(current).parent;
        }
        current
    }

    /// Representative of `var`'s class, compressing the path walked
    pub fn find(&mut self, var: TypeVar) -> TypeVar {
        let root = self.find_root(var);
        let mut current = var;
        while current != root {
            let next = self.slot(current).parent;
            self.slot_mut(current).parent = root;
            current = next;
        }
        root
    }

    /// Assert that `a` and `b` denote the same type.
    ///
    /// On a concrete mismatch reached through a variable, the variable's
    /// class is bound to an error term and the mismatch is still returned.
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), UnifyError> {
        trace!(%a, %b, "unify");
        match (a, b) {
            (Type::Var(x), Type::Var(y)) => self.union(*x, *y),
            (Type::Var(x), term) => self.bind(*x, term),
            (term, Type::Var(y)) => self.bind(*y, term),
            _ => self.unify_terms(a, b),
        }
    }

    /// Unify two variables
    pub fn unify_vars(&mut self, a: TypeVar, b: TypeVar) -> Result<(), UnifyError> {
        self.unify(&Type::Var(a), &Type::Var(b))
    }

    /// Unify a variable with a term
    pub fn unify_var(&mut self, var: TypeVar, term: &Type) -> Result<(), UnifyError> {
        self.unify(&Type::Var(var), term)
    }

    fn union(&mut self, x: TypeVar, y: TypeVar) -> Result<(), UnifyError> {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return Ok(());
        }

        match (self.slot(rx).term.clone(), self.slot(ry).term.clone()) {
            (None, None) => {
                self.link(rx, ry, None);
                Ok(())
            }
            (Some(term), None) => self.link_bound(ry, rx, term),
            (None, Some(term)) => self.link_bound(rx, ry, term),
            (Some(left), Some(right)) => {
                if left.is_error() {
                    self.link(rx, ry, Some(left));
                    return Ok(());
                }
                if right.is_error() {
                    self.link(rx, ry, Some(right));
                    return Ok(());
                }
                match self.unify_terms(&left, &right) {
                    Ok(()) => {
                        self.link(rx, ry, Some(left));
                        Ok(())
                    }
                    Err(err) => {
                        self.link(rx, ry, Some(poisoned(&err)));
                        Err(err)
                    }
                }
            }
        }
    }

    /// Join the unbound class `free` into `bound`, whose root carries `term`
    fn link_bound(&mut self, free: TypeVar, bound: TypeVar, term: Type) -> Result<(), UnifyError> {
        if self.occurs(free, &term) {
            return Err(UnifyError::Occurs {
                var: free,
                ty: self.probe_type(&term),
            });
        }
        self.link(free, bound, Some(term));
        Ok(())
    }

    /// Merge two roots by rank; the surviving root receives `term`.
    fn link(&mut self, a: TypeVar, b: TypeVar, term: Option<Type>) {
        let (rank_a, rank_b) = (self.slot(a).rank, self.slot(b).rank);
        let (child, root) = if rank_a < rank_b { (a, b) } else { (b, a) };
        self.slot_mut(child).parent = root;
        self.slot_mut(child).term = None;
        if rank_a == rank_b {
            self.slot_mut(root).rank = rank_a.saturating_add(1);
        }
        self.slot_mut(root).term = term;
    }

    fn bind(&mut self, var: TypeVar, term: &Type) -> Result<(), UnifyError> {
        let root = self.find(var);
        match self.slot(root).term.clone() {
            None => {
                if !term.is_error() && self.occurs(root, term) {
                    return Err(UnifyError::Occurs {
                        var: root,
                        ty: self.probe_type(term),
                    });
                }
                self.slot_mut(root).term = Some(term.clone());
                Ok(())
            }
            Some(existing) if existing.is_error() => Ok(()),
            Some(_) if term.is_error() => {
                self.slot_mut(root).term = Some(term.clone());
                Ok(())
            }
            Some(existing) => match self.unify_terms(&existing, term) {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.poison(root, &err);
                    Err(err)
                }
            },
        }
    }

    fn unify_terms(&mut self, a: &Type, b: &Type) -> Result<(), UnifyError> {
        match (a, b) {
            (Type::Var(_), _) | (_, Type::Var(_)) => self.unify(a, b),
            (Type::Error(_), _) | (_, Type::Error(_)) => Ok(()),
            (Type::Primitive(x), Type::Primitive(y)) if x == y => Ok(()),
            (Type::Parametric(n1, args1), Type::Parametric(n2, args2))
                if n1 == n2 && args1.len() == args2.len() =>
            {
                let mismatch = self.mismatch(a, b);
                for (x, y) in args1.iter().zip(args2) {
                    self.unify(x, y).map_err(|_| mismatch.clone())?;
                }
                Ok(())
            }
            (
                Type::Callable {
                    params: p1,
                    ret: r1,
                },
                Type::Callable {
                    params: p2,
                    ret: r2,
                },
            ) => {
                if p1.len() != p2.len() {
                    return Err(UnifyError::Arity {
                        expected: p1.len(),
                        found: p2.len(),
                    });
                }
                let mismatch = self.mismatch(a, b);
                for (x, y) in p1.iter().zip(p2) {
                    self.unify(x, y).map_err(|_| mismatch.clone())?;
                }
                self.unify(r1, r2).map_err(|_| mismatch)
            }
            _ => Err(self.mismatch(a, b)),
        }
    }

    fn mismatch(&self, expected: &Type, found: &Type) -> UnifyError {
        UnifyError::Mismatch {
            expected: self.probe_type(expected),
            found: self.probe_type(found),
        }
    }

    /// Bind `var`'s class to an error term carrying `err`'s message
    pub fn poison(&mut self, var: TypeVar, err: &UnifyError) {
        let root = self.find(var);
        self.slot_mut(root).term = Some(poisoned(err));
    }

    /// Bind `var`'s class to a specific error term, regardless of its state
    pub fn set_error(&mut self, var: TypeVar, error: TypeError) {
        let root = self.find(var);
        self.slot_mut(root).term = Some(Type::Error(error));
    }

    /// Does `var`'s class appear anywhere inside `term`?
    pub fn occurs(&self, var: TypeVar, term: &Type) -> bool {
        let root = self.find_root(var);
        self.occurs_root(root, term)
    }

    fn occurs_root(&self, root: TypeVar, term: &Type) -> bool {
        match term {
            Type::Var(v) => {
                let r = self.find_root(*v);
                if r == root {
                    return true;
                }
                match &self.slot(r).term {
                    Some(inner) => self.occurs_root(root, inner),
                    None => false,
                }
            }
            Type::Parametric(_, args) => args.iter().any(|t| self.occurs_root(root, t)),
            Type::Callable { params, ret } => {
                params.iter().any(|t| self.occurs_root(root, t)) || self.occurs_root(root, ret)
            }
            Type::Primitive(_) | Type::Error(_) => false,
        }
    }

    /// Fully resolve `var`, compressing paths along the way
    pub fn resolve(&mut self, var: TypeVar) -> Type {
        let root = self.find(var);
        match self.slot(root).term.clone() {
            None => Type::Var(root),
            Some(term) => self.resolve_type(&term),
        }
    }

    /// Fully resolve every variable inside `term`
    pub fn resolve_type(&mut self, term: &Type) -> Type {
        match term {
            Type::Var(v) => self.resolve(*v),
            Type::Parametric(name, args) => Type::Parametric(
                name.clone(),
                args.iter().map(|t| self.resolve_type(t)).collect(),
            ),
            Type::Callable { params, ret } => Type::Callable {
                params: params.iter().map(|t| self.resolve_type(t)).collect(),
                ret: Box::new(self.resolve_type(ret)),
            },
            Type::Primitive(_) | Type::Error(_) => term.clone(),
        }
    }

    /// Read-only counterpart of [`resolve`](Self::resolve)
    pub fn probe(&self, var: TypeVar) -> Type {
        let root = self.find_root(var);
        match &self.slot(root).term {
            None => Type::Var(root),
            Some(term) => self.probe_type(term),
        }
    }

    /// Read-only counterpart of [`resolve_type`](Self::resolve_type)
    pub fn probe_type(&self, term: &Type) -> Type {
        match term {
            Type::Var(v) => self.probe(*v),
            Type::Parametric(name, args) => {
                Type::Parametric(name.clone(), args.iter().map(|t| self.probe_type(t)).collect())
            }
            Type::Callable { params, ret } => Type::Callable {
                params: params.iter().map(|t| self.probe_type(t)).collect(),
                ret: Box::new(self.probe_type(ret)),
            },
            Type::Primitive(_) | Type::Error(_) => term.clone(),
        }
    }

    /// Shallow view of a term: a variable is replaced by its class term
    /// without resolving nested variables.
    pub fn shallow(&self, term: &Type) -> Type {
        match term {
            Type::Var(v) => {
                let root = self.find_root(*v);
                self.slot(root).term.clone().unwrap_or(Type::Var(root))
            }
            _ => term.clone(),
        }
    }

    pub fn state(&self, var: TypeVar) -> VarState {
        let root = self.find_root(var);
        match &self.slot(root).term {
            Some(Type::Error(_)) => VarState::BoundToError,
            Some(_) => VarState::BoundToTerm,
            None if root != var => VarState::BoundToVariable,
            None => VarState::Unconstrained,
        }
    }

    /// Parameter and return types of `term` if it resolves to a callable
    pub fn types_in_callable(&self, term: &Type) -> Option<(Vec<Type>, Type)> {
        match self.probe_type(term) {
            Type::Callable { params, ret } => Some((params, *ret)),
            _ => None,
        }
    }

    /// Run `f`, undoing every binding it made if it fails.
    ///
    /// Only slots written inside `f` are restored, so the cost is
    /// proportional to the work `f` did. Variables minted inside a failed
    /// transaction stay valid but are reset to unconstrained. Transactions
    /// nest: an inner commit is undone by a failing outer one.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let mark = self.trail.len();
        let base = self.slots.len();
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        if result.is_err() {
            for (index, slot) in self.trail.drain(mark..).rev() {
                self.slots[index] = slot;
            }
            for index in base..self.slots.len() {
                self.slots[index] = Slot::root(TypeVar(index as u32));
            }
        } else if self.depth == 0 {
            self.trail.clear();
        }
        result
    }
}

fn poisoned(err: &UnifyError) -> Type {
    Type::Error(TypeError::unification(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_concrete_term_wins() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let b = store.fresh_tvar();
        store.unify_vars(a, b).unwrap();
        store.unify_var(b, &Type::int()).unwrap();
        assert_eq!(store.resolve(a), Type::int());
        assert_eq!(store.resolve(b), Type::int());
    }

    #[test]
    fn test_unify_is_idempotent() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let b = store.fresh_tvar();
        store.unify_vars(a, b).unwrap();
        store.unify_var(a, &Type::str()).unwrap();
        let before = (store.resolve(a), store.resolve(b), store.state(a), store.state(b));
        store.unify_vars(a, b).unwrap();
        store.unify_var(b, &Type::str()).unwrap();
        let after = (store.resolve(a), store.resolve(b), store.state(a), store.state(b));
        assert_eq!(before, after);
    }

    #[test]
    fn test_mismatch_poisons_class() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let b = store.fresh_tvar();
        store.unify_vars(a, b).unwrap();
        store.unify_var(a, &Type::int()).unwrap();

        let err = store.unify_var(b, &Type::str()).unwrap_err();
        assert_eq!(
            err,
            UnifyError::Mismatch {
                expected: Type::int(),
                found: Type::str()
            }
        );
        assert!(store.resolve(a).is_error());
        assert_eq!(store.state(b), VarState::BoundToError);
    }

    #[test]
    fn test_error_absorbs() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        store.set_error(a, TypeError::unification("first"));
        assert!(store.unify_var(a, &Type::int()).is_ok());

        let b = store.fresh_tvar();
        store.unify_var(b, &Type::float()).unwrap();
        store.unify_vars(a, b).unwrap();
        assert_eq!(
            store.resolve(b).as_error().map(|e| e.message.clone()),
            Some("first".to_string())
        );
    }

    #[test]
    fn test_structural_unification() {
        let mut store = TypeConstraints::new();
        let elem = store.fresh();
        let ret = store.fresh();
        store
            .unify(
                &Type::callable(vec![Type::list(elem.clone())], ret.clone()),
                &Type::callable(vec![Type::list(Type::int())], Type::bool()),
            )
            .unwrap();
        assert_eq!(store.resolve_type(&elem), Type::int());
        assert_eq!(store.resolve_type(&ret), Type::bool());
    }

    #[test]
    fn test_callable_arity_mismatch() {
        let mut store = TypeConstraints::new();
        let err = store
            .unify(
                &Type::callable(vec![Type::int()], Type::none()),
                &Type::callable(vec![], Type::none()),
            )
            .unwrap_err();
        assert_eq!(err, UnifyError::Arity { expected: 1, found: 0 });
    }

    #[test]
    fn test_occurs_check() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let err = store.unify_var(a, &Type::list(Type::Var(a))).unwrap_err();
        assert!(matches!(err, UnifyError::Occurs { .. }));
        assert_eq!(store.state(a), VarState::Unconstrained);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let result: Result<(), UnifyError> = store.transaction(|s| {
            s.unify_var(a, &Type::int())?;
            let b = s.fresh_tvar();
            s.unify_vars(a, b)?;
            s.unify_var(b, &Type::str())
        });
        assert!(result.is_err());
        assert_eq!(store.state(a), VarState::Unconstrained);
        assert_eq!(store.len(), 2);
        assert_eq!(store.state(TypeVar(1)), VarState::Unconstrained);

        store.transaction(|s| s.unify_var(a, &Type::float())).unwrap();
        assert_eq!(store.resolve(a), Type::float());
    }

    #[test]
    fn test_nested_transaction_undone_by_outer_failure() {
        let mut store = TypeConstraints::new();
        let a = store.fresh_tvar();
        let b = store.fresh_tvar();
        let result: Result<(), UnifyError> = store.transaction(|s| {
            s.transaction(|s| s.unify_vars(a, b))?;
            let inner: Result<(), UnifyError> = s.transaction(|s| {
                s.unify_var(b, &Type::int())?;
                s.unify_var(a, &Type::str())
            });
            assert!(inner.is_err());
            assert_eq!(s.root(a), s.root(b));
            assert!(matches!(s.probe(a), Type::Var(_)));
            s.unify_var(a, &Type::bool())?;
            Err(s.mismatch(&Type::bool(), &Type::none()))
        });
        assert!(result.is_err());
        assert_eq!(store.state(a), VarState::Unconstrained);
        assert_eq!(store.state(b), VarState::Unconstrained);
        assert_ne!(store.root(a), store.root(b));

        store.transaction(|s| s.unify_vars(a, b)).unwrap();
        store.unify_var(a, &Type::float()).unwrap();
        assert_eq!(store.resolve(b), Type::float());
    }

    #[test]
    fn test_committed_transactions_leave_no_trail() {
        let mut store = TypeConstraints::new();
        let vars: Vec<_> = (0..64).map(|_| store.fresh_tvar()).collect();
        for pair in vars.windows(2) {
            store.transaction(|s| s.unify_vars(pair[0], pair[1])).unwrap();
            assert!(store.trail.is_empty());
        }
        let failed: Result<(), UnifyError> = store.transaction(|s| {
            s.unify_var(vars[0], &Type::int())?;
            s.unify_var(vars[63], &Type::str())
        });
        assert!(failed.is_err());
        assert!(store.trail.is_empty());
        assert!(vars.iter().all(|v| store.state(*v) != VarState::BoundToError));
        assert!(vars.iter().all(|v| !matches!(store.probe(*v), Type::Primitive(_))));
    }

    #[test]
    fn test_path_compression_keeps_answers() {
        let mut store = TypeConstraints::new();
        let vars: Vec<_> = (0..8).map(|_| store.fresh_tvar()).collect();
        for pair in vars.windows(2) {
            store.unify_vars(pair[0], pair[1]).unwrap();
        }
        store.unify_var(vars[3], &Type::bool()).unwrap();
        for v in &vars {
            assert_eq!(store.probe(*v), Type::bool());
            assert_eq!(store.resolve(*v), Type::bool());
        }
        let root = store.find(vars[0]);
        assert!(vars.iter().all(|v| store.find(*v) == root));
    }

    #[test]
    fn test_types_in_callable() {
        let mut store = TypeConstraints::new();
        let f = store.fresh_tvar();
        store
            .unify_var(f, &Type::callable(vec![Type::int(), Type::str()], Type::float()))
            .unwrap();
        let (params, ret) = store.types_in_callable(&Type::Var(f)).unwrap();
        assert_eq!(params, vec![Type::int(), Type::str()]);
        assert_eq!(ret, Type::float());
        assert!(store.types_in_callable(&Type::int()).is_none());
    }
}
