//! Type inference for the Python teaching subset
//!
//! One [`Inferer`] walks a parsed module once. Every node owns a type
//! variable in a [`TypeConstraints`] arena, scopes live in an
//! [`Environments`] arena, and operators and builtins are resolved through
//! the [`TypeStore`]. The walk never stops on a type error: the offending
//! node is bound to an error term and recorded as a [`TypeErrorSite`].

pub mod constraints;
pub mod environment;
pub mod messages;
pub mod type_store;
pub mod types;

mod calls;
mod expressions;
mod statements;

pub use constraints::{TypeConstraints, UnifyError, VarState};
pub use environment::{Environments, NameResolutionError, Scope, ScopeId, ScopeKind};
pub use type_store::{BuiltinSignatures, SigType, Selection, Signature, TypeStore};
pub use types::{ErrorKind, Type, TypeError, TypeVar};

use crate::diagnostics::Span;
use crate::parser::ast::{Module, NodeId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// A node where a type error originated
#[derive(Debug, Clone, PartialEq)]
pub struct TypeErrorSite {
    pub node: NodeId,
    pub span: Span,
    pub error: TypeError,
}

impl TypeErrorSite {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }
}

/// Result of inferring one module
#[derive(Debug, Clone)]
pub struct TypeInference {
    constraints: TypeConstraints,
    envs: Environments,
    type_store: TypeStore,
    node_types: HashMap<NodeId, TypeVar>,
    scopes: HashMap<NodeId, ScopeId>,
    module_scope: ScopeId,
    errors: Vec<TypeErrorSite>,
}

impl TypeInference {
    /// Resolved type of a node
    pub fn type_of(&self, node: NodeId) -> Option<Type> {
        self.node_types
            .get(&node)
            .map(|var| self.constraints.probe(*var))
    }

    pub fn type_var_of(&self, node: NodeId) -> Option<TypeVar> {
        self.node_types.get(&node).copied()
    }

    /// Scope opened by a module, def, class or lambda node
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.get(&node).copied()
    }

    pub fn module_scope(&self) -> ScopeId {
        self.module_scope
    }

    pub fn lookup_in_env(&self, scope: ScopeId, name: &str) -> Result<TypeVar, NameResolutionError> {
        self.envs.lookup_in_env(scope, name)
    }

    pub fn resolve(&self, var: TypeVar) -> Type {
        self.constraints.probe(var)
    }

    /// Resolved type of `name` as seen from `scope`
    pub fn binding_type(&self, scope: ScopeId, name: &str) -> Option<Type> {
        self.envs
            .lookup_in_env(scope, name)
            .ok()
            .map(|var| self.resolve(var))
    }

    /// Module-level bindings and their types, sorted by name
    pub fn module_bindings(&self) -> Vec<(String, Type)> {
        let mut bindings: Vec<(String, Type)> = self
            .envs
            .scope(self.module_scope)
            .bindings()
            .map(|(name, var)| (name.to_string(), self.resolve(var)))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    pub fn errors(&self) -> &[TypeErrorSite] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn constraints(&self) -> &TypeConstraints {
        &self.constraints
    }

    pub fn environments(&self) -> &Environments {
        &self.envs
    }

    pub fn type_store(&self) -> &TypeStore {
        &self.type_store
    }
}

/// Infer types for every node of `module`
pub fn infer_module(module: &Module) -> TypeInference {
    Inferer::new().infer(module)
}

/// What a call needs to know about a definition beyond its type
#[derive(Debug, Clone)]
struct CalleeInfo {
    name: String,
    /// Any parameter or the return carries an annotation
    annotated: bool,
    /// Parameters without a default
    required: usize,
    /// Defined directly in a class body
    method: bool,
}

/// The function whose body is being walked
#[derive(Debug, Clone)]
struct FunctionFrame {
    name: String,
    return_var: TypeVar,
    annotated: bool,
}

/// Single-pass tree walker
#[derive(Debug)]
pub struct Inferer {
    constraints: TypeConstraints,
    envs: Environments,
    type_store: TypeStore,
    module_scope: ScopeId,
    /// Scope of the code being walked
    scope: ScopeId,
    frames: Vec<FunctionFrame>,
    /// Names of the class bodies being walked, innermost last
    classes: Vec<String>,
    class_scopes: HashMap<String, ScopeId>,
    node_types: HashMap<NodeId, TypeVar>,
    scopes: HashMap<NodeId, ScopeId>,
    /// Definition variables bound ahead of their statement
    prebound: HashMap<NodeId, TypeVar>,
    callees: HashMap<TypeVar, CalleeInfo>,
    errors: Vec<TypeErrorSite>,
}

impl Default for Inferer {
    fn default() -> Self {
        Self::new()
    }
}

impl Inferer {
    pub fn new() -> Self {
        Self::with_type_store(TypeStore::new())
    }

    /// Start from a given store of builtin signatures
    pub fn with_type_store(type_store: TypeStore) -> Self {
        let mut envs = Environments::new();
        let module_scope = envs.new_scope(None, ScopeKind::Module);
        Self {
            constraints: TypeConstraints::new(),
            envs,
            type_store,
            module_scope,
            scope: module_scope,
            frames: Vec::new(),
            classes: Vec::new(),
            class_scopes: HashMap::new(),
            node_types: HashMap::new(),
            scopes: HashMap::new(),
            prebound: HashMap::new(),
            callees: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn infer(mut self, module: &Module) -> TypeInference {
        self.scopes.insert(module.id, self.module_scope);
        self.visit_block(&module.body);
        debug!(
            errors = self.errors.len(),
            variables = self.constraints.len(),
            scopes = self.envs.len(),
            "inference finished"
        );

        TypeInference {
            constraints: self.constraints,
            envs: self.envs,
            type_store: self.type_store,
            node_types: self.node_types,
            scopes: self.scopes,
            module_scope: self.module_scope,
            errors: self.errors,
        }
    }

    /// The variable owned by `id`, minted on first use
    fn node_var(&mut self, id: NodeId) -> TypeVar {
        *self
            .node_types
            .entry(id)
            .or_insert_with(|| self.constraints.fresh_tvar())
    }

    /// Attach `ty` to the node and hand back the node's variable as a term
    fn set_node(&mut self, id: NodeId, ty: &Type) -> Type {
        let var = self.node_var(id);
        if let Err(err) = self.constraints.unify_var(var, ty) {
            trace!(node = id.0, %err, "node type conflict");
        }
        Type::Var(var)
    }

    /// Unify where a failure is not reported to the user; a failure leaves
    /// the store untouched.
    fn constrain(&mut self, var: TypeVar, ty: &Type) {
        if let Err(err) = self.constraints.transaction(|s| s.unify_var(var, ty)) {
            trace!(%var, %err, "constraint dropped");
        }
    }

    fn record_error(&mut self, node: NodeId, span: &Span, error: TypeError) -> Type {
        debug!(
            line = span.start_line,
            kind = ?error.kind,
            message = error.message.lines().next().unwrap_or_default(),
            "type error"
        );
        self.errors.push(TypeErrorSite {
            node,
            span: span.clone(),
            error: error.clone(),
        });
        Type::Error(error)
    }

    /// The error `ty` resolves to, if any
    fn propagated_error(&self, ty: &Type) -> Option<TypeError> {
        match self.constraints.shallow(ty) {
            Type::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Whether every pair unifies, leaving the store untouched either way
    fn unifiable(&mut self, params: &[Type], args: &[Type]) -> bool {
        let outcome: Result<(), Option<UnifyError>> = self.constraints.transaction(|s| {
            for (param, arg) in params.iter().zip(args) {
                s.unify(param, arg).map_err(Some)?;
            }
            Err(None)
        });
        matches!(outcome, Err(None))
    }

    /// Definition info for a callee, following unions made since it was bound
    fn callee_info(&self, var: TypeVar) -> Option<&CalleeInfo> {
        if let Some(info) = self.callees.get(&var) {
            return Some(info);
        }
        let root = self.constraints.root(var);
        self.callees
            .iter()
            .find(|(candidate, _)| self.constraints.root(**candidate) == root)
            .map(|(_, info)| info)
    }

    /// Recorded signature of a callee's definition, following unions made
    /// since it was bound
    fn definition_signature(&self, var: TypeVar) -> Option<&Signature> {
        if let Some(signature) = self.type_store.definition(var) {
            return Some(signature);
        }
        let root = self.constraints.root(var);
        self.type_store
            .definitions()
            .filter(|(candidate, _)| self.constraints.root(*candidate) == root)
            .min_by_key(|(candidate, _)| *candidate)
            .map(|(_, signature)| signature)
    }

    /// The class whose body is being walked directly
    fn enclosing_class(&self) -> Option<&str> {
        if self.envs.scope(self.scope).kind() == ScopeKind::Class {
            self.classes.last().map(String::as_str)
        } else {
            None
        }
    }

    /// Slot of `attr` on an instance of a known class, created on first use
    fn class_member(&mut self, receiver: &Type, attr: &str) -> Option<TypeVar> {
        let Type::Primitive(class) = self.constraints.shallow(receiver) else {
            return None;
        };
        let scope = *self.class_scopes.get(&class)?;
        if let Some(var) = self.envs.lookup_local(scope, attr) {
            return Some(var);
        }
        let var = self.constraints.fresh_tvar();
        self.envs.bind(scope, attr, var);
        Some(var)
    }

    fn with_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }
}
