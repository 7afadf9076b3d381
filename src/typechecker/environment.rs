//! Scoped name bindings.
//!
//! All scopes of one inference pass live in a single arena and refer to
//! their enclosing scope by index.

use super::types::TypeVar;
use std::collections::HashMap;

/// Index of a scope in [`Environments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of node introduced a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Lambda,
    Class,
}

/// A single lexical scope
#[derive(Debug, Clone)]
pub struct Scope {
    bindings: HashMap<String, TypeVar>,
    parent: Option<ScopeId>,
    kind: ScopeKind,
}

impl Scope {
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, TypeVar)> {
        self.bindings.iter().map(|(name, var)| (name.as_str(), *var))
    }
}

/// Name lookup failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("name '{name}' is not defined")]
pub struct NameResolutionError {
    pub name: String,
}

/// Arena of scopes
#[derive(Debug, Clone, Default)]
pub struct Environments {
    scopes: Vec<Scope>,
}

impl Environments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            bindings: HashMap::new(),
            parent,
            kind,
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Bind `name` in `scope`, replacing any earlier binding there
    pub fn bind(&mut self, scope: ScopeId, name: impl Into<String>, var: TypeVar) {
        self.scopes[scope.index()].bindings.insert(name.into(), var);
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<TypeVar> {
        self.scope(scope).bindings.get(name).copied()
    }

    /// Find `name` in `scope` or the nearest enclosing scope binding it.
    ///
    /// Class bodies are only searched when the lookup starts in them.
    pub fn lookup_in_env(&self, scope: ScopeId, name: &str) -> Result<TypeVar, NameResolutionError> {
        if let Some(var) = self.lookup_local(scope, name) {
            return Ok(var);
        }
        let mut current = self.scope(scope).parent;
        while let Some(id) = current {
            let candidate = self.scope(id);
            if candidate.kind != ScopeKind::Class {
                if let Some(var) = candidate.bindings.get(name) {
                    return Ok(*var);
                }
            }
            current = candidate.parent;
        }
        Err(NameResolutionError {
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
