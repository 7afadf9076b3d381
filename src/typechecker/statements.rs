//! Statements: definitions, bindings and control flow

use super::messages::{
    assignment_message, iterate_message, return_message, unpack_message, Operand,
};
use super::types::{LIST, TUPLE};
use super::{
    CalleeInfo, FunctionFrame, Inferer, ScopeId, ScopeKind, Selection, Type, TypeError, TypeVar,
};
use crate::diagnostics::Span;
use crate::parser::ast::{ClassDef, Expr, FunctionDef, NodeId, Param, Stmt};
use tracing::debug;

impl Inferer {
    pub(super) fn visit_block(&mut self, stmts: &[Stmt]) {
        self.prebind(stmts);
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    /// Bind the def and class names of a block before walking it, so bodies
    /// may refer to definitions further down. Annotated parameters and
    /// returns are known up front, so an early call is checked against them.
    fn prebind(&mut self, stmts: &[Stmt]) {
        let class = self.enclosing_class().map(str::to_string);
        for stmt in stmts {
            match stmt {
                Stmt::FunctionDef(def) => {
                    if self.envs.lookup_local(self.scope, &def.name).is_some() {
                        continue;
                    }
                    let var = self.constraints.fresh_tvar();
                    let params = def
                        .params
                        .iter()
                        .enumerate()
                        .map(|(index, param)| match (&param.annotation, &class) {
                            (Some(annotation), _) => self.annotation_type(annotation),
                            (None, Some(class)) if index == 0 => Type::primitive(class.as_str()),
                            _ => self.constraints.fresh(),
                        })
                        .collect();
                    let ret = match &def.returns {
                        Some(returns) => self.annotation_type(returns),
                        None => self.constraints.fresh(),
                    };
                    self.constrain(var, &Type::callable(params, ret));
                    self.envs.bind(self.scope, def.name.as_str(), var);
                    self.callees.insert(var, callee_for(def, class.is_some()));
                    self.prebound.insert(def.id, var);
                }
                Stmt::ClassDef(def) => {
                    if self.envs.lookup_local(self.scope, &def.name).is_some() {
                        continue;
                    }
                    let var = self.constraints.fresh_tvar();
                    self.envs.bind(self.scope, def.name.as_str(), var);
                    self.prebound.insert(def.id, var);
                }
                _ => {}
            }
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(def) => self.visit_function_def(def),
            Stmt::ClassDef(def) => self.visit_class_def(def),
            Stmt::Return { id, span, value } => self.visit_return(*id, span, value.as_ref()),
            Stmt::Assign {
                id,
                span,
                targets,
                value,
            } => {
                let ty = self.visit_expr(value);
                let text = super::expressions::operand_text(value);
                let mut failure = None;
                for target in targets {
                    failure = self.assign(*id, span, "Assign", target, &ty, &text).or(failure);
                }
                self.set_node(*id, &failure.unwrap_or(ty));
            }
            Stmt::AnnAssign {
                id,
                span,
                target,
                annotation,
                value,
            } => self.visit_ann_assign(*id, span, target, annotation, value.as_ref()),
            Stmt::AugAssign {
                id,
                span,
                target,
                op,
                value,
            } => {
                // The target is walked once; its slot is the value just read
                let current = self.visit_expr(target);
                let operand = self.visit_expr(value);
                let result = self.binary_operation(*id, span, *op, target, &current, value, &operand);
                let failure = if self.propagated_error(&current).is_some() {
                    None
                } else {
                    let text = format!("{} {}= {}", target, op.symbol(), value);
                    let name = target.to_string();
                    self.rebind(*id, span, "AugAssign", &name, &current, &result, &text)
                };
                self.set_node(*id, &failure.unwrap_or(result));
            }
            Stmt::Expr { id, expr, .. } => {
                let ty = self.visit_expr(expr);
                self.set_node(*id, &ty);
            }
            Stmt::If {
                id,
                test,
                body,
                orelse,
                ..
            } => {
                self.visit_expr(test);
                self.visit_block(body);
                self.visit_block(orelse);
                self.set_node(*id, &Type::none());
            }
            Stmt::While { id, test, body, .. } => {
                self.visit_expr(test);
                self.visit_block(body);
                self.set_node(*id, &Type::none());
            }
            Stmt::For {
                id,
                span,
                target,
                iter,
                body,
            } => self.visit_for(*id, span, target, iter, body),
            Stmt::Import { id, names, .. } => {
                for alias in names {
                    let var = self.constraints.fresh_tvar();
                    self.envs.bind(self.scope, alias.bound_name(), var);
                }
                self.set_node(*id, &Type::none());
            }
            Stmt::Assert { id, test, msg, .. } => {
                self.visit_expr(test);
                if let Some(msg) = msg {
                    self.visit_expr(msg);
                }
                self.set_node(*id, &Type::none());
            }
            Stmt::Pass { id, .. } | Stmt::Break { id, .. } | Stmt::Continue { id, .. } => {
                self.set_node(*id, &Type::none());
            }
        }
    }

    /// The variable a definition binds: its pre-bound slot, or a new binding
    fn definition_var(&mut self, id: NodeId, name: &str) -> (TypeVar, bool) {
        if let Some(var) = self.prebound.remove(&id) {
            return (var, true);
        }
        let var = self.constraints.fresh_tvar();
        self.envs.bind(self.scope, name, var);
        (var, false)
    }

    fn visit_function_def(&mut self, def: &FunctionDef) {
        let class = self.enclosing_class().map(str::to_string);
        let (fn_var, prebound) = self.definition_var(def.id, &def.name);
        if !prebound {
            self.callees.insert(fn_var, callee_for(def, class.is_some()));
        }

        let defaults: Vec<Option<Type>> = def
            .params
            .iter()
            .map(|p| p.default.as_ref().map(|d| self.visit_expr(d)))
            .collect();

        let scope = self.envs.new_scope(Some(self.scope), ScopeKind::Function);
        self.scopes.insert(def.id, scope);
        let params = self.bind_params(scope, &def.params, &defaults, class.as_deref());

        let return_var = self.constraints.fresh_tvar();
        self.envs.bind(scope, "return", return_var);
        if let Some(returns) = &def.returns {
            let declared = self.annotation_type(returns);
            self.constrain(return_var, &declared);
        }

        // Bound and registered before the body so recursive calls see the parameters
        let signature = Type::callable(params.clone(), Type::Var(return_var));
        if let Err(err) = self.constraints.unify_var(fn_var, &signature) {
            let message = format!(
                "In the FunctionDef node in line {}, the definition of \"{}\" contradicts an earlier use: {}.",
                def.span.start_line, def.name, err
            );
            self.record_error(def.id, &def.span, TypeError::unification(message));
        }
        self.type_store
            .register_function(fn_var, params, Type::Var(return_var));

        self.frames.push(FunctionFrame {
            name: def.name.clone(),
            return_var,
            annotated: def.returns.is_some(),
        });
        self.with_scope(scope, |this| this.visit_block(&def.body));
        self.frames.pop();

        if !contains_return(&def.body) {
            self.constrain(return_var, &Type::none());
        }

        self.set_node(def.id, &Type::Var(fn_var));
        debug!(
            function = %def.name,
            signature = %self.constraints.probe(fn_var),
            "inferred function signature"
        );
    }

    /// Bind each parameter in `scope` to its node's variable
    pub(super) fn bind_params(
        &mut self,
        scope: ScopeId,
        params: &[Param],
        defaults: &[Option<Type>],
        class: Option<&str>,
    ) -> Vec<Type> {
        let mut types = Vec::with_capacity(params.len());
        for (index, (param, default)) in params.iter().zip(defaults).enumerate() {
            let var = self.node_var(param.id);
            self.envs.bind(scope, param.name.as_str(), var);
            match (&param.annotation, class) {
                (Some(annotation), _) => {
                    let declared = self.annotation_type(annotation);
                    self.constrain(var, &declared);
                }
                (None, Some(class)) if index == 0 => {
                    self.constrain(var, &Type::primitive(class));
                }
                _ => {}
            }
            if let Some(default) = default {
                self.constrain(var, default);
            }
            types.push(Type::Var(var));
        }
        types
    }

    fn visit_class_def(&mut self, def: &ClassDef) {
        let (class_var, _) = self.definition_var(def.id, &def.name);
        for base in &def.bases {
            self.visit_expr(base);
        }

        let scope = self.envs.new_scope(Some(self.scope), ScopeKind::Class);
        self.scopes.insert(def.id, scope);
        self.class_scopes.insert(def.name.clone(), scope);
        self.classes.push(def.name.clone());
        self.with_scope(scope, |this| this.visit_block(&def.body));
        self.classes.pop();

        // The constructor takes __init__'s parameters after self
        let mut params = Vec::new();
        let mut annotated = false;
        let mut required = 0;
        if let Some(init) = self.envs.lookup_local(scope, "__init__") {
            if let Type::Callable { params: init_params, .. } = self.constraints.shallow(&Type::Var(init)) {
                params = init_params.into_iter().skip(1).collect();
                required = params.len();
            }
            if let Some(info) = self.callee_info(init) {
                annotated = info.annotated;
                required = info.required.saturating_sub(1);
            }
        }

        let constructor = Type::callable(params, Type::primitive(def.name.as_str()));
        if let Err(err) = self.constraints.unify_var(class_var, &constructor) {
            let message = format!(
                "In the ClassDef node in line {}, the class \"{}\" contradicts an earlier use: {}.",
                def.span.start_line, def.name, err
            );
            self.record_error(def.id, &def.span, TypeError::unification(message));
        }
        self.callees.insert(
            class_var,
            CalleeInfo {
                name: def.name.clone(),
                annotated,
                required,
                method: false,
            },
        );
        self.set_node(def.id, &Type::Var(class_var));
        debug!(
            class = %def.name,
            constructor = %self.constraints.probe(class_var),
            "inferred class"
        );
    }

    fn visit_return(&mut self, id: NodeId, span: &Span, value: Option<&Expr>) {
        let ty = match value {
            Some(expr) => self.visit_expr(expr),
            None => Type::none(),
        };
        let Some(frame) = self.frames.last() else {
            self.set_node(id, &ty);
            return;
        };
        let (function, return_var, annotated) = (frame.name.clone(), frame.return_var, frame.annotated);
        if self.propagated_error(&ty).is_some() {
            self.set_node(id, &ty);
            return;
        }

        let expected = self.constraints.probe(return_var);
        let found = self.constraints.probe_type(&ty);
        let node_ty = match self.constraints.transaction(|s| s.unify_var(return_var, &ty)) {
            Ok(()) => ty,
            Err(_) => {
                let text = value.map_or_else(|| "None".to_string(), super::expressions::operand_text);
                let message = return_message(
                    span.start_line,
                    &function,
                    &expected,
                    &Operand { ty: &found, text },
                    annotated,
                );
                self.record_error(id, span, TypeError::unification(message))
            }
        };
        self.set_node(id, &node_ty);
    }

    fn visit_ann_assign(
        &mut self,
        id: NodeId,
        span: &Span,
        target: &Expr,
        annotation: &Expr,
        value: Option<&Expr>,
    ) {
        let declared = self.annotation_type(annotation);
        if let Expr::Name {
            id: target_id,
            name,
            ..
        } = target
        {
            let var = match self.envs.lookup_local(self.scope, name) {
                Some(var) => var,
                None => {
                    let var = self.constraints.fresh_tvar();
                    self.envs.bind(self.scope, name.as_str(), var);
                    var
                }
            };
            self.set_node(*target_id, &Type::Var(var));
            self.constrain(var, &declared);
        }

        let failure = match value {
            Some(value) => {
                let ty = self.visit_expr(value);
                let text = super::expressions::operand_text(value);
                self.assign(id, span, "AnnAssign", target, &ty, &text)
            }
            None => None,
        };
        self.set_node(id, &failure.unwrap_or(declared));
    }

    fn visit_for(&mut self, id: NodeId, span: &Span, target: &Expr, iter: &Expr, body: &[Stmt]) {
        let iterable = self.visit_expr(iter);
        let element = self.element_type(id, span, iter, &iterable);
        let text = format!("an element of {}", iter);
        let failure = self.assign(id, span, "For", target, &element, &text);
        self.visit_block(body);
        self.set_node(id, &failure.unwrap_or_else(Type::none));
    }

    /// Type of the values produced by iterating `iterable`
    fn element_type(&mut self, id: NodeId, span: &Span, iter: &Expr, iterable: &Type) -> Type {
        if let Some(err) = self.propagated_error(iterable) {
            return Type::Error(err);
        }
        if let Type::Parametric(name, elems) = self.constraints.shallow(iterable) {
            if name == TUPLE {
                return self.common_type(&elems);
            }
        }
        match self
            .type_store
            .select("__iter__", std::slice::from_ref(iterable), &mut self.constraints)
        {
            Selection::Matched(ty) => ty,
            _ => {
                let found = self.constraints.probe_type(iterable);
                let message = iterate_message(
                    span.start_line,
                    &Operand {
                        ty: &found,
                        text: super::expressions::operand_text(iter),
                    },
                );
                self.record_error(id, span, TypeError::unification(message))
            }
        }
    }

    /// Bind `target` to `ty`. Returns the error term when the binding
    /// contradicts what the target already holds.
    fn assign(
        &mut self,
        stmt: NodeId,
        span: &Span,
        node: &str,
        target: &Expr,
        ty: &Type,
        text: &str,
    ) -> Option<Type> {
        match target {
            Expr::Name { id, name, .. } => match self.envs.lookup_local(self.scope, name) {
                Some(var) => {
                    if !self.node_types.contains_key(id) {
                        self.set_node(*id, &Type::Var(var));
                    }
                    self.rebind(stmt, span, node, name, &Type::Var(var), ty, text)
                }
                None => {
                    let var = self.constraints.fresh_tvar();
                    self.envs.bind(self.scope, name.as_str(), var);
                    self.constrain(var, ty);
                    if !self.node_types.contains_key(id) {
                        self.set_node(*id, &Type::Var(var));
                    }
                    None
                }
            },
            Expr::Tuple { id, elts, .. } | Expr::List { id, elts, .. } => match self.unpack(ty, elts.len()) {
                Some(parts) => {
                    let mut failure = None;
                    for (elt, part) in elts.iter().zip(&parts) {
                        failure = self.assign(stmt, span, node, elt, part, text).or(failure);
                    }
                    self.set_node(*id, ty);
                    failure
                }
                None => {
                    let found = self.constraints.probe_type(ty);
                    let message = unpack_message(
                        node,
                        span.start_line,
                        &Operand {
                            ty: &found,
                            text: text.to_string(),
                        },
                        elts.len(),
                    );
                    let error = self.record_error(stmt, span, TypeError::unification(message));
                    // Every target holds the error so later uses stay quiet
                    for elt in elts {
                        self.assign(stmt, span, node, elt, &error, text);
                    }
                    self.set_node(*id, &error);
                    Some(error)
                }
            },
            Expr::Attribute { id, value, attr, .. } => {
                let receiver = self.visit_expr(value);
                match self.class_member(&receiver, attr) {
                    Some(var) => {
                        self.set_node(*id, &Type::Var(var));
                        let name = target.to_string();
                        self.rebind(stmt, span, node, &name, &Type::Var(var), ty, text)
                    }
                    None => {
                        self.set_node(*id, ty);
                        None
                    }
                }
            }
            Expr::Subscript {
                id,
                span: target_span,
                value,
                index,
            } => {
                let container = self.visit_expr(value);
                let key = self.visit_expr(index);
                let slot = self.subscript(*id, target_span, value, &container, index, &key);
                self.set_node(*id, &slot);
                if self.propagated_error(&slot).is_some() {
                    return None;
                }
                let name = target.to_string();
                self.rebind(stmt, span, node, &name, &slot, ty, text)
            }
            other => {
                self.visit_expr(other);
                None
            }
        }
    }

    /// Unify an existing slot with a new value, recording a contradiction
    #[allow(clippy::too_many_arguments)]
    fn rebind(
        &mut self,
        stmt: NodeId,
        span: &Span,
        node: &str,
        name: &str,
        slot: &Type,
        ty: &Type,
        text: &str,
    ) -> Option<Type> {
        let previous = self.constraints.probe_type(slot);
        let found = self.constraints.probe_type(ty);
        if self.constraints.transaction(|s| s.unify(slot, ty)).is_ok() {
            return None;
        }
        let message = assignment_message(
            node,
            span.start_line,
            name,
            &previous,
            &Operand {
                ty: &found,
                text: text.to_string(),
            },
        );
        let error = TypeError::unification(message);
        // The target holds the contradiction; the assigned value keeps its type
        if let Type::Var(var) = slot {
            self.constraints.set_error(*var, error.clone());
        }
        Some(self.record_error(stmt, span, error))
    }

    /// Split a value assigned to `arity` targets; `None` if it cannot be split
    fn unpack(&mut self, ty: &Type, arity: usize) -> Option<Vec<Type>> {
        match self.constraints.shallow(ty) {
            Type::Error(err) => Some(vec![Type::Error(err); arity]),
            Type::Parametric(name, elems) if name == TUPLE && elems.len() == arity => Some(elems),
            Type::Parametric(name, elems) if name == LIST && elems.len() == 1 => {
                Some(vec![elems[0].clone(); arity])
            }
            Type::Primitive(name) if name == "str" => Some(vec![Type::str(); arity]),
            _ => {
                let parts: Vec<Type> = (0..arity).map(|_| self.constraints.fresh()).collect();
                let shape = Type::tuple(parts.clone());
                match self.constraints.transaction(|s| s.unify(ty, &shape)) {
                    Ok(()) => Some(parts),
                    Err(err) => {
                        debug!(value = %self.constraints.probe_type(ty), arity, %err, "cannot unpack value");
                        None
                    }
                }
            }
        }
    }

    /// Convert an annotation expression into a type term
    pub(super) fn annotation_type(&mut self, annotation: &Expr) -> Type {
        match annotation {
            Expr::NoneLit { .. } => Type::none(),
            // Forward reference to a class
            Expr::Str { value, .. } => Type::primitive(value.as_str()),
            Expr::Name { name, .. } => match name.as_str() {
                "int" | "float" | "str" | "bool" => Type::primitive(name.as_str()),
                "list" | "List" => Type::list(self.constraints.fresh()),
                "dict" | "Dict" => {
                    let key = self.constraints.fresh();
                    Type::dict(key, self.constraints.fresh())
                }
                "Any" | "object" | "tuple" | "Tuple" | "Callable" | "Optional" | "Union" => {
                    self.constraints.fresh()
                }
                class => Type::primitive(class),
            },
            Expr::Subscript { value, index, .. } => {
                let Expr::Name { name, .. } = value.as_ref() else {
                    return self.constraints.fresh();
                };
                let args: Vec<&Expr> = match index.as_ref() {
                    Expr::Tuple { elts, .. } => elts.iter().collect(),
                    single => vec![single],
                };
                match (name.as_str(), args.as_slice()) {
                    ("List" | "list", [elem]) => Type::list(self.annotation_type(elem)),
                    ("Dict" | "dict", [key, value]) => {
                        let key = self.annotation_type(key);
                        Type::dict(key, self.annotation_type(value))
                    }
                    ("Tuple" | "tuple", elems) => {
                        let elems = elems.iter().map(|e| self.annotation_type(e)).collect();
                        Type::tuple(elems)
                    }
                    ("Callable", [Expr::List { elts, .. }, ret]) => {
                        let params = elts.iter().map(|e| self.annotation_type(e)).collect();
                        Type::callable(params, self.annotation_type(ret))
                    }
                    _ => self.constraints.fresh(),
                }
            }
            _ => self.constraints.fresh(),
        }
    }
}

fn callee_for(def: &FunctionDef, method: bool) -> CalleeInfo {
    CalleeInfo {
        name: def.name.clone(),
        annotated: def.is_annotated(),
        required: def.params.iter().filter(|p| p.default.is_none()).count(),
        method,
    }
}

/// Whether a body returns anywhere outside nested definitions
fn contains_return(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Return { .. } => true,
        Stmt::If { body, orelse, .. } => contains_return(body) || contains_return(orelse),
        Stmt::While { body, .. } | Stmt::For { body, .. } => contains_return(body),
        _ => false,
    })
}
