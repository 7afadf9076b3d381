//! Expressions

use super::messages::{
    binop_message, compare_message, subscript_message, unary_message, unresolved_name_message,
    Operand,
};
use super::types::{DICT, LIST, TUPLE};
use super::{Inferer, ScopeKind, Selection, Type, TypeError};
use crate::diagnostics::Span;
use crate::parser::ast::{BinaryOp, CompareOp, Expr, NodeId, Param, UnaryOp};

/// How an operand is quoted in a message: `repr` for literals, source otherwise
pub(super) fn operand_text(expr: &Expr) -> String {
    expr.literal_repr().unwrap_or_else(|| expr.to_string())
}

impl Inferer {
    /// Infer `expr` and its children; returns the node's variable as a term
    pub(super) fn visit_expr(&mut self, expr: &Expr) -> Type {
        let ty = match expr {
            Expr::Int { .. } => Type::int(),
            Expr::Float { .. } => Type::float(),
            Expr::Str { .. } => Type::str(),
            Expr::Bool { .. } => Type::bool(),
            Expr::NoneLit { .. } => Type::none(),
            Expr::Name { id, span, name } => self.visit_name(*id, span, name),
            Expr::BinOp {
                id,
                span,
                left,
                op,
                right,
            } => {
                let l = self.visit_expr(left);
                let r = self.visit_expr(right);
                self.binary_operation(*id, span, *op, left, &l, right, &r)
            }
            Expr::UnaryOp {
                id,
                span,
                op,
                operand,
            } => {
                let ty = self.visit_expr(operand);
                self.unary_operation(*id, span, *op, operand, &ty)
            }
            Expr::BoolOp { left, right, .. } => {
                let l = self.visit_expr(left);
                let r = self.visit_expr(right);
                self.join(&l, &r)
            }
            Expr::Compare {
                id,
                span,
                left,
                comparisons,
            } => self.visit_compare(*id, span, left, comparisons),
            Expr::Call {
                id,
                span,
                func,
                args,
                keywords,
            } => self.visit_call(*id, span, func, args, keywords),
            Expr::Attribute { value, attr, .. } => {
                let receiver = self.visit_expr(value);
                self.attribute(&receiver, attr)
            }
            Expr::Subscript {
                id,
                span,
                value,
                index,
            } => {
                let container = self.visit_expr(value);
                let key = self.visit_expr(index);
                self.subscript(*id, span, value, &container, index, &key)
            }
            Expr::List { elts, .. } => {
                let elems: Vec<Type> = elts.iter().map(|e| self.visit_expr(e)).collect();
                match self.first_error(&elems) {
                    Some(err) => err,
                    None => Type::list(self.common_type(&elems)),
                }
            }
            Expr::Tuple { elts, .. } => {
                let elems: Vec<Type> = elts.iter().map(|e| self.visit_expr(e)).collect();
                self.first_error(&elems).unwrap_or_else(|| Type::tuple(elems))
            }
            Expr::Dict { entries, .. } => {
                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    keys.push(self.visit_expr(key));
                    values.push(self.visit_expr(value));
                }
                match self.first_error(&keys).or_else(|| self.first_error(&values)) {
                    Some(err) => err,
                    None => {
                        let key = self.common_type(&keys);
                        Type::dict(key, self.common_type(&values))
                    }
                }
            }
            Expr::IfExp {
                test, body, orelse, ..
            } => {
                self.visit_expr(test);
                let body = self.visit_expr(body);
                let orelse = self.visit_expr(orelse);
                self.join(&body, &orelse)
            }
            Expr::Lambda {
                id, params, body, ..
            } => self.visit_lambda(*id, params, body),
        };
        self.set_node(expr.id(), &ty)
    }

    fn visit_name(&mut self, id: NodeId, span: &Span, name: &str) -> Type {
        match self.envs.lookup_in_env(self.scope, name) {
            Ok(var) => Type::Var(var),
            Err(err) => match self.builtin_value(name) {
                Some(ty) => ty,
                None => {
                    let message = unresolved_name_message(span.start_line, &err.name);
                    self.record_error(id, span, TypeError::name_resolution(message))
                }
            },
        }
    }

    /// A builtin function used as a value: its first overload
    pub(super) fn builtin_value(&mut self, name: &str) -> Option<Type> {
        if name.starts_with("__") || !self.type_store.is_builtin(name) {
            return None;
        }
        let signature = self.type_store.lookup(name).first()?.clone();
        let (params, ret) = signature.instantiate(&mut self.constraints, signature.arity());
        Some(Type::callable(params, ret))
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn binary_operation(
        &mut self,
        id: NodeId,
        span: &Span,
        op: BinaryOp,
        left: &Expr,
        l: &Type,
        right: &Expr,
        r: &Type,
    ) -> Type {
        if let Some(err) = self.propagated_error(l).or_else(|| self.propagated_error(r)) {
            return Type::Error(err);
        }
        let args = [l.clone(), r.clone()];
        match self.type_store.select(op.dunder(), &args, &mut self.constraints) {
            Selection::Matched(ty) => ty,
            _ => {
                let (lt, rt) = (self.constraints.probe_type(l), self.constraints.probe_type(r));
                let message = binop_message(
                    op,
                    &Operand {
                        ty: &lt,
                        text: operand_text(left),
                    },
                    &Operand {
                        ty: &rt,
                        text: operand_text(right),
                    },
                );
                self.record_error(id, span, TypeError::unification(message))
            }
        }
    }

    fn unary_operation(&mut self, id: NodeId, span: &Span, op: UnaryOp, operand: &Expr, ty: &Type) -> Type {
        let Some(dunder) = op.dunder() else {
            return Type::bool();
        };
        if let Some(err) = self.propagated_error(ty) {
            return Type::Error(err);
        }
        match self
            .type_store
            .select(dunder, std::slice::from_ref(ty), &mut self.constraints)
        {
            Selection::Matched(result) => result,
            _ => {
                let found = self.constraints.probe_type(ty);
                let message = unary_message(
                    op.symbol(),
                    &Operand {
                        ty: &found,
                        text: operand_text(operand),
                    },
                );
                self.record_error(id, span, TypeError::unification(message))
            }
        }
    }

    fn visit_compare(
        &mut self,
        id: NodeId,
        span: &Span,
        left: &Expr,
        comparisons: &[(CompareOp, Expr)],
    ) -> Type {
        let mut previous_expr = left;
        let mut previous = self.visit_expr(left);
        let mut failure = None;

        for (op, right) in comparisons {
            let ty = self.visit_expr(right);
            if failure.is_none() {
                failure = self.comparison(id, span, *op, previous_expr, &previous, right, &ty);
            }
            previous_expr = right;
            previous = ty;
        }
        failure.unwrap_or_else(Type::bool)
    }

    /// Check one link of a comparison chain; returns the error term on failure
    #[allow(clippy::too_many_arguments)]
    fn comparison(
        &mut self,
        id: NodeId,
        span: &Span,
        op: CompareOp,
        left: &Expr,
        l: &Type,
        right: &Expr,
        r: &Type,
    ) -> Option<Type> {
        if let Some(err) = self.propagated_error(l).or_else(|| self.propagated_error(r)) {
            return Some(Type::Error(err));
        }
        match op {
            CompareOp::In | CompareOp::NotIn => {
                self.membership(l, r);
                None
            }
            _ => {
                let dunder = op.dunder()?;
                let args = [l.clone(), r.clone()];
                if let Selection::Matched(_) = self.type_store.select(dunder, &args, &mut self.constraints) {
                    return None;
                }
                let (lt, rt) = (self.constraints.probe_type(l), self.constraints.probe_type(r));
                let message = compare_message(
                    &Operand {
                        ty: &lt,
                        text: operand_text(left),
                    },
                    &Operand {
                        ty: &rt,
                        text: operand_text(right),
                    },
                );
                Some(self.record_error(id, span, TypeError::unification(message)))
            }
        }
    }

    /// `item in container` ties the item to the element or key type when known
    fn membership(&mut self, item: &Type, container: &Type) {
        let Type::Parametric(name, args) = self.constraints.shallow(container) else {
            return;
        };
        let element = match (name.as_str(), args.as_slice()) {
            (LIST, [elem]) | (DICT, [elem, _]) => elem.clone(),
            _ => return,
        };
        if let Type::Var(var) = element {
            self.constrain(var, item);
        } else if let Type::Var(var) = item {
            self.constrain(*var, &element);
        }
    }

    /// Member access; unknown receivers and modules yield a fresh variable
    fn attribute(&mut self, receiver: &Type, attr: &str) -> Type {
        if let Some(err) = self.propagated_error(receiver) {
            return Type::Error(err);
        }
        let Some(var) = self.class_member(receiver, attr) else {
            return self.constraints.fresh();
        };
        let is_method = self.callee_info(var).is_some_and(|info| info.method);
        if is_method {
            // Bound method: the receiver fills the first parameter
            if let Type::Callable { params, ret } = self.constraints.shallow(&Type::Var(var)) {
                return Type::Callable {
                    params: params.into_iter().skip(1).collect(),
                    ret,
                };
            }
        }
        Type::Var(var)
    }

    pub(super) fn subscript(
        &mut self,
        id: NodeId,
        span: &Span,
        value: &Expr,
        container: &Type,
        index: &Expr,
        key: &Type,
    ) -> Type {
        if let Some(err) = self
            .propagated_error(container)
            .or_else(|| self.propagated_error(key))
        {
            return Type::Error(err);
        }

        if let Type::Parametric(name, elems) = self.constraints.shallow(container) {
            if name == TUPLE {
                if let Expr::Int { value: position, .. } = index {
                    let len = elems.len() as i64;
                    let position = if *position < 0 { len + position } else { *position };
                    if let Some(elem) = usize::try_from(position).ok().and_then(|p| elems.get(p)) {
                        return elem.clone();
                    }
                }
                return self.common_type(&elems);
            }
        }

        let args = [container.clone(), key.clone()];
        match self.type_store.select("__getitem__", &args, &mut self.constraints) {
            Selection::Matched(ty) => ty,
            _ => {
                let (vt, kt) = (
                    self.constraints.probe_type(container),
                    self.constraints.probe_type(key),
                );
                let message = subscript_message(
                    &Operand {
                        ty: &vt,
                        text: operand_text(value),
                    },
                    &Operand {
                        ty: &kt,
                        text: operand_text(index),
                    },
                );
                self.record_error(id, span, TypeError::unification(message))
            }
        }
    }

    fn visit_lambda(&mut self, id: NodeId, params: &[Param], body: &Expr) -> Type {
        let defaults: Vec<Option<Type>> = params
            .iter()
            .map(|p| p.default.as_ref().map(|d| self.visit_expr(d)))
            .collect();
        let scope = self.envs.new_scope(Some(self.scope), ScopeKind::Lambda);
        self.scopes.insert(id, scope);
        let params = self.bind_params(scope, params, &defaults, None);
        let ret = self.with_scope(scope, |this| this.visit_expr(body));
        Type::callable(params, ret)
    }

    /// Both branches' type when they agree, otherwise a fresh variable
    fn join(&mut self, a: &Type, b: &Type) -> Type {
        if let Some(err) = self.propagated_error(a).or_else(|| self.propagated_error(b)) {
            return Type::Error(err);
        }
        match self.constraints.transaction(|s| s.unify(a, b)) {
            Ok(()) => a.clone(),
            Err(_) => self.constraints.fresh(),
        }
    }

    /// One type for all `types` when they unify, otherwise a fresh variable
    pub(super) fn common_type(&mut self, types: &[Type]) -> Type {
        let elem = self.constraints.fresh();
        let unified = self.constraints.transaction(|s| {
            for ty in types {
                s.unify(&elem, ty)?;
            }
            Ok::<(), super::UnifyError>(())
        });
        if unified.is_err() {
            // Heterogeneous display: the element type stays open
            return self.constraints.fresh();
        }
        elem
    }

    fn first_error(&self, types: &[Type]) -> Option<Type> {
        types
            .iter()
            .find_map(|ty| self.propagated_error(ty))
            .map(Type::Error)
    }
}
