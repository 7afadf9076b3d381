//! Call resolution
//!
//! A call goes one of three ways. Builtins pick the first overload that
//! accepts the arguments. User definitions unify each argument with its
//! parameter; annotated ones check every argument separately so a single
//! message can list all mismatching parameters. A callee whose type is still
//! open is constrained to be a function of the argument types.

use super::messages::{
    annotated_call_message, call_arity_message, call_message, not_callable_message,
    unresolved_name_message, ParamMismatch,
};
use super::{Inferer, Selection, Type, TypeError};
use crate::diagnostics::Span;
use crate::parser::ast::{Expr, Keyword, NodeId};
use tracing::trace;

/// What is being called
enum Callee {
    Builtin(String),
    Value { name: String, ty: Type },
}

impl Inferer {
    pub(super) fn visit_call(
        &mut self,
        id: NodeId,
        span: &Span,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
    ) -> Type {
        let callee = self.resolve_callee(func);
        let arg_types: Vec<Type> = args.iter().map(|arg| self.visit_expr(arg)).collect();
        // Keyword arguments are inferred but not matched to parameters
        for keyword in keywords {
            self.visit_expr(&keyword.value);
        }

        let callee = match callee {
            Ok(callee) => callee,
            Err(err) => return err,
        };
        if let Some(err) = arg_types.iter().find_map(|ty| self.propagated_error(ty)) {
            return Type::Error(err);
        }

        match callee {
            Callee::Builtin(name) => self.call_builtin(id, span, &name, args, &arg_types),
            Callee::Value { name, ty } => self.call_value(id, span, &name, &ty, args, &arg_types),
        }
    }

    /// Infer the callee; an error term if the callee itself failed
    fn resolve_callee(&mut self, func: &Expr) -> Result<Callee, Type> {
        if let Expr::Name { id, name, .. } = func {
            if self.envs.lookup_in_env(self.scope, name).is_err() {
                if let Some(value) = self.builtin_value(name) {
                    self.set_node(*id, &value);
                    return Ok(Callee::Builtin(name.clone()));
                }
            }
        }

        let ty = self.visit_expr(func);
        if self.propagated_error(&ty).is_some() {
            return Err(ty);
        }
        let name = match func {
            Expr::Attribute { attr, .. } => attr.clone(),
            other => other.to_string(),
        };
        Ok(Callee::Value { name, ty })
    }

    fn call_builtin(&mut self, id: NodeId, span: &Span, name: &str, args: &[Expr], arg_types: &[Type]) -> Type {
        let line = span.start_line;
        match self.type_store.select(name, arg_types, &mut self.constraints) {
            Selection::Matched(ty) => ty,
            Selection::ArityMismatch { expected } => {
                let message = call_arity_message(line, name, expected, arg_types.len());
                self.record_error(id, span, TypeError::arity(message))
            }
            Selection::NoMatch { params } => {
                let mismatches = self.mismatches(&params, args, arg_types);
                let message = call_message(line, name, &mismatches, false);
                self.record_error(id, span, TypeError::parameter_type(message))
            }
            Selection::Unknown => {
                let message = unresolved_name_message(line, name);
                self.record_error(id, span, TypeError::name_resolution(message))
            }
        }
    }

    fn call_value(
        &mut self,
        id: NodeId,
        span: &Span,
        name: &str,
        callee: &Type,
        args: &[Expr],
        arg_types: &[Type],
    ) -> Type {
        match self.constraints.shallow(callee) {
            Type::Callable { params, ret } => {
                let definition = match callee {
                    Type::Var(var) => self.definition_signature(*var).cloned(),
                    _ => None,
                };
                // A recorded definition shares its variables with the callee's type
                let (params, ret) = match definition {
                    Some(signature) => signature.instantiate(&mut self.constraints, arg_types.len()),
                    None => (params, *ret),
                };
                let info = match callee {
                    Type::Var(var) => self.callee_info(*var),
                    _ => None,
                };
                let (annotated, required) = info
                    .map(|info| (info.annotated, info.required))
                    .unwrap_or((false, params.len()));
                if let Some(info) = info {
                    trace!(callee = %info.name, annotated, required, "call to definition");
                }
                self.call_function(id, span, name, &params, &ret, annotated, required, args, arg_types)
            }
            Type::Var(_) => {
                let ret = self.constraints.fresh();
                let shape = Type::callable(arg_types.to_vec(), ret.clone());
                match self.constraints.transaction(|s| s.unify(callee, &shape)) {
                    Ok(()) => ret,
                    Err(err) => {
                        let message = format!(
                            "In the Call node in line {}, \"{}\" cannot be called with these arguments: {}.",
                            span.start_line, name, err
                        );
                        self.record_error(id, span, TypeError::unification(message))
                    }
                }
            }
            Type::Error(err) => Type::Error(err),
            other => {
                let found = self.constraints.probe_type(&other);
                self.not_callable(id, span, name, &found)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_function(
        &mut self,
        id: NodeId,
        span: &Span,
        name: &str,
        params: &[Type],
        ret: &Type,
        annotated: bool,
        required: usize,
        args: &[Expr],
        arg_types: &[Type],
    ) -> Type {
        let line = span.start_line;
        if arg_types.len() < required || arg_types.len() > params.len() {
            let message = call_arity_message(line, name, params.len(), arg_types.len());
            return self.record_error(id, span, TypeError::arity(message));
        }

        let mismatches = if annotated {
            self.unify_each(params, args, arg_types)
        } else if self.unify_all(params, arg_types) {
            Vec::new()
        } else {
            self.mismatches(params, args, arg_types)
        };
        if mismatches.is_empty() {
            return ret.clone();
        }

        let message = if annotated {
            annotated_call_message(line, name, &mismatches)
        } else {
            call_message(line, name, &mismatches, true)
        };
        self.record_error(id, span, TypeError::parameter_type(message))
    }

    /// Unify argument by argument, keeping the ones that fit
    fn unify_each(&mut self, params: &[Type], args: &[Expr], arg_types: &[Type]) -> Vec<ParamMismatch> {
        let mut mismatches = Vec::new();
        for (index, (param, arg)) in params.iter().zip(arg_types).enumerate() {
            let expected = self.constraints.probe_type(param);
            let found = self.constraints.probe_type(arg);
            if self.constraints.transaction(|s| s.unify(param, arg)).is_err() {
                mismatches.push(ParamMismatch {
                    index: index + 1,
                    expected,
                    found,
                    found_inferred: !args[index].is_literal(),
                });
            }
        }
        mismatches
    }

    /// Unify all arguments at once, committing only if every one fits
    fn unify_all(&mut self, params: &[Type], arg_types: &[Type]) -> bool {
        self.constraints
            .transaction(|s| {
                for (param, arg) in params.iter().zip(arg_types) {
                    s.unify(param, arg)?;
                }
                Ok::<(), super::UnifyError>(())
            })
            .is_ok()
    }

    /// Parameters whose arguments do not fit, without touching the store.
    ///
    /// When every argument fits on its own but not together, the first
    /// parameter that breaks the combination is reported.
    fn mismatches(&mut self, params: &[Type], args: &[Expr], arg_types: &[Type]) -> Vec<ParamMismatch> {
        let count = params.len().min(arg_types.len());
        let mut failing: Vec<usize> = (0..count)
            .filter(|&i| !self.unifiable(&params[i..=i], &arg_types[i..=i]))
            .collect();
        if failing.is_empty() {
            failing.extend((0..count).find(|&i| !self.unifiable(&params[..=i], &arg_types[..=i])));
        }

        failing
            .into_iter()
            .map(|i| ParamMismatch {
                index: i + 1,
                expected: self.constraints.probe_type(&params[i]),
                found: self.constraints.probe_type(&arg_types[i]),
                found_inferred: !args[i].is_literal(),
            })
            .collect()
    }

    fn not_callable(&mut self, id: NodeId, span: &Span, name: &str, found: &Type) -> Type {
        let message = not_callable_message(span.start_line, name, found);
        self.record_error(id, span, TypeError::unification(message))
    }
}
