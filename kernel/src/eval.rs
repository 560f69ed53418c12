//! Shared expression evaluator over `blueprint::ast::Expr`.
//!
//! Used by both the verifier (law clauses, field-only scope) and the Forge
//! VM (forge bodies, field + local scope). Factored out rather than
//! duplicated, following the teacher's `transition.rs` pattern of one
//! evaluation routine shared by the validating and executing paths.

use crate::blueprint::{BinOp, Expr};
use crate::error::KernelError;
use crate::value::{Payload, TaggedValue};

/// Name resolution context for expression evaluation.
pub trait Scope {
    fn field(&self, name: &str) -> Option<&TaggedValue>;
    fn local(&self, name: &str) -> Option<&TaggedValue>;
}

/// A scope with no locals — used by the verifier, whose law clauses may
/// reference only fields.
pub struct FieldScope<'a> {
    pub fields: &'a std::collections::BTreeMap<String, TaggedValue>,
}

impl<'a> Scope for FieldScope<'a> {
    fn field(&self, name: &str) -> Option<&TaggedValue> {
        self.fields.get(name)
    }

    fn local(&self, _name: &str) -> Option<&TaggedValue> {
        None
    }
}

const BUILTIN_ARITY_ERROR: KernelError = KernelError::DimensionMismatch;

/// Evaluate an expression against `scope`. `depth` is the caller's current
/// nesting level; exceeding `max_depth` raises `BoundExceeded` rather than
/// overflowing the native call stack (spec §4.4).
pub fn eval_expr(
    expr: &Expr,
    scope: &dyn Scope,
    epsilon: f64,
    depth: u32,
    max_depth: u32,
) -> Result<TaggedValue, KernelError> {
    if depth > max_depth {
        return Err(KernelError::BoundExceeded("max_recursion_depth"));
    }
    match expr {
        Expr::Number(n) => TaggedValue::construct(crate::value::Dimension::Real, Payload::Number(*n)),
        Expr::StringLit(s) => Ok(TaggedValue::text(s.clone())),
        Expr::SymbolLit(s) => Ok(TaggedValue::symbol(s.clone())),
        Expr::Field(name) => scope
            .field(name)
            .cloned()
            .ok_or_else(|| KernelError::UnknownField(name.clone())),
        Expr::Ident(name) => scope
            .local(name)
            .cloned()
            .ok_or_else(|| KernelError::UnknownIdentifier(name.clone())),
        Expr::BinOp(lhs, op, rhs) => {
            let a = eval_expr(lhs, scope, epsilon, depth + 1, max_depth)?;
            let b = eval_expr(rhs, scope, epsilon, depth + 1, max_depth)?;
            match op {
                BinOp::Add => a.add(&b),
                BinOp::Sub => a.sub(&b),
                BinOp::Mul => a.mul(&b, epsilon),
                BinOp::Div => a.div(&b, epsilon),
                BinOp::Lt => a.lt(&b),
                BinOp::Le => a.le(&b),
                BinOp::Gt => a.gt(&b),
                BinOp::Ge => a.ge(&b),
                BinOp::Eq => a.eq_value(&b),
            }
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval_expr(a, scope, epsilon, depth + 1, max_depth))
                .collect::<Result<Vec<_>, _>>()?;
            eval_call(name, &values, epsilon)
        }
    }
}

fn eval_call(name: &str, values: &[TaggedValue], epsilon: f64) -> Result<TaggedValue, KernelError> {
    if let Some(dimension) = crate::value::Dimension::from_type_name(name) {
        let arg = values.first().ok_or(BUILTIN_ARITY_ERROR)?;
        let n = arg.as_f64()?;
        return TaggedValue::construct(dimension, Payload::Number(n));
    }
    match name {
        "ratio" => {
            let f = values.first().ok_or(BUILTIN_ARITY_ERROR)?;
            let g = values.get(1).ok_or(BUILTIN_ARITY_ERROR)?;
            crate::value::ratio(f, g, epsilon)
        }
        "abs" => values.first().ok_or(BUILTIN_ARITY_ERROR)?.abs(),
        "sqrt" => values.first().ok_or(BUILTIN_ARITY_ERROR)?.sqrt(),
        "as_real" => values.first().ok_or(BUILTIN_ARITY_ERROR)?.as_real(),
        other => Err(KernelError::UnknownIdentifier(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const EPS: f64 = 1e-9;

    fn scope_with(fields: BTreeMap<String, TaggedValue>) -> impl Scope {
        struct Owned(BTreeMap<String, TaggedValue>);
        impl Scope for Owned {
            fn field(&self, name: &str) -> Option<&TaggedValue> {
                self.0.get(name)
            }
            fn local(&self, _name: &str) -> Option<&TaggedValue> {
                None
            }
        }
        Owned(fields)
    }

    #[test]
    fn evaluates_field_comparison() {
        let mut fields = BTreeMap::new();
        fields.insert("balance".to_string(), TaggedValue::money(-5.0).unwrap());
        let scope = scope_with(fields);
        let expr = Expr::BinOp(
            Box::new(Expr::Field("balance".into())),
            BinOp::Lt,
            Box::new(Expr::Call("Money".into(), vec![Expr::Number(0.0)])),
        );
        let result = eval_expr(&expr, &scope, EPS, 0, 100).unwrap();
        assert_eq!(result.as_bool().unwrap(), true);
    }

    #[test]
    fn unknown_field_is_error() {
        let scope = scope_with(BTreeMap::new());
        let expr = Expr::Field("missing".into());
        assert_eq!(
            eval_expr(&expr, &scope, EPS, 0, 100),
            Err(KernelError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn ratio_builtin_dispatches() {
        let scope = scope_with(BTreeMap::new());
        let expr = Expr::Call(
            "ratio".into(),
            vec![Expr::Number(6.0), Expr::Number(3.0)],
        );
        let result = eval_expr(&expr, &scope, EPS, 0, 100).unwrap();
        assert_eq!(result.as_f64().unwrap(), 2.0);
    }

    #[test]
    fn recursion_depth_bound_enforced() {
        let scope = scope_with(BTreeMap::new());
        let expr = Expr::Number(1.0);
        assert_eq!(
            eval_expr(&expr, &scope, EPS, 5, 4),
            Err(KernelError::BoundExceeded("max_recursion_depth"))
        );
    }

    #[test]
    fn unknown_call_target_is_error() {
        let scope = scope_with(BTreeMap::new());
        let expr = Expr::Call("bogus".into(), vec![]);
        assert_eq!(
            eval_expr(&expr, &scope, EPS, 0, 100),
            Err(KernelError::UnknownIdentifier("bogus".into()))
        );
    }
}
