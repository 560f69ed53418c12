//! Forge VM — executes a forge body atomically against a working copy of
//! state (spec §4.4).
//!
//! Grounded on the teacher's `transition.rs` apply-loop: clone-then-mutate,
//! never touch the live state until the caller commits. The teacher
//! processes a flat list of typed transition variants; here the "program" is
//! a parsed statement list, so the loop is a small tree-walking interpreter
//! instead, but the commit discipline (working copy in, fresh state or
//! discard out) is identical.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::blueprint::{Forge, Stmt};
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::eval::{eval_expr, Scope};
use crate::value::TaggedValue;
use crate::witness::State;

struct VmScope<'a> {
    state: &'a State,
    locals: &'a BTreeMap<String, TaggedValue>,
}

impl<'a> Scope for VmScope<'a> {
    fn field(&self, name: &str) -> Option<&TaggedValue> {
        self.state.get(name)
    }

    fn local(&self, name: &str) -> Option<&TaggedValue> {
        self.locals.get(name)
    }
}

/// Result of successfully interpreting a forge body to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub state: State,
    pub reply: Option<TaggedValue>,
}

/// Interpret `forge.body` against a working copy of `state`, seeded with
/// `args` bound to the forge's declared parameters.
///
/// Every error variant returned here is converted by the caller
/// (`verifier::verify_forge`) into an `exec`-phase finfr witness; this
/// function itself never mutates the caller's `state`.
pub fn execute_forge(
    forge: &Forge,
    state: &State,
    args: &BTreeMap<String, TaggedValue>,
    config: &KernelConfig,
) -> Result<ExecutionOutcome, KernelError> {
    let mut locals = BTreeMap::new();
    for param in &forge.params {
        let arg = args
            .get(&param.name)
            .ok_or_else(|| KernelError::UnknownIdentifier(format!("missing argument `{}`", param.name)))?;
        if arg.dimension != param.dimension {
            return Err(KernelError::DimensionMismatch);
        }
        locals.insert(param.name.clone(), arg.clone());
    }

    let mut working = state.clone();
    let mut reply = None;
    let started = Instant::now();
    // Per-call step cap. Kept local rather than routed through the phase
    // machine's cross-call `operations` counter: `verify_forge` (and this
    // function beneath it) is also invoked by `Instance::verify`, which runs
    // with no `PhaseGuard` in scope at all, so there is no machine to route
    // through on that path. Documented divergence: DESIGN.md, `vm.rs` entry.
    let mut operations: u64 = 0;

    for (step, stmt) in forge.body.iter().enumerate() {
        if step as u64 >= config.max_iterations {
            return Err(KernelError::BoundExceeded("max_iterations"));
        }
        if started.elapsed().as_secs_f64() > config.timeout_seconds {
            return Err(KernelError::BoundExceeded("timeout_seconds"));
        }

        operations += 1;
        if operations > config.max_operations {
            return Err(KernelError::BoundExceeded("max_operations"));
        }

        let scope = VmScope { state: &working, locals: &locals };
        match stmt {
            Stmt::FieldAssign { field, expr, line: _ } => {
                let value = eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?;
                if !working.contains_key(field) {
                    return Err(KernelError::UnknownField(field.clone()));
                }
                working.insert(field.clone(), value);
            }
            Stmt::Memo { name, expr, line: _ } => {
                let value = eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?;
                locals.insert(name.clone(), value);
            }
            Stmt::RequestSet { .. } => {
                // Recorded statically by the verifier's `request_of`; no
                // runtime effect on state.
            }
            Stmt::Reply { expr, line: _ } => {
                let value = eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?;
                reply = Some(value);
            }
            Stmt::Expr { expr, line: _ } => {
                eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?;
            }
        }
    }

    Ok(ExecutionOutcome { state: working, reply })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::compile;

    const SRC: &str = r#"
        blueprint BankAccount
            field @balance: Money default Money(0)
            forge withdraw(amount: Money)
                memo fee = Money(1)
                @balance = @balance - amount - fee
                reply @balance
            end
        end
    "#;

    fn find_forge<'a>(bp: &'a crate::blueprint::Blueprint, name: &str) -> &'a Forge {
        bp.forges.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn executes_statements_in_order() {
        let (bp, errors) = compile(SRC);
        assert!(errors.is_empty(), "{errors:?}");
        let bp = bp.unwrap();
        let forge = find_forge(&bp, "withdraw");

        let mut state = State::new();
        state.insert("balance".to_string(), TaggedValue::money(100.0).unwrap());
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(20.0).unwrap());

        let outcome = execute_forge(forge, &state, &args, &KernelConfig::default()).unwrap();
        assert_eq!(outcome.state["balance"].as_f64().unwrap(), 79.0);
        assert_eq!(outcome.reply.unwrap().as_f64().unwrap(), 79.0);
    }

    #[test]
    fn missing_argument_is_error() {
        let (bp, _) = compile(SRC);
        let bp = bp.unwrap();
        let forge = find_forge(&bp, "withdraw");
        let mut state = State::new();
        state.insert("balance".to_string(), TaggedValue::money(100.0).unwrap());
        let result = execute_forge(forge, &state, &BTreeMap::new(), &KernelConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn iteration_bound_is_enforced() {
        let (bp, _) = compile(SRC);
        let bp = bp.unwrap();
        let forge = find_forge(&bp, "withdraw");
        let mut state = State::new();
        state.insert("balance".to_string(), TaggedValue::money(100.0).unwrap());
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(20.0).unwrap());
        let mut tight_config = KernelConfig::default();
        tight_config.max_iterations = 1;
        let result = execute_forge(forge, &state, &args, &tight_config);
        assert_eq!(result, Err(KernelError::BoundExceeded("max_iterations")));
    }

    #[test]
    fn does_not_mutate_caller_state_on_error() {
        let (bp, _) = compile(SRC);
        let bp = bp.unwrap();
        let forge = find_forge(&bp, "withdraw");
        let state = State::new(); // missing @balance entirely
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(20.0).unwrap());
        let result = execute_forge(forge, &state, &args, &KernelConfig::default());
        assert!(result.is_err());
        assert!(state.is_empty());
    }
}
