//! Verifier — decides admissibility of a state and of a proposed forge call
//! (spec §4.3).
//!
//! Grounded on the teacher's `transition.rs`: a pure function from
//! (state, input) to an outcome, with every rejection reason collected
//! rather than the first one returned. The teacher short-circuits on the
//! first consensus violation since it only needs one; this verifier instead
//! walks every finfr-outcome law every time, per spec §4.3's "exhaustive,
//! not short-circuit" requirement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::blueprint::{Blueprint, Cond, Forge, Outcome, Stmt};
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::eval::{eval_expr, FieldScope};
use crate::value::TaggedValue;
use crate::vm;
use crate::witness::{State, TStar, Violation, Witness};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Fin,
    Finfr,
}

/// Outcome of `verify_forge`: either a clean commit candidate (`new_state`,
/// `reply`) or a `finfr` witness. `new_state` is always populated — on
/// `finfr` it equals the state the check started from (spec invariant 1:
/// a finfr call leaves observable state unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeResult {
    pub status: Status,
    pub witness: Option<Witness>,
    pub new_state: State,
    pub reply: Option<TaggedValue>,
    pub violated_laws: Vec<String>,
}

/// Evaluate every `finfr`-outcome law against `state`, in declaration order.
/// `request` is `Some(symbol)` only during a pre-check; post-checks always
/// pass `None` (spec §4.3: "request-dependent clauses only fire during
/// pre-check").
pub fn verify_state(
    blueprint: &Blueprint,
    state: &State,
    request: Option<&str>,
    config: &KernelConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for law in &blueprint.laws {
        if law.outcome != Outcome::Finfr {
            continue;
        }
        match law_fires(law, state, request, config) {
            Ok(true) => violations.push(Violation {
                law: law.name.clone(),
                clauses: describe_clauses(law),
                reason: "law_fired".to_string(),
                line: law.line,
            }),
            Ok(false) => {}
            Err(err) => {
                // Laws must not raise (spec §7); a raising predicate is
                // treated as firing, plus an auxiliary violation names the
                // underlying fault.
                violations.push(Violation {
                    law: law.name.clone(),
                    clauses: describe_clauses(law),
                    reason: err.reason_code().to_string(),
                    line: law.line,
                });
                violations.push(Violation {
                    law: "<runtime>".to_string(),
                    clauses: vec![],
                    reason: err.reason_code().to_string(),
                    line: law.line,
                });
            }
        }
    }
    violations
}

fn law_fires(
    law: &crate::blueprint::Law,
    state: &State,
    request: Option<&str>,
    config: &KernelConfig,
) -> Result<bool, KernelError> {
    // Zero-clause laws fire unconditionally (spec §4.3 edge case).
    let scope = FieldScope { fields: state };
    for clause in &law.clauses {
        let holds = match &clause.cond {
            Cond::RequestIs(symbol) => request == Some(symbol.as_str()),
            Cond::Bool(expr) => {
                let value = eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?;
                value.as_bool()?
            }
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn describe_clauses(law: &crate::blueprint::Law) -> Vec<String> {
    law.clauses
        .iter()
        .map(|clause| {
            let keyword = match clause.keyword {
                crate::blueprint::ClauseKeyword::When => "when",
                crate::blueprint::ClauseKeyword::And => "and",
            };
            match &clause.cond {
                Cond::RequestIs(symbol) => format!("{keyword} request is :{symbol}"),
                Cond::Bool(expr) => format!("{keyword} {}", describe_expr(expr)),
            }
        })
        .collect()
}

fn describe_expr(expr: &crate::blueprint::Expr) -> String {
    use crate::blueprint::{BinOp, Expr};
    match expr {
        Expr::Number(n) => n.to_string(),
        Expr::StringLit(s) => format!("\"{s}\""),
        Expr::SymbolLit(s) => format!(":{s}"),
        Expr::Field(name) => format!("@{name}"),
        Expr::Ident(name) => name.clone(),
        Expr::BinOp(lhs, op, rhs) => {
            let sym = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Eq => "==",
            };
            format!("{} {sym} {}", describe_expr(lhs), describe_expr(rhs))
        }
        Expr::Call(name, args) => {
            let inner = args.iter().map(describe_expr).collect::<Vec<_>>().join(", ");
            format!("{name}({inner})")
        }
    }
}

fn request_of(forge: &Forge) -> Option<&str> {
    forge.body.iter().find_map(|stmt| match stmt {
        Stmt::RequestSet { symbol, .. } => Some(symbol.as_str()),
        _ => None,
    })
}

/// Run the full pre-check / simulate / post-check cycle for one forge call
/// (spec §4.3, four numbered steps).
pub fn verify_forge(
    blueprint: &Blueprint,
    forge_name: &str,
    state: &State,
    args: &BTreeMap<String, TaggedValue>,
    config: &KernelConfig,
) -> Result<ForgeResult, KernelError> {
    let forge = blueprint
        .forges
        .iter()
        .find(|f| f.name == forge_name)
        .ok_or_else(|| KernelError::UnknownForge(forge_name.to_string()))?;

    let request = request_of(forge);
    let pre_violations = verify_state(blueprint, state, request, config);
    if !pre_violations.is_empty() {
        let witness = Witness::new(TStar::Pre, state.clone(), pre_violations);
        return Ok(ForgeResult {
            status: Status::Finfr,
            violated_laws: witness.violated_laws(),
            witness: Some(witness),
            new_state: state.clone(),
            reply: None,
        });
    }

    let outcome = match vm::execute_forge(forge, state, args, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            let violated = vec![Violation {
                law: "<runtime>".to_string(),
                clauses: vec![],
                reason: err.reason_code().to_string(),
                line: forge.line,
            }];
            let witness = Witness::new(TStar::Exec, state.clone(), violated);
            return Ok(ForgeResult {
                status: Status::Finfr,
                violated_laws: witness.violated_laws(),
                witness: Some(witness),
                new_state: state.clone(),
                reply: None,
            });
        }
    };

    let post_violations = verify_state(blueprint, &outcome.state, None, config);
    if !post_violations.is_empty() {
        let witness = Witness::new(TStar::Post, outcome.state, post_violations);
        return Ok(ForgeResult {
            status: Status::Finfr,
            violated_laws: witness.violated_laws(),
            witness: Some(witness),
            new_state: state.clone(),
            reply: None,
        });
    }

    Ok(ForgeResult {
        status: Status::Fin,
        witness: None,
        violated_laws: vec![],
        new_state: outcome.state,
        reply: outcome.reply,
    })
}
