//! Witness — the structured explanation of a `finfr` result (spec §3, §4.3).
//!
//! Grounded in shape on the teacher's `state/witness.rs` (a dedicated module
//! for the host/kernel trust-boundary payload, with a small constructor that
//! never mutates once built) — the Merkle-path content is specific to the
//! teacher's fraud-proof domain and has no counterpart here; what carries
//! over is the pattern of a single immutable struct owned exclusively by the
//! call that produced it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::value::TaggedValue;

/// Where in the phase cycle a violation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TStar {
    Pre,
    Exec,
    Post,
}

/// A single firing law, recorded in declaration order (spec §4.3: "the
/// verifier never rewrites laws and never short-circuits collection").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub law: String,
    pub clauses: Vec<String>,
    pub reason: String,
    pub line: usize,
}

/// State snapshot keyed by field name, deterministic in iteration order
/// (`BTreeMap`, following the teacher's "BTreeMap used everywhere" invariant
/// rather than a hash map whose order would vary run to run).
pub type State = BTreeMap<String, TaggedValue>;

/// Structured explanation of a `finfr` outcome.
///
/// The derived `Serialize`/`Deserialize` shape is used for ledger
/// persistence round-tripping; the external wire contract (spec §6) is
/// produced separately by `to_json`, since it renders `x_star` entries as
/// `{"type": ..., "value": ...}` rather than `TaggedValue`'s own field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Witness {
    pub t_star: TStar,
    pub x_star: State,
    pub violated: Vec<Violation>,
    pub normal_hint: String,
}

impl Witness {
    pub fn new(t_star: TStar, x_star: State, violated: Vec<Violation>) -> Self {
        let normal_hint = repair_hint(&violated);
        Witness { t_star, x_star, violated, normal_hint }
    }

    /// The names of every violated law, in firing order.
    pub fn violated_laws(&self) -> Vec<String> {
        self.violated.iter().map(|v| v.law.clone()).collect()
    }

    /// Render the canonical wire shape from spec §6.
    pub fn to_json(&self) -> serde_json::Value {
        let x_star: serde_json::Map<String, serde_json::Value> = self
            .x_star
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    json!({
                        "type": value.dimension,
                        "value": value.payload,
                    }),
                )
            })
            .collect();
        json!({
            "t_star": self.t_star,
            "x_star": serde_json::Value::Object(x_star),
            "violated": self.violated,
            "normal_hint": self.normal_hint,
        })
    }
}

/// Derive a repair hint from a small rule table keyed by violation reason,
/// falling back to a generic per-law hint (spec §4.3).
fn repair_hint(violated: &[Violation]) -> String {
    let Some(first) = violated.first() else {
        return "no violation recorded".to_string();
    };
    match first.reason.as_str() {
        "division_by_zero" => "ensure denominator > 0".to_string(),
        "dim_mismatch" => "operands must share a dimension before this law is evaluated".to_string(),
        "bound_exceeded" => "reduce the size or complexity of the forge body".to_string(),
        _ => format!("satisfy law `{}` before proceeding", first.law),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_hint_for_division_by_zero() {
        let violated = vec![Violation {
            law: "NoDivByZero".into(),
            clauses: vec![],
            reason: "division_by_zero".into(),
            line: 1,
        }];
        let w = Witness::new(TStar::Exec, State::new(), violated);
        assert_eq!(w.normal_hint, "ensure denominator > 0");
    }

    #[test]
    fn repair_hint_falls_back_to_generic() {
        let violated = vec![Violation {
            law: "NoOverdraft".into(),
            clauses: vec![],
            reason: "law_fired".into(),
            line: 3,
        }];
        let w = Witness::new(TStar::Pre, State::new(), violated);
        assert_eq!(w.normal_hint, "satisfy law `NoOverdraft` before proceeding");
    }

    #[test]
    fn violated_laws_preserves_order() {
        let violated = vec![
            Violation { law: "A".into(), clauses: vec![], reason: "x".into(), line: 1 },
            Violation { law: "B".into(), clauses: vec![], reason: "y".into(), line: 2 },
        ];
        let w = Witness::new(TStar::Pre, State::new(), violated);
        assert_eq!(w.violated_laws(), vec!["A".to_string(), "B".to_string()]);
    }
}
