//! Instance — one loaded Blueprint, its live state, and its ledger, wired
//! together through the Phase Machine (spec §4.5, §2 "SYSTEM OVERVIEW").
//!
//! The call sequence here is the "scoped acquisition" described in spec
//! §4.5: one `PhaseGuard` per forge call, walking IDLE→...→IDLE exactly
//! once. The heavy lifting (pre-check, simulate, post-check) is already a
//! single atomic pipeline in `verifier::verify_forge`; the phase advances
//! around it are orchestration bookkeeping that gives each named phase a
//! concrete meaning without re-splitting that pipeline's internals.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::blueprint::Blueprint;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::eval::{eval_expr, FieldScope};
use crate::ledger::{Ledger, LedgerEntry};
use crate::phase::PhaseGuard;
use crate::phase::PhaseMachine;
use crate::value::{Payload, TaggedValue};
use crate::verifier::{self, Status};
use crate::witness::{State, Witness};

/// Outcome of one `Instance::call`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub status: Status,
    pub reply: Option<TaggedValue>,
    pub witness: Option<Witness>,
    pub violated_laws: Vec<String>,
    pub ledger_entry: LedgerEntry,
}

/// A live Blueprint instance: state, ledger, and phase sequencer.
pub struct Instance {
    blueprint: Blueprint,
    state: State,
    phase: PhaseMachine,
    ledger: Ledger,
}

impl Instance {
    /// Load a Blueprint and initialize its field defaults (spec §4.2).
    pub fn new(blueprint: Blueprint, config: &KernelConfig) -> Result<Self, KernelError> {
        let state = initial_state(&blueprint, config)?;
        let ledger = Ledger::new(config.hash_prefix_length)?;
        Ok(Instance { blueprint, state, phase: PhaseMachine::new(), ledger })
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// `verify`: run the pre/simulate/post pipeline without committing
    /// anything, and without touching the ledger (spec §6 `verify`).
    pub fn verify(
        &self,
        forge_name: &str,
        args: &BTreeMap<String, TaggedValue>,
        config: &KernelConfig,
    ) -> Result<verifier::ForgeResult, KernelError> {
        verifier::verify_forge(&self.blueprint, forge_name, &self.state, args, config)
    }

    /// `run`: verify, and on `fin` commit the new state and append a ledger
    /// entry. On `finfr` the ledger still records the attempt (spec §4.6:
    /// "every executed forge (fin or finfr)") but the live state is
    /// untouched (spec invariant 1).
    #[instrument(skip(self, args, config), fields(forge = %forge_name))]
    pub fn run(
        &mut self,
        forge_name: &str,
        args: BTreeMap<String, TaggedValue>,
        config: &KernelConfig,
    ) -> Result<CallResult, KernelError> {
        let mut guard = PhaseGuard::acquire(&mut self.phase)?;
        guard.advance()?; // IDLE -> INGEST: request intake
        guard.advance()?; // INGEST -> PARSE: blueprint already compiled
        guard.advance()?; // PARSE -> CRYSTALLIZE: resolve forge definition
        guard.record_operation();

        let state_before = self.state.clone();

        guard.advance()?; // CRYSTALLIZE -> DIFFUSE: pre-check + simulate
        let result = verifier::verify_forge(&self.blueprint, forge_name, &state_before, &args, config)?;
        guard.record_operation();

        guard.advance()?; // DIFFUSE -> CONVERGE: post-check already folded into verify_forge
        guard.advance()?; // CONVERGE -> VERIFY
        guard.advance()?; // VERIFY -> COMMIT: decide

        let (status_str, state_after) = match result.status {
            Status::Fin => {
                self.state = result.new_state.clone();
                ("fin", result.new_state.clone())
            }
            Status::Finfr => ("finfr", state_before.clone()),
        };

        guard.advance()?; // COMMIT -> REFLECT: ledger append
        let entry = self.ledger.append(
            forge_name,
            args,
            status_str,
            result.reply.clone(),
            state_before,
            state_after,
            result.witness.clone(),
        )?;
        guard.advance()?; // REFLECT -> IDLE
        drop(guard);

        Ok(CallResult {
            status: result.status,
            reply: result.reply,
            witness: result.witness,
            violated_laws: result.violated_laws,
            ledger_entry: entry,
        })
    }

    /// Force the instance back to a clean `IDLE` phase without touching
    /// state or ledger history (used after an unexpected early return).
    pub fn reset_phase(&mut self) {
        self.phase.reset();
    }

    /// Swap in a ledger reconstructed by `replay`/`rollback_to`, adopting
    /// the state it implies. The phase machine is forced back to `IDLE`
    /// (spec §4.6 `replay`: "deterministic serialization and reconstruction").
    pub fn replace_ledger_and_state(&mut self, ledger: Ledger, state: State) {
        self.ledger = ledger;
        self.state = state;
        self.phase.reset();
    }
}

fn initial_state(blueprint: &Blueprint, config: &KernelConfig) -> Result<State, KernelError> {
    let mut state = State::new();
    for field in &blueprint.fields {
        let value = match &field.default {
            Some(expr) => {
                let scope = FieldScope { fields: &state };
                eval_expr(expr, &scope, config.ratio_epsilon, 0, config.max_recursion_depth)?
            }
            None => zero_value(field.dimension)?,
        };
        state.insert(field.name.clone(), value);
    }
    Ok(state)
}

fn zero_value(dimension: crate::value::Dimension) -> Result<TaggedValue, KernelError> {
    use crate::value::Dimension;
    let payload = match dimension {
        Dimension::Text => Payload::Text(String::new()),
        Dimension::Bool => Payload::Bool(false),
        Dimension::Symbol => Payload::Symbol(String::new()),
        _ => Payload::Number(0.0),
    };
    TaggedValue::construct(dimension, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::compile;

    const SRC: &str = r#"
        blueprint BankAccount
            field @balance: Money default Money(100)
            law NoOverdraft
                when @balance < Money(0)
                finfr
            end
            forge withdraw(amount: Money)
                @balance = @balance - amount
                reply @balance
            end
        end
    "#;

    fn new_instance() -> Instance {
        let (bp, errors) = compile(SRC);
        assert!(errors.is_empty(), "{errors:?}");
        Instance::new(bp.unwrap(), &KernelConfig::default()).unwrap()
    }

    #[test]
    fn initial_state_uses_field_defaults() {
        let instance = new_instance();
        assert_eq!(instance.state()["balance"].as_f64().unwrap(), 100.0);
    }

    #[test]
    fn run_commits_on_fin_and_appends_ledger_entry() {
        let mut instance = new_instance();
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(30.0).unwrap());
        let result = instance.run("withdraw", args, &KernelConfig::default()).unwrap();
        assert_eq!(result.status, Status::Fin);
        assert_eq!(instance.state()["balance"].as_f64().unwrap(), 70.0);
        assert_eq!(result.ledger_entry.status, "fin");
        assert_eq!(instance.ledger().entries().len(), 2); // genesis + this call
    }

    #[test]
    fn run_leaves_state_unchanged_on_finfr_but_still_logs() {
        let mut instance = new_instance();
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(500.0).unwrap());
        let result = instance.run("withdraw", args, &KernelConfig::default()).unwrap();
        assert_eq!(result.status, Status::Finfr);
        assert_eq!(instance.state()["balance"].as_f64().unwrap(), 100.0);
        assert_eq!(result.ledger_entry.status, "finfr");
    }

    #[test]
    fn phase_returns_to_idle_after_call() {
        let mut instance = new_instance();
        let mut args = BTreeMap::new();
        args.insert("amount".to_string(), TaggedValue::money(10.0).unwrap());
        instance.run("withdraw", args, &KernelConfig::default()).unwrap();
        assert!(!instance.phase.can_mutate_state());
    }
}
