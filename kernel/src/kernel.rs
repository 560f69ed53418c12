//! `Kernel` — the synchronous boundary API (spec §6).
//!
//! Grounded on the teacher's top-level `lib.rs` role: a thin façade that
//! owns no logic of its own, only routes calls into the modules that do
//! (`blueprint::compile`, `verifier::verify_forge`, `ledger`), returning
//! `serde`-serializable response structs rather than raw domain types — the
//! same separation the example pack draws between its in-process types and
//! its wire-facing ones (`logannye-tinyzkp`'s `pcs.rs` response shapes).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blueprint;
use crate::blueprint::ParseError;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::instance::Instance;
use crate::ledger::{Ledger, LedgerEntry};
use crate::value::TaggedValue;
use crate::verifier::{self, Status};
use crate::witness::State;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub blueprints: Vec<String>,
    pub parse_errors: Vec<ParseError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: Status,
    pub witness: Option<Value>,
    pub violated_laws: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRef {
    pub index: u64,
    pub hash: String,
    pub prev_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: Status,
    pub reply: Option<TaggedValue>,
    pub state: BTreeMap<String, Value>,
    pub ledger_entry: LedgerEntryRef,
    pub witness: Option<Value>,
    pub violated_laws: Vec<String>,
}

/// One call in a `run_sequence` batch.
#[derive(Debug, Clone)]
pub struct ForgeCall {
    pub forge: String,
    pub args: BTreeMap<String, TaggedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSequenceResponse {
    pub results: Vec<RunResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmegaLaw {
    pub name: String,
    pub outcome: String,
    pub clauses: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Render a `State` into the `{field: {dimension, value}}` wire shape (spec
/// §6 `state(blueprint)`).
fn state_view(state: &State) -> BTreeMap<String, Value> {
    state
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                serde_json::json!({ "dimension": value.dimension, "value": value.payload }),
            )
        })
        .collect()
}

/// Owns zero or more named `Instance`s, one per loaded Blueprint name (spec
/// §6).
pub struct Kernel {
    config: KernelConfig,
    instances: BTreeMap<String, Instance>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Kernel { config, instances: BTreeMap::new() }
    }

    fn instance(&self, name: &str) -> Result<&Instance, KernelError> {
        self.instances.get(name).ok_or_else(|| KernelError::UnknownBlueprint(name.to_string()))
    }

    fn instance_mut(&mut self, name: &str) -> Result<&mut Instance, KernelError> {
        self.instances.get_mut(name).ok_or_else(|| KernelError::UnknownBlueprint(name.to_string()))
    }

    /// Compile a Blueprint source and, if admissible, load it as a fresh
    /// instance keyed by its declared name (spec §6 `load`).
    pub fn load(&mut self, source: &str) -> LoadResponse {
        let (compiled, parse_errors) = blueprint::compile(source);
        let Some(bp) = compiled else {
            return LoadResponse { blueprints: vec![], parse_errors };
        };
        let name = bp.name.clone();
        match Instance::new(bp, &self.config) {
            Ok(instance) => {
                self.instances.insert(name.clone(), instance);
                LoadResponse { blueprints: vec![name], parse_errors }
            }
            Err(err) => LoadResponse {
                blueprints: vec![],
                parse_errors: vec![ParseError {
                    line: 0,
                    column: 0,
                    phase: "load".to_string(),
                    message: err.to_string(),
                }],
            },
        }
    }

    /// Run the pre/simulate/post pipeline without committing (spec §6
    /// `verify`).
    pub fn verify(
        &self,
        blueprint_name: &str,
        forge: &str,
        args: BTreeMap<String, TaggedValue>,
    ) -> Result<VerifyResponse, KernelError> {
        let instance = self.instance(blueprint_name)?;
        let result = instance.verify(forge, &args, &self.config)?;
        Ok(VerifyResponse {
            status: result.status,
            witness: result.witness.as_ref().map(|w| w.to_json()),
            violated_laws: result.violated_laws,
        })
    }

    /// Verify and, on `fin`, commit the new state and append a ledger entry
    /// (spec §6 `run`).
    pub fn run(
        &mut self,
        blueprint_name: &str,
        forge: &str,
        args: BTreeMap<String, TaggedValue>,
    ) -> Result<RunResponse, KernelError> {
        let config = self.config;
        let instance = self.instance_mut(blueprint_name)?;
        let result = instance.run(forge, args, &config)?;
        Ok(RunResponse {
            status: result.status,
            reply: result.reply,
            state: state_view(instance.state()),
            ledger_entry: LedgerEntryRef {
                index: result.ledger_entry.index,
                hash: result.ledger_entry.hash,
                prev_hash: result.ledger_entry.prev_hash,
            },
            witness: result.witness.as_ref().map(|w| w.to_json()),
            violated_laws: result.violated_laws,
        })
    }

    /// Run a sequence of calls, optionally stopping at the first `finfr`
    /// (spec §6 `run_sequence`).
    pub fn run_sequence(
        &mut self,
        blueprint_name: &str,
        calls: Vec<ForgeCall>,
        stop_on_finfr: bool,
    ) -> Result<RunSequenceResponse, KernelError> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let response = self.run(blueprint_name, &call.forge, call.args)?;
            let stop = stop_on_finfr && response.status == Status::Finfr;
            results.push(response);
            if stop {
                break;
            }
        }
        Ok(RunSequenceResponse { results })
    }

    /// Current field state of a loaded instance (spec §6 `state`).
    pub fn state(&self, blueprint_name: &str) -> Result<BTreeMap<String, Value>, KernelError> {
        Ok(state_view(self.instance(blueprint_name)?.state()))
    }

    /// The full law table: name, outcome, clause text, and a generated
    /// description (spec §6 `omega`).
    pub fn omega(&self, blueprint_name: &str) -> Result<Vec<OmegaLaw>, KernelError> {
        let bp = self.instance(blueprint_name)?.blueprint();
        Ok(bp
            .laws
            .iter()
            .map(|law| {
                let clauses = verifier::describe_clauses(law);
                let outcome = match law.outcome {
                    crate::blueprint::Outcome::Fin => "fin",
                    crate::blueprint::Outcome::Finfr => "finfr",
                };
                let description = if clauses.is_empty() {
                    format!("{} always yields {outcome}", law.name)
                } else {
                    format!("{} yields {outcome} {}", law.name, clauses.join(" "))
                };
                OmegaLaw { name: law.name.clone(), outcome: outcome.to_string(), clauses, description }
            })
            .collect())
    }

    /// The full ledger history for a loaded instance (spec §6 `ledger`).
    pub fn ledger(&self, blueprint_name: &str) -> Result<Vec<LedgerEntry>, KernelError> {
        Ok(self.instance(blueprint_name)?.ledger().entries().to_vec())
    }

    /// Reinitialize a loaded instance to its Blueprint field defaults with a
    /// fresh genesis ledger (spec §6 `reset`).
    pub fn reset(&mut self, blueprint_name: &str) -> Result<StatusResponse, KernelError> {
        let bp = self.instance(blueprint_name)?.blueprint().clone();
        let fresh = Instance::new(bp, &self.config)?;
        self.instances.insert(blueprint_name.to_string(), fresh);
        Ok(StatusResponse { status: "ok".to_string() })
    }

    /// Canonical-JSON ledger export (spec §6 `export_ledger`).
    pub fn export_ledger(&self, blueprint_name: &str) -> Result<Vec<u8>, KernelError> {
        self.instance(blueprint_name)?.ledger().export()
    }

    /// Reconstruct a loaded instance's ledger and state from previously
    /// exported bytes, verifying the chain before accepting it (spec §6
    /// `replay_ledger`). The table's boundary signature omits a target
    /// blueprint name; in practice a ledger export carries no law/forge
    /// definitions of its own, so replay re-attaches to an already-loaded
    /// Blueprint by name rather than conjuring one from bytes alone.
    pub fn replay_ledger(&mut self, blueprint_name: &str, bytes: &[u8]) -> Result<StatusResponse, KernelError> {
        let ledger = Ledger::replay(bytes, self.config.hash_prefix_length)?;
        let (_, state) = ledger.snapshot();
        let instance = self.instance_mut(blueprint_name)?;
        instance.replace_ledger_and_state(ledger, state);
        Ok(StatusResponse { status: "ok".to_string() })
    }
}
