//! Ledger — append-only, hash-chained record of every executed forge (spec
//! §4.6).
//!
//! Grounded on the teacher's epoch-chaining discipline in `transition.rs`
//! ("previous_root chaining (thermodynamic arrow of time)") generalized from
//! a single epoch-root field to a full per-call entry list, and on
//! `physics/hashing.rs`'s one-function-one-purpose hashing module (see
//! `hashing.rs` in this crate). Unlike the teacher's chain, which commits a
//! single rolling `state_root`, this ledger keeps every entry addressable —
//! spec §4.6 requires `verify_chain`, `snapshot`/`restore`, and `replay` to
//! operate over the full history, not just its tip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical_json;
use crate::error::KernelError;
use crate::hashing;
use crate::value::TaggedValue;
use crate::witness::{State, Witness};

/// Injectable wall-clock source. Production code uses `SystemClock`; tests
/// that compare ledger entries byte-for-byte (spec §8 invariant 5) supply a
/// fixed clock instead, since two real-time timestamps are never equal.
pub trait Clock {
    fn now_iso8601(&self) -> String;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso8601(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

/// One append-only ledger record (spec §6 "Canonical ledger entry").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub timestamp: String,
    pub hash: String,
    pub prev_hash: String,
    pub forge: String,
    pub args: BTreeMap<String, TaggedValue>,
    pub status: String,
    pub reply: Option<TaggedValue>,
    pub state_before: State,
    pub state_after: State,
    pub witness: Option<Witness>,
}

/// Result of `Ledger::verify_chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub broken_at: Option<u64>,
    pub reason: Option<String>,
}

fn zero_hash(prefix_len: usize) -> String {
    "0".repeat(prefix_len * 2)
}

fn entry_data(entry: &LedgerEntry) -> Value {
    json!({
        "forge": entry.forge,
        "args": entry.args,
        "status": entry.status,
        "reply": entry.reply,
        "state_before": entry.state_before,
        "state_after": entry.state_after,
        "witness": entry.witness,
    })
}

fn compute_hash(
    index: u64,
    timestamp: &str,
    data: &Value,
    prev_hash: &str,
    prefix_len: usize,
) -> Result<String, KernelError> {
    let preimage = json!({
        "index": index,
        "timestamp": timestamp,
        "data": data,
        "prev_hash": prev_hash,
    });
    let bytes = canonical_json::canonicalize(&preimage)?;
    let digest = hashing::sha256(&bytes);
    Ok(hashing::to_hex(&digest, prefix_len))
}

/// The append-only, hash-chained ledger for one instance.
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    hash_prefix_length: usize,
    clock: Box<dyn Clock>,
}

impl Ledger {
    /// Construct a fresh ledger, appending the genesis entry immediately
    /// (spec §4.6: "entry 0 is genesis").
    pub fn new(hash_prefix_length: usize) -> Result<Self, KernelError> {
        Self::with_clock(hash_prefix_length, Box::new(SystemClock))
    }

    pub fn with_clock(hash_prefix_length: usize, clock: Box<dyn Clock>) -> Result<Self, KernelError> {
        let mut ledger = Ledger { entries: Vec::new(), hash_prefix_length, clock };
        ledger.append("<genesis>", BTreeMap::new(), "fin", None, State::new(), State::new(), None)?;
        Ok(ledger)
    }

    /// Reconstruct a ledger from an already-validated entry list (used by
    /// `replay` and by rollback prefixes). Does not append a new genesis —
    /// `entries[0]` is assumed to already be one.
    fn from_entries(entries: Vec<LedgerEntry>, hash_prefix_length: usize) -> Self {
        Ledger { entries, hash_prefix_length, clock: Box::new(SystemClock) }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn current_index(&self) -> u64 {
        self.entries.len() as u64 - 1
    }

    /// Append one forge-call record, computing its hash over
    /// `{index, timestamp, data, prev_hash}` (spec §4.6).
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        forge: impl Into<String>,
        args: BTreeMap<String, TaggedValue>,
        status: impl Into<String>,
        reply: Option<TaggedValue>,
        state_before: State,
        state_after: State,
        witness: Option<Witness>,
    ) -> Result<LedgerEntry, KernelError> {
        let index = self.entries.len() as u64;
        let prev_hash = self
            .entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| zero_hash(self.hash_prefix_length));
        let timestamp = self.clock.now_iso8601();
        let forge = forge.into();
        let status = status.into();

        let data = json!({
            "forge": forge,
            "args": args,
            "status": status,
            "reply": reply,
            "state_before": state_before,
            "state_after": state_after,
            "witness": witness,
        });
        let hash = compute_hash(index, &timestamp, &data, &prev_hash, self.hash_prefix_length)?;

        let entry = LedgerEntry {
            index,
            timestamp,
            hash,
            prev_hash,
            forge,
            args,
            status,
            reply,
            state_before,
            state_after,
            witness,
        };
        self.entries.push(entry.clone());
        tracing::debug!(index, forge = %entry.forge, status = %entry.status, "ledger entry appended");
        Ok(entry)
    }

    /// Check `prev_hash`/`self_hash` linkage for every entry after genesis.
    pub fn verify_chain(&self) -> ChainVerification {
        for i in 1..self.entries.len() {
            let prev = &self.entries[i - 1];
            let entry = &self.entries[i];
            if entry.prev_hash != prev.hash {
                return ChainVerification {
                    valid: false,
                    broken_at: Some(i as u64),
                    reason: Some("prev_hash does not match predecessor's hash".to_string()),
                };
            }
            let recomputed = match compute_hash(
                entry.index,
                &entry.timestamp,
                &entry_data(entry),
                &entry.prev_hash,
                self.hash_prefix_length,
            ) {
                Ok(h) => h,
                Err(err) => {
                    return ChainVerification {
                        valid: false,
                        broken_at: Some(i as u64),
                        reason: Some(err.to_string()),
                    };
                }
            };
            if recomputed != entry.hash {
                return ChainVerification {
                    valid: false,
                    broken_at: Some(i as u64),
                    reason: Some("self_hash does not match recomputed digest".to_string()),
                };
            }
        }
        ChainVerification { valid: true, broken_at: None, reason: None }
    }

    /// `(index, deep_copy(state))` of the most recently committed state.
    pub fn snapshot(&self) -> (u64, State) {
        let last = self.entries.last().expect("genesis entry always present");
        (self.current_index(), last.state_after.clone())
    }

    /// Restore to a prior snapshot by appending a `<restore>` diff entry;
    /// the ledger itself is never truncated (spec §4.6).
    pub fn restore(&mut self, snapshot: (u64, State)) -> Result<LedgerEntry, KernelError> {
        let (index, state) = snapshot;
        if index > self.current_index() {
            return Err(KernelError::LedgerIndexOutOfRange(index));
        }
        let state_before = self.entries.last().expect("genesis entry always present").state_after.clone();
        self.append("<restore>", BTreeMap::new(), "fin", None, state_before, state, None)
    }

    /// Logical rollback: return the genesis-through-`index` prefix and the
    /// state it implies. The caller is responsible for building a fresh
    /// instance from the prefix and swapping it in (spec §4.6).
    pub fn rollback_to(&self, index: u64) -> Result<(Vec<LedgerEntry>, State), KernelError> {
        if index >= self.entries.len() as u64 {
            return Err(KernelError::LedgerIndexOutOfRange(index));
        }
        let prefix = self.entries[..=index as usize].to_vec();
        let state = prefix.last().expect("prefix is non-empty").state_after.clone();
        Ok((prefix, state))
    }

    /// Deterministic canonical-JSON serialization of the full entry list.
    pub fn export(&self) -> Result<Vec<u8>, KernelError> {
        let value = serde_json::to_value(&self.entries)
            .map_err(|e| KernelError::MalformedExport(e.to_string()))?;
        canonical_json::canonicalize(&value)
    }

    /// Reconstruct a ledger from exported bytes, verifying the chain before
    /// accepting it.
    pub fn replay(bytes: &[u8], hash_prefix_length: usize) -> Result<Ledger, KernelError> {
        let entries: Vec<LedgerEntry> =
            serde_json::from_slice(bytes).map_err(|e| KernelError::MalformedExport(e.to_string()))?;
        if entries.is_empty() {
            return Err(KernelError::MalformedExport("ledger export has no entries".to_string()));
        }
        let ledger = Ledger::from_entries(entries, hash_prefix_length);
        let verification = ledger.verify_chain();
        if !verification.valid {
            return Err(KernelError::ChainCorruption {
                broken_at: verification.broken_at.unwrap_or(0),
                reason: verification.reason.unwrap_or_default(),
            });
        }
        Ok(ledger)
    }

    /// Rebuild a ledger from a rollback prefix, re-verifying the chain.
    pub fn from_prefix(entries: Vec<LedgerEntry>, hash_prefix_length: usize) -> Result<Ledger, KernelError> {
        let ledger = Ledger::from_entries(entries, hash_prefix_length);
        let verification = ledger.verify_chain();
        if !verification.valid {
            return Err(KernelError::ChainCorruption {
                broken_at: verification.broken_at.unwrap_or(0),
                reason: verification.reason.unwrap_or_default(),
            });
        }
        Ok(ledger)
    }
}
