//! `KernelError` — the canonical error type threading through parsing, value
//! arithmetic, and phase transitions.
//!
//! INVARIANTS:
//! 1. Laws themselves never raise `KernelError`; if a law's predicate panics
//!    the verifier treats the panic as a firing finfr (see `verifier::verify_state`).
//! 2. Every variant here has a direct counterpart in the §7 error taxonomy:
//!    `Parse`, `Dimension`, `DivisionByZero`, `BoundExceeded`, `LawViolation`,
//!    `Phase`, `ChainCorruption`.
//! 3. Only `Parse` (at load time) and `ChainCorruption` (terminal) cross the
//!    API boundary as hard errors. Everything else is captured and converted
//!    to a `finfr` witness before it reaches a caller.

use crate::blueprint::ParseError;

/// Errors raised while parsing, evaluating, or sequencing kernel operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Blueprint source failed to parse. Carries every recovered error, not
    /// just the first — the parser recovers at statement boundaries.
    #[error("parse failed with {} error(s)", .0.len())]
    Parse(Vec<ParseError>),

    /// Non-finite numeric payload passed to `TaggedValue::construct`.
    #[error("non-finite numeric value")]
    Nan,

    /// Cross-dimensional arithmetic or comparison.
    #[error("dimension mismatch")]
    DimensionMismatch,

    /// `|b| < ratio_epsilon` in `div`/`ratio`.
    #[error("division by zero")]
    DivisionByZero,

    /// A `Count`-dimensioned value would be fractional.
    #[error("count value is not integral")]
    CountNotIntegral,

    /// Unknown identifier referenced during forge-body evaluation.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Unknown field referenced by `@name`.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Unknown forge or blueprint name requested at the API boundary.
    #[error("unknown blueprint: {0}")]
    UnknownBlueprint(String),

    /// Unknown forge name requested on a known blueprint.
    #[error("unknown forge: {0}")]
    UnknownForge(String),

    /// VM iteration / recursion / operation / wall-time budget exceeded.
    #[error("execution bound exceeded: {0}")]
    BoundExceeded(&'static str),

    /// Illegal phase transition (arbitrary skip instead of +1).
    #[error("illegal phase transition from {from} to {to}")]
    Phase { from: u8, to: u8 },

    /// `Ledger::verify_chain` failed. Terminal: the kernel refuses further
    /// commits once this is observed.
    #[error("ledger chain corrupted at index {broken_at}: {reason}")]
    ChainCorruption { broken_at: u64, reason: String },

    /// A snapshot/restore/rollback request referenced an index that does not
    /// exist in the ledger.
    #[error("ledger index {0} out of range")]
    LedgerIndexOutOfRange(u64),

    /// `replay` was given bytes that do not decode to a valid exported ledger.
    #[error("malformed ledger export: {0}")]
    MalformedExport(String),
}

impl KernelError {
    /// A short machine-stable reason code, used as the `reason` field of a
    /// runtime-fault witness (`t_star = exec`).
    pub fn reason_code(&self) -> &'static str {
        match self {
            KernelError::Parse(_) => "parse_error",
            KernelError::Nan => "nan",
            KernelError::DimensionMismatch => "dim_mismatch",
            KernelError::DivisionByZero => "division_by_zero",
            KernelError::CountNotIntegral => "count_not_integral",
            KernelError::UnknownIdentifier(_) => "unknown_identifier",
            KernelError::UnknownField(_) => "unknown_field",
            KernelError::UnknownBlueprint(_) => "unknown_blueprint",
            KernelError::UnknownForge(_) => "unknown_forge",
            KernelError::BoundExceeded(_) => "bound_exceeded",
            KernelError::Phase { .. } => "phase_error",
            KernelError::ChainCorruption { .. } => "chain_corruption",
            KernelError::LedgerIndexOutOfRange(_) => "ledger_index_out_of_range",
            KernelError::MalformedExport(_) => "malformed_export",
        }
    }
}
