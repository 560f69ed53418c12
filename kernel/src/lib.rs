//! tinyTalk — Deterministic Constraint-First Execution Kernel
//! Version: 0.0.0-draft
//!
//! A Blueprint declares fields, laws, and forges. A forge call runs a fixed
//! pre-check / simulate / post-check cycle through a bounded Phase Machine;
//! every call, `fin` or `finfr`, is recorded in an append-only hash-chained
//! Ledger. No networking, no async, no threading — a single-process,
//! single-caller execution kernel.
//!
//! INVARIANTS:
//! 1. A `finfr` outcome never mutates observable state; only `fin` commits.
//! 2. The verifier is exhaustive: every `finfr`-outcome law is evaluated,
//!    never short-circuited on the first violation.
//! 3. `BTreeMap` used everywhere state or args are keyed by name: iteration
//!    order is deterministic.
//! 4. `HashMap` is forbidden in any path that feeds a ledger hash or a
//!    witness — an unordered iteration would make both non-reproducible.
//! 5. The Phase Machine only ever advances by exactly one state; any other
//!    transition is a `KernelError::Phase` error.
//! 6. The ledger is append-only. `restore` and `rollback_to` never truncate
//!    or rewrite prior entries.

pub mod blueprint;
pub mod canonical_json;
pub mod config;
pub mod error;
pub mod eval;
pub mod hashing;
pub mod instance;
pub mod kernel;
pub mod ledger;
pub mod phase;
pub mod value;
pub mod verifier;
pub mod vm;
pub mod witness;

pub use config::KernelConfig;
pub use error::KernelError;
pub use kernel::Kernel;
