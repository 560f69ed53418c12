//! `KernelConfig` — the recognized configuration surface from spec §6.
//!
//! Re-supplied at kernel construction; never persisted as part of the ledger
//! export. Bounds are configurable per-kernel but not per-call (spec §4.4).

/// Execution bounds and numeric tolerances for a kernel instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConfig {
    /// VM iteration cap (statements executed per forge call).
    pub max_iterations: u64,
    /// Expression-tree recursion depth cap.
    pub max_recursion_depth: u32,
    /// Phase-machine operation counter cap (statements + expression steps).
    pub max_operations: u64,
    /// Wall-time cap per forge call, in seconds.
    pub timeout_seconds: f64,
    /// Zero/tolerance threshold used by `div`/`ratio` (§4.1).
    pub ratio_epsilon: f64,
    /// Ledger hash truncation length for display purposes. The full SHA-256
    /// digest is always used for chain linkage regardless of this value.
    pub hash_prefix_length: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            max_iterations: 10_000,
            max_recursion_depth: 100,
            max_operations: 1_000_000,
            timeout_seconds: 30.0,
            ratio_epsilon: 1e-9,
            hash_prefix_length: 16,
        }
    }
}
