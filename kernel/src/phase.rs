//! Phase Machine — sequences every forge call through a bounded 0→9→0 cycle
//! (spec §4.5).
//!
//! The ten-state enum and one-step-at-a-time transition discipline is
//! grounded on the teacher's `transition.rs` "Execution Sequence (Frozen for
//! v0.0.1-alpha)" numbered comment, which fixes an ordered pipeline the
//! transition function must walk in lockstep. `PhaseGuard`'s
//! observe-then-drop shape follows `logannye-tinyzkp`'s `MonotoneBlockGuard`
//! (`stream.rs`): a small struct that exists only to make a sequencing
//! invariant impossible to violate by construction, generalized here to force
//! `IDLE` on every exit path via `Drop` rather than a debug assertion.

/// One step of the bounded execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Ingest = 1,
    Parse = 2,
    Crystallize = 3,
    Diffuse = 4,
    Converge = 5,
    Verify = 6,
    Commit = 7,
    Reflect = 8,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The next phase in the cycle. Total: `Reflect` wraps back to `Idle`,
    /// closing the loop (spec §4.5: "Initial/terminal: both IDLE").
    fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::Ingest,
            Phase::Ingest => Phase::Parse,
            Phase::Parse => Phase::Crystallize,
            Phase::Crystallize => Phase::Diffuse,
            Phase::Diffuse => Phase::Converge,
            Phase::Converge => Phase::Verify,
            Phase::Verify => Phase::Commit,
            Phase::Commit => Phase::Reflect,
            Phase::Reflect => Phase::Idle,
        }
    }
}

/// Per-kernel phase sequencer. One `PhaseMachine` guards one in-flight forge
/// call at a time (spec §5: "a kernel hosts one Phase Machine").
#[derive(Debug)]
pub struct PhaseMachine {
    current: Phase,
    /// Monotonic count of interpreted VM steps across the machine's
    /// lifetime, used by the VM to enforce `max_operations` (spec §4.4).
    operations: u64,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        PhaseMachine { current: Phase::Idle, operations: 0 }
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Mutating the instance's state is permitted only mid-cycle.
    pub fn can_mutate_state(&self) -> bool {
        self.current != Phase::Idle
    }

    /// Advance by exactly one step. The only transition this API exposes is
    /// `current -> current.next()`; arbitrary skips are structurally
    /// impossible rather than checked at runtime.
    pub fn advance(&mut self) -> Result<Phase, crate::error::KernelError> {
        self.current = self.current.next();
        Ok(self.current)
    }

    pub fn record_operation(&mut self) {
        self.operations += 1;
    }

    /// Force the machine back to `Idle`, unconditionally. Called on every
    /// exit path of a forge call, successful or not (spec §4.5: "on any fault
    /// the scope handler... forces IDLE").
    pub fn reset(&mut self) {
        self.current = Phase::Idle;
    }
}

/// Scoped acquisition for a single forge call: advances the machine through
/// the cycle and guarantees `Idle` on drop regardless of how the call ends
/// (early return, panic unwinding, or normal completion).
pub struct PhaseGuard<'a> {
    machine: &'a mut PhaseMachine,
}

impl<'a> PhaseGuard<'a> {
    /// Acquire the guard. Fails if the machine is not currently `Idle` —
    /// only one forge call may be in flight per instance (spec §5).
    pub fn acquire(machine: &'a mut PhaseMachine) -> Result<Self, crate::error::KernelError> {
        if machine.current != Phase::Idle {
            return Err(crate::error::KernelError::Phase {
                from: machine.current.as_u8(),
                to: Phase::Idle.as_u8(),
            });
        }
        Ok(PhaseGuard { machine })
    }

    pub fn advance(&mut self) -> Result<Phase, crate::error::KernelError> {
        self.machine.advance()
    }

    pub fn current(&self) -> Phase {
        self.machine.current()
    }

    pub fn record_operation(&mut self) {
        self.machine.record_operation();
    }
}

impl<'a> Drop for PhaseGuard<'a> {
    fn drop(&mut self) {
        self.machine.reset();
    }
}
