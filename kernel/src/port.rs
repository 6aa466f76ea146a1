//! The `Port` seam: everything the portable core needs from the concrete
//! architecture but must not implement itself.
//!
//! Grounded on `r3_port_arm_m/src/threading/imp.rs`'s method set
//! (`enter_cpu_lock`/`leave_cpu_lock`, `is_cpu_lock_active`,
//! `is_task_context`, `yield_cpu`, `initialize_task_state`,
//! `dispatch_first_task`, `exit_and_dispatch`) — this kernel keeps the same
//! split (critical-section control, context lifecycle, dispatch) but
//! expresses it as a plain trait object implemented once per architecture
//! (`port-arm-m`'s `CortexMPort`) or, for tests, by [`crate::sim::SimPort`],
//! rather than the teacher's const-generic `Traits: PortInstance` style —
//! this kernel creates tasks dynamically so there's no benefit to
//! monomorphizing the kernel over a compile-time task set.

extern crate alloc;

use alloc::vec::Vec;

/// Describes the initial register state for a freshly created task, enough
/// for a `Port` to synthesize the interrupt stack frame spec.md §4.3
/// requires (first restore lands at `entry(arg)`, return address points at
/// the task-return shim).
pub struct InitialFrame {
    pub entry: usize,
    pub arg: usize,
    pub return_shim: usize,
    /// Process GOT base, installed into a dedicated register at restore
    /// time for position-independent code (spec.md §4.9).
    pub got_base: Option<u32>,
}

/// Everything the portable kernel core asks of the concrete architecture.
pub trait Port {
    /// Disables interrupts/exceptions below the kernel's own priority and
    /// returns an opaque token proving the lock is held. Nestable only
    /// through the token, matching `CpuLockCell`'s single-entry discipline.
    fn enter_cpu_lock(&self) -> bool;
    /// Restores the interrupt state from before the matching
    /// `enter_cpu_lock`.
    fn leave_cpu_lock(&self);
    fn is_cpu_lock_active(&self) -> bool;
    fn is_task_context(&self) -> bool;

    /// Writes the saved-stack-pointer bytes for a brand new task such that
    /// resuming it lands at `frame.entry(frame.arg)`.
    fn initialize_task_state(&self, stack: &mut [u8], frame: InitialFrame) -> usize;

    /// Requests a context switch at the next safe point. A no-op if one is
    /// already pending.
    fn pend_switch(&self);

    /// Enters the scheduler for the first time; never returns.
    fn dispatch_first_task(&self, saved_sp: usize) -> !;
}

/// Register set saved on context switch, for ports that want to describe
/// it as data rather than raw assembly (used by `SimPort`).
#[derive(Debug, Default, Clone)]
pub struct SavedRegisters(pub Vec<u32>);
