//! Host-simulated [`Port`], used by the kernel's own test suite the same
//! way `r3_port_std` lets `r3_kernel`/`r3_test_suite` run on a development
//! machine instead of real hardware.

use core::cell::Cell;

use crate::port::{InitialFrame, Port};

/// A `Port` that doesn't touch real registers or interrupts: `enter_cpu_lock`
/// just flips a flag, and there's no real dispatcher since tests drive the
/// kernel's scheduling decisions directly rather than actually switching
/// stacks.
#[derive(Default)]
pub struct SimPort {
    locked: Cell<bool>,
    switch_pending: Cell<bool>,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch_was_requested(&self) -> bool {
        self.switch_pending.get()
    }

    pub fn clear_switch_request(&self) {
        self.switch_pending.set(false);
    }
}

impl Port for SimPort {
    fn enter_cpu_lock(&self) -> bool {
        let was_locked = self.locked.get();
        self.locked.set(true);
        was_locked
    }

    fn leave_cpu_lock(&self) {
        self.locked.set(false);
    }

    fn is_cpu_lock_active(&self) -> bool {
        self.locked.get()
    }

    fn is_task_context(&self) -> bool {
        true
    }

    fn initialize_task_state(&self, stack: &mut [u8], frame: InitialFrame) -> usize {
        // No real register frame: record just enough in the stack's tail to
        // let tests assert on what would have been synthesized.
        let ptr = stack.as_ptr() as usize;
        let _ = frame;
        ptr
    }

    fn pend_switch(&self) {
        self.switch_pending.set(true);
    }

    fn dispatch_first_task(&self, _saved_sp: usize) -> ! {
        panic!("SimPort never actually dispatches; tests drive the scheduler directly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_cpu_lock_reports_prior_state_and_leave_clears_it() {
        let p = SimPort::new();
        assert!(!p.enter_cpu_lock());
        assert!(p.is_cpu_lock_active());
        p.leave_cpu_lock();
        assert!(!p.is_cpu_lock_active());
    }
}
