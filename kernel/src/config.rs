//! Kernel configuration, supplied once to [`crate::kernel::Kernel::new`].
//!
//! Grounded on `r3_kernel`'s `Cfg`/build-time configuration pattern, but
//! collapsed to a plain runtime struct: this kernel builds its task and
//! object arenas dynamically rather than generating static const-generic
//! arrays at compile time, so there's nothing left for a builder macro to
//! emit.

/// Minimum task stack size without a hardware floating-point frame, per
/// `OS_Tasks.c`'s stack-frame layout (16 auto-saved + 8 non-auto-saved
/// 32-bit words).
pub const MIN_STACK_SIZE: usize = 128;
/// Minimum task stack size when the FPU frame is present (adds the 16
/// extended registers `os_syscall`/`SVC_Handler` account for).
pub const MIN_STACK_SIZE_FPU: usize = 384;

/// Number of distinct priority levels, `0..PRIORITY_LEVELS` (spec.md §3:
/// base priority `0…127`).
pub const PRIORITY_LEVELS: u8 = 128;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Ticks between scheduler tick invocations; purely documentary here,
    /// since the portable core doesn't drive its own timer.
    pub tick_period_us: u32,
    /// Stack reserved for the idle task.
    pub idle_stack_size: usize,
    /// Whether tasks in this build carry an FPU frame, which changes the
    /// minimum stack size and the register set saved on context switch.
    pub has_fpu: bool,
}

impl Config {
    pub fn min_stack_size(&self) -> usize {
        if self.has_fpu {
            MIN_STACK_SIZE_FPU
        } else {
            MIN_STACK_SIZE
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_period_us: 1000,
            idle_stack_size: MIN_STACK_SIZE,
            has_fpu: false,
        }
    }
}
