//! Scheduler selection and the idle task. spec.md §4.7.
//!
//! Tick handling and switch *requests* already live on [`crate::kernel::Kernel`]
//! (mirroring how the teacher keeps scheduling state on its top-level `State`
//! rather than splitting it into a separate type); this module is the part
//! genuinely specific to "which task runs next", grounded on `OS_Internal.c`'s
//! task-list walk: skip ENDED/DELETING (reaping DELETING synchronously),
//! pick the READY task with the highest effective priority, ties broken by
//! list order, falling back to the idle task.

extern crate alloc;

use crate::kernel::Kernel;
use crate::port::Port;
use crate::task::{TaskId, TaskState};

/// Walks the task arena in (stable) insertion order, reaping any DELETING
/// task found along the way, and returns the READY task with the highest
/// effective priority — the earliest in iteration order among ties.
pub fn select_next<P: Port>(kernel: &mut Kernel<P>) -> Option<TaskId> {
    let deleting: alloc::vec::Vec<TaskId> = kernel
        .tasks
        .iter()
        .filter(|(_, t)| t.state == TaskState::Deleting)
        .map(|(idx, _)| TaskId::from_raw(idx))
        .collect();
    for t in deleting {
        let _ = kernel.task_delete(t);
    }

    kernel
        .tasks
        .iter()
        .filter(|(_, t)| t.state == TaskState::Ready)
        .max_by_key(|(_, t)| t.effective_priority)
        .map(|(idx, _)| TaskId::from_raw(idx))
}

/// The task every scheduler needs when nothing else is READY. Ports install
/// this at the lowest priority level when bringing up the kernel; it just
/// spins, matching `OS_Tasks.c`'s idle loop.
pub fn idle_entry(_arg: usize) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sim::SimPort;

    #[test]
    fn selects_highest_priority_ready_task() {
        let mut k = Kernel::new(SimPort::new(), Config::default(), 4096);
        let low = k.task_create(None, idle_entry, 1, 128, 0).unwrap();
        let high = k.task_create(None, idle_entry, 50, 128, 0).unwrap();
        let _ = low;
        assert_eq!(select_next(&mut k), Some(high));
    }
}
