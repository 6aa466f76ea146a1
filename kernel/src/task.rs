//! Tasks: creation, lifecycle, priority bookkeeping.
//!
//! Grounded on `OS_Tasks.c:os_task_create`/`os_task_return`/`os_task_delete`/
//! `os_task_sleep` for the lifecycle semantics, and on `r3_kernel/src/task.rs`
//! for how a no_std kernel crate structures a task control block and its
//! associated free functions (teacher keeps `TaskCb` data-only with the
//! behaviour in free `fn`s taking `&'static TaskCb`; this kernel keeps `Task`
//! data-only the same way, with behaviour living in `kernel.rs`/`wait.rs`/
//! `priority.rs` operating on a `TaskId` plus `&mut Kernel`).

use alloc::vec::Vec;

use crate::arena::Index;
use crate::list::TaskList;
use crate::mutex::MutexId;
use crate::object::ObjectId;

/// A stable reference to a [`Task`]. Opaque outside the crate; callers only
/// ever hold the handle returned by [`crate::kernel::Kernel::task_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Index);

impl TaskId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

/// spec.md §3: `state ∈ {READY, BLOCKED, ENDED, DELETING, NOT_EXIST}`.
/// `NotExist` isn't a stored variant here — a handle whose arena slot was
/// recycled simply fails to resolve (see `arena.rs`), which is the more
/// idiomatic way to express "this task no longer exists" than a tombstone
/// state that every reader has to remember to check for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Blocked,
    Ended,
    Deleting,
}

/// spec.md §4.4: a multi-object wait is either "any one of these" or
/// "all of these".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    One,
    All,
}

/// A bounded or unbounded countdown, ticked down once per scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Forever,
    Ticks(u32),
}

/// Where a task's entry point lives. Resolves open question #2 from §9: the
/// original frees a task's entry function pointer as a heap object on
/// delete, which is wrong for statically created tasks. Tagging the entry
/// by provenance means deletion only ever frees what the kernel allocated.
#[derive(Clone, Copy)]
pub enum Entry {
    /// A function supplied directly by kernel-side code; never freed.
    Static(fn(usize) -> !),
    /// An entry point inside a loaded process's segment slab; freed (along
    /// with the rest of the slab) when the owning process is killed, never
    /// by the task itself.
    Process(u32),
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Entry::Static(p) => write!(f, "Entry::Static({:p})", *p as *const ()),
            Entry::Process(addr) => write!(f, "Entry::Process({:#010x})", addr),
        }
    }
}

/// Where a task's stack memory came from, mirroring [`Entry`]'s ownership
/// split.
pub enum StackOwner {
    /// Allocated directly for this task. `heap_offset` is the reservation
    /// `kernel.rs` took out of [`crate::heap::Heap`] for it, released back
    /// on delete.
    Owned { stack: Vec<u8>, heap_offset: usize },
    /// A range inside a process's segment slab; not freed by the task.
    Process { base: u32, size: u32 },
}

/// Task control block. spec.md §3's invariants: a `Blocked` task has a
/// non-empty `waited` vector, and
/// `effective_priority == max(base_priority, block-list waiters, owned
/// mutexes' max waiter priority)` — maintained by `priority::recompute_task`.
pub struct Task {
    pub name: Option<alloc::string::String>,
    pub entry: Entry,
    pub stack: StackOwner,
    /// Saved stack-pointer snapshot; written by the `Port` on context switch
    /// out, read on switch in. Opaque to the portable core.
    pub saved_sp: usize,
    pub base_priority: u8,
    pub effective_priority: u8,
    pub state: TaskState,
    pub timeout: Timeout,
    /// Objects this task is currently waiting on (populated only while
    /// `Blocked`).
    pub waited: Vec<ObjectId>,
    /// Index into `waited` of the object granted to the task, or `None` if
    /// nothing has been granted yet.
    pub wanted: Option<usize>,
    pub wait_mode: WaitMode,
    /// Set when a bounded wait's countdown reached zero before any of its
    /// objects became available; cleared on every fresh `wait` call and by
    /// [`crate::wait::grant`]. Lets `finish_wait` tell a timed-out wakeup
    /// apart from a granted one without overloading `wanted`.
    pub timed_out: bool,
    pub return_value: Option<i32>,
    pub pid: u16,
    /// Process GOT base, installed into a dedicated register at context
    /// restore time so position-independent code can find its globals
    /// (spec.md §4.9). `None` for kernel-native tasks.
    pub got_base: Option<u32>,
    /// Mutexes currently owned by this task (for priority inheritance and
    /// for `abandon_owned_mutexes` on delete).
    pub owned_mutexes: Vec<MutexId>,
    /// Tasks blocked waiting for this task to reach `Ended` (a task is
    /// itself a waitable object per spec.md §3's object kind tag; this is
    /// its block list). Their priorities feed into this task's inherited
    /// effective priority the same way a mutex's waiters do.
    pub join_waiters: TaskList,
    /// The process this task belongs to, if any (kernel tasks have none).
    pub process: Option<crate::process::ProcessId>,
}

impl Task {
    pub fn is_blocked_on(&self, obj: ObjectId) -> bool {
        self.state == TaskState::Blocked && self.waited.contains(&obj)
    }
}

/// The address baked into every initial stack frame as the return address
/// (spec.md §4.3: "the return address pointing at the task-return shim").
/// A kernel-native `Entry::Static` task is typed `fn(usize) -> !` and can
/// never reach it through safe Rust; an `Entry::Process` task's foreign
/// position-independent entry point follows ordinary C calling convention
/// and can return normally, and this is where control lands when it does.
/// The concrete `Port` is expected to trap this address back into the
/// kernel to run [`crate::kernel::Kernel::task_return`] with whatever the
/// entry point left in its return-value register.
pub extern "C" fn return_shim() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
