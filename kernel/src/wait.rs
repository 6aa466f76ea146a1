//! The unified multi-object wait engine.
//!
//! Grounded on `OS_Internal.c`'s `os_task_list_isObjFreeOnTask` (the
//! simulated-consumption predicate) and `os_handle_list_updateAndCheck` (the
//! propagating wake pass) — spec.md §4.4/§4.5 describe the same two-part
//! design: one predicate that tells a caller whether an object would be
//! free *for them specifically*, accounting for every higher-priority or
//! earlier-queued waiter ahead of them, and one engine that re-runs that
//! predicate across every object flagged `needs_update` until the flag set
//! empties out.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::Error;
use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::port::Port;
use crate::task::{TaskId, TaskState, Timeout, WaitMode};

/// spec.md §4.4's "immediately satisfiable" predicate: would `obj` have a
/// free unit left for `task` once every waiter ahead of it in `obj`'s
/// (priority-sorted) block list has simulated taking its share? A WAIT_ONE
/// waiter ahead always counts as a consumer (it would take the first thing
/// available to it); a WAIT_ALL waiter ahead only counts if every *other*
/// object it waits on is, recursively, also available to it — the mutual
/// recursion spec.md calls out. `visiting` breaks cycles a programmer error
/// could otherwise create (stopping the inner walk at the target task keeps
/// the common case terminating in one pass; `visiting` is the backstop for
/// the uncommon one).
pub fn is_object_free_on_task<P: Port>(
    kernel: &Kernel<P>,
    obj: ObjectId,
    task: TaskId,
    visiting: &mut Vec<(ObjectId, TaskId)>,
) -> bool {
    let key = (obj, task);
    if visiting.contains(&key) {
        return false;
    }
    visiting.push(key);

    let mut remaining = match kernel.free_count(obj) {
        Ok(fc) => fc,
        Err(_) => {
            visiting.pop();
            return false;
        }
    };

    for waiter in sorted_waiters(kernel, obj) {
        if waiter == task {
            visiting.pop();
            return remaining.is_positive();
        }
        if kernel.task_state(waiter) != Ok(TaskState::Blocked) {
            continue;
        }
        let (mode, waited) = match kernel_task_wait(kernel, waiter) {
            Some(v) => v,
            None => continue,
        };
        let eligible = match mode {
            WaitMode::One => true,
            WaitMode::All => waited
                .iter()
                .all(|&o| o == obj || is_object_free_on_task(kernel, o, waiter, visiting)),
        };
        if eligible {
            remaining = remaining.consume_one();
        }
    }
    visiting.pop();
    remaining.is_positive()
}

fn kernel_task_wait<P: Port>(kernel: &Kernel<P>, task: TaskId) -> Option<(WaitMode, Vec<ObjectId>)> {
    kernel
        .tasks
        .get(task.raw())
        .map(|t| (t.wait_mode, t.waited.clone()))
}

fn sorted_waiters<P: Port>(kernel: &Kernel<P>, obj: ObjectId) -> Vec<TaskId> {
    let mut waiters = kernel.waiters_snapshot(obj);
    waiters.sort_by(|&a, &b| {
        let pa = kernel.task_priority(a).unwrap_or(0);
        let pb = kernel.task_priority(b).unwrap_or(0);
        pb.cmp(&pa)
    });
    waiters
}

fn is_satisfiable<P: Port>(kernel: &Kernel<P>, task: TaskId, objs: &[ObjectId], mode: WaitMode) -> bool {
    let mut visiting = Vec::new();
    match mode {
        WaitMode::One => objs
            .iter()
            .any(|&o| is_object_free_on_task(kernel, o, task, &mut visiting)),
        WaitMode::All => objs
            .iter()
            .all(|&o| is_object_free_on_task(kernel, o, task, &mut visiting)),
    }
}

/// spec.md §4.4: the shared implementation behind `wait_one`/`wait_any`/
/// `wait_all`. Checks immediate satisfiability first; if the caller would
/// have to block and `timeout` is zero, fails with `Timeout` instead.
/// Otherwise installs the caller into every object's block list and leaves
/// it `Blocked` — the actual suspension (saving the caller's context and
/// picking a new task to run) is the `Port`'s job, triggered by the
/// `pend_switch()` call below, not this function's.
pub fn wait<P: Port>(
    kernel: &mut Kernel<P>,
    task: TaskId,
    objs: Vec<ObjectId>,
    mode: WaitMode,
    timeout: Timeout,
) -> Result<(), Error> {
    if objs.is_empty() {
        return Err(Error::BadArg);
    }
    if !kernel.port().is_task_context() {
        return Err(Error::Forbidden);
    }

    if is_satisfiable(kernel, task, &objs, mode) {
        grant(kernel, task, &objs, mode);
        return Ok(());
    }
    if matches!(timeout, Timeout::Ticks(0)) {
        return Err(Error::Timeout);
    }

    {
        let t = kernel.tasks.get_mut(task.raw()).ok_or(Error::Invalid)?;
        t.waited = objs.clone();
        t.wait_mode = mode;
        t.wanted = None;
        t.timed_out = false;
        t.state = TaskState::Blocked;
        t.timeout = timeout;
    }
    for &o in &objs {
        kernel.push_waiter(o, task);
    }
    kernel.yield_now();
    Ok(())
}

/// Performs the actual acquisition once a wait (blocking or not) has been
/// determined satisfiable: for WAIT_ALL, takes every object; for WAIT_ONE,
/// takes the first one that's free and records its index as `wanted`.
fn grant<P: Port>(kernel: &mut Kernel<P>, task: TaskId, objs: &[ObjectId], mode: WaitMode) {
    match mode {
        WaitMode::All => {
            for &o in objs {
                let _ = kernel.take(o, task);
            }
            if let Some(t) = kernel.tasks.get_mut(task.raw()) {
                t.wanted = Some(objs.len().saturating_sub(1));
            }
        }
        WaitMode::One => {
            let mut visiting = Vec::new();
            if let Some(idx) = objs
                .iter()
                .position(|&o| is_object_free_on_task(kernel, o, task, &mut visiting))
            {
                let _ = kernel.take(objs[idx], task);
                if let Some(t) = kernel.tasks.get_mut(task.raw()) {
                    t.wanted = Some(idx);
                }
            }
        }
    }
    if let Some(t) = kernel.tasks.get_mut(task.raw()) {
        t.state = TaskState::Ready;
        t.timed_out = false;
    }
    for &o in objs {
        kernel.leave_block_list(o, task);
    }
}

/// spec.md §5/§4.4: called once a bounded wait's countdown has reached zero
/// without any of its objects becoming available. Pulls `task` out of every
/// object's block list it's still queued on (flagging each `needs_update`,
/// since removing a waiter can free up room for whoever was behind it),
/// marks the task READY with nothing granted, and sets `timed_out` so
/// `finish_wait` reports `Error::Timeout` instead of a granted object.
pub(crate) fn expire_timeout<P: Port>(kernel: &mut Kernel<P>, task: TaskId) {
    let objs = kernel.tasks.get(task.raw()).map(|t| t.waited.clone()).unwrap_or_default();
    for &o in &objs {
        kernel.leave_block_list(o, task);
        kernel.mark_needs_update(o);
    }
    if let Some(t) = kernel.tasks.get_mut(task.raw()) {
        t.waited.clear();
        t.wanted = None;
        t.timed_out = true;
        t.state = TaskState::Ready;
    }
}

/// Reads back the object a resumed WAIT_ONE/WAIT_ANY/WAIT_ALL call was
/// granted, clearing the task's wait bookkeeping. `Ok(None)` if the task is
/// still blocked (caller should check `task_state` first); `Err(Timeout)`
/// if the wait's countdown expired before anything became available
/// (spec.md §5).
pub fn finish_wait<P: Port>(kernel: &mut Kernel<P>, task: TaskId) -> Result<Option<ObjectId>, Error> {
    let t = kernel.tasks.get(task.raw()).ok_or(Error::Invalid)?;
    if t.state != TaskState::Ready {
        return Ok(None);
    }
    let timed_out = t.timed_out;
    let granted = match t.wanted {
        Some(idx) => t.waited.get(idx).copied(),
        None => None,
    };
    if let Some(t) = kernel.tasks.get_mut(task.raw()) {
        t.waited.clear();
        t.wanted = None;
        t.timed_out = false;
    }
    if timed_out {
        return Err(Error::Timeout);
    }
    Ok(granted)
}

/// spec.md §4.5: marks `obj` for re-evaluation and immediately drains the
/// propagation queue.
pub fn wake_object<P: Port>(kernel: &mut Kernel<P>, obj: ObjectId) {
    kernel.mark_needs_update(obj);
    run_wake_engine(kernel);
}

fn all_flagged_objects<P: Port>(kernel: &Kernel<P>) -> Vec<ObjectId> {
    let mut out = Vec::new();
    for (idx, _) in kernel.semaphores.iter() {
        let id = crate::semaphore::SemaphoreId::from_raw(idx);
        if kernel.needs_update(ObjectId::Semaphore(id)) {
            out.push(ObjectId::Semaphore(id));
        }
    }
    for (idx, _) in kernel.mutexes.iter() {
        let id = crate::mutex::MutexId::from_raw(idx);
        if kernel.needs_update(ObjectId::Mutex(id)) {
            out.push(ObjectId::Mutex(id));
        }
    }
    for (idx, _) in kernel.events.iter() {
        let id = crate::event::EventId::from_raw(idx);
        if kernel.needs_update(ObjectId::Event(id)) {
            out.push(ObjectId::Event(id));
        }
    }
    for (idx, _) in kernel.queues.iter() {
        let id = crate::msgqueue::QueueId::from_raw(idx);
        if kernel.needs_update(ObjectId::Queue(id)) {
            out.push(ObjectId::Queue(id));
        }
    }
    for (idx, _) in kernel.topics.iter() {
        let id = crate::topic::TopicId::from_raw(idx);
        if kernel.needs_update(ObjectId::Topic(id)) {
            out.push(ObjectId::Topic(id));
        }
    }
    out
}

pub(crate) fn run_wake_engine<P: Port>(kernel: &mut Kernel<P>) {
    let mut highest_woken: Option<u8> = None;
    loop {
        let flagged = all_flagged_objects(kernel);
        if flagged.is_empty() {
            break;
        }
        for obj in flagged {
            if !kernel.needs_update(obj) {
                continue;
            }
            kernel.clear_needs_update(obj);
            let waiters = sorted_waiters(kernel, obj);
            for w in waiters {
                if kernel.task_state(w) != Ok(TaskState::Blocked) {
                    continue;
                }
                let (mode, waited) = match kernel_task_wait(kernel, w) {
                    Some(v) => v,
                    None => continue,
                };
                let satisfied = is_satisfiable(kernel, w, &waited, mode);
                if !satisfied {
                    continue;
                }
                grant(kernel, w, &waited, mode);
                if let Ok(p) = kernel.task_priority(w) {
                    highest_woken = Some(highest_woken.map_or(p, |cur| cur.max(p)));
                }
                if mode == WaitMode::All {
                    for &sibling in &waited {
                        if sibling != obj {
                            kernel.mark_needs_update(sibling);
                        }
                    }
                }
            }
        }
    }

    if let Some(p) = highest_woken {
        let current_prio = kernel.current_task().and_then(|t| kernel.task_priority(t).ok());
        if current_prio.map(|cp| p > cp).unwrap_or(true) {
            kernel.yield_now();
        }
    }
}
