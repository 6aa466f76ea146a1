//! Priority inheritance: recursive recomputation across task → mutex →
//! task chains.
//!
//! Grounded on `OS_Internal.c`'s `os_task_udpatePrio`/`os_mutex_udpatePrio`
//! pair, which walk the same two-step recursion this module implements:
//! recomputing a task's effective priority can change a mutex it owns'
//! relevance to its waiters, which can change the owning chain further up.
//! spec.md §4.6 notes the inheritance graph is a DAG in steady state (no
//! task waits on a mutex it owns); `recompute_task` relies on that to
//! terminate and does not itself guard against a cycle.

extern crate alloc;

use alloc::vec::Vec;

use crate::arena::Arena;
use crate::mutex::{Mutex, MutexId};
use crate::object::ObjectId;
use crate::task::{Task, TaskId};

/// Recomputes `mutex`'s `max_waiter_priority` from its current block list.
/// Call whenever the block list changes or a waiter's own priority changes.
pub fn recompute_mutex(tasks: &Arena<Task>, mutexes: &mut Arena<Mutex>, mutex: MutexId) {
    let Some(m) = mutexes.get(mutex.raw()) else {
        return;
    };
    let max = m
        .waiters
        .iter()
        .filter_map(|t| tasks.get(t.raw()).map(|t| t.effective_priority))
        .max();
    mutexes.get_mut(mutex.raw()).unwrap().max_waiter_priority = max;
}

/// Recomputes `task`'s effective priority from `max(base, join waiters,
/// owned mutexes' max waiter priority)`. If it changed, recurses into every
/// mutex the task is currently blocked on (its new priority may change that
/// mutex's `max_waiter_priority`, and so its owner's effective priority) and
/// re-derives every mutex it owns (for symmetry with the original; a task's
/// own priority change never alters what its own owned mutexes report, so
/// this pass is a no-op check rather than a real propagation step).
pub fn recompute_task(tasks: &mut Arena<Task>, mutexes: &mut Arena<Mutex>, task: TaskId) {
    let mut visiting: Vec<TaskId> = Vec::new();
    recompute_task_inner(tasks, mutexes, task, &mut visiting);
}

fn recompute_task_inner(
    tasks: &mut Arena<Task>,
    mutexes: &mut Arena<Mutex>,
    task: TaskId,
    visiting: &mut Vec<TaskId>,
) {
    if visiting.contains(&task) {
        // A programmer error created a cycle (task waits on a mutex it
        // owns, transitively); stop rather than loop forever.
        log::warn!("priority inheritance cycle detected, aborting propagation");
        return;
    }
    visiting.push(task);

    let Some(t) = tasks.get(task.raw()) else {
        visiting.pop();
        return;
    };
    let base = t.base_priority;
    let join_max = t
        .join_waiters
        .iter()
        .filter_map(|w| tasks.get(w.raw()).map(|w| w.effective_priority))
        .max()
        .unwrap_or(0);
    let owned_max = t
        .owned_mutexes
        .iter()
        .filter_map(|m| mutexes.get(m.raw()).and_then(|m| m.max_waiter_priority))
        .max()
        .unwrap_or(0);
    let new_priority = base.max(join_max).max(owned_max);
    let waited: Vec<ObjectId> = t.waited.clone();
    let owned: Vec<MutexId> = t.owned_mutexes.clone();
    let old_priority = t.effective_priority;

    if new_priority == old_priority {
        visiting.pop();
        return;
    }
    if let Some(t) = tasks.get_mut(task.raw()) {
        t.effective_priority = new_priority;
    }

    for obj in waited {
        if let ObjectId::Mutex(m) = obj {
            recompute_mutex(tasks, mutexes, m);
            let owner = mutexes.get(m.raw()).and_then(|m| m.owner);
            if let Some(owner) = owner {
                recompute_task_inner(tasks, mutexes, owner, visiting);
            }
        }
    }
    for m in owned {
        recompute_mutex(tasks, mutexes, m);
    }

    visiting.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Entry, StackOwner, TaskState, Timeout, WaitMode};

    fn mk_task(priority: u8) -> Task {
        Task {
            name: None,
            entry: Entry::Static(|_| loop {
                core::hint::spin_loop();
            }),
            stack: StackOwner::Owned {
                stack: alloc::vec![0u8; 128],
                heap_offset: 0,
            },
            saved_sp: 0,
            base_priority: priority,
            effective_priority: priority,
            state: TaskState::Ready,
            timeout: Timeout::Forever,
            waited: Vec::new(),
            wanted: None,
            wait_mode: WaitMode::One,
            timed_out: false,
            return_value: None,
            pid: 0,
            got_base: None,
            owned_mutexes: Vec::new(),
            join_waiters: crate::list::TaskList::new(),
            process: None,
        }
    }

    #[test]
    fn owner_inherits_highest_waiter_priority() {
        let mut tasks = Arena::new();
        let mut mutexes = Arena::new();

        let owner = TaskId::from_raw(tasks.insert(mk_task(10)));
        let waiter = TaskId::from_raw(tasks.insert(mk_task(50)));

        let mid = MutexId::from_raw(mutexes.insert(Mutex::new()));
        mutexes.get_mut(mid.raw()).unwrap().owner = Some(owner);
        mutexes.get_mut(mid.raw()).unwrap().waiters.push_back(waiter);
        tasks.get_mut(owner.raw()).unwrap().owned_mutexes.push(mid);
        tasks.get_mut(waiter.raw()).unwrap().waited.push(ObjectId::Mutex(mid));

        recompute_mutex(&tasks, &mut mutexes, mid);
        recompute_task(&mut tasks, &mut mutexes, owner);

        assert_eq!(tasks.get(owner.raw()).unwrap().effective_priority, 50);
    }

    #[test]
    fn unrelated_task_priority_is_unaffected() {
        let mut tasks = Arena::new();
        let mut mutexes = Arena::new();
        let lone = TaskId::from_raw(tasks.insert(mk_task(7)));
        recompute_task(&mut tasks, &mut mutexes, lone);
        assert_eq!(tasks.get(lone.raw()).unwrap().effective_priority, 7);
    }

    /// A task waiting on a mutex it itself owns is the programmer error
    /// spec.md §4.6 says can't arise in steady state; the `visiting` guard
    /// must still stop the recursion rather than overflow the stack.
    #[test]
    fn cyclic_ownership_terminates_instead_of_recursing_forever() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut tasks = Arena::new();
        let mut mutexes = Arena::new();

        let task = TaskId::from_raw(tasks.insert(mk_task(3)));
        let mid = MutexId::from_raw(mutexes.insert(Mutex::new()));
        mutexes.get_mut(mid.raw()).unwrap().owner = Some(task);
        mutexes.get_mut(mid.raw()).unwrap().waiters.push_back(task);
        mutexes.get_mut(mid.raw()).unwrap().max_waiter_priority = Some(10);
        tasks.get_mut(task.raw()).unwrap().owned_mutexes.push(mid);
        tasks.get_mut(task.raw()).unwrap().waited.push(ObjectId::Mutex(mid));

        recompute_task(&mut tasks, &mut mutexes, task);
        assert_eq!(tasks.get(task.raw()).unwrap().effective_priority, 10);
    }
}
