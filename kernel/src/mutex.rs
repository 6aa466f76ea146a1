//! Priority-inheriting mutex.
//!
//! spec.md §4.6 requires true priority inheritance (owner temporarily runs
//! at the priority of its highest waiter), which is a different discipline
//! from the teacher's static priority-ceiling mutex
//! (`r3_kernel/src/mutex.rs::MutexCb::ceiling` — a compile-time-fixed upper
//! bound applied regardless of who's actually waiting). This mutex instead
//! tracks `max_waiter_priority` directly off its block list and leaves the
//! recomputation walk to `priority::recompute_task`, mirroring the
//! `prev_mutex_held`-style owned-mutex list the teacher threads through
//! `TaskCb` (here: `Task::owned_mutexes`, a plain `Vec` since this kernel
//! doesn't need the teacher's intrusive-pointer threading).

extern crate alloc;

use crate::arena::Index;
use crate::list::TaskList;
use crate::object::FreeCount;
use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutexId(Index);

impl MutexId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

pub struct Mutex {
    pub name: Option<alloc::string::String>,
    pub owner: Option<TaskId>,
    pub needs_update: bool,
    pub waiters: TaskList,
    /// Highest effective priority among current waiters, or `None` if the
    /// block list is empty. Recomputed whenever the block list changes;
    /// consulted by `priority::recompute_task` for the owner's inherited
    /// floor.
    pub max_waiter_priority: Option<u8>,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            name: None,
            owner: None,
            needs_update: false,
            waiters: TaskList::new(),
            max_waiter_priority: None,
        }
    }

    pub fn free_count(&self) -> FreeCount {
        if self.owner.is_none() {
            FreeCount::Infinite
        } else {
            FreeCount::Finite(0)
        }
    }

    /// Assigns ownership to `task`. Caller is responsible for appending
    /// `self`'s id to `task`'s owned-mutex list.
    pub fn take(&mut self, task: TaskId) {
        self.owner = Some(task);
    }

    pub fn release(&mut self) {
        self.owner = None;
        self.needs_update = true;
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unowned_mutex_has_infinite_free_count() {
        let m = Mutex::new();
        assert_eq!(m.free_count(), FreeCount::Infinite);
    }

    #[test]
    fn owned_mutex_has_zero_free_count() {
        let mut m = Mutex::new();
        m.take(TaskId::from_raw(Index::for_test(0, 0)));
        assert_eq!(m.free_count(), FreeCount::Finite(0));
    }
}
