//! Message queue. Grounded on `OS_MsgQ.c`: a mode-tagged sequence of opaque
//! payloads; `push` inserts at head (LIFO) or tail (FIFO), `wait` pops the
//! head either way. Unlike the original's `os_msgQ_getFreeCount`/
//! `os_msgQ_objTake` (stubbed to return 0/OK because the C object-header
//! dispatch requires every kind to implement them even when the real
//! availability check lives in the wait engine itself), this kernel's
//! dispatch is a direct match on [`crate::object::ObjectId`]
//! (`kernel.rs::free_count`/`take`), so the queue just reports its real
//! length and pops for real.

extern crate alloc;

use alloc::collections::VecDeque;

use crate::arena::Index;
use crate::list::TaskList;
use crate::object::FreeCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(Index);

impl QueueId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

pub struct MessageQueue {
    pub name: Option<alloc::string::String>,
    pub mode: QueueMode,
    pub messages: VecDeque<u32>,
    pub needs_update: bool,
    pub waiters: TaskList,
}

impl MessageQueue {
    pub fn new(mode: QueueMode) -> Self {
        Self {
            name: None,
            mode,
            messages: VecDeque::new(),
            needs_update: false,
            waiters: TaskList::new(),
        }
    }

    pub fn free_count(&self) -> FreeCount {
        FreeCount::Finite(self.messages.len() as u32)
    }

    pub fn push(&mut self, msg: u32) {
        match self.mode {
            QueueMode::Fifo => self.messages.push_back(msg),
            QueueMode::Lifo => self.messages.push_front(msg),
        }
        self.needs_update = true;
    }

    pub fn take(&mut self) -> Option<u32> {
        self.messages.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_pops_in_push_order() {
        let mut q = MessageQueue::new(QueueMode::Fifo);
        q.push(1);
        q.push(2);
        assert_eq!(q.take(), Some(1));
        assert_eq!(q.take(), Some(2));
    }

    #[test]
    fn lifo_pops_most_recent_first() {
        let mut q = MessageQueue::new(QueueMode::Lifo);
        q.push(1);
        q.push(2);
        assert_eq!(q.take(), Some(2));
        assert_eq!(q.take(), Some(1));
    }
}
