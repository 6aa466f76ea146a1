//! Topic: per-subscriber fan-out queue. Grounded on `OS_Topic.c`:
//! `subscribe` gives the calling task its own private FIFO; `publish` pushes
//! the same payload into every subscriber's FIFO and wakes; `receive`
//! delegates straight to the caller's own FIFO. A task's `free_count` on a
//! topic (`os_topic_getFreeCount`) is its own subscription's queue length,
//! or 0 if it never subscribed — not the topic's aggregate, since each
//! subscriber drains independently.

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};

use crate::arena::Index;
use crate::list::TaskList;
use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId(Index);

impl TopicId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

pub struct Topic {
    pub name: Option<alloc::string::String>,
    pub needs_update: bool,
    pub waiters: TaskList,
    subscriptions: BTreeMap<TaskId, VecDeque<u32>>,
}

impl Topic {
    pub fn new() -> Self {
        Self {
            name: None,
            needs_update: false,
            waiters: TaskList::new(),
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn subscribe(&mut self, task: TaskId) {
        self.subscriptions.entry(task).or_default();
    }

    pub fn unsubscribe(&mut self, task: TaskId) {
        self.subscriptions.remove(&task);
    }

    pub fn is_subscribed(&self, task: TaskId) -> bool {
        self.subscriptions.contains_key(&task)
    }

    /// Free count as seen by `task`: its own subscription's queue length,
    /// 0 if it isn't subscribed at all.
    pub fn free_count_for(&self, task: TaskId) -> u32 {
        self.subscriptions
            .get(&task)
            .map(|q| q.len() as u32)
            .unwrap_or(0)
    }

    pub fn publish(&mut self, msg: u32) {
        for queue in self.subscriptions.values_mut() {
            queue.push_back(msg);
        }
        self.needs_update = true;
    }

    pub fn receive(&mut self, task: TaskId) -> Option<u32> {
        self.subscriptions.get_mut(&task)?.pop_front()
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Index;

    fn tid(slot: u32) -> TaskId {
        TaskId::from_raw(Index::for_test(slot, 0))
    }

    #[test]
    fn non_subscriber_sees_zero_free_count() {
        let t = Topic::new();
        assert_eq!(t.free_count_for(tid(1)), 0);
    }

    #[test]
    fn publish_fans_out_to_every_subscriber() {
        let mut t = Topic::new();
        t.subscribe(tid(1));
        t.subscribe(tid(2));
        t.publish(42);
        assert_eq!(t.receive(tid(1)), Some(42));
        assert_eq!(t.receive(tid(2)), Some(42));
        assert_eq!(t.receive(tid(1)), None);
    }
}
