//! The object layer: a tagged variant standing in for the teacher's
//! polymorphic object header.
//!
//! spec.md §3 describes a common object header carrying two "virtual"
//! operations, `free_count` and `take`, shared by every waitable kind. The
//! original C implements that with a struct of function pointers embedded at
//! the front of every object (`os_handle_t`/`os_obj_type_e` in
//! `OS_Obj.h`). §9's redesign notes call that out by name: "Object
//! polymorphism via function pointers inside a common header: replace with a
//! tagged variant plus a trait-style dispatch on the variant." [`ObjectId`]
//! is that tagged variant; [`crate::kernel::Kernel`] provides the dispatch
//! (`free_count`/`take` match on it instead of indirecting through a vtable,
//! since the kernel already owns every arena the variants point into).

use crate::event::EventId;
use crate::msgqueue::QueueId;
use crate::mutex::MutexId;
use crate::semaphore::SemaphoreId;
use crate::task::TaskId;
use crate::topic::TopicId;

/// A reference to any waitable kernel object, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Task(TaskId),
    Semaphore(SemaphoreId),
    Mutex(MutexId),
    Event(EventId),
    Queue(QueueId),
    Topic(TopicId),
}

/// The number of additional successful `take`s an object can currently
/// serve. `Infinite` is the sentinel spec.md §3 calls "∞" (an unowned mutex,
/// a set manual-reset event).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeCount {
    Finite(u32),
    Infinite,
}

impl FreeCount {
    pub fn is_zero(self) -> bool {
        matches!(self, FreeCount::Finite(0))
    }

    pub fn is_positive(self) -> bool {
        !self.is_zero()
    }

    /// Consume one unit, saturating; `Infinite` never runs out.
    pub fn consume_one(self) -> FreeCount {
        match self {
            FreeCount::Infinite => FreeCount::Infinite,
            FreeCount::Finite(0) => FreeCount::Finite(0),
            FreeCount::Finite(n) => FreeCount::Finite(n - 1),
        }
    }

    /// At least `waiters` more takes are possible, i.e. every waiter ahead
    /// of the one being considered could be satisfied too.
    pub fn at_least(self, waiters: u32) -> bool {
        match self {
            FreeCount::Infinite => true,
            FreeCount::Finite(n) => n >= waiters,
        }
    }
}

impl From<ObjectId> for &'static str {
    fn from(o: ObjectId) -> Self {
        match o {
            ObjectId::Task(_) => "task",
            ObjectId::Semaphore(_) => "semaphore",
            ObjectId::Mutex(_) => "mutex",
            ObjectId::Event(_) => "event",
            ObjectId::Queue(_) => "queue",
            ObjectId::Topic(_) => "topic",
        }
    }
}
