//! Event flag. spec.md §3/§4.8/§4.11: boolean state plus AUTO/MANUAL mode.
//! `set` asserts; AUTO clears on take (one waiter consumed), MANUAL stays
//! asserted until an explicit `reset`.

extern crate alloc;

use crate::arena::Index;
use crate::list::TaskList;
use crate::object::FreeCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(Index);

impl EventId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

pub struct Event {
    pub name: Option<alloc::string::String>,
    pub set: bool,
    pub mode: EventMode,
    pub needs_update: bool,
    pub waiters: TaskList,
}

impl Event {
    pub fn new(mode: EventMode) -> Self {
        Self {
            name: None,
            set: false,
            mode,
            needs_update: false,
            waiters: TaskList::new(),
        }
    }

    pub fn free_count(&self) -> FreeCount {
        if self.set {
            FreeCount::Infinite
        } else {
            FreeCount::Finite(0)
        }
    }

    /// In AUTO mode a successful take clears the flag for everyone else;
    /// MANUAL leaves it asserted.
    pub fn take(&mut self) {
        if self.mode == EventMode::Auto {
            self.set = false;
        }
    }

    pub fn set_flag(&mut self) {
        self.set = true;
        self.needs_update = true;
    }

    pub fn reset(&mut self) {
        self.set = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_event_clears_on_take() {
        let mut e = Event::new(EventMode::Auto);
        e.set_flag();
        e.take();
        assert!(!e.set);
    }

    #[test]
    fn manual_event_stays_set_until_reset() {
        let mut e = Event::new(EventMode::Manual);
        e.set_flag();
        e.take();
        assert!(e.set);
        e.reset();
        assert!(!e.set);
    }
}
