//! The kernel: owns every arena and dispatches the object-layer virtual
//! operations (`free_count`/`take`) across the tagged [`ObjectId`] variants.
//!
//! Grounded on `r3_kernel`'s top-level `State` struct, which is likewise the
//! single owner of every kernel data structure the rest of the crate
//! operates on — the difference is this kernel's arenas grow and shrink at
//! runtime instead of being const-generic arrays sized at build time.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use crate::arena::Arena;
use crate::config::Config;
use crate::error::Error;
use crate::event::{Event, EventId, EventMode};
use crate::heap::Heap;
use crate::msgqueue::{MessageQueue, QueueId, QueueMode};
use crate::mutex::{Mutex, MutexId};
use crate::object::{FreeCount, ObjectId};
use crate::port::Port;
use crate::process::{Process, ProcessId};
use crate::semaphore::{Semaphore, SemaphoreId};
use crate::task::{Entry, StackOwner, Task, TaskId, TaskState, Timeout, WaitMode};
use crate::topic::{Topic, TopicId};

/// STOP/START per spec.md §4.7/§4.11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stop,
    Start,
}

pub struct Kernel<P> {
    pub(crate) port: P,
    pub config: Config,
    pub(crate) tasks: Arena<Task>,
    pub(crate) semaphores: Arena<Semaphore>,
    pub(crate) mutexes: Arena<Mutex>,
    pub(crate) events: Arena<Event>,
    pub(crate) queues: Arena<MessageQueue>,
    pub(crate) topics: Arena<Topic>,
    pub(crate) processes: Arena<Process>,
    pub(crate) heap: Heap,
    pub(crate) current: Option<TaskId>,
    pub(crate) scheduler_state: SchedulerState,
    pub(crate) tick: u64,
}

impl<P: Port> Kernel<P> {
    pub fn new(port: P, config: Config, heap_size: usize) -> Self {
        Self {
            port,
            config,
            tasks: Arena::new(),
            semaphores: Arena::new(),
            mutexes: Arena::new(),
            events: Arena::new(),
            queues: Arena::new(),
            topics: Arena::new(),
            processes: Arena::new(),
            heap: Heap::new(heap_size),
            current: None,
            scheduler_state: SchedulerState::Stop,
            tick: 0,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler_state
    }

    pub fn heap_monitor(&self) -> (usize, usize) {
        self.heap.monitor()
    }

    // --- task lifecycle -------------------------------------------------

    /// spec.md §4.3: allocate control block and stack, assign a PID by
    /// hashing the tick until unique, insert into the task set, and, if the
    /// new task outranks the currently running one and the scheduler is
    /// live, request a switch.
    pub fn task_create(
        &mut self,
        name: Option<String>,
        entry: fn(usize) -> !,
        priority: u8,
        stack_size: usize,
        arg: usize,
    ) -> Result<TaskId, Error> {
        if priority >= crate::config::PRIORITY_LEVELS {
            return Err(Error::BadArg);
        }
        let min = self.config.min_stack_size();
        if stack_size < min {
            return Err(Error::BadArg);
        }
        let heap_offset = self.heap.allocate(stack_size)?;
        let mut stack = alloc::vec![0u8; stack_size];
        let saved_sp = self.port.initialize_task_state(
            &mut stack,
            crate::port::InitialFrame {
                entry: entry as usize,
                arg,
                return_shim: crate::task::return_shim as *const () as usize,
                got_base: None,
            },
        );
        let pid = self.fresh_pid();
        let task = Task {
            name,
            entry: Entry::Static(entry),
            stack: StackOwner::Owned { stack, heap_offset },
            saved_sp,
            base_priority: priority,
            effective_priority: priority,
            state: TaskState::Ready,
            timeout: Timeout::Forever,
            waited: Vec::new(),
            wanted: None,
            wait_mode: WaitMode::One,
            timed_out: false,
            return_value: None,
            pid,
            got_base: None,
            owned_mutexes: Vec::new(),
            join_waiters: crate::list::TaskList::new(),
            process: None,
        };
        let id = TaskId::from_raw(self.tasks.insert(task));

        if self.scheduler_state == SchedulerState::Start {
            if let Some(current) = self.current {
                let current_prio = self.tasks.get(current.raw()).map(|t| t.effective_priority);
                if current_prio.map(|p| priority > p).unwrap_or(true) {
                    self.port.pend_switch();
                }
            } else {
                self.port.pend_switch();
            }
        }
        Ok(id)
    }

    /// spec.md §4.9's variant of task creation: entry lives inside an
    /// already-loaded process's segment slab rather than kernel code, and
    /// the task additionally carries the process's GOT base for the `Port`
    /// to install at context-restore time.
    pub(crate) fn task_create_in_process(
        &mut self,
        process: ProcessId,
        entry_offset: u32,
        got_base: u32,
        priority: u8,
        stack_size: usize,
        argv: &[&str],
    ) -> Result<TaskId, Error> {
        let min = self.config.min_stack_size();
        if stack_size < min {
            return Err(Error::BadArg);
        }
        let slab_base = self
            .processes
            .get(process.raw())
            .ok_or(Error::Invalid)?
            .slab_base();
        let heap_offset = self.heap.allocate(stack_size)?;
        let mut stack = alloc::vec![0u8; stack_size];
        let arg = stack.as_ptr() as usize + crate::process::marshal_argv(&mut stack, argv);
        let saved_sp = self.port.initialize_task_state(
            &mut stack,
            crate::port::InitialFrame {
                entry: slab_base.wrapping_add(entry_offset as usize),
                arg,
                return_shim: crate::task::return_shim as *const () as usize,
                got_base: Some(got_base),
            },
        );
        let pid = self.fresh_pid();
        let task = Task {
            name: None,
            entry: Entry::Process(entry_offset),
            stack: StackOwner::Owned { stack, heap_offset },
            saved_sp,
            base_priority: priority,
            effective_priority: priority,
            state: TaskState::Ready,
            timeout: Timeout::Forever,
            waited: Vec::new(),
            wanted: None,
            wait_mode: WaitMode::One,
            timed_out: false,
            return_value: None,
            pid,
            got_base: Some(got_base),
            owned_mutexes: Vec::new(),
            join_waiters: crate::list::TaskList::new(),
            process: Some(process),
        };
        let id = TaskId::from_raw(self.tasks.insert(task));
        if self.scheduler_state == SchedulerState::Start {
            self.port.pend_switch();
        }
        Ok(id)
    }

    fn fresh_pid(&self) -> u16 {
        let mut candidate = (self.tick.wrapping_mul(2654435761) & 0xffff) as u16;
        while self.tasks.iter().any(|(_, t)| t.pid == candidate) {
            candidate = candidate.wrapping_add(1);
        }
        candidate
    }

    pub fn task_state(&self, task: TaskId) -> Result<TaskState, Error> {
        self.tasks.get(task.raw()).map(|t| t.state).ok_or(Error::Invalid)
    }

    pub fn task_priority(&self, task: TaskId) -> Result<u8, Error> {
        self.tasks
            .get(task.raw())
            .map(|t| t.effective_priority)
            .ok_or(Error::Invalid)
    }

    pub fn task_by_pid(&self, pid: u16) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|(_, t)| t.pid == pid)
            .map(|(idx, _)| TaskId::from_raw(idx))
    }

    pub fn process_by_pid(&self, pid: u16) -> Option<ProcessId> {
        self.processes
            .iter()
            .find(|(_, p)| p.pid == pid)
            .map(|(idx, _)| ProcessId::from_raw(idx))
    }

    /// spec.md §4.3: stores the return value, marks ENDED, and runs a wake
    /// pass so any joiner sees the transition.
    pub fn task_return(&mut self, task: TaskId, value: i32) -> Result<(), Error> {
        let t = self.tasks.get_mut(task.raw()).ok_or(Error::Invalid)?;
        t.return_value = Some(value);
        t.state = TaskState::Ended;
        crate::wait::wake_object(self, ObjectId::Task(task));
        Ok(())
    }

    /// Supplemented feature (`os_task_getReturn`): read back the value an
    /// ended task stored, reaping its control block once consumed.
    pub fn task_join(&mut self, task: TaskId) -> Result<i32, Error> {
        let t = self.tasks.get(task.raw()).ok_or(Error::Invalid)?;
        if t.state != TaskState::Ended {
            return Err(Error::NotReady);
        }
        let value = t.return_value.ok_or(Error::NotReady)?;
        self.reap_task(task);
        Ok(value)
    }

    /// spec.md §4.3: external delete marks ENDED... actually DELETING, wakes
    /// everything the task was blocked in, and removes it from every list;
    /// self-delete instead loops/yields until a safe reap point. Since this
    /// core doesn't run a real scheduler loop on the host, the caller-facing
    /// distinction collapses to: mark DELETING, wake the target's own
    /// waited-on objects so nobody is left hanging, and reap immediately
    /// (the `Port`'s real dispatcher is the one that actually defers a
    /// self-delete to a safe stack).
    pub fn task_delete(&mut self, task: TaskId) -> Result<(), Error> {
        let t = self.tasks.get_mut(task.raw()).ok_or(Error::Invalid)?;
        t.state = TaskState::Deleting;
        let waited: Vec<ObjectId> = core::mem::take(&mut t.waited);
        for obj in waited {
            self.leave_block_list(obj, task);
        }
        crate::wait::wake_object(self, ObjectId::Task(task));
        self.abandon_owned_mutexes(task);
        self.reap_task(task);
        Ok(())
    }

    fn reap_task(&mut self, task: TaskId) {
        if let Some(t) = self.tasks.get(task.raw()) {
            if let StackOwner::Owned { stack, heap_offset } = &t.stack {
                self.heap.free(*heap_offset, stack.len());
            }
        }
        self.tasks.remove(task.raw());
        if self.current == Some(task) {
            self.current = None;
        }
    }

    fn abandon_owned_mutexes(&mut self, task: TaskId) {
        let owned = self
            .tasks
            .get(task.raw())
            .map(|t| t.owned_mutexes.clone())
            .unwrap_or_default();
        for m in owned {
            if let Some(mutex) = self.mutexes.get_mut(m.raw()) {
                mutex.owner = None;
                mutex.needs_update = true;
            }
            crate::wait::wake_object(self, ObjectId::Mutex(m));
        }
    }

    /// spec.md §4.3: transitions to BLOCKED with a countdown, waiting on no
    /// object; the tick handler restores READY at zero.
    pub fn task_sleep(&mut self, task: TaskId, ticks: u32) -> Result<(), Error> {
        let t = self.tasks.get_mut(task.raw()).ok_or(Error::Invalid)?;
        t.state = TaskState::Blocked;
        t.timeout = Timeout::Ticks(ticks);
        Ok(())
    }

    pub fn yield_now(&mut self) {
        self.port.pend_switch();
    }

    pub(crate) fn leave_block_list(&mut self, obj: ObjectId, task: TaskId) {
        match obj {
            ObjectId::Task(t) => {
                if let Some(t) = self.tasks.get_mut(t.raw()) {
                    t.join_waiters.remove(task);
                }
            }
            ObjectId::Semaphore(s) => {
                if let Some(s) = self.semaphores.get_mut(s.raw()) {
                    s.waiters.remove(task);
                }
            }
            ObjectId::Mutex(m) => {
                if let Some(m) = self.mutexes.get_mut(m.raw()) {
                    m.waiters.remove(task);
                }
                crate::priority::recompute_mutex(&self.tasks, &mut self.mutexes, m);
            }
            ObjectId::Event(e) => {
                if let Some(e) = self.events.get_mut(e.raw()) {
                    e.waiters.remove(task);
                }
            }
            ObjectId::Queue(q) => {
                if let Some(q) = self.queues.get_mut(q.raw()) {
                    q.waiters.remove(task);
                }
            }
            ObjectId::Topic(t) => {
                if let Some(t) = self.topics.get_mut(t.raw()) {
                    t.waiters.remove(task);
                }
            }
        }
    }

    // --- object-layer dispatch ------------------------------------------

    /// The shared `free_count` virtual operation from spec.md §3, dispatched
    /// by matching the tagged [`ObjectId`] instead of indirecting through a
    /// function-pointer table.
    pub fn free_count(&self, obj: ObjectId) -> Result<FreeCount, Error> {
        Ok(match obj {
            ObjectId::Task(t) => {
                let t = self.tasks.get(t.raw()).ok_or(Error::Invalid)?;
                if t.state == TaskState::Ended {
                    FreeCount::Infinite
                } else {
                    FreeCount::Finite(0)
                }
            }
            ObjectId::Semaphore(s) => self.semaphores.get(s.raw()).ok_or(Error::Invalid)?.free_count(),
            ObjectId::Mutex(m) => self.mutexes.get(m.raw()).ok_or(Error::Invalid)?.free_count(),
            ObjectId::Event(e) => self.events.get(e.raw()).ok_or(Error::Invalid)?.free_count(),
            ObjectId::Queue(q) => self.queues.get(q.raw()).ok_or(Error::Invalid)?.free_count(),
            ObjectId::Topic(t) => {
                let current = self.current.ok_or(Error::NotReady)?;
                let t = self.topics.get(t.raw()).ok_or(Error::Invalid)?;
                FreeCount::Finite(t.free_count_for(current))
            }
        })
    }

    /// The shared `take` virtual operation. `taker` is whichever task is
    /// being granted the object (normally the caller, always so except the
    /// internal bookkeeping paths in `wait.rs`).
    pub fn take(&mut self, obj: ObjectId, taker: TaskId) -> Result<(), Error> {
        match obj {
            ObjectId::Task(_) => {}
            ObjectId::Semaphore(s) => {
                self.semaphores.get_mut(s.raw()).ok_or(Error::Invalid)?.take();
            }
            ObjectId::Mutex(m) => {
                self.mutexes.get_mut(m.raw()).ok_or(Error::Invalid)?.take(taker);
                if let Some(t) = self.tasks.get_mut(taker.raw()) {
                    t.owned_mutexes.push(m);
                }
            }
            ObjectId::Event(e) => {
                self.events.get_mut(e.raw()).ok_or(Error::Invalid)?.take();
            }
            ObjectId::Queue(q) => {
                self.queues.get_mut(q.raw()).ok_or(Error::Invalid)?.take();
            }
            ObjectId::Topic(t) => {
                self.topics.get_mut(t.raw()).ok_or(Error::Invalid)?.receive(taker);
            }
        }
        Ok(())
    }

    fn waiters_of(&self, obj: ObjectId) -> Option<&crate::list::TaskList> {
        match obj {
            ObjectId::Task(t) => self.tasks.get(t.raw()).map(|t| &t.join_waiters),
            ObjectId::Semaphore(s) => self.semaphores.get(s.raw()).map(|s| &s.waiters),
            ObjectId::Mutex(m) => self.mutexes.get(m.raw()).map(|m| &m.waiters),
            ObjectId::Event(e) => self.events.get(e.raw()).map(|e| &e.waiters),
            ObjectId::Queue(q) => self.queues.get(q.raw()).map(|q| &q.waiters),
            ObjectId::Topic(t) => self.topics.get(t.raw()).map(|t| &t.waiters),
        }
    }

    pub(crate) fn push_waiter(&mut self, obj: ObjectId, task: TaskId) {
        match obj {
            ObjectId::Task(t) => {
                if let Some(t) = self.tasks.get_mut(t.raw()) {
                    t.join_waiters.push_back(task);
                }
            }
            ObjectId::Semaphore(s) => {
                if let Some(s) = self.semaphores.get_mut(s.raw()) {
                    s.waiters.push_back(task);
                }
            }
            ObjectId::Mutex(m) => {
                if let Some(m) = self.mutexes.get_mut(m.raw()) {
                    m.waiters.push_back(task);
                }
                crate::priority::recompute_mutex(&self.tasks, &mut self.mutexes, m);
                if let Some(owner) = self.mutexes.get(m.raw()).and_then(|m| m.owner) {
                    crate::priority::recompute_task(&mut self.tasks, &mut self.mutexes, owner);
                }
            }
            ObjectId::Event(e) => {
                if let Some(e) = self.events.get_mut(e.raw()) {
                    e.waiters.push_back(task);
                }
            }
            ObjectId::Queue(q) => {
                if let Some(q) = self.queues.get_mut(q.raw()) {
                    q.waiters.push_back(task);
                }
            }
            ObjectId::Topic(t) => {
                if let Some(t) = self.topics.get_mut(t.raw()) {
                    t.waiters.push_back(task);
                }
            }
        }
    }

    pub(crate) fn waiters_snapshot(&self, obj: ObjectId) -> Vec<TaskId> {
        self.waiters_of(obj).map(|l| l.iter().collect()).unwrap_or_default()
    }

    pub(crate) fn needs_update(&self, obj: ObjectId) -> bool {
        match obj {
            ObjectId::Task(_) => false,
            ObjectId::Semaphore(s) => self.semaphores.get(s.raw()).map(|s| s.needs_update).unwrap_or(false),
            ObjectId::Mutex(m) => self.mutexes.get(m.raw()).map(|m| m.needs_update).unwrap_or(false),
            ObjectId::Event(e) => self.events.get(e.raw()).map(|e| e.needs_update).unwrap_or(false),
            ObjectId::Queue(q) => self.queues.get(q.raw()).map(|q| q.needs_update).unwrap_or(false),
            ObjectId::Topic(t) => self.topics.get(t.raw()).map(|t| t.needs_update).unwrap_or(false),
        }
    }

    pub(crate) fn clear_needs_update(&mut self, obj: ObjectId) {
        match obj {
            ObjectId::Task(_) => {}
            ObjectId::Semaphore(s) => {
                if let Some(s) = self.semaphores.get_mut(s.raw()) {
                    s.needs_update = false;
                }
            }
            ObjectId::Mutex(m) => {
                if let Some(m) = self.mutexes.get_mut(m.raw()) {
                    m.needs_update = false;
                }
            }
            ObjectId::Event(e) => {
                if let Some(e) = self.events.get_mut(e.raw()) {
                    e.needs_update = false;
                }
            }
            ObjectId::Queue(q) => {
                if let Some(q) = self.queues.get_mut(q.raw()) {
                    q.needs_update = false;
                }
            }
            ObjectId::Topic(t) => {
                if let Some(t) = self.topics.get_mut(t.raw()) {
                    t.needs_update = false;
                }
            }
        }
    }

    pub(crate) fn mark_needs_update(&mut self, obj: ObjectId) {
        match obj {
            ObjectId::Task(_) => {}
            ObjectId::Semaphore(s) => {
                if let Some(s) = self.semaphores.get_mut(s.raw()) {
                    s.needs_update = true;
                }
            }
            ObjectId::Mutex(m) => {
                if let Some(m) = self.mutexes.get_mut(m.raw()) {
                    m.needs_update = true;
                }
            }
            ObjectId::Event(e) => {
                if let Some(e) = self.events.get_mut(e.raw()) {
                    e.needs_update = true;
                }
            }
            ObjectId::Queue(q) => {
                if let Some(q) = self.queues.get_mut(q.raw()) {
                    q.needs_update = true;
                }
            }
            ObjectId::Topic(t) => {
                if let Some(t) = self.topics.get_mut(t.raw()) {
                    t.needs_update = true;
                }
            }
        }
    }

    // --- synchronization object constructors/operations ------------------

    pub fn semaphore_create(&mut self, initial: u32, max: u32) -> SemaphoreId {
        SemaphoreId::from_raw(self.semaphores.insert(Semaphore::new(initial, max)))
    }

    pub fn semaphore_release(&mut self, sem: SemaphoreId) -> Result<(), Error> {
        let changed = self.semaphores.get_mut(sem.raw()).ok_or(Error::Invalid)?.release();
        if changed {
            crate::wait::wake_object(self, ObjectId::Semaphore(sem));
        }
        Ok(())
    }

    pub fn mutex_create(&mut self) -> MutexId {
        MutexId::from_raw(self.mutexes.insert(Mutex::new()))
    }

    /// spec.md §4.8: release requires caller == owner; clears owner, drops
    /// it from the owner's owned-mutex list, recomputes the (former)
    /// owner's effective priority, and runs a wake pass.
    pub fn mutex_release(&mut self, mutex: MutexId, caller: TaskId) -> Result<(), Error> {
        let owner = self.mutexes.get(mutex.raw()).ok_or(Error::Invalid)?.owner;
        if owner != Some(caller) {
            return Err(Error::Forbidden);
        }
        self.mutexes.get_mut(mutex.raw()).unwrap().release();
        if let Some(t) = self.tasks.get_mut(caller.raw()) {
            t.owned_mutexes.retain(|&m| m != mutex);
        }
        crate::priority::recompute_task(&mut self.tasks, &mut self.mutexes, caller);
        crate::wait::wake_object(self, ObjectId::Mutex(mutex));
        Ok(())
    }

    pub fn event_create(&mut self, mode: EventMode) -> EventId {
        EventId::from_raw(self.events.insert(Event::new(mode)))
    }

    pub fn event_set(&mut self, event: EventId) -> Result<(), Error> {
        self.events.get_mut(event.raw()).ok_or(Error::Invalid)?.set_flag();
        crate::wait::wake_object(self, ObjectId::Event(event));
        Ok(())
    }

    pub fn event_reset(&mut self, event: EventId) -> Result<(), Error> {
        self.events.get_mut(event.raw()).ok_or(Error::Invalid)?.reset();
        Ok(())
    }

    pub fn queue_create(&mut self, mode: QueueMode) -> QueueId {
        QueueId::from_raw(self.queues.insert(MessageQueue::new(mode)))
    }

    pub fn queue_push(&mut self, queue: QueueId, msg: u32) -> Result<(), Error> {
        self.queues.get_mut(queue.raw()).ok_or(Error::Invalid)?.push(msg);
        crate::wait::wake_object(self, ObjectId::Queue(queue));
        Ok(())
    }

    pub fn topic_create(&mut self) -> TopicId {
        TopicId::from_raw(self.topics.insert(Topic::new()))
    }

    pub fn topic_subscribe(&mut self, topic: TopicId, task: TaskId) -> Result<(), Error> {
        self.topics.get_mut(topic.raw()).ok_or(Error::Invalid)?.subscribe(task);
        Ok(())
    }

    pub fn topic_publish(&mut self, topic: TopicId, msg: u32) -> Result<(), Error> {
        self.topics.get_mut(topic.raw()).ok_or(Error::Invalid)?.publish(msg);
        crate::wait::wake_object(self, ObjectId::Topic(topic));
        Ok(())
    }

    /// §9's redesign note on `free_count`'s topic sentinel: unlike
    /// [`Self::free_count`] (which only answers for the current task),
    /// this answers for any specific subscriber, 0 if unsubscribed.
    pub fn topic_free_count_for(&self, topic: TopicId, task: TaskId) -> Result<u32, Error> {
        Ok(self.topics.get(topic.raw()).ok_or(Error::Invalid)?.free_count_for(task))
    }

    // --- scheduler --------------------------------------------------------

    pub fn start(&mut self) {
        self.scheduler_state = SchedulerState::Start;
        self.port.pend_switch();
    }

    pub fn stop(&mut self) {
        self.scheduler_state = SchedulerState::Stop;
    }

    /// spec.md §4.7/§5: decrement every blocked task's countdown (whether
    /// it's a plain `task_sleep` or a bounded `wait` on one or more
    /// objects), promote expired ones back to READY, then request a switch
    /// if warranted. A countdown reaching zero while still waiting on
    /// objects goes through [`crate::wait::expire_timeout`] so its block
    /// list entries are removed and its wait reports `Timeout`; a plain
    /// sleep (empty `waited`) just flips straight to READY.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        let expired: Vec<TaskId> = self
            .tasks
            .iter_mut()
            .filter_map(|(idx, t)| {
                if t.state == TaskState::Blocked {
                    if let Timeout::Ticks(n) = t.timeout {
                        let n = n.saturating_sub(1);
                        t.timeout = Timeout::Ticks(n);
                        if n == 0 {
                            if t.waited.is_empty() {
                                t.state = TaskState::Ready;
                            }
                            return Some(TaskId::from_raw(idx));
                        }
                    }
                }
                None
            })
            .collect();
        let mut any_object_timeout = false;
        for task in expired {
            let waiting_on_objects = self
                .tasks
                .get(task.raw())
                .map(|t| !t.waited.is_empty())
                .unwrap_or(false);
            if waiting_on_objects {
                crate::wait::expire_timeout(self, task);
                any_object_timeout = true;
            }
        }
        if any_object_timeout {
            crate::wait::run_wake_engine(self);
        }

        if self.scheduler_state != SchedulerState::Start {
            return;
        }
        if let Some(current) = self.current {
            let current_prio = self.tasks.get(current.raw()).map(|t| t.effective_priority);
            let higher_ready = self.tasks.iter().any(|(_, t)| {
                t.state == TaskState::Ready
                    && current_prio.map(|p| t.effective_priority > p).unwrap_or(true)
            });
            if higher_ready {
                self.port.pend_switch();
            }
        } else {
            self.port.pend_switch();
        }
    }
}
