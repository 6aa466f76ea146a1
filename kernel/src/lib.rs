//! Portable core of a preemptive real-time kernel for 32-bit ARM Cortex-M
//! microcontrollers: tasks, priority-scheduled execution with priority
//! inheritance, a family of blocking synchronization objects, and a
//! user-process loader for position-independent ELF executables.
//!
//! This crate is architecture-agnostic; the concrete context switch and tick
//! source live in a separate `Port` implementation (see the sibling
//! `rkos_port_arm_m` crate). Tests in this crate run against [`sim::SimPort`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arena;
pub mod config;
pub mod elf;
pub mod error;
pub mod event;
pub mod fs;
pub mod heap;
pub mod kernel;
pub mod list;
pub mod msgqueue;
pub mod mutex;
pub mod object;
pub mod port;
pub mod priority;
pub mod process;
pub mod semaphore;
pub mod sched;
pub mod syscall;
pub mod task;
pub mod topic;
pub mod wait;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::Config;
pub use error::Error;
pub use kernel::Kernel;
pub use object::ObjectId;
pub use port::Port;
