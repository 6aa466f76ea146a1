//! System-call trap and dispatch. spec.md §4.10.
//!
//! Grounded on `OS_Syscalls.c`: `os_syscall_frame_t` (syscall number, caller
//! task, up to 8 argument words), the fixed `os_syscall_table[]` of file
//! operations, and `os_syscall_handler`'s flow (spawn a short-lived kernel
//! task bound to the frame, block the caller on it WAIT_ALL, yield; the
//! service task's termination wakes the caller through the ordinary join
//! path). The one simplification from the original: `OS_Syscalls.c`'s
//! service task is a real task that the scheduler runs to completion later;
//! this kernel's file operations never themselves block, so the service
//! "task" here completes synchronously inside `dispatch` — the caller still
//! observes the exact same WAIT_ALL-then-join sequence of state changes,
//! just without an intervening context switch back to it.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::Error;
use crate::fs::{FileHandle, FileSystem};
use crate::object::ObjectId;
use crate::port::Port;
use crate::task::{TaskId, Timeout, WaitMode};
use crate::Kernel;

/// spec.md §4.10: "the syscall table enumerates file operations only".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallNumber {
    Open = 0,
    Close = 1,
    Read = 2,
    Write = 3,
}

impl SyscallNumber {
    fn from_index(n: u32) -> Option<Self> {
        match n {
            0 => Some(Self::Open),
            1 => Some(Self::Close),
            2 => Some(Self::Read),
            3 => Some(Self::Write),
            _ => None,
        }
    }
}

/// Marshalled user-stack frame: the syscall number plus up to 8 argument
/// words, mirroring `os_syscall_frame_t`'s `r0..r8`. Paths and buffers are
/// out of scope for this ABI sketch (they'd be user-space pointers the
/// trap handler would need to validate, which belongs to the concrete
/// `Port`, not the portable core) — callers pass already-resolved
/// arguments.
pub struct Frame<'a> {
    pub number: u32,
    pub path: Option<&'a str>,
    pub buf: Option<&'a mut [u8]>,
    pub handle: Option<FileHandle>,
}

/// spec.md §4.10's dispatch: verifies the scheduler is running, spawns the
/// ephemeral service task, blocks `caller` on it WAIT_ALL, services the
/// call, and resolves the join — returning the syscall's result the same
/// way the reserved stack slot would on real hardware.
pub fn dispatch<P: Port, F: FileSystem>(
    kernel: &mut Kernel<P>,
    fs: &mut F,
    caller: TaskId,
    frame: Frame<'_>,
) -> Result<i32, Error> {
    if kernel.scheduler_state() != crate::kernel::SchedulerState::Start {
        return Err(Error::NotReady);
    }
    if !kernel.port().is_task_context() {
        return Err(Error::Forbidden);
    }
    let Some(number) = SyscallNumber::from_index(frame.number) else {
        return Err(Error::BadArg);
    };

    let service = kernel.task_create(
        Some(alloc::string::String::from("svc")),
        service_entry,
        crate::config::PRIORITY_LEVELS - 1,
        crate::config::MIN_STACK_SIZE,
        0,
    )?;

    crate::wait::wait(
        kernel,
        caller,
        Vec::from([ObjectId::Task(service)]),
        WaitMode::All,
        Timeout::Forever,
    )?;

    let result = service_call(fs, number, frame);

    let code = match result {
        Ok(n) => n as i32,
        Err(e) => {
            log::warn!("syscall {number:?} failed: {e:?}");
            i32::from(e)
        }
    };
    kernel.task_return(service, code)?;
    let _ = crate::wait::finish_wait(kernel, caller);
    kernel.task_join(service)
}

fn service_call<F: FileSystem>(fs: &mut F, number: SyscallNumber, frame: Frame<'_>) -> Result<usize, Error> {
    match number {
        SyscallNumber::Open => {
            let path = frame.path.ok_or(Error::BadArg)?;
            fs.open(path).map(|h| h as usize)
        }
        SyscallNumber::Close => {
            let handle = frame.handle.ok_or(Error::BadArg)?;
            fs.close(handle).map(|_| 0)
        }
        SyscallNumber::Read => {
            let handle = frame.handle.ok_or(Error::BadArg)?;
            let buf = frame.buf.ok_or(Error::BadArg)?;
            fs.read(handle, buf)
        }
        SyscallNumber::Write => {
            let handle = frame.handle.ok_or(Error::BadArg)?;
            let buf = frame.buf.ok_or(Error::BadArg)?;
            fs.write(handle, buf)
        }
    }
}

/// The ephemeral service task's entry point. Never actually scheduled in
/// this synchronous model (`dispatch` completes and reaps it before any
/// context switch would run it), but kept as a real function so the task
/// control block is indistinguishable from any other kernel task from the
/// scheduler's point of view.
fn service_entry(_arg: usize) -> ! {
    loop {
        core::hint::spin_loop();
    }
}
