//! Kernel error codes.
//!
//! Grounded on `r3_kernel/src/error.rs`'s approach of representing every
//! kernel error as a small integer, but collapsed to the single flat enum
//! spec.md §7 describes (the original kernel returns one of these codes from
//! essentially every entry point, rather than the teacher's per-operation
//! sub-error types — there's no equivalent here of the teacher's `raw::*`
//! trait family since this kernel isn't assembled from a generic trait-object
//! API surface).

use core::fmt;

/// A kernel operation's result code. `Ok` is represented by `Result::Ok`;
/// this enum only ever appears as `Result::Err`'s payload.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An argument was malformed (null name, zero-sized stack, negative
    /// priority, ...).
    BadArg = 1,
    /// A handle did not refer to an object of the expected kind, or no
    /// longer refers to a live object.
    Invalid = 2,
    /// The heap could not satisfy an allocation request.
    InsufficientHeap = 3,
    /// The operation requires the scheduler to be running.
    NotReady = 4,
    /// The operation was attempted from an interrupt, or on a resource not
    /// owned by the caller (e.g. unlocking a mutex you don't hold).
    Forbidden = 5,
    /// A bounded wait expired before the condition was satisfied.
    Timeout = 6,
    /// Unclassified internal error.
    Unknown = 7,
    /// The file system collaborator reported an error.
    Fs = 8,
    /// The requested item was not present (empty queue/topic).
    Empty = 9,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::BadArg => "bad argument",
            Error::Invalid => "invalid handle or kind",
            Error::InsufficientHeap => "insufficient heap",
            Error::NotReady => "scheduler not running",
            Error::Forbidden => "forbidden in this context",
            Error::Timeout => "timed out",
            Error::Unknown => "unknown error",
            Error::Fs => "file system error",
            Error::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// Syscall ABI boundary: every service call writes its result back into a
/// slot on the caller's stack as a plain integer (see `kernel::syscall`).
/// Success is encoded as a non-negative value by the individual service
/// functions; this conversion only concerns the kernel-level failure path.
impl From<Error> for i32 {
    fn from(e: Error) -> Self {
        -(e as i8 as i32)
    }
}
