//! Loaded user processes. Grounded on `OS_Process.c`'s `os_process_t`
//! (segment slab, GOT base, entry pointer, thread list, PID, name) and its
//! `os_process_create`/`os_process_kill`/`os_process_getByPID` lifecycle;
//! relocation itself lives in `elf.rs` per spec.md §4.9.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use crate::arena::Index;
use crate::error::Error;
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::port::Port;
use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(Index);

impl ProcessId {
    pub(crate) fn from_raw(idx: Index) -> Self {
        Self(idx)
    }

    pub(crate) fn raw(self) -> Index {
        self.0
    }
}

/// A loaded ELF image's flattened memory: every `PT_LOAD` segment packed
/// into one contiguous, 8-byte-aligned slab (spec.md §4.9 step ii/iii).
pub struct Process {
    pub name: String,
    pub pid: u16,
    pub segments: Vec<u8>,
    /// The kernel heap reservation backing `segments`, released when the
    /// process is killed.
    pub heap_offset: usize,
    /// Slab-relative address of the relocated `.got`.
    pub got_base: u32,
    /// `slab_base + e_entry`, Thumb bit already set (spec.md §4.9 step v);
    /// the slab's absolute base is filled in once the segments are placed
    /// in memory, which on this kernel is simply `segments.as_ptr()`.
    pub entry: u32,
    /// Tasks currently belonging to this process; the initial task plus
    /// any it spawns.
    pub threads: Vec<TaskId>,
}

impl Process {
    pub fn new(name: String, pid: u16, segments: Vec<u8>, heap_offset: usize, got_base: u32, entry: u32) -> Self {
        Self {
            name,
            pid,
            segments,
            heap_offset,
            got_base,
            entry,
            threads: Vec::new(),
        }
    }

    pub fn slab_base(&self) -> usize {
        self.segments.as_ptr() as usize
    }
}

/// Supplemented feature (`os_process_create(file, argc, argv[])`): loads
/// `path` through the ELF loader, registers the resulting process, and
/// spawns its initial task with `argv` marshalled onto the new task's own
/// stack (see [`marshal_argv`]) the way the original lays arguments out
/// before a process's first instruction runs.
pub fn load<P: Port, F: FileSystem>(
    kernel: &mut Kernel<P>,
    fs: &mut F,
    path: &str,
    priority: u8,
    stack_size: usize,
    argv: &[&str],
) -> Result<(ProcessId, TaskId), Error> {
    let handle = fs
        .open(path)
        .inspect_err(|e| log::warn!("process: failed to open {path}: {e:?}"))?;
    let bytes = fs
        .read_all(handle)
        .inspect_err(|e| log::warn!("process: failed to read {path}: {e:?}"))?;
    fs.close(handle)
        .inspect_err(|e| log::warn!("process: failed to close {path}: {e:?}"))?;

    let image = crate::elf::load(&bytes)
        .inspect_err(|e| log::warn!("process: failed to load ELF image {path}: {e:?}"))?;
    let heap_offset = kernel
        .heap
        .allocate(image.slab.len())
        .inspect_err(|e| log::warn!("process: heap reservation for {path}'s slab failed: {e:?}"))?;
    let pid = fresh_pid(kernel);
    let name = path.rsplit('/').next().unwrap_or(path);
    let process = Process::new(String::from(name), pid, image.slab, heap_offset, image.got_base, image.entry);
    let process_id = ProcessId::from_raw(kernel.processes.insert(process));

    let task = kernel.task_create_in_process(process_id, image.entry, image.got_base, priority, stack_size, argv)?;
    if let Some(p) = kernel.processes.get_mut(process_id.raw()) {
        p.threads.push(task);
    }
    Ok((process_id, task))
}

/// Packs `argv` into the low end of a freshly allocated task stack as
/// `[argc: u32][len: u32, bytes...]*`, and returns the stack-relative
/// offset of that block (0) for the caller to turn into the task's single
/// `arg` register once the stack's real base address is known. Silently
/// truncates whatever doesn't fit rather than failing task creation over
/// an oversized argument list.
pub(crate) fn marshal_argv(stack: &mut [u8], argv: &[&str]) -> usize {
    if stack.len() < 4 {
        return 0;
    }
    let mut offset = 4usize;
    let mut packed = 0u32;
    for s in argv {
        let bytes = s.as_bytes();
        if offset + 4 + bytes.len() > stack.len() {
            break;
        }
        stack[offset..offset + 4].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        offset += 4;
        stack[offset..offset + bytes.len()].copy_from_slice(bytes);
        offset += bytes.len();
        packed += 1;
    }
    stack[0..4].copy_from_slice(&packed.to_le_bytes());
    0
}

fn fresh_pid<P: Port>(kernel: &Kernel<P>) -> u16 {
    let mut candidate: u16 = 1;
    while kernel.processes.iter().any(|(_, p)| p.pid == candidate) {
        candidate = candidate.wrapping_add(1);
    }
    candidate
}

/// Supplemented feature (`os_process_kill`): tears down every thread the
/// process owns and removes it from the process set. The segment slab is
/// dropped along with the `Process` value itself.
pub fn kill<P: Port>(kernel: &mut Kernel<P>, process: ProcessId) -> Result<(), Error> {
    let p = kernel.processes.get(process.raw()).ok_or(Error::Invalid)?;
    let threads = p.threads.clone();
    let (heap_offset, slab_size) = (p.heap_offset, p.segments.len());
    for t in threads {
        let _ = kernel.task_delete(t);
    }
    kernel.processes.remove(process.raw());
    kernel.heap.free(heap_offset, slab_size);
    Ok(())
}
