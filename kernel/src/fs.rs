//! External collaborators the core depends on but does not implement.
//!
//! spec.md §1 lists the flash block driver and the log-structured flash
//! file system as deliberately out of scope, "specified only through the
//! interfaces the core uses". These two traits are that interface: the
//! syscall layer (`syscall.rs`) and the ELF loader (`elf.rs`) are generic
//! over a `FileSystem` implementation rather than calling concrete flash
//! routines, the way the teacher's `Port` trait lets the portable kernel
//! stay silent about which microcontroller it's running on.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::Error;

/// A raw sector-addressed flash block device.
pub trait BlockDevice {
    fn sector_size(&self) -> usize;
    fn sector_count(&self) -> usize;
    fn erase(&mut self, sector: usize) -> Result<(), Error>;
    fn program(&mut self, sector: usize, offset: usize, data: &[u8]) -> Result<(), Error>;
    fn read(&self, sector: usize, offset: usize, buf: &mut [u8]) -> Result<(), Error>;
}

/// File handle identity as seen by the syscall table (spec.md §4.10: open,
/// close, read, write).
pub type FileHandle = u32;

/// The log-structured file system layered over a [`BlockDevice`].
pub trait FileSystem {
    fn open(&mut self, path: &str) -> Result<FileHandle, Error>;
    fn close(&mut self, handle: FileHandle) -> Result<(), Error>;
    fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> Result<usize, Error>;
    fn write(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize, Error>;
    /// Reads the entire file, for the ELF loader's benefit.
    fn read_all(&mut self, handle: FileHandle) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = self.read(handle, &mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}
