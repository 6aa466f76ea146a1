//! First-fit allocator over a fixed region. spec.md §4.2: serves kernel
//! task-stack and ELF-segment-slab allocations; internal metadata is 8-byte
//! aligned; `monitor` reports used/total.
//!
//! Not present in `original_source/` as a standalone file (the reference
//! firmware gets its heap from a vendored allocator, not the kernel's own
//! sources), so this is grounded directly on spec.md's description rather
//! than a ported C routine. The free-list-of-blocks shape below is the
//! textbook first-fit design the spec calls for.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::Error;

const ALIGN: usize = 8;

fn align_up(n: usize) -> usize {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

#[derive(Debug, Clone, Copy)]
struct Block {
    offset: usize,
    size: usize,
}

/// A first-fit heap over a region of the given total size. Blocks are
/// tracked by offset/size pairs rather than over a real backing buffer,
/// since the portable core doesn't own physical RAM placement — the `Port`
/// (or, on the host, the test double) is the one handing out real memory;
/// this type answers "is there room, and where" for that caller.
pub struct Heap {
    total: usize,
    free: Vec<Block>,
    used: usize,
}

impl Heap {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            free: alloc::vec![Block {
                offset: 0,
                size: total
            }],
            used: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Reserves `size` bytes (rounded up to 8-byte alignment) and returns
    /// the offset of the run within the region, or `InsufficientHeap`.
    pub fn allocate(&mut self, size: usize) -> Result<usize, Error> {
        let size = align_up(size);
        let (idx, block) = self
            .free
            .iter()
            .enumerate()
            .find(|(_, b)| b.size >= size)
            .map(|(i, b)| (i, *b))
            .ok_or(Error::InsufficientHeap)?;
        let offset = block.offset;
        if block.size == size {
            self.free.remove(idx);
        } else {
            self.free[idx] = Block {
                offset: block.offset + size,
                size: block.size - size,
            };
        }
        self.used += size;
        Ok(offset)
    }

    /// Returns a previously allocated run to the free list, merging with
    /// any adjacent free block.
    pub fn free(&mut self, offset: usize, size: usize) {
        let size = align_up(size);
        self.used = self.used.saturating_sub(size);
        self.free.push(Block { offset, size });
        self.free.sort_by_key(|b| b.offset);
        let mut merged: Vec<Block> = Vec::with_capacity(self.free.len());
        for b in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.offset + last.size == b.offset => {
                    last.size += b.size;
                }
                _ => merged.push(b),
            }
        }
        self.free = merged;
    }

    pub fn monitor(&self) -> (usize, usize) {
        (self.used, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn allocate_and_free_round_trips() {
        let mut h = Heap::new(1024);
        let a = h.allocate(100).unwrap();
        assert_eq!(h.used(), 104);
        h.free(a, 100);
        assert_eq!(h.used(), 0);
        assert_eq!(h.monitor(), (0, 1024));
    }

    #[test]
    fn exhausted_heap_reports_insufficient() {
        let mut h = Heap::new(16);
        assert!(h.allocate(8).is_ok());
        assert!(h.allocate(8).is_ok());
        assert_eq!(h.allocate(8), Err(Error::InsufficientHeap));
    }

    #[test]
    fn freed_adjacent_blocks_merge() {
        let mut h = Heap::new(32);
        let a = h.allocate(8).unwrap();
        let b = h.allocate(8).unwrap();
        h.free(a, 8);
        h.free(b, 8);
        // Both freed and merged with the remaining tail: one big block.
        let c = h.allocate(32).unwrap();
        assert_eq!(c, 0);
    }

    /// No two live allocations out of a fixed-size heap ever share a byte,
    /// across an arbitrary interleaving of allocate/free requests.
    #[quickcheck]
    fn property_live_allocations_never_overlap(requests: Vec<(u8, bool)>) -> bool {
        const TOTAL: usize = 4096;
        let mut h = Heap::new(TOTAL);
        let mut live: Vec<(usize, usize)> = Vec::new();
        for &(size_byte, should_free) in requests.iter().take(64) {
            let size = (size_byte as usize % 256) + 1;
            if should_free && !live.is_empty() {
                let (offset, size) = live.remove(size_byte as usize % live.len());
                h.free(offset, size);
                continue;
            }
            if let Ok(offset) = h.allocate(size) {
                let aligned = align_up(size);
                for &(o2, s2) in &live {
                    if offset < o2 + s2 && o2 < offset + aligned {
                        return false;
                    }
                }
                live.push((offset, aligned));
            }
        }
        live.iter().all(|&(o, s)| o + s <= TOTAL)
    }

    /// Freeing every outstanding allocation always returns the heap to a
    /// single free run spanning the entire region, regardless of the
    /// allocation sizes or the order they're freed in.
    #[quickcheck]
    fn property_freeing_everything_restores_full_capacity(sizes: Vec<u8>) -> bool {
        const TOTAL: usize = 4096;
        let mut h = Heap::new(TOTAL);
        let mut live = Vec::new();
        for &size_byte in sizes.iter().take(32) {
            let size = (size_byte as usize % 256) + 1;
            if let Ok(offset) = h.allocate(size) {
                live.push((offset, size));
            }
        }
        for (offset, size) in live {
            h.free(offset, size);
        }
        h.used() == 0 && h.allocate(TOTAL).is_ok()
    }
}
