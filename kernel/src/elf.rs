//! Position-independent ELF32 loader. spec.md §4.9.
//!
//! Grounded on `OS_Process.c`'s `os_elf_loadHeader`/`os_elf_loadSegments`/
//! `os_elf_adjustMem` (the variant that walks all four of `.got`,
//! `.preinit_array`, `.init_array`, `.fini_array` — `OS_Internal.c`'s own
//! loader only patches `.got`, which is why this module follows Process's
//! version). Header/segment parsing itself is handed to `xmas-elf`, the
//! no_std ELF crate the pack's other kernel-shaped repo
//! (`NON-OS-N0N-OS/kernel`) reaches for, rather than hand-rolling the
//! struct layouts the original C does — this kernel still does the
//! position-independent-code-specific relocation work (steps ii-v) itself,
//! since that logic is this loader's entire reason to exist.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use xmas_elf::header::Machine;
use xmas_elf::program::Type as SegmentType;
use xmas_elf::ElfFile;

use crate::error::Error;

/// The four section kinds spec.md §4.9 step (iv) requires rewritten: each
/// holds a run of 32-bit absolute virtual addresses that must become
/// slab-relative once the image is no longer loaded at its link-time
/// address.
const RELOCATED_SECTIONS: [&str; 4] = [".got", ".preinit_array", ".init_array", ".fini_array"];

/// The result of loading one ELF image: a single flattened, relocated
/// memory slab plus the two addresses a caller needs to start the process
/// (entry point, GOT base — both already slab-relative).
#[derive(Debug)]
pub struct LoadedImage {
    pub slab: Vec<u8>,
    pub got_base: u32,
    pub entry: u32,
}

/// spec.md §4.9. `bytes` is the whole file, already read into memory by the
/// (out-of-scope) file system collaborator.
pub fn load(bytes: &[u8]) -> Result<LoadedImage, Error> {
    let file = ElfFile::new(bytes).map_err(|e| {
        log::warn!("elf: header parse failed: {e}");
        Error::BadArg
    })?;
    let header = &file.header;

    if header.pt1.magic != xmas_elf::header::MAGIC {
        log::warn!("elf: bad magic");
        return Err(Error::BadArg);
    }
    if header.pt1.class() != xmas_elf::header::Class::ThirtyTwo {
        log::warn!("elf: not a 32-bit image");
        return Err(Error::BadArg);
    }
    if header.pt1.data() != xmas_elf::header::Data::LittleEndian {
        log::warn!("elf: not little-endian");
        return Err(Error::BadArg);
    }
    if header.pt1.version() != xmas_elf::header::Version::Current {
        log::warn!("elf: unsupported ident version");
        return Err(Error::BadArg);
    }
    if header.pt2.machine().as_machine() != Machine::Arm {
        log::warn!("elf: not an ARM image");
        return Err(Error::BadArg);
    }

    // (ii) sum memsz over PT_LOAD, each rounded up to 8 bytes.
    let loads: Vec<_> = file
        .program_iter()
        .filter(|ph| ph.get_type() == Ok(SegmentType::Load))
        .collect();
    let total: usize = loads
        .iter()
        .map(|ph| align8(ph.mem_size() as usize))
        .sum();

    let mut slab = vec![0u8; total];

    // (iii) copy filesz bytes of each segment to its slab-relative offset,
    // in program-header order; the BSS tail (mem_size - file_size) is
    // already zero.
    let mut offset = 0usize;
    let mut segment_offsets = Vec::with_capacity(loads.len());
    for ph in &loads {
        let file_size = ph.file_size() as usize;
        let file_off = ph.offset() as usize;
        let src = bytes.get(file_off..file_off + file_size).ok_or_else(|| {
            log::warn!("elf: PT_LOAD segment at file offset {file_off:#x} runs past end of file");
            Error::BadArg
        })?;
        slab[offset..offset + file_size].copy_from_slice(src);
        segment_offsets.push((ph.virtual_addr() as u32, offset as u32));
        offset += align8(ph.mem_size() as usize);
    }

    // (iv) relocate .got/.preinit_array/.init_array/.fini_array: every word
    // is an absolute link-time virtual address, rewritten to
    // slab_base + word. The loader doesn't know the slab's eventual
    // absolute base yet (that's a placement decision for the caller), so
    // addresses are expressed relative to the slab's own start here and
    // the caller adds the real base once the slab is placed in memory.
    let mut got_base = 0u32;
    for name in RELOCATED_SECTIONS {
        let Some(section) = file.section_iter().find(|s| s.get_name(&file) == Ok(name)) else {
            continue;
        };
        let vaddr = section.address() as u32;
        let slab_off = to_slab_offset(&segment_offsets, vaddr).ok_or_else(|| {
            log::warn!("elf: {name} at vaddr {vaddr:#x} falls outside every PT_LOAD segment");
            Error::BadArg
        })?;
        let size = section.size() as usize;
        if !size.is_multiple_of(4) {
            log::warn!("elf: {name} size {size:#x} is not word-aligned");
            return Err(Error::BadArg);
        }
        for word_off in (0..size).step_by(4) {
            let at = slab_off as usize + word_off;
            let bytes4: [u8; 4] = slab
                .get(at..at + 4)
                .ok_or_else(|| {
                    log::warn!("elf: {name} entry at slab offset {at:#x} runs past end of slab");
                    Error::BadArg
                })?
                .try_into()
                .unwrap();
            let link_addr = u32::from_le_bytes(bytes4);
            let relocated = to_slab_offset(&segment_offsets, link_addr).unwrap_or(link_addr);
            slab[at..at + 4].copy_from_slice(&relocated.to_le_bytes());
        }
        if name == ".got" {
            got_base = slab_off;
        }
    }

    // (v) entry = slab_base + e_entry, Thumb bit set. Slab-relative here;
    // caller adds the slab's real base address.
    let entry = (header.pt2.entry_point() as u32) | 1;

    Ok(LoadedImage {
        slab,
        got_base,
        entry,
    })
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Translates a link-time virtual address into its offset within the
/// flattened slab, by finding which PT_LOAD segment it falls inside.
fn to_slab_offset(segments: &[(u32, u32)], vaddr: u32) -> Option<u32> {
    segments
        .iter()
        .find(|&&(seg_vaddr, _)| vaddr >= seg_vaddr)
        .map(|&(seg_vaddr, slab_off)| slab_off + (vaddr - seg_vaddr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let _ = env_logger::builder().is_test(true).try_init();
        let bytes = [0u8; 64];
        assert_eq!(load(&bytes).unwrap_err(), Error::BadArg);
    }
}
