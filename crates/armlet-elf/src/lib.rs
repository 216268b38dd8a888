//! ELF32 firmware image loader.
//!
//! Accepts little-endian `EM_ARM` executables, turns their PT_LOAD segments
//! into region descriptors for the bus, and extracts the entry point plus
//! the initial main stack pointer from the vector table.

use object::elf;
use object::read::elf::{ElfFile32, FileHeader, ProgramHeader};
use object::{Endian, Endianness};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElfError {
    /// Not parseable as an ELF image at all.
    #[error("not a valid ELF image: {reason}")]
    NotValid { reason: &'static str },
    /// Parseable, but not a little-endian ARM ELF32 executable.
    #[error("wrong ELF header: {reason}")]
    WrongHeader { reason: &'static str },
}

/// One loadable segment, ready to become a bus region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionImage {
    pub base: u32,
    pub data: Vec<u8>,
    pub writable: bool,
}

/// What the loader hands the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Entry PC with the Thumb bit forced.
    pub entry: u32,
    /// Word 0 of the vector table, when the image carries one.
    pub initial_sp: Option<u32>,
    pub regions: Vec<RegionImage>,
}

/// Parses and validates a firmware image.
pub fn load(data: &[u8]) -> Result<LoadedImage, ElfError> {
    let file = ElfFile32::<Endianness>::parse(data).map_err(|_| ElfError::NotValid {
        reason: "malformed ELF32 structure",
    })?;
    let endian = file.endian();
    let header = file.raw_header();

    if !endian.is_little_endian() {
        return Err(ElfError::WrongHeader {
            reason: "big-endian image",
        });
    }
    if header.e_machine(endian) != elf::EM_ARM {
        return Err(ElfError::WrongHeader {
            reason: "machine type is not ARM",
        });
    }
    if header.e_type(endian) != elf::ET_EXEC {
        return Err(ElfError::WrongHeader {
            reason: "not an executable image",
        });
    }

    let mut regions = Vec::new();
    for segment in file.raw_segments() {
        if segment.p_type(endian) != elf::PT_LOAD {
            continue;
        }
        let memsz = segment.p_memsz(endian);
        if memsz == 0 {
            continue;
        }
        let base = segment.p_vaddr(endian);
        let file_bytes = segment
            .data(endian, data)
            .map_err(|()| ElfError::NotValid {
                reason: "segment data out of bounds",
            })?;
        // Pad .bss-style trailing space with zeroes.
        let mut bytes = file_bytes.to_vec();
        bytes.resize(memsz as usize, 0);
        let writable = segment.p_flags(endian) & elf::PF_W != 0;
        debug!(
            base = format_args!("{base:#010x}"),
            len = bytes.len(),
            writable,
            "loadable segment"
        );
        regions.push(RegionImage {
            base,
            data: bytes,
            writable,
        });
    }
    if regions.is_empty() {
        return Err(ElfError::NotValid {
            reason: "no loadable segments",
        });
    }

    let entry = header.e_entry(endian) | 1;

    // Cortex-M reset reads the initial MSP from word 0 of the vector table,
    // which sits at the base of the segment holding the entry point.
    let initial_sp = regions
        .iter()
        .find(|r| {
            let pc = entry & !1;
            pc >= r.base && pc < r.base + r.data.len() as u32
        })
        .filter(|r| r.data.len() >= 8)
        .map(|r| u32::from_le_bytes(r.data[0..4].try_into().unwrap()))
        .filter(|&sp| sp != 0);

    Ok(LoadedImage {
        entry,
        initial_sp,
        regions,
    })
}
