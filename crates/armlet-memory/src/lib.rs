//! Word-addressable memory fabric for the emulator.
//!
//! A [`MemoryBus`] is an ordered set of disjoint [`Region`]s (code, data,
//! peripheral). Every typed access resolves the address to at most one
//! region with a linear scan — region counts are small — and performs a
//! little-endian load or store on the backing bytes. Misses and writes to
//! read-only regions come back as typed [`BusError`]s; translating those
//! into architectural bus faults is the CPU core's job, not ours.

use thiserror::Error;

/// Access classification for a failed bus operation.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum BusError {
    /// No region contains the addressed bytes.
    #[error("no memory mapped at {addr:#010x} ({size} bytes)")]
    Inaccessible { addr: u32, size: u32 },
    /// The region exists but refuses stores.
    #[error("write to read-only memory at {addr:#010x}")]
    WriteNotAllowed { addr: u32 },
    /// Region registration conflict.
    #[error("region {base:#010x}+{len:#x} overlaps an existing mapping")]
    Overlap { base: u32, len: u32 },
    /// Zero-length or address-wrapping region.
    #[error("invalid region range {base:#010x}+{len:#x}")]
    InvalidRange { base: u32, len: u32 },
}

/// A contiguous span of guest memory with its own write permission.
#[derive(Debug)]
pub struct Region {
    base: u32,
    data: Vec<u8>,
    writable: bool,
    name: &'static str,
}

impl Region {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn contains(&self, addr: u32, size: u32) -> bool {
        addr >= self.base
            && u64::from(addr) + u64::from(size) <= u64::from(self.base) + self.data.len() as u64
    }
}

/// The bus: routes typed accesses to regions.
#[derive(Debug, Default)]
pub struct MemoryBus {
    regions: Vec<Region>,
}

impl MemoryBus {
    pub fn new() -> MemoryBus {
        MemoryBus::default()
    }

    /// Registers a region. Regions must be non-empty, must not wrap the
    /// 32-bit address space, and must not overlap an existing mapping.
    pub fn register(
        &mut self,
        name: &'static str,
        base: u32,
        data: Vec<u8>,
        writable: bool,
    ) -> Result<(), BusError> {
        let len = data.len() as u64;
        if data.is_empty() || u64::from(base) + len > 1 << 32 {
            return Err(BusError::InvalidRange {
                base,
                len: len as u32,
            });
        }
        let end = u64::from(base) + len;
        for existing in &self.regions {
            let e_start = u64::from(existing.base);
            let e_end = e_start + existing.data.len() as u64;
            if u64::from(base) < e_end && e_start < end {
                return Err(BusError::Overlap {
                    base,
                    len: len as u32,
                });
            }
        }
        self.regions.push(Region {
            base,
            data,
            writable,
            name,
        });
        Ok(())
    }

    /// Convenience: a zero-filled writable RAM region.
    pub fn register_ram(&mut self, name: &'static str, base: u32, len: u32) -> Result<(), BusError> {
        self.register(name, base, vec![0; len as usize], true)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn find(&self, addr: u32, size: u32) -> Result<&Region, BusError> {
        self.regions
            .iter()
            .find(|r| r.contains(addr, size))
            .ok_or(BusError::Inaccessible { addr, size })
    }

    fn find_mut(&mut self, addr: u32, size: u32) -> Result<&mut Region, BusError> {
        self.regions
            .iter_mut()
            .find(|r| r.contains(addr, size))
            .ok_or(BusError::Inaccessible { addr, size })
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, BusError> {
        let region = self.find(addr, 1)?;
        Ok(region.data[(addr - region.base) as usize])
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, BusError> {
        let region = self.find(addr, 2)?;
        let off = (addr - region.base) as usize;
        Ok(u16::from_le_bytes([region.data[off], region.data[off + 1]]))
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, BusError> {
        let region = self.find(addr, 4)?;
        let off = (addr - region.base) as usize;
        let bytes: [u8; 4] = region.data[off..off + 4].try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), BusError> {
        let region = self.find_mut(addr, 1)?;
        if !region.writable {
            return Err(BusError::WriteNotAllowed { addr });
        }
        let off = (addr - region.base) as usize;
        region.data[off] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), BusError> {
        let region = self.find_mut(addr, 2)?;
        if !region.writable {
            return Err(BusError::WriteNotAllowed { addr });
        }
        let off = (addr - region.base) as usize;
        region.data[off..off + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), BusError> {
        let region = self.find_mut(addr, 4)?;
        if !region.writable {
            return Err(BusError::WriteNotAllowed { addr });
        }
        let off = (addr - region.base) as usize;
        region.data[off..off + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Bulk read used by the semihosting agent and the loader. The span must
    /// lie within a single region.
    pub fn read_bytes(&self, addr: u32, buf: &mut [u8]) -> Result<(), BusError> {
        let region = self.find(addr, buf.len() as u32)?;
        let off = (addr - region.base) as usize;
        buf.copy_from_slice(&region.data[off..off + buf.len()]);
        Ok(())
    }

    /// Bulk write; the span must lie within a single writable region.
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), BusError> {
        let region = self.find_mut(addr, bytes.len() as u32)?;
        if !region.writable {
            return Err(BusError::WriteNotAllowed { addr });
        }
        let off = (addr - region.base) as usize;
        region.data[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
