//! Typed memory access with architectural fault latching.
//!
//! Bus misses become precise BusFaults with BFAR recorded; writes refused by
//! a read-only region become MemManage data access violations with MMFAR.
//! With `CCR.UNALIGN_TRP` set, unaligned accesses pend
//! UsageFault[UNALIGNED] instead of touching the bus.

use armlet_memory::{BusError, MemoryBus};

use crate::error::CpuError;
use crate::exceptions::{
    pend_bus_fault, pend_mem_fault, pend_usage_fault, BusFaultKind, MemFaultKind, UsageFaultKind,
};
use crate::state::CpuState;

fn check_alignment(state: &mut CpuState, addr: u32, size: u32) -> Result<(), CpuError> {
    if size > 1 && state.unalign_trp() && addr % size != 0 {
        pend_usage_fault(state, UsageFaultKind::Unaligned);
        return Err(CpuError::UsageFault(UsageFaultKind::Unaligned));
    }
    Ok(())
}

fn raise_read(state: &mut CpuState, addr: u32, err: BusError) -> CpuError {
    pend_bus_fault(state, BusFaultKind::PreciseErr, Some(addr));
    err.into()
}

fn raise_write(state: &mut CpuState, addr: u32, err: BusError) -> CpuError {
    match err {
        BusError::WriteNotAllowed { .. } => {
            pend_mem_fault(state, MemFaultKind::DAccViol, Some(addr));
        }
        _ => pend_bus_fault(state, BusFaultKind::PreciseErr, Some(addr)),
    }
    err.into()
}

pub(super) fn read_u32(state: &mut CpuState, bus: &MemoryBus, addr: u32) -> Result<u32, CpuError> {
    check_alignment(state, addr, 4)?;
    bus.read_u32(addr).map_err(|e| raise_read(state, addr, e))
}

pub(super) fn read_u16(state: &mut CpuState, bus: &MemoryBus, addr: u32) -> Result<u16, CpuError> {
    check_alignment(state, addr, 2)?;
    bus.read_u16(addr).map_err(|e| raise_read(state, addr, e))
}

pub(super) fn read_u8(state: &mut CpuState, bus: &MemoryBus, addr: u32) -> Result<u8, CpuError> {
    bus.read_u8(addr).map_err(|e| raise_read(state, addr, e))
}

pub(super) fn write_u32(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    addr: u32,
    value: u32,
) -> Result<(), CpuError> {
    check_alignment(state, addr, 4)?;
    bus.write_u32(addr, value)
        .map_err(|e| raise_write(state, addr, e))
}

pub(super) fn write_u16(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    addr: u32,
    value: u16,
) -> Result<(), CpuError> {
    check_alignment(state, addr, 2)?;
    bus.write_u16(addr, value)
        .map_err(|e| raise_write(state, addr, e))
}

pub(super) fn write_u8(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    addr: u32,
    value: u8,
) -> Result<(), CpuError> {
    bus.write_u8(addr, value)
        .map_err(|e| raise_write(state, addr, e))
}
