//! Instruction fetch.

use armlet_isa::RawInstr;
use armlet_memory::MemoryBus;

use crate::error::CpuError;
use crate::exceptions::{pend_bus_fault, BusFaultKind};
use crate::state::CpuState;

/// True when the leading halfword opens a 32-bit encoding.
fn is_wide_prefix(hw: u16) -> bool {
    matches!(hw >> 11, 0b11101 | 0b11110 | 0b11111)
}

/// Reads the halfword(s) at the current PC. A miss latches a precise
/// instruction-bus error before propagating.
pub fn fetch(state: &mut CpuState, bus: &MemoryBus) -> Result<RawInstr, CpuError> {
    let pc = state.pc();
    let hw1 = match bus.read_u16(pc) {
        Ok(hw) => hw,
        Err(e) => {
            pend_bus_fault(state, BusFaultKind::IBusErr, None);
            return Err(e.into());
        }
    };
    if !is_wide_prefix(hw1) {
        return Ok(RawInstr::Narrow(hw1));
    }
    let hw2 = match bus.read_u16(pc.wrapping_add(2)) {
        Ok(hw) => hw,
        Err(e) => {
            pend_bus_fault(state, BusFaultKind::IBusErr, None);
            return Err(e.into());
        }
    };
    Ok(RawInstr::Wide(hw1, hw2))
}
