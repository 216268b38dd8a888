//! PC-write rules.
//!
//! Branch targets always clear bit 0; interworking writes route through
//! [`bx_write_pc`], which interprets bit 0 as the T bit and recognizes the
//! EXC_RETURN prefix.

use crate::error::CpuError;
use crate::state::CpuState;

/// Sequential advance past the current instruction.
pub fn advance(state: &mut CpuState, wide: bool) {
    let step = if wide { 4 } else { 2 };
    let pc = state.pc().wrapping_add(step);
    state.set_pc(pc);
}

/// `BranchWritePC`: clear bit 0, assign.
pub fn branch_write_pc(state: &mut CpuState, address: u32) {
    state.set_pc(address & !1);
}

/// `ALUWritePC`: data-processing writes to the PC branch like a plain branch.
pub fn alu_write_pc(state: &mut CpuState, address: u32) {
    branch_write_pc(state, address);
}

/// `BXWritePC`: bit 0 selects the execution state. Clearing it leaves Thumb,
/// which this core cannot do; the INVSTATE UsageFault is raised when the
/// next instruction is attempted. The 0xF prefix marks an exception return,
/// which is outside this core's scope.
pub fn bx_write_pc(state: &mut CpuState, address: u32) -> Result<(), CpuError> {
    if address >> 28 == 0xF && state.is_handler_mode() {
        return Err(CpuError::Unsupported("exception return"));
    }
    state.set_thumb_state(address & 1 != 0);
    state.set_pc(address & !1);
    Ok(())
}

/// `BLXWritePC`: the caller has already stashed the return address in LR.
pub fn blx_write_pc(state: &mut CpuState, address: u32) -> Result<(), CpuError> {
    bx_write_pc(state, address)
}

/// `LoadWritePC`: a loaded PC behaves like BX.
pub fn load_write_pc(state: &mut CpuState, address: u32) -> Result<(), CpuError> {
    bx_write_pc(state, address)
}
