//! IT-block machinery and conditional-execution predicates.
//!
//! ISTATE layout: bits 7:4 hold the current condition, bits 3:0 the
//! then/else mask. Advancing shifts the mask left within the low five bits;
//! when the mask empties the block is over.

use armlet_isa::Condition;

use crate::state::CpuState;

pub fn in_it_block(state: &CpuState) -> bool {
    state.istate() & 0xF != 0
}

pub fn last_in_it_block(state: &CpuState) -> bool {
    state.istate() & 0xF == 0b1000
}

/// The condition gating the current instruction: the active IT condition
/// inside a block, unconditional otherwise.
pub fn current_condition(state: &CpuState) -> Option<Condition> {
    if in_it_block(state) {
        Condition::from_bits(u32::from(state.istate()) >> 4)
    } else {
        None
    }
}

/// Evaluates an explicit condition against the APSR.
pub fn condition_holds(state: &CpuState, cond: Condition) -> bool {
    cond.holds(state.flag_n(), state.flag_z(), state.flag_c(), state.flag_v())
}

/// `ConditionPassed()` for instructions without an explicit condition field.
pub fn condition_passed(state: &CpuState) -> bool {
    match current_condition(state) {
        Some(cond) => condition_holds(state, cond),
        None => true,
    }
}

/// `ITAdvance()`: one instruction of the block has retired.
pub fn it_advance(state: &mut CpuState) {
    let istate = state.istate();
    if istate & 0b111 == 0 {
        state.set_istate(0);
    } else {
        let shifted = (istate & 0x1F) << 1;
        state.set_istate((istate & 0xE0) | (shifted & 0x1F));
    }
}
