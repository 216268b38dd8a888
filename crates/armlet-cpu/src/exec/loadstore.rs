//! Load/store execution: single transfers, pairs, multiples, table branches.

use armlet_isa::alu;
use armlet_isa::{Instr, InstrFlags, RegisterId, RegisterList, Shift};
use armlet_memory::MemoryBus;

use crate::error::CpuError;
use crate::state::CpuState;
use crate::{it, pc};

use super::{memops, retire, ExecFlags};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum Width {
    Byte,
    Half,
    Word,
}

/// Resolves the P/U/W addressing-mode flags into the access address and the
/// optional write-back value.
fn address_and_wback(state: &CpuState, instr: &Instr, n: RegisterId, imm32: u32) -> (u32, Option<u32>) {
    let base = state.read_reg(n);
    let offset_addr = if instr.flags.contains(InstrFlags::ADD) {
        base.wrapping_add(imm32)
    } else {
        base.wrapping_sub(imm32)
    };
    let address = if instr.flags.contains(InstrFlags::INDEX) {
        offset_addr
    } else {
        base
    };
    let wback = instr.flags.contains(InstrFlags::WBACK).then_some(offset_addr);
    (address, wback)
}

fn load_width(
    state: &mut CpuState,
    bus: &MemoryBus,
    address: u32,
    width: Width,
    signed: bool,
) -> Result<u32, CpuError> {
    let value = match width {
        Width::Byte => {
            let raw = u32::from(memops::read_u8(state, bus, address)?);
            if signed {
                alu::sign_extend(raw, 8)
            } else {
                raw
            }
        }
        Width::Half => {
            let raw = u32::from(memops::read_u16(state, bus, address)?);
            if signed {
                alu::sign_extend(raw, 16)
            } else {
                raw
            }
        }
        Width::Word => memops::read_u32(state, bus, address)?,
    };
    Ok(value)
}

fn store_width(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    address: u32,
    value: u32,
    width: Width,
) -> Result<(), CpuError> {
    match width {
        Width::Byte => memops::write_u8(state, bus, address, value as u8),
        Width::Half => memops::write_u16(state, bus, address, value as u16),
        Width::Word => memops::write_u32(state, bus, address, value),
    }
}

/// Final writeback of a loaded value; a PC destination turns the load into
/// an interworking branch and requires a word-aligned access address.
fn finish_load(
    state: &mut CpuState,
    instr: &Instr,
    t: RegisterId,
    address: u32,
    data: u32,
) -> Result<ExecFlags, CpuError> {
    if t.is_pc() {
        if address & 3 != 0 {
            return Err(CpuError::Unpredictable);
        }
        pc::load_write_pc(state, data)?;
        it::it_advance(state);
    } else {
        state.write_reg(t, data);
        retire(state, instr);
    }
    Ok(ExecFlags::empty())
}

pub(super) fn ldr_literal(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    t: RegisterId,
    imm32: u32,
) -> Result<ExecFlags, CpuError> {
    let base = state.read_reg(RegisterId::Pc) & !3;
    let address = if instr.flags.contains(InstrFlags::ADD) {
        base.wrapping_add(imm32)
    } else {
        base.wrapping_sub(imm32)
    };
    let data = memops::read_u32(state, bus, address)?;
    finish_load(state, instr, t, address, data)
}

pub(super) fn load_imm(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    n: RegisterId,
    t: RegisterId,
    imm32: u32,
    width: Width,
    signed: bool,
) -> Result<ExecFlags, CpuError> {
    let (address, wback) = address_and_wback(state, instr, n, imm32);
    let data = load_width(state, bus, address, width, signed)?;
    if let Some(wback) = wback {
        state.write_reg(n, wback);
    }
    finish_load(state, instr, t, address, data)
}

pub(super) fn store_imm(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    n: RegisterId,
    t: RegisterId,
    imm32: u32,
    width: Width,
) -> Result<ExecFlags, CpuError> {
    let (address, wback) = address_and_wback(state, instr, n, imm32);
    let value = state.read_reg(t);
    store_width(state, bus, address, value, width)?;
    if let Some(wback) = wback {
        state.write_reg(n, wback);
    }
    retire(state, instr);
    Ok(ExecFlags::empty())
}

/// STREX with no exclusive monitor: the store succeeds unconditionally and
/// the status register reads success.
pub(super) fn strex(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    n: RegisterId,
    t: RegisterId,
    d: RegisterId,
    imm32: u32,
) -> Result<ExecFlags, CpuError> {
    let address = state.read_reg(n).wrapping_add(imm32);
    let value = state.read_reg(t);
    memops::write_u32(state, bus, address, value)?;
    state.write_reg(d, 0);
    retire(state, instr);
    Ok(ExecFlags::empty())
}

#[allow(clippy::too_many_arguments)]
pub(super) fn load_reg(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    n: RegisterId,
    m: RegisterId,
    t: RegisterId,
    shift: Shift,
    width: Width,
    signed: bool,
) -> Result<ExecFlags, CpuError> {
    let offset = alu::shift(state.read_reg(m), shift, state.flag_c());
    let address = state.read_reg(n).wrapping_add(offset);
    let data = load_width(state, bus, address, width, signed)?;
    finish_load(state, instr, t, address, data)
}

#[allow(clippy::too_many_arguments)]
pub(super) fn store_reg(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    n: RegisterId,
    m: RegisterId,
    t: RegisterId,
    shift: Shift,
    width: Width,
) -> Result<ExecFlags, CpuError> {
    let offset = alu::shift(state.read_reg(m), shift, state.flag_c());
    let address = state.read_reg(n).wrapping_add(offset);
    let value = state.read_reg(t);
    store_width(state, bus, address, value, width)?;
    retire(state, instr);
    Ok(ExecFlags::empty())
}

pub(super) fn ldrd(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    n: RegisterId,
    t: RegisterId,
    t2: RegisterId,
    imm32: u32,
) -> Result<ExecFlags, CpuError> {
    let (address, wback) = address_and_wback(state, instr, n, imm32);
    let lo = memops::read_u32(state, bus, address)?;
    let hi = memops::read_u32(state, bus, address.wrapping_add(4))?;
    if let Some(wback) = wback {
        state.write_reg(n, wback);
    }
    state.write_reg(t, lo);
    state.write_reg(t2, hi);
    retire(state, instr);
    Ok(ExecFlags::empty())
}

pub(super) fn strd(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    n: RegisterId,
    t: RegisterId,
    t2: RegisterId,
    imm32: u32,
) -> Result<ExecFlags, CpuError> {
    let (address, wback) = address_and_wback(state, instr, n, imm32);
    let lo = state.read_reg(t);
    let hi = state.read_reg(t2);
    memops::write_u32(state, bus, address, lo)?;
    memops::write_u32(state, bus, address.wrapping_add(4), hi)?;
    if let Some(wback) = wback {
        state.write_reg(n, wback);
    }
    retire(state, instr);
    Ok(ExecFlags::empty())
}

/// LDM: ascending addresses, ascending register indices; bit 15 routes the
/// last word through `LoadWritePC`.
pub(super) fn ldm(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    n: RegisterId,
    registers: RegisterList,
) -> Result<ExecFlags, CpuError> {
    let mut address = state.read_reg(n);
    let mut loaded_pc = None;
    let mut values = Vec::with_capacity(registers.count() as usize);
    for reg in registers.iter() {
        let data = memops::read_u32(state, bus, address)?;
        if reg.is_pc() {
            loaded_pc = Some(data);
        } else {
            values.push((reg, data));
        }
        address = address.wrapping_add(4);
    }
    if instr.flags.contains(InstrFlags::WBACK) {
        state.write_reg(n, address);
    }
    for (reg, data) in values {
        state.write_reg(reg, data);
    }
    match loaded_pc {
        Some(target) => {
            pc::load_write_pc(state, target)?;
            it::it_advance(state);
        }
        None => retire(state, instr),
    }
    Ok(ExecFlags::empty())
}

/// STM: the base, if stored, must be the lowest register in the list when
/// write-back is active; anything else is UNDEFINED behavior for the store.
pub(super) fn stm(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    n: RegisterId,
    registers: RegisterList,
) -> Result<ExecFlags, CpuError> {
    if instr.flags.contains(InstrFlags::WBACK)
        && registers.contains(n)
        && registers.lowest() != Some(n)
    {
        return Err(CpuError::Undefined);
    }
    let mut address = state.read_reg(n);
    for reg in registers.iter() {
        let value = state.read_reg(reg);
        memops::write_u32(state, bus, address, value)?;
        address = address.wrapping_add(4);
    }
    if instr.flags.contains(InstrFlags::WBACK) {
        state.write_reg(n, address);
    }
    retire(state, instr);
    Ok(ExecFlags::empty())
}

/// PUSH is STMDB with SP write-back.
pub(super) fn push(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    registers: RegisterList,
) -> Result<ExecFlags, CpuError> {
    let sp = state.read_reg(RegisterId::Sp);
    let mut address = sp.wrapping_sub(4 * registers.count());
    let base = address;
    for reg in registers.iter() {
        let value = state.read_reg(reg);
        memops::write_u32(state, bus, address, value)?;
        address = address.wrapping_add(4);
    }
    state.write_reg(RegisterId::Sp, base);
    retire(state, instr);
    Ok(ExecFlags::empty())
}

/// POP is LDM from SP with write-back; bit 15 returns through the PC.
pub(super) fn pop(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    registers: RegisterList,
) -> Result<ExecFlags, CpuError> {
    let mut address = state.read_reg(RegisterId::Sp);
    let mut loaded_pc = None;
    let mut values = Vec::with_capacity(registers.count() as usize);
    for reg in registers.iter() {
        let data = memops::read_u32(state, bus, address)?;
        if reg.is_pc() {
            loaded_pc = Some(data);
        } else {
            values.push((reg, data));
        }
        address = address.wrapping_add(4);
    }
    state.write_reg(RegisterId::Sp, address);
    for (reg, data) in values {
        state.write_reg(reg, data);
    }
    match loaded_pc {
        Some(target) => {
            pc::load_write_pc(state, target)?;
            it::it_advance(state);
        }
        None => retire(state, instr),
    }
    Ok(ExecFlags::empty())
}

/// TBB/TBH: an unsigned table entry doubles into a forward branch offset.
pub(super) fn table_branch(
    state: &mut CpuState,
    bus: &MemoryBus,
    instr: &Instr,
    n: RegisterId,
    m: RegisterId,
) -> Result<ExecFlags, CpuError> {
    let base = state.read_reg(n);
    let index = state.read_reg(m);
    let halfwords = if instr.flags.contains(InstrFlags::TBH) {
        let address = base.wrapping_add(index << 1);
        u32::from(memops::read_u16(state, bus, address)?)
    } else {
        let address = base.wrapping_add(index);
        u32::from(memops::read_u8(state, bus, address)?)
    };
    let target = state
        .read_reg(RegisterId::Pc)
        .wrapping_add(halfwords << 1);
    pc::branch_write_pc(state, target);
    it::it_advance(state);
    Ok(ExecFlags::empty())
}
