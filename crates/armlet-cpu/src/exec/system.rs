//! System instructions: SVC/BKPT delegation, MSR/MRS.

use tracing::{debug, trace};

use armlet_isa::{Instr, RegisterId};
use armlet_memory::MemoryBus;

use crate::error::CpuError;
use crate::exceptions::{set_pending, ExceptionType};
use crate::host::{Hooks, HostRequest};
use crate::state::{CpuState, SpecialReg};

use super::{retire, ExecFlags};

/// SVC: the delegate may claim the call; otherwise SVCall is pended.
pub(super) fn svc(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    imm32: u32,
    hooks: &mut Hooks<'_>,
) -> Result<ExecFlags, CpuError> {
    let mut flags = ExecFlags::empty();
    match hooks.svc.as_mut() {
        Some(handler) => {
            let request = handler.svc(imm32, state, bus)?;
            if request.contains(HostRequest::EXIT) {
                flags |= ExecFlags::SVC_EXIT;
            } else if request.contains(HostRequest::ERROR_EXIT) {
                flags |= ExecFlags::SVC_ERROR_EXIT;
            }
            if !request.contains(HostRequest::OMIT_EXCEPTION) {
                set_pending(state, ExceptionType::SvCall);
            }
        }
        None => set_pending(state, ExceptionType::SvCall),
    }
    retire(state, instr);
    Ok(flags)
}

/// BKPT: the delegate (semihosting) may claim the immediate; an unclaimed
/// breakpoint escalates to the debug HardFault.
pub(super) fn bkpt(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    imm32: u32,
    hooks: &mut Hooks<'_>,
) -> Result<ExecFlags, CpuError> {
    let mut flags = ExecFlags::empty();
    match hooks.bkpt.as_mut() {
        Some(handler) => {
            let request = handler.bkpt(imm32, state, bus)?;
            if request.contains(HostRequest::EXIT) {
                flags |= ExecFlags::BKPT_EXIT;
            } else if request.contains(HostRequest::ERROR_EXIT) {
                flags |= ExecFlags::BKPT_ERROR_EXIT;
            }
            if !request.contains(HostRequest::OMIT_EXCEPTION) {
                set_pending(state, ExceptionType::HardFault);
            }
        }
        None => set_pending(state, ExceptionType::HardFault),
    }
    retire(state, instr);
    Ok(flags)
}

/// MSR (register to special register).
///
/// APSR writes need no privilege; stack pointers, PRIMASK and CONTROL are
/// privileged and silently ignored otherwise. BASEPRI and FAULTMASK are
/// held RAZ/WI on this core.
pub(super) fn msr(
    state: &mut CpuState,
    instr: &Instr,
    n: RegisterId,
    sysm: u8,
    mask: u8,
) -> Result<ExecFlags, CpuError> {
    let value = state.read_reg(n);
    let privileged = state.is_privileged();
    match sysm >> 3 {
        0b00000 => {
            if sysm & 0b100 == 0 && mask & 0b10 != 0 {
                state.write_special(SpecialReg::Apsr, value);
            }
            // IPSR/EPSR writes are ignored by MSR.
        }
        0b00001 => match sysm & 0b111 {
            0b000 => {
                if privileged {
                    trace!(value = format_args!("{value:#010x}"), "msr msp");
                    state.write_special(SpecialReg::SpMain, value);
                }
            }
            0b001 => {
                if privileged {
                    trace!(value = format_args!("{value:#010x}"), "msr psp");
                    state.write_special(SpecialReg::SpProcess, value);
                }
            }
            _ => return Err(CpuError::Unpredictable),
        },
        0b00010 => match sysm & 0b111 {
            0b000 => {
                if privileged {
                    state.write_special(SpecialReg::Primask, value);
                }
            }
            // BASEPRI / BASEPRI_MAX / FAULTMASK: RAZ/WI.
            0b001 | 0b010 | 0b011 => {
                debug!(sysm, "msr to an unmodelled priority mask ignored");
            }
            0b100 => {
                if privileged {
                    trace!(value = format_args!("{value:#010x}"), "msr control");
                    state.write_special(SpecialReg::Control, value);
                }
            }
            _ => return Err(CpuError::Unpredictable),
        },
        _ => return Err(CpuError::Unpredictable),
    }
    retire(state, instr);
    Ok(ExecFlags::empty())
}

/// MRS (special register to register). EPSR reads as zero through MRS.
pub(super) fn mrs(
    state: &mut CpuState,
    instr: &Instr,
    d: RegisterId,
    sysm: u8,
) -> Result<ExecFlags, CpuError> {
    let mut value = 0u32;
    match sysm >> 3 {
        0b00000 => {
            if sysm & 0b001 != 0 {
                value |= state.read_special(SpecialReg::Ipsr);
            }
            if sysm & 0b100 == 0 {
                value |= state.read_special(SpecialReg::Apsr);
            }
        }
        0b00001 => match sysm & 0b111 {
            0b000 => {
                if state.is_privileged() {
                    value = state.read_special(SpecialReg::SpMain);
                }
            }
            0b001 => {
                if state.is_privileged() {
                    value = state.read_special(SpecialReg::SpProcess);
                }
            }
            _ => return Err(CpuError::Unpredictable),
        },
        0b00010 => match sysm & 0b111 {
            0b000 => value = state.read_special(SpecialReg::Primask),
            0b001 | 0b010 | 0b011 => value = 0,
            0b100 => value = state.read_special(SpecialReg::Control) & 0b11,
            _ => return Err(CpuError::Unpredictable),
        },
        _ => return Err(CpuError::Unpredictable),
    }
    state.write_reg(d, value);
    retire(state, instr);
    Ok(ExecFlags::empty())
}
