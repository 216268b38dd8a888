//! Exception pending latch and the CFSR register bank.
//!
//! This core latches exceptions; it does not take them. The run loop
//! consumes the pending set between instructions. CFSR layout: MMFSR in
//! bits 7:0, BFSR in bits 15:8, UFSR in bits 31:16.

use tracing::trace;

use crate::state::{CpuState, SpecialReg};

/// ARMv7-M exception numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionType {
    Reset = 1,
    Nmi = 2,
    HardFault = 3,
    MemManage = 4,
    BusFault = 5,
    UsageFault = 6,
    SvCall = 11,
    DebugMonitor = 12,
    PendSv = 14,
    SysTick = 15,
}

/// UFSR flags (bit positions within the 16-bit subfield).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageFaultKind {
    UndefInstr,
    InvState,
    InvPc,
    NoCp,
    Unaligned,
    DivByZero,
}

impl UsageFaultKind {
    fn bit(self) -> u32 {
        match self {
            UsageFaultKind::UndefInstr => 0,
            UsageFaultKind::InvState => 1,
            UsageFaultKind::InvPc => 2,
            UsageFaultKind::NoCp => 3,
            UsageFaultKind::Unaligned => 8,
            UsageFaultKind::DivByZero => 9,
        }
    }
}

/// BFSR flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusFaultKind {
    IBusErr,
    PreciseErr,
    ImpreciseErr,
    UnstkErr,
    StkErr,
    LspErr,
}

impl BusFaultKind {
    fn bit(self) -> u32 {
        match self {
            BusFaultKind::IBusErr => 0,
            BusFaultKind::PreciseErr => 1,
            BusFaultKind::ImpreciseErr => 2,
            BusFaultKind::UnstkErr => 3,
            BusFaultKind::StkErr => 4,
            BusFaultKind::LspErr => 5,
        }
    }
}

/// MMFSR flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemFaultKind {
    IAccViol,
    DAccViol,
    UnstkErr,
    StkErr,
    LspErr,
}

impl MemFaultKind {
    fn bit(self) -> u32 {
        match self {
            MemFaultKind::IAccViol => 0,
            MemFaultKind::DAccViol => 1,
            MemFaultKind::UnstkErr => 3,
            MemFaultKind::StkErr => 4,
            MemFaultKind::LspErr => 5,
        }
    }
}

const MMFSR_SHIFT: u32 = 0;
const MMFSR_MMARVALID: u32 = 1 << 7;
const BFSR_SHIFT: u32 = 8;
const BFSR_BFARVALID: u32 = 1 << 15;
const UFSR_SHIFT: u32 = 16;

/// Latches `kind` as pending without touching the CFSR.
pub fn set_pending(state: &mut CpuState, kind: ExceptionType) {
    trace!(exception = ?kind, "exception pended");
    *state.pending_mut() |= 1 << kind as u32;
}

pub fn is_pending(state: &CpuState, kind: ExceptionType) -> bool {
    state.pending() & (1 << kind as u32) != 0
}

pub fn clear_pending(state: &mut CpuState, kind: ExceptionType) {
    *state.pending_mut() &= !(1 << kind as u32);
}

/// True when a latched exception is one the bare core cannot recover from
/// (the loop stops before the next instruction).
pub fn fault_pending(state: &CpuState) -> bool {
    const FAULTS: u32 = (1 << ExceptionType::HardFault as u32)
        | (1 << ExceptionType::MemManage as u32)
        | (1 << ExceptionType::BusFault as u32)
        | (1 << ExceptionType::UsageFault as u32);
    state.pending() & FAULTS != 0
}

/// Pends a UsageFault and sets the matching UFSR flag.
pub fn pend_usage_fault(state: &mut CpuState, kind: UsageFaultKind) {
    trace!(fault = ?kind, "usage fault");
    *state.cfsr_mut() |= 1 << (UFSR_SHIFT + kind.bit());
    set_pending(state, ExceptionType::UsageFault);
}

/// Pends a BusFault; a faulting data address records BFAR with BFARVALID.
pub fn pend_bus_fault(state: &mut CpuState, kind: BusFaultKind, address: Option<u32>) {
    trace!(fault = ?kind, ?address, "bus fault");
    *state.cfsr_mut() |= 1 << (BFSR_SHIFT + kind.bit());
    if let Some(address) = address {
        state.write_special(SpecialReg::Bfar, address);
        *state.cfsr_mut() |= BFSR_BFARVALID;
    }
    set_pending(state, ExceptionType::BusFault);
}

/// Pends a MemManage fault; a faulting data address records MMFAR.
pub fn pend_mem_fault(state: &mut CpuState, kind: MemFaultKind, address: Option<u32>) {
    trace!(fault = ?kind, ?address, "memmanage fault");
    *state.cfsr_mut() |= 1 << (MMFSR_SHIFT + kind.bit());
    if let Some(address) = address {
        state.write_special(SpecialReg::Mmfar, address);
        *state.cfsr_mut() |= MMFSR_MMARVALID;
    }
    set_pending(state, ExceptionType::MemManage);
}

/// UFSR accessors used by tests and the run loop.
pub fn ufsr_set(state: &CpuState, kind: UsageFaultKind) -> bool {
    state.cfsr() & (1 << (UFSR_SHIFT + kind.bit())) != 0
}

pub fn bfsr_set(state: &CpuState, kind: BusFaultKind) -> bool {
    state.cfsr() & (1 << (BFSR_SHIFT + kind.bit())) != 0
}

pub fn bfar_valid(state: &CpuState) -> bool {
    state.cfsr() & BFSR_BFARVALID != 0
}

pub fn mmfsr_set(state: &CpuState, kind: MemFaultKind) -> bool {
    state.cfsr() & (1 << (MMFSR_SHIFT + kind.bit())) != 0
}

pub fn mmar_valid(state: &CpuState) -> bool {
    state.cfsr() & MMFSR_MMARVALID != 0
}
