use bitflags::bitflags;

use crate::cond::Condition;
use crate::registers::{RegisterId, RegisterList};
use crate::shift::Shift;

/// Raw instruction as presented by the fetcher: one halfword, or two for the
/// 32-bit Thumb encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawInstr {
    Narrow(u16),
    Wide(u16, u16),
}

impl RawInstr {
    pub fn is_wide(self) -> bool {
        matches!(self, RawInstr::Wide(..))
    }

    /// Byte length of the encoding, 2 or 4.
    pub fn len(self) -> u32 {
        if self.is_wide() {
            4
        } else {
            2
        }
    }
}

/// A Thumb modified immediate together with the carry-out of its expansion.
///
/// `carry` is `None` when the expansion did not rotate; flag-setting logical
/// instructions then leave APSR.C unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImmCarry {
    pub imm32: u32,
    pub carry: Option<bool>,
}

impl ImmCarry {
    /// An immediate whose encoding can never change the carry flag.
    pub fn plain(imm32: u32) -> ImmCarry {
        ImmCarry { imm32, carry: None }
    }
}

bitflags! {
    /// Encoding-derived instruction attributes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct InstrFlags: u8 {
        /// 32-bit encoding; PC advances by 4 instead of 2.
        const WIDE = 1 << 0;
        /// The S bit: update APSR N/Z/C/V from the result.
        const SETFLAGS = 1 << 1;
        /// The U bit of a load/store: offset is added, not subtracted.
        const ADD = 1 << 2;
        /// The P bit: offset is applied before the access.
        const INDEX = 1 << 3;
        /// The W bit: base register is written back.
        const WBACK = 1 << 4;
        /// Table branch reads halfwords (TBH) rather than bytes (TBB).
        const TBH = 1 << 5;
        /// Compare-branch variant branches on non-zero (CBNZ).
        const NONZERO = 1 << 6;
    }
}

/// A decoded instruction: operation payload plus encoding flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instr {
    pub op: Op,
    pub flags: InstrFlags,
}

impl Instr {
    pub fn is_wide(&self) -> bool {
        self.flags.contains(InstrFlags::WIDE)
    }
}

/// Every operation the executor dispatches on.
///
/// Register fields follow the ARM names: `n`/`m`/`a` sources, `d`
/// destination, `t`/`t2` transfer registers for loads and stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    // Data processing, modified immediate.
    MovImm { d: RegisterId, imm: ImmCarry },
    MvnImm { d: RegisterId, imm: ImmCarry },
    AndImm { n: RegisterId, d: RegisterId, imm: ImmCarry },
    BicImm { n: RegisterId, d: RegisterId, imm: ImmCarry },
    OrrImm { n: RegisterId, d: RegisterId, imm: ImmCarry },
    EorImm { n: RegisterId, d: RegisterId, imm: ImmCarry },
    TstImm { n: RegisterId, imm: ImmCarry },
    TeqImm { n: RegisterId, imm: ImmCarry },
    AddImm { n: RegisterId, d: RegisterId, imm32: u32 },
    AdcImm { n: RegisterId, d: RegisterId, imm32: u32 },
    SubImm { n: RegisterId, d: RegisterId, imm32: u32 },
    SbcImm { n: RegisterId, d: RegisterId, imm32: u32 },
    RsbImm { n: RegisterId, d: RegisterId, imm32: u32 },
    CmpImm { n: RegisterId, imm32: u32 },
    CmnImm { n: RegisterId, imm32: u32 },
    /// ADR: `d = align(PC, 4) ± imm32` (ADD flag selects the sign).
    Adr { d: RegisterId, imm32: u32 },
    /// MOVT: writes `imm16` into the top halfword, low halfword preserved.
    Movt { d: RegisterId, imm16: u16 },

    // Data processing, register (optionally shifted).
    MovReg { d: RegisterId, m: RegisterId },
    MvnReg { d: RegisterId, m: RegisterId, shift: Shift },
    AndReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    BicReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    OrrReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    EorReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    AddReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    AdcReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    SubReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    SbcReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    RsbReg { n: RegisterId, m: RegisterId, d: RegisterId, shift: Shift },
    TstReg { n: RegisterId, m: RegisterId, shift: Shift },
    TeqReg { n: RegisterId, m: RegisterId, shift: Shift },
    CmpReg { n: RegisterId, m: RegisterId, shift: Shift },
    CmnReg { n: RegisterId, m: RegisterId, shift: Shift },

    // Shifts.
    /// LSL/LSR/ASR/ROR/RRX with an immediate amount: `d = shift(m)`.
    ShiftImm { d: RegisterId, m: RegisterId, shift: Shift },
    /// LSL/LSR/ASR/ROR by register: `d = shift(n, kind, m<7:0>)`.
    ShiftReg { n: RegisterId, m: RegisterId, d: RegisterId, kind: crate::ShiftType },

    // Misc data processing.
    Clz { d: RegisterId, m: RegisterId },
    Sxtb { d: RegisterId, m: RegisterId, rotation: u8 },
    Sxth { d: RegisterId, m: RegisterId, rotation: u8 },
    Uxtb { d: RegisterId, m: RegisterId, rotation: u8 },
    Uxth { d: RegisterId, m: RegisterId, rotation: u8 },
    Bfi { n: RegisterId, d: RegisterId, lsb: u8, msb: u8 },
    Ubfx { n: RegisterId, d: RegisterId, lsb: u8, width_minus_1: u8 },

    // Multiply and divide.
    Mul { n: RegisterId, m: RegisterId, d: RegisterId },
    Mla { n: RegisterId, m: RegisterId, a: RegisterId, d: RegisterId },
    Mls { n: RegisterId, m: RegisterId, a: RegisterId, d: RegisterId },
    Umull { n: RegisterId, m: RegisterId, d_lo: RegisterId, d_hi: RegisterId },
    Smull { n: RegisterId, m: RegisterId, d_lo: RegisterId, d_hi: RegisterId },
    Umlal { n: RegisterId, m: RegisterId, d_lo: RegisterId, d_hi: RegisterId },
    Smlal { n: RegisterId, m: RegisterId, d_lo: RegisterId, d_hi: RegisterId },
    Udiv { n: RegisterId, m: RegisterId, d: RegisterId },
    Sdiv { n: RegisterId, m: RegisterId, d: RegisterId },

    // Loads and stores.
    /// LDR (literal): word at `align(PC, 4) ± imm32`.
    LdrLit { t: RegisterId, imm32: u32 },
    LdrImm { n: RegisterId, t: RegisterId, imm32: u32 },
    LdrbImm { n: RegisterId, t: RegisterId, imm32: u32 },
    LdrhImm { n: RegisterId, t: RegisterId, imm32: u32 },
    LdrsbImm { n: RegisterId, t: RegisterId, imm32: u32 },
    LdrshImm { n: RegisterId, t: RegisterId, imm32: u32 },
    StrImm { n: RegisterId, t: RegisterId, imm32: u32 },
    StrbImm { n: RegisterId, t: RegisterId, imm32: u32 },
    StrhImm { n: RegisterId, t: RegisterId, imm32: u32 },
    LdrReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    LdrbReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    LdrhReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    LdrsbReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    LdrshReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    StrReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    StrbReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    StrhReg { n: RegisterId, m: RegisterId, t: RegisterId, shift: Shift },
    Ldrd { n: RegisterId, t: RegisterId, t2: RegisterId, imm32: u32 },
    Strd { n: RegisterId, t: RegisterId, t2: RegisterId, imm32: u32 },
    /// LDREX; no exclusive monitor is modelled, behaves as LDR.
    Ldrex { n: RegisterId, t: RegisterId, imm32: u32 },
    /// STREX; always succeeds, writing 0 to `d`.
    Strex { n: RegisterId, t: RegisterId, d: RegisterId, imm32: u32 },

    // Load/store multiple.
    Ldm { n: RegisterId, registers: RegisterList },
    Stm { n: RegisterId, registers: RegisterList },
    Push { registers: RegisterList },
    Pop { registers: RegisterList },

    // Branches.
    B { imm32: u32 },
    BCond { cond: Condition, imm32: u32 },
    Bl { imm32: u32 },
    Bx { m: RegisterId },
    Blx { m: RegisterId },
    /// CBZ/CBNZ (NONZERO flag distinguishes them).
    CbNz { n: RegisterId, imm32: u32 },
    /// TBB/TBH (TBH flag selects halfword entries).
    TableBranch { n: RegisterId, m: RegisterId },

    // System.
    It { firstcond: u8, mask: u8 },
    Svc { imm32: u32 },
    Bkpt { imm32: u32 },
    Msr { n: RegisterId, sysm: u8, mask: u8 },
    Mrs { d: RegisterId, sysm: u8 },
    Nop,
    Dmb,
    Dsb,
    Isb,
}
