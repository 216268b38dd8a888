//! 32-bit Thumb-2 encodings (ARMv7-M ARM §A5.3).

use armlet_isa::alu::{sign_extend, thumb_expand_imm_c};
use armlet_isa::{
    decode_imm_shift, Condition, ImmCarry, Instr, InstrFlags, Op, RegisterId, RegisterList, Shift,
    ShiftType,
};

use crate::{raw_of, DecodeError, ItPosition};

fn reg(bits: u16) -> RegisterId {
    RegisterId::from_index(u32::from(bits) & 0xF).unwrap()
}

fn unknown(hw1: u16, hw2: u16) -> DecodeError {
    DecodeError::UnknownOpcode {
        raw: raw_of(hw1, Some(hw2)),
    }
}

fn unpredictable(hw1: u16, hw2: u16) -> DecodeError {
    DecodeError::Unpredictable {
        raw: raw_of(hw1, Some(hw2)),
    }
}

fn undefined(hw1: u16, hw2: u16) -> DecodeError {
    DecodeError::Undefined {
        raw: raw_of(hw1, Some(hw2)),
    }
}

/// `Rd`/`Rt` etc. in 32-bit encodings must usually avoid r13/r15.
fn check_not_sp_pc(r: RegisterId, hw1: u16, hw2: u16) -> Result<RegisterId, DecodeError> {
    if r.is_sp_or_pc() {
        Err(unpredictable(hw1, hw2))
    } else {
        Ok(r)
    }
}

pub(crate) fn decode(hw1: u16, hw2: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    match (hw1 >> 11) & 0b11 {
        0b01 => decode_op1_01(hw1, hw2),
        0b10 => {
            if hw2 & (1 << 15) == 0 {
                if hw1 & (1 << 9) == 0 {
                    decode_modified_immediate(hw1, hw2)
                } else {
                    decode_plain_immediate(hw1, hw2)
                }
            } else {
                decode_branch_and_control(hw1, hw2, it)
            }
        }
        0b11 => decode_op1_11(hw1, hw2),
        _ => Err(unknown(hw1, hw2)),
    }
}

fn wide(op: Op, extra: InstrFlags) -> Instr {
    Instr {
        op,
        flags: InstrFlags::WIDE | extra,
    }
}

// ---------------------------------------------------------------------------
// op1 = 01: load/store multiple, dual/exclusive, table branch, shifted-reg DP.
// ---------------------------------------------------------------------------

fn decode_op1_01(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    if hw1 & (1 << 10) != 0 {
        // Coprocessor space; absent on this profile.
        return Err(unknown(hw1, hw2));
    }
    if hw1 & (1 << 9) == 0 {
        if hw1 & (1 << 6) == 0 {
            decode_load_store_multiple(hw1, hw2)
        } else {
            decode_dual_exclusive_table(hw1, hw2)
        }
    } else {
        decode_shifted_register(hw1, hw2)
    }
}

fn decode_load_store_multiple(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let n = reg(hw1 & 0xF);
    let load = hw1 & (1 << 4) != 0;
    let wback = hw1 & (1 << 5) != 0;
    let mode = (hw1 >> 7) & 0b11;
    let registers = RegisterList(hw2 & 0xDFFF);
    if registers.count() < 2 {
        return Err(unpredictable(hw1, hw2));
    }
    let mut flags = InstrFlags::WIDE;
    if wback {
        flags |= InstrFlags::WBACK;
    }
    match (mode, load) {
        (0b01, false) => {
            // STM.W; base in the list with write-back is unpredictable.
            if wback && registers.contains(n) {
                return Err(unpredictable(hw1, hw2));
            }
            Ok(Instr {
                op: Op::Stm { n, registers },
                flags,
            })
        }
        (0b01, true) => {
            if registers.contains(RegisterId::Pc) && registers.contains(RegisterId::Lr) {
                return Err(unpredictable(hw1, hw2));
            }
            if wback && n.is_sp() {
                // POP.W.
                return Ok(Instr {
                    op: Op::Pop { registers },
                    flags: InstrFlags::WIDE,
                });
            }
            if wback && registers.contains(n) {
                return Err(unpredictable(hw1, hw2));
            }
            Ok(Instr {
                op: Op::Ldm { n, registers },
                flags,
            })
        }
        (0b10, false) => {
            // STMDB; the SP! form is PUSH.W.
            if wback && n.is_sp() {
                return Ok(Instr {
                    op: Op::Push { registers },
                    flags: InstrFlags::WIDE,
                });
            }
            Err(unknown(hw1, hw2))
        }
        _ => Err(unknown(hw1, hw2)),
    }
}

fn decode_dual_exclusive_table(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let index = hw1 & (1 << 8) != 0;
    let add = hw1 & (1 << 7) != 0;
    let wback = hw1 & (1 << 5) != 0;
    let load = hw1 & (1 << 4) != 0;
    let n = reg(hw1 & 0xF);

    if !index && !add && !wback {
        // Exclusive access: 1110 1000 010L nnnn.
        let t = check_not_sp_pc(reg(hw2 >> 12), hw1, hw2)?;
        let imm32 = u32::from(hw2 & 0xFF) << 2;
        if load {
            if (hw2 >> 8) & 0xF != 0xF {
                return Err(unknown(hw1, hw2));
            }
            if n.is_pc() {
                return Err(unpredictable(hw1, hw2));
            }
            return Ok(wide(Op::Ldrex { n, t, imm32 }, InstrFlags::INDEX | InstrFlags::ADD));
        }
        let d = check_not_sp_pc(reg((hw2 >> 8) & 0xF), hw1, hw2)?;
        if n.is_pc() || d == n || d == t {
            return Err(unpredictable(hw1, hw2));
        }
        return Ok(wide(Op::Strex { n, t, d, imm32 }, InstrFlags::empty()));
    }

    if !index && add && !wback {
        // Table branch: 1110 1000 1101 nnnn 1111 0000 000H mmmm.
        if load && hw2 >> 12 == 0xF && (hw2 >> 5) & 0x7F == 0 {
            let m = reg(hw2 & 0xF);
            if m.is_sp_or_pc() {
                return Err(unpredictable(hw1, hw2));
            }
            let mut flags = InstrFlags::WIDE;
            if hw2 & (1 << 4) != 0 {
                flags |= InstrFlags::TBH;
            }
            return Ok(Instr {
                op: Op::TableBranch { n, m },
                flags,
            });
        }
        // LDREXB/LDREXH and friends are not modelled.
        return Err(unknown(hw1, hw2));
    }

    // LDRD/STRD (immediate): P or W set.
    if !index && !wback {
        return Err(unknown(hw1, hw2));
    }
    let t = check_not_sp_pc(reg(hw2 >> 12), hw1, hw2)?;
    let t2 = check_not_sp_pc(reg((hw2 >> 8) & 0xF), hw1, hw2)?;
    let imm32 = u32::from(hw2 & 0xFF) << 2;
    let mut flags = InstrFlags::WIDE;
    if index {
        flags |= InstrFlags::INDEX;
    }
    if add {
        flags |= InstrFlags::ADD;
    }
    if wback {
        flags |= InstrFlags::WBACK;
    }
    if load {
        if n.is_pc() {
            // LDRD (literal) is not supported.
            return Err(unknown(hw1, hw2));
        }
        if wback && (n == t || n == t2) {
            return Err(unpredictable(hw1, hw2));
        }
        if t == t2 {
            return Err(unpredictable(hw1, hw2));
        }
        Ok(Instr {
            op: Op::Ldrd { n, t, t2, imm32 },
            flags,
        })
    } else {
        if n.is_pc() {
            return Err(unpredictable(hw1, hw2));
        }
        if wback && (n == t || n == t2) {
            return Err(unpredictable(hw1, hw2));
        }
        Ok(Instr {
            op: Op::Strd { n, t, t2, imm32 },
            flags,
        })
    }
}

fn decode_shifted_register(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let op = (hw1 >> 5) & 0xF;
    let s = hw1 & (1 << 4) != 0;
    let n = reg(hw1 & 0xF);
    let d = reg((hw2 >> 8) & 0xF);
    let m = reg(hw2 & 0xF);
    let imm3 = (hw2 >> 12) & 0b111;
    let imm2 = (hw2 >> 6) & 0b11;
    let ty = (hw2 >> 4) & 0b11;
    let shift = decode_imm_shift(u32::from(ty), u32::from((imm3 << 2) | imm2));
    let mut flags = InstrFlags::WIDE;
    if s {
        flags |= InstrFlags::SETFLAGS;
    }
    if m.is_sp_or_pc() {
        return Err(unpredictable(hw1, hw2));
    }

    let rd_is_pc = d.is_pc();
    match op {
        0b0000 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::TstReg { n, m, shift }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::AndReg { n, m, d, shift }, flags })
        }
        0b0001 => Ok(Instr { op: Op::BicReg { n, m, d, shift }, flags }),
        0b0010 => {
            if n.is_pc() {
                // MOV (register-shifted) W covers MOV/LSL/LSR/ASR/ROR/RRX.
                return Ok(Instr { op: Op::ShiftImm { d, m, shift }, flags });
            }
            Ok(Instr { op: Op::OrrReg { n, m, d, shift }, flags })
        }
        0b0011 => {
            if n.is_pc() {
                return Ok(Instr { op: Op::MvnReg { d, m, shift }, flags });
            }
            // ORN (register) is not implemented on this core model.
            Err(unknown(hw1, hw2))
        }
        0b0100 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::TeqReg { n, m, shift }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::EorReg { n, m, d, shift }, flags })
        }
        0b1000 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::CmnReg { n, m, shift }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::AddReg { n, m, d, shift }, flags })
        }
        0b1010 => Ok(Instr { op: Op::AdcReg { n, m, d, shift }, flags }),
        0b1011 => Ok(Instr { op: Op::SbcReg { n, m, d, shift }, flags }),
        0b1101 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::CmpReg { n, m, shift }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::SubReg { n, m, d, shift }, flags })
        }
        0b1110 => Ok(Instr { op: Op::RsbReg { n, m, d, shift }, flags }),
        _ => Err(unknown(hw1, hw2)),
    }
}

// ---------------------------------------------------------------------------
// op1 = 10, op = 0: data processing with immediates.
// ---------------------------------------------------------------------------

fn decode_modified_immediate(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let op = (hw1 >> 5) & 0xF;
    let s = hw1 & (1 << 4) != 0;
    let n = reg(hw1 & 0xF);
    let d = reg((hw2 >> 8) & 0xF);
    let i = u32::from((hw1 >> 10) & 1);
    let imm3 = u32::from((hw2 >> 12) & 0b111);
    let imm8 = u32::from(hw2 & 0xFF);
    let imm12 = (i << 11) | (imm3 << 8) | imm8;
    let (imm32, carry) = thumb_expand_imm_c(imm12);
    let imm = ImmCarry { imm32, carry };
    let mut flags = InstrFlags::WIDE;
    if s {
        flags |= InstrFlags::SETFLAGS;
    }
    let rd_is_pc = d.is_pc();

    match op {
        0b0000 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::TstImm { n, imm }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::AndImm { n, d, imm }, flags })
        }
        0b0001 => Ok(Instr { op: Op::BicImm { n, d, imm }, flags }),
        0b0010 => {
            if n.is_pc() {
                return Ok(Instr { op: Op::MovImm { d, imm }, flags });
            }
            Ok(Instr { op: Op::OrrImm { n, d, imm }, flags })
        }
        0b0011 => {
            if n.is_pc() {
                return Ok(Instr { op: Op::MvnImm { d, imm }, flags });
            }
            Err(unknown(hw1, hw2))
        }
        0b0100 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::TeqImm { n, imm }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::EorImm { n, d, imm }, flags })
        }
        0b1000 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::CmnImm { n, imm32 }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::AddImm { n, d, imm32 }, flags })
        }
        0b1010 => Ok(Instr { op: Op::AdcImm { n, d, imm32 }, flags }),
        0b1011 => Ok(Instr { op: Op::SbcImm { n, d, imm32 }, flags }),
        0b1101 => {
            if rd_is_pc {
                if !s {
                    return Err(unpredictable(hw1, hw2));
                }
                return Ok(wide(Op::CmpImm { n, imm32 }, InstrFlags::empty()));
            }
            Ok(Instr { op: Op::SubImm { n, d, imm32 }, flags })
        }
        0b1110 => Ok(Instr { op: Op::RsbImm { n, d, imm32 }, flags }),
        _ => Err(unknown(hw1, hw2)),
    }
}

fn decode_plain_immediate(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let op = (hw1 >> 4) & 0x1F;
    let n = reg(hw1 & 0xF);
    let d = reg((hw2 >> 8) & 0xF);
    let i = u32::from((hw1 >> 10) & 1);
    let imm3 = u32::from((hw2 >> 12) & 0b111);
    let imm8 = u32::from(hw2 & 0xFF);
    let imm12 = (i << 11) | (imm3 << 8) | imm8;
    match op {
        0b00000 => {
            // ADDW, or ADR when Rn is PC.
            let d = check_not_sp_pc_allow_sp_base(d, n, hw1, hw2)?;
            if n.is_pc() {
                return Ok(wide(Op::Adr { d, imm32: imm12 }, InstrFlags::ADD));
            }
            Ok(wide(Op::AddImm { n, d, imm32: imm12 }, InstrFlags::empty()))
        }
        0b00100 => {
            // MOVW.
            let d = check_not_sp_pc(d, hw1, hw2)?;
            let imm16 = (u32::from(hw1 & 0xF) << 12) | imm12;
            Ok(wide(
                Op::MovImm {
                    d,
                    imm: ImmCarry::plain(imm16),
                },
                InstrFlags::empty(),
            ))
        }
        0b01010 => {
            // SUBW, or ADR (sub form) when Rn is PC.
            let d = check_not_sp_pc_allow_sp_base(d, n, hw1, hw2)?;
            if n.is_pc() {
                return Ok(wide(Op::Adr { d, imm32: imm12 }, InstrFlags::empty()));
            }
            Ok(wide(Op::SubImm { n, d, imm32: imm12 }, InstrFlags::empty()))
        }
        0b01100 => {
            // MOVT.
            let d = check_not_sp_pc(d, hw1, hw2)?;
            let imm16 = ((u32::from(hw1 & 0xF) << 12) | imm12) as u16;
            Ok(wide(Op::Movt { d, imm16 }, InstrFlags::empty()))
        }
        0b10110 => {
            // BFI (BFC, the Rn=PC form, is not implemented).
            if n.is_pc() {
                return Err(unknown(hw1, hw2));
            }
            let d = check_not_sp_pc(d, hw1, hw2)?;
            let lsb = ((imm3 << 2) | ((u32::from(hw2) >> 6) & 0b11)) as u8;
            let msb = (hw2 & 0x1F) as u8;
            if u32::from(msb) < u32::from(lsb) {
                return Err(unpredictable(hw1, hw2));
            }
            Ok(wide(Op::Bfi { n, d, lsb, msb }, InstrFlags::empty()))
        }
        0b11100 => {
            // UBFX.
            let d = check_not_sp_pc(d, hw1, hw2)?;
            let n = check_not_sp_pc(n, hw1, hw2)?;
            let lsb = ((imm3 << 2) | ((u32::from(hw2) >> 6) & 0b11)) as u8;
            let width_minus_1 = (hw2 & 0x1F) as u8;
            Ok(wide(
                Op::Ubfx {
                    n,
                    d,
                    lsb,
                    width_minus_1,
                },
                InstrFlags::empty(),
            ))
        }
        _ => Err(unknown(hw1, hw2)),
    }
}

/// ADDW/SUBW allow an SP base with an SP destination; otherwise the
/// destination must avoid r13/r15.
fn check_not_sp_pc_allow_sp_base(
    d: RegisterId,
    n: RegisterId,
    hw1: u16,
    hw2: u16,
) -> Result<RegisterId, DecodeError> {
    if d.is_pc() {
        return Err(unpredictable(hw1, hw2));
    }
    if d.is_sp() && !n.is_sp() {
        return Err(unpredictable(hw1, hw2));
    }
    Ok(d)
}

// ---------------------------------------------------------------------------
// op1 = 10, op = 1: branches and miscellaneous control.
// ---------------------------------------------------------------------------

fn decode_branch_and_control(hw1: u16, hw2: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let op2 = (hw2 >> 12) & 0b111;
    match op2 {
        0b000 | 0b010 => {
            let op = (hw1 >> 4) & 0x7F;
            match op {
                0b0111000 | 0b0111001 => decode_msr(hw1, hw2),
                // Wide hint space (NOP.W, WFI.W, ...): all retire as NOP.
                0b0111010 => Ok(wide(Op::Nop, InstrFlags::empty())),
                0b0111011 => decode_misc_control(hw1, hw2),
                0b0111110 | 0b0111111 => decode_mrs(hw1, hw2),
                0b1111111 if op2 == 0b010 => Err(undefined(hw1, hw2)),
                _ => decode_b_cond(hw1, hw2, it),
            }
        }
        0b001 | 0b011 => {
            // B T4.
            if it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw1, hw2));
            }
            Ok(wide(
                Op::B {
                    imm32: branch_imm25(hw1, hw2),
                },
                InstrFlags::empty(),
            ))
        }
        0b101 | 0b111 => {
            // BL T1.
            if it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw1, hw2));
            }
            Ok(wide(
                Op::Bl {
                    imm32: branch_imm25(hw1, hw2),
                },
                InstrFlags::empty(),
            ))
        }
        _ => Err(unknown(hw1, hw2)),
    }
}

fn branch_imm25(hw1: u16, hw2: u16) -> u32 {
    let s = u32::from((hw1 >> 10) & 1);
    let imm10 = u32::from(hw1 & 0x3FF);
    let j1 = u32::from((hw2 >> 13) & 1);
    let j2 = u32::from((hw2 >> 11) & 1);
    let imm11 = u32::from(hw2 & 0x7FF);
    let i1 = !(j1 ^ s) & 1;
    let i2 = !(j2 ^ s) & 1;
    sign_extend(
        (s << 24) | (i1 << 23) | (i2 << 22) | (imm10 << 12) | (imm11 << 1),
        25,
    )
}

fn decode_b_cond(hw1: u16, hw2: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    if it.in_it_block {
        return Err(unpredictable(hw1, hw2));
    }
    let cond_bits = u32::from((hw1 >> 6) & 0xF);
    if cond_bits >= 0b1110 {
        // The 111x conditions select the misc-control space, never a branch.
        return Err(unknown(hw1, hw2));
    }
    let cond = Condition::from_bits(cond_bits).ok_or_else(|| unknown(hw1, hw2))?;
    let s = u32::from((hw1 >> 10) & 1);
    let imm6 = u32::from(hw1 & 0x3F);
    let j1 = u32::from((hw2 >> 13) & 1);
    let j2 = u32::from((hw2 >> 11) & 1);
    let imm11 = u32::from(hw2 & 0x7FF);
    let imm32 = sign_extend(
        (s << 20) | (j2 << 19) | (j1 << 18) | (imm6 << 12) | (imm11 << 1),
        21,
    );
    Ok(wide(Op::BCond { cond, imm32 }, InstrFlags::empty()))
}

fn decode_msr(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    // MSR (register): 1111 0011 100x nnnn | 10x0 mm00 SYSm.
    if hw2 & 0x0300 != 0 {
        return Err(unknown(hw1, hw2));
    }
    let n = check_not_sp_pc(reg(hw1 & 0xF), hw1, hw2)?;
    let mask = ((hw2 >> 10) & 0b11) as u8;
    let sysm = (hw2 & 0xFF) as u8;
    if mask == 0 {
        return Err(unpredictable(hw1, hw2));
    }
    Ok(wide(Op::Msr { n, sysm, mask }, InstrFlags::empty()))
}

fn decode_mrs(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let d = check_not_sp_pc(reg((hw2 >> 8) & 0xF), hw1, hw2)?;
    let sysm = (hw2 & 0xFF) as u8;
    Ok(wide(Op::Mrs { d, sysm }, InstrFlags::empty()))
}

fn decode_misc_control(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let op = match (hw2 >> 4) & 0xF {
        0b0100 => Op::Dsb,
        0b0101 => Op::Dmb,
        0b0110 => Op::Isb,
        _ => return Err(unknown(hw1, hw2)),
    };
    Ok(wide(op, InstrFlags::empty()))
}

// ---------------------------------------------------------------------------
// op1 = 11: single loads/stores, register data processing, multiplies.
// ---------------------------------------------------------------------------

fn decode_op1_11(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    match (hw1 >> 8) & 0b111 {
        0b000 | 0b001 => decode_load_store_single(hw1, hw2),
        0b010 => decode_register_data_processing(hw1, hw2),
        0b011 => decode_multiply(hw1, hw2),
        _ => Err(unknown(hw1, hw2)),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LsSize {
    Byte,
    Half,
    Word,
}

fn decode_load_store_single(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let signed = hw1 & (1 << 8) != 0;
    let imm12_form = hw1 & (1 << 7) != 0;
    let size = match (hw1 >> 5) & 0b11 {
        0b00 => LsSize::Byte,
        0b01 => LsSize::Half,
        0b10 => LsSize::Word,
        _ => return Err(unknown(hw1, hw2)),
    };
    let load = hw1 & (1 << 4) != 0;
    let n = reg(hw1 & 0xF);
    let t = reg(hw2 >> 12);

    if signed && (!load || size == LsSize::Word) {
        return Err(unknown(hw1, hw2));
    }
    if t.is_pc() && load && size != LsSize::Word {
        // PLD/PLI memory hints share these encodings; not modelled.
        return Err(unknown(hw1, hw2));
    }
    if !load && t.is_sp_or_pc() {
        return Err(unpredictable(hw1, hw2));
    }

    if n.is_pc() {
        // Literal forms; only LDR (literal) T2 is supported.
        if load && size == LsSize::Word && !signed {
            let imm32 = u32::from(hw2 & 0xFFF);
            let mut flags = InstrFlags::WIDE | InstrFlags::INDEX;
            if imm12_form {
                // Bit 7 is U for the literal form.
                flags |= InstrFlags::ADD;
            }
            return Ok(Instr {
                op: Op::LdrLit { t, imm32 },
                flags,
            });
        }
        return Err(unknown(hw1, hw2));
    }

    if imm12_form {
        let imm32 = u32::from(hw2 & 0xFFF);
        let flags = InstrFlags::WIDE | InstrFlags::INDEX | InstrFlags::ADD;
        return Ok(Instr {
            op: ls_op(load, signed, size, n, t, imm32, None),
            flags,
        });
    }

    if hw2 & (1 << 11) != 0 {
        // imm8 with P/U/W.
        let index = hw2 & (1 << 10) != 0;
        let add = hw2 & (1 << 9) != 0;
        let wback = hw2 & (1 << 8) != 0;
        if !index && !wback {
            return Err(undefined(hw1, hw2));
        }
        if wback && n == t {
            return Err(unpredictable(hw1, hw2));
        }
        let imm32 = u32::from(hw2 & 0xFF);
        let mut flags = InstrFlags::WIDE;
        if index {
            flags |= InstrFlags::INDEX;
        }
        if add {
            flags |= InstrFlags::ADD;
        }
        if wback {
            flags |= InstrFlags::WBACK;
        }
        return Ok(Instr {
            op: ls_op(load, signed, size, n, t, imm32, None),
            flags,
        });
    }

    if (hw2 >> 6) & 0x1F == 0 {
        // Register offset, LSL #imm2.
        let m = check_not_sp_pc(reg(hw2 & 0xF), hw1, hw2)?;
        let shift = Shift::lsl(((hw2 >> 4) & 0b11) as u8);
        let flags = InstrFlags::WIDE | InstrFlags::INDEX | InstrFlags::ADD;
        return Ok(Instr {
            op: ls_op(load, signed, size, n, t, 0, Some((m, shift))),
            flags,
        });
    }

    Err(unknown(hw1, hw2))
}

fn ls_op(
    load: bool,
    signed: bool,
    size: LsSize,
    n: RegisterId,
    t: RegisterId,
    imm32: u32,
    regoff: Option<(RegisterId, Shift)>,
) -> Op {
    match regoff {
        Some((m, shift)) => match (load, signed, size) {
            (true, false, LsSize::Word) => Op::LdrReg { n, m, t, shift },
            (true, false, LsSize::Half) => Op::LdrhReg { n, m, t, shift },
            (true, false, LsSize::Byte) => Op::LdrbReg { n, m, t, shift },
            (true, true, LsSize::Half) => Op::LdrshReg { n, m, t, shift },
            (true, true, LsSize::Byte) => Op::LdrsbReg { n, m, t, shift },
            (false, _, LsSize::Word) => Op::StrReg { n, m, t, shift },
            (false, _, LsSize::Half) => Op::StrhReg { n, m, t, shift },
            (false, _, LsSize::Byte) => Op::StrbReg { n, m, t, shift },
            (true, true, LsSize::Word) => unreachable!("signed word loads are rejected earlier"),
        },
        None => match (load, signed, size) {
            (true, false, LsSize::Word) => Op::LdrImm { n, t, imm32 },
            (true, false, LsSize::Half) => Op::LdrhImm { n, t, imm32 },
            (true, false, LsSize::Byte) => Op::LdrbImm { n, t, imm32 },
            (true, true, LsSize::Half) => Op::LdrshImm { n, t, imm32 },
            (true, true, LsSize::Byte) => Op::LdrsbImm { n, t, imm32 },
            (false, _, LsSize::Word) => Op::StrImm { n, t, imm32 },
            (false, _, LsSize::Half) => Op::StrhImm { n, t, imm32 },
            (false, _, LsSize::Byte) => Op::StrbImm { n, t, imm32 },
            (true, true, LsSize::Word) => unreachable!("signed word loads are rejected earlier"),
        },
    }
}

fn decode_register_data_processing(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    if hw2 >> 12 != 0xF {
        return Err(unknown(hw1, hw2));
    }
    let op1 = (hw1 >> 4) & 0xF;
    let n = reg(hw1 & 0xF);
    let d = reg((hw2 >> 8) & 0xF);
    let m = reg(hw2 & 0xF);
    let op2 = (hw2 >> 4) & 0xF;

    if op2 == 0 {
        // LSL/LSR/ASR/ROR (register) W.
        let kind = match op1 >> 1 {
            0b000 => ShiftType::Lsl,
            0b001 => ShiftType::Lsr,
            0b010 => ShiftType::Asr,
            0b011 => ShiftType::Ror,
            _ => return Err(unknown(hw1, hw2)),
        };
        let d = check_not_sp_pc(d, hw1, hw2)?;
        let n = check_not_sp_pc(n, hw1, hw2)?;
        let m = check_not_sp_pc(m, hw1, hw2)?;
        let mut flags = InstrFlags::WIDE;
        if hw1 & 1 << 4 != 0 {
            flags |= InstrFlags::SETFLAGS;
        }
        return Ok(Instr {
            op: Op::ShiftReg { n, m, d, kind },
            flags,
        });
    }

    if op2 & 0b1000 != 0 && hw1 & (1 << 7) == 0 {
        // Sign/zero extension with rotation; only the Rn=PC forms exist here.
        if !n.is_pc() {
            return Err(unknown(hw1, hw2));
        }
        let d = check_not_sp_pc(d, hw1, hw2)?;
        let m = check_not_sp_pc(m, hw1, hw2)?;
        let rotation = (((hw2 >> 4) & 0b11) * 8) as u8;
        let op = match (hw1 >> 4) & 0b111 {
            0b000 => Op::Sxth { d, m, rotation },
            0b001 => Op::Uxth { d, m, rotation },
            0b100 => Op::Sxtb { d, m, rotation },
            0b101 => Op::Uxtb { d, m, rotation },
            _ => return Err(unknown(hw1, hw2)),
        };
        return Ok(wide(op, InstrFlags::empty()));
    }

    if hw1 & (1 << 7) != 0 && op2 == 0b1000 && op1 & 0b11 == 0b11 {
        // CLZ: both Rm fields must agree.
        if n != m {
            return Err(unpredictable(hw1, hw2));
        }
        let d = check_not_sp_pc(d, hw1, hw2)?;
        let m = check_not_sp_pc(m, hw1, hw2)?;
        return Ok(wide(Op::Clz { d, m }, InstrFlags::empty()));
    }

    Err(unknown(hw1, hw2))
}

fn decode_multiply(hw1: u16, hw2: u16) -> Result<Instr, DecodeError> {
    let long = hw1 & (1 << 7) != 0;
    let op = (hw1 >> 4) & 0b111;
    let n = check_not_sp_pc(reg(hw1 & 0xF), hw1, hw2)?;
    let m = check_not_sp_pc(reg(hw2 & 0xF), hw1, hw2)?;
    if !long {
        if op != 0 {
            return Err(unknown(hw1, hw2));
        }
        let a_bits = (hw2 >> 12) & 0xF;
        let d = check_not_sp_pc(reg((hw2 >> 8) & 0xF), hw1, hw2)?;
        match (hw2 >> 4) & 0b11 {
            0b00 => {
                if a_bits == 0xF {
                    Ok(wide(Op::Mul { n, m, d }, InstrFlags::empty()))
                } else {
                    let a = check_not_sp_pc(reg(a_bits), hw1, hw2)?;
                    Ok(wide(Op::Mla { n, m, a, d }, InstrFlags::empty()))
                }
            }
            0b01 => {
                let a = check_not_sp_pc(reg(a_bits), hw1, hw2)?;
                Ok(wide(Op::Mls { n, m, a, d }, InstrFlags::empty()))
            }
            _ => Err(unknown(hw1, hw2)),
        }
    } else {
        let lo_bits = (hw2 >> 12) & 0xF;
        let hi_bits = (hw2 >> 8) & 0xF;
        match op {
            0b000 | 0b010 | 0b100 | 0b110 => {
                if (hw2 >> 4) & 0xF != 0 {
                    return Err(unknown(hw1, hw2));
                }
                let d_lo = check_not_sp_pc(reg(lo_bits), hw1, hw2)?;
                let d_hi = check_not_sp_pc(reg(hi_bits), hw1, hw2)?;
                if d_lo == d_hi {
                    return Err(unpredictable(hw1, hw2));
                }
                let op = match op {
                    0b000 => Op::Smull { n, m, d_lo, d_hi },
                    0b010 => Op::Umull { n, m, d_lo, d_hi },
                    0b100 => Op::Smlal { n, m, d_lo, d_hi },
                    _ => Op::Umlal { n, m, d_lo, d_hi },
                };
                Ok(wide(op, InstrFlags::empty()))
            }
            0b001 | 0b011 => {
                if (hw2 >> 4) & 0xF != 0xF || lo_bits != 0xF {
                    return Err(unknown(hw1, hw2));
                }
                let d = check_not_sp_pc(reg(hi_bits), hw1, hw2)?;
                let op = if op == 0b001 {
                    Op::Sdiv { n, m, d }
                } else {
                    Op::Udiv { n, m, d }
                };
                Ok(wide(op, InstrFlags::empty()))
            }
            _ => Err(unknown(hw1, hw2)),
        }
    }
}
