//! 16-bit Thumb encodings (ARMv7-M ARM §A5.2).

use armlet_isa::alu::sign_extend;
use armlet_isa::{
    decode_imm_shift, Condition, ImmCarry, Instr, InstrFlags, Op, RegisterId, RegisterList, Shift,
    ShiftType,
};

use crate::{raw_of, DecodeError, ItPosition};

fn reg(bits: u16) -> RegisterId {
    RegisterId::from_index(u32::from(bits) & 0xF).unwrap()
}

fn unknown(hw: u16) -> DecodeError {
    DecodeError::UnknownOpcode { raw: raw_of(hw, None) }
}

fn unpredictable(hw: u16) -> DecodeError {
    DecodeError::Unpredictable { raw: raw_of(hw, None) }
}

/// Flags for the 16-bit data-processing encodings: the S bit is implicit and
/// asserted exactly when the instruction executes outside an IT block.
fn dp_flags(it: ItPosition) -> InstrFlags {
    if it.in_it_block {
        InstrFlags::empty()
    } else {
        InstrFlags::SETFLAGS
    }
}

pub(crate) fn decode(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    match hw >> 12 {
        0b0000 | 0b0001 => decode_shift_add_sub(hw, it),
        0b0010 | 0b0011 => decode_mov_cmp_add_sub_imm(hw, it),
        0b0100 => match (hw >> 10) & 0b11 {
            0b00 => decode_data_processing(hw, it),
            0b01 => decode_special_data(hw, it),
            _ => {
                // LDR (literal) T1.
                let t = reg((hw >> 8) & 0b111);
                let imm32 = u32::from(hw & 0xFF) << 2;
                Ok(Instr {
                    op: Op::LdrLit { t, imm32 },
                    flags: InstrFlags::INDEX | InstrFlags::ADD,
                })
            }
        },
        0b0101 => decode_load_store_register(hw),
        0b0110 | 0b0111 | 0b1000 | 0b1001 => decode_load_store_immediate(hw),
        0b1010 => {
            let d = reg((hw >> 8) & 0b111);
            let imm32 = u32::from(hw & 0xFF) << 2;
            if hw & (1 << 11) == 0 {
                // ADR T1.
                Ok(Instr {
                    op: Op::Adr { d, imm32 },
                    flags: InstrFlags::ADD,
                })
            } else {
                // ADD (SP plus immediate) T1.
                Ok(Instr {
                    op: Op::AddImm {
                        n: RegisterId::Sp,
                        d,
                        imm32,
                    },
                    flags: InstrFlags::empty(),
                })
            }
        }
        0b1011 => decode_misc(hw, it),
        0b1100 => {
            let n = reg((hw >> 8) & 0b111);
            let registers = RegisterList(hw & 0xFF);
            if registers.is_empty() {
                return Err(unpredictable(hw));
            }
            if hw & (1 << 11) == 0 {
                // STM T1 always writes back.
                Ok(Instr {
                    op: Op::Stm { n, registers },
                    flags: InstrFlags::WBACK,
                })
            } else {
                // LDM T1 writes back unless the base is in the list.
                let flags = if registers.contains(n) {
                    InstrFlags::empty()
                } else {
                    InstrFlags::WBACK
                };
                Ok(Instr {
                    op: Op::Ldm { n, registers },
                    flags,
                })
            }
        }
        0b1101 => decode_cond_branch_svc(hw, it),
        0b1110 => {
            if hw & (1 << 11) != 0 {
                // 32-bit prefix; the fetcher never hands this to us alone.
                return Err(unknown(hw));
            }
            // B T2.
            if it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw));
            }
            let imm32 = sign_extend(u32::from(hw & 0x7FF) << 1, 12);
            Ok(Instr {
                op: Op::B { imm32 },
                flags: InstrFlags::empty(),
            })
        }
        _ => Err(unknown(hw)),
    }
}

fn decode_shift_add_sub(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let op = (hw >> 9) & 0b11111;
    let flags = dp_flags(it);
    match op {
        // LSL/LSR/ASR (immediate) T1.
        0b00000..=0b01011 => {
            let ty = (hw >> 11) & 0b11;
            let imm5 = (hw >> 6) & 0x1F;
            let m = reg((hw >> 3) & 0b111);
            let d = reg(hw & 0b111);
            let shift = decode_imm_shift(u32::from(ty), u32::from(imm5));
            Ok(Instr {
                op: Op::ShiftImm { d, m, shift },
                flags,
            })
        }
        0b01100 | 0b01101 => {
            // ADD/SUB (register) T1.
            let m = reg((hw >> 6) & 0b111);
            let n = reg((hw >> 3) & 0b111);
            let d = reg(hw & 0b111);
            let op = if op == 0b01100 {
                Op::AddReg {
                    n,
                    m,
                    d,
                    shift: Shift::NONE,
                }
            } else {
                Op::SubReg {
                    n,
                    m,
                    d,
                    shift: Shift::NONE,
                }
            };
            Ok(Instr { op, flags })
        }
        0b01110 | 0b01111 => {
            // ADD/SUB (3-bit immediate) T1.
            let imm32 = u32::from((hw >> 6) & 0b111);
            let n = reg((hw >> 3) & 0b111);
            let d = reg(hw & 0b111);
            let op = if op == 0b01110 {
                Op::AddImm { n, d, imm32 }
            } else {
                Op::SubImm { n, d, imm32 }
            };
            Ok(Instr { op, flags })
        }
        _ => Err(unknown(hw)),
    }
}

fn decode_mov_cmp_add_sub_imm(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let rdn = reg((hw >> 8) & 0b111);
    let imm32 = u32::from(hw & 0xFF);
    let flags = dp_flags(it);
    let op = match (hw >> 11) & 0b11 {
        0b00 => Op::MovImm {
            d: rdn,
            imm: ImmCarry::plain(imm32),
        },
        0b01 => {
            return Ok(Instr {
                op: Op::CmpImm { n: rdn, imm32 },
                flags: InstrFlags::empty(),
            })
        }
        0b10 => Op::AddImm {
            n: rdn,
            d: rdn,
            imm32,
        },
        _ => Op::SubImm {
            n: rdn,
            d: rdn,
            imm32,
        },
    };
    Ok(Instr { op, flags })
}

fn decode_data_processing(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let m = reg((hw >> 3) & 0b111);
    let dn = reg(hw & 0b111);
    let flags = dp_flags(it);
    let none = Shift::NONE;
    let op = match (hw >> 6) & 0xF {
        0b0000 => Op::AndReg { n: dn, m, d: dn, shift: none },
        0b0001 => Op::EorReg { n: dn, m, d: dn, shift: none },
        0b0010 => Op::ShiftReg { n: dn, m, d: dn, kind: ShiftType::Lsl },
        0b0011 => Op::ShiftReg { n: dn, m, d: dn, kind: ShiftType::Lsr },
        0b0100 => Op::ShiftReg { n: dn, m, d: dn, kind: ShiftType::Asr },
        0b0101 => Op::AdcReg { n: dn, m, d: dn, shift: none },
        0b0110 => Op::SbcReg { n: dn, m, d: dn, shift: none },
        0b0111 => Op::ShiftReg { n: dn, m, d: dn, kind: ShiftType::Ror },
        0b1000 => {
            return Ok(Instr {
                op: Op::TstReg { n: dn, m, shift: none },
                flags: InstrFlags::empty(),
            })
        }
        // RSB (immediate) T1, always #0.
        0b1001 => Op::RsbImm { n: m, d: dn, imm32: 0 },
        0b1010 => {
            return Ok(Instr {
                op: Op::CmpReg { n: dn, m, shift: none },
                flags: InstrFlags::empty(),
            })
        }
        0b1011 => {
            return Ok(Instr {
                op: Op::CmnReg { n: dn, m, shift: none },
                flags: InstrFlags::empty(),
            })
        }
        0b1100 => Op::OrrReg { n: dn, m, d: dn, shift: none },
        0b1101 => Op::Mul { n: m, m: dn, d: dn },
        0b1110 => Op::BicReg { n: dn, m, d: dn, shift: none },
        _ => Op::MvnReg { d: dn, m, shift: none },
    };
    Ok(Instr { op, flags })
}

fn decode_special_data(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let m = reg((hw >> 3) & 0xF);
    let dn = reg(((hw >> 4) & 0b1000) | (hw & 0b111));
    match (hw >> 8) & 0b11 {
        0b00 => {
            // ADD (register) T2, high registers, no flag update.
            if dn.is_pc() && m.is_pc() {
                return Err(unpredictable(hw));
            }
            if dn.is_pc() && it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::AddReg {
                    n: dn,
                    m,
                    d: dn,
                    shift: Shift::NONE,
                },
                flags: InstrFlags::empty(),
            })
        }
        0b01 => {
            // CMP (register) T2.
            if dn.index() < 8 && m.index() < 8 {
                return Err(unpredictable(hw));
            }
            if dn.is_pc() || m.is_pc() {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::CmpReg {
                    n: dn,
                    m,
                    shift: Shift::NONE,
                },
                flags: InstrFlags::empty(),
            })
        }
        0b10 => {
            // MOV (register) T1.
            if dn.is_pc() && it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::MovReg { d: dn, m },
                flags: InstrFlags::empty(),
            })
        }
        _ => {
            if hw & 0b111 != 0 {
                return Err(unpredictable(hw));
            }
            if it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw));
            }
            if hw & (1 << 7) == 0 {
                Ok(Instr {
                    op: Op::Bx { m },
                    flags: InstrFlags::empty(),
                })
            } else {
                if m.is_pc() {
                    return Err(unpredictable(hw));
                }
                Ok(Instr {
                    op: Op::Blx { m },
                    flags: InstrFlags::empty(),
                })
            }
        }
    }
}

fn decode_load_store_register(hw: u16) -> Result<Instr, DecodeError> {
    let m = reg((hw >> 6) & 0b111);
    let n = reg((hw >> 3) & 0b111);
    let t = reg(hw & 0b111);
    let shift = Shift::NONE;
    let flags = InstrFlags::INDEX | InstrFlags::ADD;
    let op = match (hw >> 9) & 0b111 {
        0b000 => Op::StrReg { n, m, t, shift },
        0b001 => Op::StrhReg { n, m, t, shift },
        0b010 => Op::StrbReg { n, m, t, shift },
        0b011 => Op::LdrsbReg { n, m, t, shift },
        0b100 => Op::LdrReg { n, m, t, shift },
        0b101 => Op::LdrhReg { n, m, t, shift },
        0b110 => Op::LdrbReg { n, m, t, shift },
        _ => Op::LdrshReg { n, m, t, shift },
    };
    Ok(Instr { op, flags })
}

fn decode_load_store_immediate(hw: u16) -> Result<Instr, DecodeError> {
    let flags = InstrFlags::INDEX | InstrFlags::ADD;
    let load = hw & (1 << 11) != 0;
    match hw >> 12 {
        0b0110 | 0b0111 => {
            let imm5 = u32::from((hw >> 6) & 0x1F);
            let n = reg((hw >> 3) & 0b111);
            let t = reg(hw & 0b111);
            let byte = hw >> 12 == 0b0111;
            let op = match (load, byte) {
                (false, false) => Op::StrImm { n, t, imm32: imm5 << 2 },
                (true, false) => Op::LdrImm { n, t, imm32: imm5 << 2 },
                (false, true) => Op::StrbImm { n, t, imm32: imm5 },
                (true, true) => Op::LdrbImm { n, t, imm32: imm5 },
            };
            Ok(Instr { op, flags })
        }
        0b1000 => {
            let imm32 = u32::from((hw >> 6) & 0x1F) << 1;
            let n = reg((hw >> 3) & 0b111);
            let t = reg(hw & 0b111);
            let op = if load {
                Op::LdrhImm { n, t, imm32 }
            } else {
                Op::StrhImm { n, t, imm32 }
            };
            Ok(Instr { op, flags })
        }
        _ => {
            // SP-relative STR/LDR T2.
            let t = reg((hw >> 8) & 0b111);
            let imm32 = u32::from(hw & 0xFF) << 2;
            let n = RegisterId::Sp;
            let op = if load {
                Op::LdrImm { n, t, imm32 }
            } else {
                Op::StrImm { n, t, imm32 }
            };
            Ok(Instr { op, flags })
        }
    }
}

fn decode_misc(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    match (hw >> 8) & 0xF {
        0b0000 => {
            // ADD/SUB (SP plus immediate) T2/T1.
            let imm32 = u32::from(hw & 0x7F) << 2;
            let op = if hw & (1 << 7) == 0 {
                Op::AddImm {
                    n: RegisterId::Sp,
                    d: RegisterId::Sp,
                    imm32,
                }
            } else {
                Op::SubImm {
                    n: RegisterId::Sp,
                    d: RegisterId::Sp,
                    imm32,
                }
            };
            Ok(Instr {
                op,
                flags: InstrFlags::empty(),
            })
        }
        0b0001 | 0b0011 | 0b1001 | 0b1011 => {
            // CBZ/CBNZ.
            if it.in_it_block {
                return Err(unpredictable(hw));
            }
            let n = reg(hw & 0b111);
            let i = u32::from((hw >> 9) & 1);
            let imm5 = u32::from((hw >> 3) & 0x1F);
            let imm32 = (i << 6) | (imm5 << 1);
            let mut flags = InstrFlags::empty();
            if hw & (1 << 11) != 0 {
                flags |= InstrFlags::NONZERO;
            }
            Ok(Instr {
                op: Op::CbNz { n, imm32 },
                flags,
            })
        }
        0b0010 => {
            let m = reg((hw >> 3) & 0b111);
            let d = reg(hw & 0b111);
            let op = match (hw >> 6) & 0b11 {
                0b00 => Op::Sxth { d, m, rotation: 0 },
                0b01 => Op::Sxtb { d, m, rotation: 0 },
                0b10 => Op::Uxth { d, m, rotation: 0 },
                _ => Op::Uxtb { d, m, rotation: 0 },
            };
            Ok(Instr {
                op,
                flags: InstrFlags::empty(),
            })
        }
        0b0100 | 0b0101 => {
            // PUSH T1: optional LR.
            let mut bits = hw & 0xFF;
            if hw & (1 << 8) != 0 {
                bits |= 1 << 14;
            }
            let registers = RegisterList(bits);
            if registers.is_empty() {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::Push { registers },
                flags: InstrFlags::empty(),
            })
        }
        0b1100 | 0b1101 => {
            // POP T1: optional PC.
            let mut bits = hw & 0xFF;
            if hw & (1 << 8) != 0 {
                bits |= 1 << 15;
            }
            let registers = RegisterList(bits);
            if registers.is_empty() {
                return Err(unpredictable(hw));
            }
            if registers.contains(RegisterId::Pc) && it.in_it_block && !it.last_in_it_block {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::Pop { registers },
                flags: InstrFlags::empty(),
            })
        }
        0b1110 => Ok(Instr {
            op: Op::Bkpt {
                imm32: u32::from(hw & 0xFF),
            },
            flags: InstrFlags::empty(),
        }),
        0b1111 => {
            let firstcond = ((hw >> 4) & 0xF) as u8;
            let mask = (hw & 0xF) as u8;
            if mask == 0 {
                // Hint space: NOP, YIELD, WFE, WFI, SEV all retire as NOP.
                return match firstcond {
                    0b0000..=0b0100 => Ok(Instr {
                        op: Op::Nop,
                        flags: InstrFlags::empty(),
                    }),
                    _ => Err(unknown(hw)),
                };
            }
            if firstcond == 0b1111 {
                return Err(unpredictable(hw));
            }
            if firstcond == 0b1110 && mask.count_ones() != 1 {
                return Err(unpredictable(hw));
            }
            if it.in_it_block {
                return Err(unpredictable(hw));
            }
            Ok(Instr {
                op: Op::It { firstcond, mask },
                flags: InstrFlags::empty(),
            })
        }
        _ => Err(unknown(hw)),
    }
}

fn decode_cond_branch_svc(hw: u16, it: ItPosition) -> Result<Instr, DecodeError> {
    let cond_bits = u32::from((hw >> 8) & 0xF);
    match cond_bits {
        0b1110 => Err(DecodeError::Undefined { raw: raw_of(hw, None) }),
        0b1111 => Ok(Instr {
            op: Op::Svc {
                imm32: u32::from(hw & 0xFF),
            },
            flags: InstrFlags::empty(),
        }),
        _ => {
            if it.in_it_block {
                return Err(unpredictable(hw));
            }
            let cond = Condition::from_bits(cond_bits).unwrap();
            let imm32 = sign_extend(u32::from(hw & 0xFF) << 1, 9);
            Ok(Instr {
                op: Op::BCond { cond, imm32 },
                flags: InstrFlags::empty(),
            })
        }
    }
}
