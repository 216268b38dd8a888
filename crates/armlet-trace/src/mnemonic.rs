//! UAL-style mnemonic rendering for decoded instructions.

use std::fmt::Write as _;

use armlet_isa::{Condition, Instr, InstrFlags, Op, RegisterId, Shift, ShiftType};

fn imm(value: u32) -> String {
    if value < 10 {
        format!("#{value}")
    } else {
        format!("#{value:#x}")
    }
}

fn rel(value: u32) -> String {
    let signed = value as i32;
    format!(".{signed:+}")
}

fn shift_suffix(shift: Shift) -> String {
    match (shift.kind, shift.amount) {
        (ShiftType::Lsl, 0) => String::new(),
        (ShiftType::Rrx, _) => ", rrx".to_string(),
        (kind, amount) => {
            let name = match kind {
                ShiftType::Lsl => "lsl",
                ShiftType::Lsr => "lsr",
                ShiftType::Asr => "asr",
                ShiftType::Ror => "ror",
                ShiftType::Rrx => unreachable!(),
            };
            format!(", {name} #{amount}")
        }
    }
}

fn rotation_suffix(rotation: u8) -> String {
    if rotation == 0 {
        String::new()
    } else {
        format!(", ror #{rotation}")
    }
}

/// `[rn, #±imm]` / `[rn, #±imm]!` / `[rn], #±imm` per the P/U/W flags.
fn address(flags: InstrFlags, n: RegisterId, imm32: u32) -> String {
    let sign = if flags.contains(InstrFlags::ADD) { "" } else { "-" };
    if flags.contains(InstrFlags::INDEX) {
        if flags.contains(InstrFlags::WBACK) {
            format!("[{n}, #{sign}{imm32}]!")
        } else if imm32 == 0 {
            format!("[{n}]")
        } else {
            format!("[{n}, #{sign}{imm32}]")
        }
    } else {
        format!("[{n}], #{sign}{imm32}")
    }
}

fn reg_address(n: RegisterId, m: RegisterId, shift: Shift) -> String {
    format!("[{n}, {m}{}]", shift_suffix(shift))
}

/// Renders one instruction. `it_cond` is the active IT condition, rendered
/// as the UAL condition suffix; the conditional branch carries its own.
pub fn mnemonic(instr: &Instr, it_cond: Option<Condition>) -> String {
    let s = if instr.flags.contains(InstrFlags::SETFLAGS) {
        "s"
    } else {
        ""
    };
    let c = it_cond.map(|c| c.to_string()).unwrap_or_default();
    let mut out = String::new();
    let o = &mut out;

    match instr.op {
        Op::MovImm { d, imm: iv } => write_op(o, format_args!("mov{s}{c} {d}, {}", imm(iv.imm32))),
        Op::MvnImm { d, imm: iv } => write_op(o, format_args!("mvn{s}{c} {d}, {}", imm(iv.imm32))),
        Op::AndImm { n, d, imm: iv } => {
            write_op(o, format_args!("and{s}{c} {d}, {n}, {}", imm(iv.imm32)))
        }
        Op::BicImm { n, d, imm: iv } => {
            write_op(o, format_args!("bic{s}{c} {d}, {n}, {}", imm(iv.imm32)))
        }
        Op::OrrImm { n, d, imm: iv } => {
            write_op(o, format_args!("orr{s}{c} {d}, {n}, {}", imm(iv.imm32)))
        }
        Op::EorImm { n, d, imm: iv } => {
            write_op(o, format_args!("eor{s}{c} {d}, {n}, {}", imm(iv.imm32)))
        }
        Op::TstImm { n, imm: iv } => write_op(o, format_args!("tst{c} {n}, {}", imm(iv.imm32))),
        Op::TeqImm { n, imm: iv } => write_op(o, format_args!("teq{c} {n}, {}", imm(iv.imm32))),
        Op::AddImm { n, d, imm32 } => {
            write_op(o, format_args!("add{s}{c} {d}, {n}, {}", imm(imm32)))
        }
        Op::AdcImm { n, d, imm32 } => {
            write_op(o, format_args!("adc{s}{c} {d}, {n}, {}", imm(imm32)))
        }
        Op::SubImm { n, d, imm32 } => {
            write_op(o, format_args!("sub{s}{c} {d}, {n}, {}", imm(imm32)))
        }
        Op::SbcImm { n, d, imm32 } => {
            write_op(o, format_args!("sbc{s}{c} {d}, {n}, {}", imm(imm32)))
        }
        Op::RsbImm { n, d, imm32 } => {
            write_op(o, format_args!("rsb{s}{c} {d}, {n}, {}", imm(imm32)))
        }
        Op::CmpImm { n, imm32 } => write_op(o, format_args!("cmp{c} {n}, {}", imm(imm32))),
        Op::CmnImm { n, imm32 } => write_op(o, format_args!("cmn{c} {n}, {}", imm(imm32))),
        Op::Adr { d, imm32 } => {
            let sign = if instr.flags.contains(InstrFlags::ADD) { "" } else { "-" };
            write_op(o, format_args!("adr{c} {d}, #{sign}{imm32}"))
        }
        Op::Movt { d, imm16 } => write_op(o, format_args!("movt{c} {d}, {}", imm(imm16.into()))),
        Op::MovReg { d, m } => write_op(o, format_args!("mov{s}{c} {d}, {m}")),
        Op::MvnReg { d, m, shift } => {
            write_op(o, format_args!("mvn{s}{c} {d}, {m}{}", shift_suffix(shift)))
        }
        Op::AndReg { n, m, d, shift } => {
            write_op(o, format_args!("and{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::BicReg { n, m, d, shift } => {
            write_op(o, format_args!("bic{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::OrrReg { n, m, d, shift } => {
            write_op(o, format_args!("orr{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::EorReg { n, m, d, shift } => {
            write_op(o, format_args!("eor{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::AddReg { n, m, d, shift } => {
            write_op(o, format_args!("add{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::AdcReg { n, m, d, shift } => {
            write_op(o, format_args!("adc{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::SubReg { n, m, d, shift } => {
            write_op(o, format_args!("sub{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::SbcReg { n, m, d, shift } => {
            write_op(o, format_args!("sbc{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::RsbReg { n, m, d, shift } => {
            write_op(o, format_args!("rsb{s}{c} {d}, {n}, {m}{}", shift_suffix(shift)))
        }
        Op::TstReg { n, m, shift } => {
            write_op(o, format_args!("tst{c} {n}, {m}{}", shift_suffix(shift)))
        }
        Op::TeqReg { n, m, shift } => {
            write_op(o, format_args!("teq{c} {n}, {m}{}", shift_suffix(shift)))
        }
        Op::CmpReg { n, m, shift } => {
            write_op(o, format_args!("cmp{c} {n}, {m}{}", shift_suffix(shift)))
        }
        Op::CmnReg { n, m, shift } => {
            write_op(o, format_args!("cmn{c} {n}, {m}{}", shift_suffix(shift)))
        }
        Op::ShiftImm { d, m, shift } => match (shift.kind, shift.amount) {
            (ShiftType::Lsl, 0) => write_op(o, format_args!("mov{s}{c} {d}, {m}")),
            (ShiftType::Rrx, _) => write_op(o, format_args!("rrx{s}{c} {d}, {m}")),
            (kind, amount) => {
                let name = shift_name(kind);
                write_op(o, format_args!("{name}{s}{c} {d}, {m}, #{amount}"))
            }
        },
        Op::ShiftReg { n, m, d, kind } => {
            let name = shift_name(kind);
            write_op(o, format_args!("{name}{s}{c} {d}, {n}, {m}"))
        }
        Op::Clz { d, m } => write_op(o, format_args!("clz{c} {d}, {m}")),
        Op::Sxtb { d, m, rotation } => {
            write_op(o, format_args!("sxtb{c} {d}, {m}{}", rotation_suffix(rotation)))
        }
        Op::Sxth { d, m, rotation } => {
            write_op(o, format_args!("sxth{c} {d}, {m}{}", rotation_suffix(rotation)))
        }
        Op::Uxtb { d, m, rotation } => {
            write_op(o, format_args!("uxtb{c} {d}, {m}{}", rotation_suffix(rotation)))
        }
        Op::Uxth { d, m, rotation } => {
            write_op(o, format_args!("uxth{c} {d}, {m}{}", rotation_suffix(rotation)))
        }
        Op::Bfi { n, d, lsb, msb } => {
            let width = msb - lsb + 1;
            write_op(o, format_args!("bfi{c} {d}, {n}, #{lsb}, #{width}"))
        }
        Op::Ubfx { n, d, lsb, width_minus_1 } => {
            let width = width_minus_1 + 1;
            write_op(o, format_args!("ubfx{c} {d}, {n}, #{lsb}, #{width}"))
        }
        Op::Mul { n, m, d } => write_op(o, format_args!("mul{s}{c} {d}, {n}, {m}")),
        Op::Mla { n, m, a, d } => write_op(o, format_args!("mla{c} {d}, {n}, {m}, {a}")),
        Op::Mls { n, m, a, d } => write_op(o, format_args!("mls{c} {d}, {n}, {m}, {a}")),
        Op::Umull { n, m, d_lo, d_hi } => {
            write_op(o, format_args!("umull{c} {d_lo}, {d_hi}, {n}, {m}"))
        }
        Op::Smull { n, m, d_lo, d_hi } => {
            write_op(o, format_args!("smull{c} {d_lo}, {d_hi}, {n}, {m}"))
        }
        Op::Umlal { n, m, d_lo, d_hi } => {
            write_op(o, format_args!("umlal{c} {d_lo}, {d_hi}, {n}, {m}"))
        }
        Op::Smlal { n, m, d_lo, d_hi } => {
            write_op(o, format_args!("smlal{c} {d_lo}, {d_hi}, {n}, {m}"))
        }
        Op::Udiv { n, m, d } => write_op(o, format_args!("udiv{c} {d}, {n}, {m}")),
        Op::Sdiv { n, m, d } => write_op(o, format_args!("sdiv{c} {d}, {n}, {m}")),
        Op::LdrLit { t, imm32 } => {
            let sign = if instr.flags.contains(InstrFlags::ADD) { "" } else { "-" };
            write_op(o, format_args!("ldr{c} {t}, [pc, #{sign}{imm32}]"))
        }
        Op::LdrImm { n, t, imm32 } => {
            write_op(o, format_args!("ldr{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::LdrbImm { n, t, imm32 } => {
            write_op(o, format_args!("ldrb{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::LdrhImm { n, t, imm32 } => {
            write_op(o, format_args!("ldrh{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::LdrsbImm { n, t, imm32 } => {
            write_op(o, format_args!("ldrsb{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::LdrshImm { n, t, imm32 } => {
            write_op(o, format_args!("ldrsh{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::StrImm { n, t, imm32 } => {
            write_op(o, format_args!("str{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::StrbImm { n, t, imm32 } => {
            write_op(o, format_args!("strb{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::StrhImm { n, t, imm32 } => {
            write_op(o, format_args!("strh{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::LdrReg { n, m, t, shift } => {
            write_op(o, format_args!("ldr{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::LdrbReg { n, m, t, shift } => {
            write_op(o, format_args!("ldrb{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::LdrhReg { n, m, t, shift } => {
            write_op(o, format_args!("ldrh{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::LdrsbReg { n, m, t, shift } => {
            write_op(o, format_args!("ldrsb{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::LdrshReg { n, m, t, shift } => {
            write_op(o, format_args!("ldrsh{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::StrReg { n, m, t, shift } => {
            write_op(o, format_args!("str{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::StrbReg { n, m, t, shift } => {
            write_op(o, format_args!("strb{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::StrhReg { n, m, t, shift } => {
            write_op(o, format_args!("strh{c} {t}, {}", reg_address(n, m, shift)))
        }
        Op::Ldrd { n, t, t2, imm32 } => {
            write_op(o, format_args!("ldrd{c} {t}, {t2}, {}", address(instr.flags, n, imm32)))
        }
        Op::Strd { n, t, t2, imm32 } => {
            write_op(o, format_args!("strd{c} {t}, {t2}, {}", address(instr.flags, n, imm32)))
        }
        Op::Ldrex { n, t, imm32 } => {
            write_op(o, format_args!("ldrex{c} {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::Strex { n, t, d, imm32 } => {
            write_op(o, format_args!("strex{c} {d}, {t}, {}", address(instr.flags, n, imm32)))
        }
        Op::Ldm { n, registers } => {
            let wb = if instr.flags.contains(InstrFlags::WBACK) { "!" } else { "" };
            write_op(o, format_args!("ldmia{c} {n}{wb}, {registers}"))
        }
        Op::Stm { n, registers } => {
            let wb = if instr.flags.contains(InstrFlags::WBACK) { "!" } else { "" };
            write_op(o, format_args!("stmia{c} {n}{wb}, {registers}"))
        }
        Op::Push { registers } => write_op(o, format_args!("push{c} {registers}")),
        Op::Pop { registers } => write_op(o, format_args!("pop{c} {registers}")),
        Op::B { imm32 } => write_op(o, format_args!("b{c} {}", rel(imm32))),
        Op::BCond { cond, imm32 } => write_op(o, format_args!("b{cond} {}", rel(imm32))),
        Op::Bl { imm32 } => write_op(o, format_args!("bl{c} {}", rel(imm32))),
        Op::Bx { m } => write_op(o, format_args!("bx{c} {m}")),
        Op::Blx { m } => write_op(o, format_args!("blx{c} {m}")),
        Op::CbNz { n, imm32 } => {
            let stem = if instr.flags.contains(InstrFlags::NONZERO) {
                "cbnz"
            } else {
                "cbz"
            };
            write_op(o, format_args!("{stem} {n}, {}", rel(imm32)))
        }
        Op::TableBranch { n, m } => {
            if instr.flags.contains(InstrFlags::TBH) {
                write_op(o, format_args!("tbh{c} [{n}, {m}, lsl #1]"))
            } else {
                write_op(o, format_args!("tbb{c} [{n}, {m}]"))
            }
        }
        Op::It { firstcond, mask } => {
            let cond = Condition::from_bits(u32::from(firstcond))
                .map(|c| c.to_string())
                .unwrap_or_else(|| format!("{firstcond:#x}"));
            write_op(o, format_args!("it{} {cond}", then_else(firstcond, mask)))
        }
        Op::Svc { imm32 } => write_op(o, format_args!("svc{c} {}", imm(imm32))),
        Op::Bkpt { imm32 } => write_op(o, format_args!("bkpt {}", imm(imm32))),
        Op::Msr { n, sysm, .. } => {
            write_op(o, format_args!("msr{c} {}, {n}", sysm_name(sysm)))
        }
        Op::Mrs { d, sysm } => write_op(o, format_args!("mrs{c} {d}, {}", sysm_name(sysm))),
        Op::Nop => write_op(o, format_args!("nop{c}")),
        Op::Dmb => write_op(o, format_args!("dmb{c} sy")),
        Op::Dsb => write_op(o, format_args!("dsb{c} sy")),
        Op::Isb => write_op(o, format_args!("isb{c} sy")),
    }
    out
}

fn write_op(out: &mut String, args: std::fmt::Arguments<'_>) {
    let _ = out.write_fmt(args);
}

fn shift_name(kind: ShiftType) -> &'static str {
    match kind {
        ShiftType::Lsl => "lsl",
        ShiftType::Lsr => "lsr",
        ShiftType::Asr => "asr",
        ShiftType::Ror => "ror",
        ShiftType::Rrx => "rrx",
    }
}

/// The T/E suffix string of an IT instruction, recovered from the mask.
fn then_else(firstcond: u8, mask: u8) -> String {
    let mut out = String::new();
    let fc0 = firstcond & 1;
    // Walk mask bits from bit 3 down to the terminating 1.
    let mut bits = [false; 3];
    let mut len = 0;
    for (i, slot) in bits.iter_mut().enumerate() {
        let tail = mask & ((1 << (3 - i)) - 1);
        if tail == 0 {
            break;
        }
        *slot = (mask >> (3 - i)) & 1 != fc0;
        len = i + 1;
    }
    for slot in bits.iter().take(len) {
        out.push(if *slot { 'e' } else { 't' });
    }
    out
}

fn sysm_name(sysm: u8) -> String {
    match sysm {
        0 => "apsr".to_string(),
        1 => "iapsr".to_string(),
        2 => "eapsr".to_string(),
        3 => "xpsr".to_string(),
        5 => "ipsr".to_string(),
        6 => "epsr".to_string(),
        7 => "iepsr".to_string(),
        8 => "msp".to_string(),
        9 => "psp".to_string(),
        16 => "primask".to_string(),
        17 => "basepri".to_string(),
        18 => "basepri_max".to_string(),
        19 => "faultmask".to_string(),
        20 => "control".to_string(),
        other => format!("sysm_{other}"),
    }
}
