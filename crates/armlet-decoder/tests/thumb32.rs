use armlet_decoder::{decode, DecodeError, ItPosition};
use armlet_isa::{
    Condition, InstrFlags, Op, RawInstr, RegisterId::*, RegisterList, Shift, ShiftType,
};

fn wide(hw1: u16, hw2: u16) -> (Op, InstrFlags) {
    let instr = decode(RawInstr::Wide(hw1, hw2), ItPosition::OUTSIDE).unwrap();
    assert!(instr.flags.contains(InstrFlags::WIDE));
    (instr.op, instr.flags)
}

fn wide_err(hw1: u16, hw2: u16) -> DecodeError {
    decode(RawInstr::Wide(hw1, hw2), ItPosition::OUTSIDE).unwrap_err()
}

#[test]
fn modified_immediate_expansion() {
    // mov.w r0, #0x00010001
    let (op, _) = wide(0xF04F, 0x1001);
    match op {
        Op::MovImm { d, imm } => {
            assert_eq!(d, R0);
            assert_eq!(imm.imm32, 0x0001_0001);
            assert_eq!(imm.carry, None);
        }
        other => panic!("unexpected {other:?}"),
    }

    // orrs.w r0, r0, #0x80000000 carries out of the rotate.
    let (op, flags) = wide(0xF050, 0x4000);
    match op {
        Op::OrrImm { n, d, imm } => {
            assert_eq!((n, d), (R0, R0));
            assert_eq!(imm.imm32, 0x8000_0000);
            assert_eq!(imm.carry, Some(true));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(flags.contains(InstrFlags::SETFLAGS));
}

#[test]
fn add_sub_cmp_wide() {
    // add.w r1, r2, #16
    assert_eq!(
        wide(0xF102, 0x0110).0,
        Op::AddImm {
            n: R2,
            d: R1,
            imm32: 16
        }
    );
    // adds.w sets flags
    let (_, flags) = wide(0xF112, 0x0110);
    assert!(flags.contains(InstrFlags::SETFLAGS));

    // cmp.w r0, #255 (Rd = PC + S selects the compare form)
    assert_eq!(wide(0xF1B0, 0x0FFF).0, Op::CmpImm { n: R0, imm32: 255 });

    // rsb.w r0, r1, #0
    assert_eq!(
        wide(0xF1C1, 0x0000).0,
        Op::RsbImm {
            n: R1,
            d: R0,
            imm32: 0
        }
    );
}

#[test]
fn plain_immediates() {
    // movw r5, #0x1234
    match wide(0xF241, 0x2534).0 {
        Op::MovImm { d, imm } => {
            assert_eq!(d, R5);
            assert_eq!(imm.imm32, 0x1234);
        }
        other => panic!("unexpected {other:?}"),
    }

    // movt r5, #0x8000
    assert_eq!(
        wide(0xF2C8, 0x0500).0,
        Op::Movt {
            d: R5,
            imm16: 0x8000
        }
    );

    // addw r0, r1, #0x123
    assert_eq!(
        wide(0xF201, 0x1023).0,
        Op::AddImm {
            n: R1,
            d: R0,
            imm32: 0x123
        }
    );

    // ubfx r0, r1, #4, #8
    assert_eq!(
        wide(0xF3C1, 0x1007).0,
        Op::Ubfx {
            n: R1,
            d: R0,
            lsb: 4,
            width_minus_1: 7
        }
    );

    // bfi r0, r1, #4, #8
    assert_eq!(
        wide(0xF361, 0x100B).0,
        Op::Bfi {
            n: R1,
            d: R0,
            lsb: 4,
            msb: 11
        }
    );

    // bfi with msb < lsb is unpredictable
    assert!(matches!(
        wide_err(0xF361, 0x1001),
        DecodeError::Unpredictable { .. }
    ));
}

#[test]
fn shifted_register_data_processing() {
    // and.w r0, r1, r2, lsl #4
    assert_eq!(
        wide(0xEA01, 0x1002).0,
        Op::AndReg {
            n: R1,
            m: R2,
            d: R0,
            shift: Shift {
                kind: ShiftType::Lsl,
                amount: 4
            }
        }
    );

    // lsl.w r0, r1, #4 (ORR with Rn = PC)
    assert_eq!(
        wide(0xEA4F, 0x1001).0,
        Op::ShiftImm {
            d: R0,
            m: R1,
            shift: Shift {
                kind: ShiftType::Lsl,
                amount: 4
            }
        }
    );

    // mvn.w r0, r1
    assert_eq!(
        wide(0xEA6F, 0x0001).0,
        Op::MvnReg {
            d: R0,
            m: R1,
            shift: Shift::NONE
        }
    );

    // tst.w r1, r2 (AND with Rd = PC, S = 1)
    assert_eq!(
        wide(0xEA11, 0x0F02).0,
        Op::TstReg {
            n: R1,
            m: R2,
            shift: Shift::NONE
        }
    );

    // rrx r0, r1 (MOV shifted, type ROR amount 0)
    assert_eq!(
        wide(0xEA4F, 0x0031).0,
        Op::ShiftImm {
            d: R0,
            m: R1,
            shift: Shift {
                kind: ShiftType::Rrx,
                amount: 1
            }
        }
    );
}

#[test]
fn register_shifts_and_extends() {
    // lsl.w r0, r1, r2
    let (op, flags) = wide(0xFA01, 0xF002);
    assert_eq!(
        op,
        Op::ShiftReg {
            n: R1,
            m: R2,
            d: R0,
            kind: ShiftType::Lsl
        }
    );
    assert!(!flags.contains(InstrFlags::SETFLAGS));

    // asrs.w r3, r4, r5
    let (op, flags) = wide(0xFA54, 0xF305);
    assert_eq!(
        op,
        Op::ShiftReg {
            n: R4,
            m: R5,
            d: R3,
            kind: ShiftType::Asr
        }
    );
    assert!(flags.contains(InstrFlags::SETFLAGS));

    // sxth.w r0, r1, ror #8
    assert_eq!(
        wide(0xFA0F, 0xF091).0,
        Op::Sxth {
            d: R0,
            m: R1,
            rotation: 8
        }
    );

    // uxtb.w r0, r1
    assert_eq!(
        wide(0xFA5F, 0xF081).0,
        Op::Uxtb {
            d: R0,
            m: R1,
            rotation: 0
        }
    );

    // clz r0, r1
    assert_eq!(wide(0xFAB1, 0xF081).0, Op::Clz { d: R0, m: R1 });
}

#[test]
fn multiplies_and_divides() {
    assert_eq!(
        wide(0xFB01, 0xF002).0,
        Op::Mul {
            n: R1,
            m: R2,
            d: R0
        }
    );
    assert_eq!(
        wide(0xFB01, 0x3002).0,
        Op::Mla {
            n: R1,
            m: R2,
            a: R3,
            d: R0
        }
    );
    assert_eq!(
        wide(0xFB01, 0x3012).0,
        Op::Mls {
            n: R1,
            m: R2,
            a: R3,
            d: R0
        }
    );
    assert_eq!(
        wide(0xFBA2, 0x0103).0,
        Op::Umull {
            n: R2,
            m: R3,
            d_lo: R0,
            d_hi: R1
        }
    );
    assert_eq!(
        wide(0xFB82, 0x0103).0,
        Op::Smull {
            n: R2,
            m: R3,
            d_lo: R0,
            d_hi: R1
        }
    );
    assert_eq!(
        wide(0xFBE2, 0x0103).0,
        Op::Umlal {
            n: R2,
            m: R3,
            d_lo: R0,
            d_hi: R1
        }
    );
    assert_eq!(
        wide(0xFBB0, 0xF2F1).0,
        Op::Udiv {
            n: R0,
            m: R1,
            d: R2
        }
    );
    assert_eq!(
        wide(0xFB90, 0xF2F1).0,
        Op::Sdiv {
            n: R0,
            m: R1,
            d: R2
        }
    );

    // umull with equal destinations is unpredictable
    assert!(matches!(
        wide_err(0xFBA2, 0x0003),
        DecodeError::Unpredictable { .. }
    ));
}

#[test]
fn wide_loads_and_stores() {
    // ldr.w r0, [r1, #4]
    let (op, flags) = wide(0xF8D1, 0x0004);
    assert_eq!(
        op,
        Op::LdrImm {
            n: R1,
            t: R0,
            imm32: 4
        }
    );
    assert!(flags.contains(InstrFlags::INDEX | InstrFlags::ADD));
    assert!(!flags.contains(InstrFlags::WBACK));

    // str.w r0, [r1, #4]
    assert_eq!(
        wide(0xF8C1, 0x0004).0,
        Op::StrImm {
            n: R1,
            t: R0,
            imm32: 4
        }
    );

    // ldr.w r0, [r1], #4 (post-indexed)
    let (op, flags) = wide(0xF851, 0x0B04);
    assert_eq!(
        op,
        Op::LdrImm {
            n: R1,
            t: R0,
            imm32: 4
        }
    );
    assert!(!flags.contains(InstrFlags::INDEX));
    assert!(flags.contains(InstrFlags::ADD | InstrFlags::WBACK));

    // ldr.w r0, [r1, #-4]! (pre-indexed, subtract)
    let (op, flags) = wide(0xF851, 0x0D04);
    assert_eq!(
        op,
        Op::LdrImm {
            n: R1,
            t: R0,
            imm32: 4
        }
    );
    assert!(flags.contains(InstrFlags::INDEX | InstrFlags::WBACK));
    assert!(!flags.contains(InstrFlags::ADD));

    // ldrsh.w r2, [r3, r4, lsl #1]
    assert_eq!(
        wide(0xF933, 0x2014).0,
        Op::LdrshReg {
            n: R3,
            m: R4,
            t: R2,
            shift: Shift::lsl(1)
        }
    );

    // ldr.w r0, [pc, #16] (literal)
    let (op, flags) = wide(0xF8DF, 0x0010);
    assert_eq!(op, Op::LdrLit { t: R0, imm32: 16 });
    assert!(flags.contains(InstrFlags::ADD));

    // post-index with writeback to the transfer register is unpredictable
    assert!(matches!(
        wide_err(0xF851, 0x1B04),
        DecodeError::Unpredictable { .. }
    ));
}

#[test]
fn dual_exclusive_and_table_branch() {
    // ldrd r2, r3, [r0, #8]
    let (op, flags) = wide(0xE9D0, 0x2302);
    assert_eq!(
        op,
        Op::Ldrd {
            n: R0,
            t: R2,
            t2: R3,
            imm32: 8
        }
    );
    assert!(flags.contains(InstrFlags::INDEX | InstrFlags::ADD));

    // strd r2, r3, [r0, #8]
    assert_eq!(
        wide(0xE9C0, 0x2302).0,
        Op::Strd {
            n: R0,
            t: R2,
            t2: R3,
            imm32: 8
        }
    );

    // ldrex r1, [r0] / strex r2, r1, [r0]
    assert_eq!(
        wide(0xE850, 0x1F00).0,
        Op::Ldrex {
            n: R0,
            t: R1,
            imm32: 0
        }
    );
    assert_eq!(
        wide(0xE840, 0x1200).0,
        Op::Strex {
            n: R0,
            t: R1,
            d: R2,
            imm32: 0
        }
    );

    // tbb [r0, r1] / tbh [r0, r1, lsl #1]
    let (op, flags) = wide(0xE8D0, 0xF001);
    assert_eq!(op, Op::TableBranch { n: R0, m: R1 });
    assert!(!flags.contains(InstrFlags::TBH));
    let (op, flags) = wide(0xE8D0, 0xF011);
    assert_eq!(op, Op::TableBranch { n: R0, m: R1 });
    assert!(flags.contains(InstrFlags::TBH));
}

#[test]
fn load_store_multiple_wide() {
    // stmia.w r0!, {r4-r6}
    let (op, flags) = wide(0xE8A0, 0x0070);
    assert_eq!(
        op,
        Op::Stm {
            n: R0,
            registers: RegisterList(0x70)
        }
    );
    assert!(flags.contains(InstrFlags::WBACK));

    // push.w {r4, r5, lr} is stmdb sp!
    assert_eq!(
        wide(0xE92D, 0x4030).0,
        Op::Push {
            registers: RegisterList(0x4030)
        }
    );

    // pop.w {r4, r5, pc} is ldmia sp!
    assert_eq!(
        wide(0xE8BD, 0x8030).0,
        Op::Pop {
            registers: RegisterList(0x8030)
        }
    );

    // stm.w with the base in the list and write-back is unpredictable
    assert!(matches!(
        wide_err(0xE8A0, 0x0071),
        DecodeError::Unpredictable { .. }
    ));
}

#[test]
fn wide_branches() {
    // bl .+4
    assert_eq!(wide(0xF000, 0xF802).0, Op::Bl { imm32: 4 });
    // b.w .+8
    assert_eq!(wide(0xF000, 0xB804).0, Op::B { imm32: 8 });
    // bne.w .+4
    assert_eq!(
        wide(0xF040, 0x8002).0,
        Op::BCond {
            cond: Condition::Ne,
            imm32: 4
        }
    );
    // backwards bl .-12
    let (op, _) = wide(0xF7FF, 0xFFFA);
    assert_eq!(op, Op::Bl { imm32: (-12i32) as u32 });
}

#[test]
fn system_and_barriers() {
    // msr msp, r0
    assert_eq!(
        wide(0xF380, 0x8808).0,
        Op::Msr {
            n: R0,
            sysm: 8,
            mask: 0b10
        }
    );
    // mrs r0, msp
    assert_eq!(wide(0xF3EF, 0x8008).0, Op::Mrs { d: R0, sysm: 8 });
    // barriers
    assert_eq!(wide(0xF3BF, 0x8F5F).0, Op::Dmb);
    assert_eq!(wide(0xF3BF, 0x8F4F).0, Op::Dsb);
    assert_eq!(wide(0xF3BF, 0x8F6F).0, Op::Isb);
    // nop.w
    assert_eq!(wide(0xF3AF, 0x8000).0, Op::Nop);
    // udf.w
    assert!(matches!(
        wide_err(0xF7F0, 0xA000),
        DecodeError::Undefined { .. }
    ));
}

#[test]
fn unknown_coprocessor_space() {
    assert!(matches!(
        wide_err(0xEE00, 0x0A10),
        DecodeError::UnknownOpcode { .. }
    ));
}
