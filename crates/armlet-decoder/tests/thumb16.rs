use armlet_decoder::{decode, DecodeError, ItPosition};
use armlet_isa::{
    Condition, ImmCarry, InstrFlags, Op, RawInstr, RegisterId::*, RegisterList, Shift, ShiftType,
};

fn narrow(hw: u16) -> (Op, InstrFlags) {
    let instr = decode(RawInstr::Narrow(hw), ItPosition::OUTSIDE).unwrap();
    (instr.op, instr.flags)
}

fn narrow_in_it(hw: u16) -> (Op, InstrFlags) {
    let it = ItPosition {
        in_it_block: true,
        last_in_it_block: false,
    };
    let instr = decode(RawInstr::Narrow(hw), it).unwrap();
    (instr.op, instr.flags)
}

#[test]
fn add_register_t1() {
    // adds r0, r0, r1
    let (op, flags) = narrow(0x1840);
    assert_eq!(
        op,
        Op::AddReg {
            n: R0,
            m: R1,
            d: R0,
            shift: Shift::NONE
        }
    );
    assert!(flags.contains(InstrFlags::SETFLAGS));

    // Inside an IT block the implicit S bit is clear.
    let (_, flags) = narrow_in_it(0x1840);
    assert!(!flags.contains(InstrFlags::SETFLAGS));
}

#[test]
fn mov_cmp_add_sub_immediate() {
    // movs r0, #42
    let (op, flags) = narrow(0x202A);
    assert_eq!(
        op,
        Op::MovImm {
            d: R0,
            imm: ImmCarry::plain(42)
        }
    );
    assert!(flags.contains(InstrFlags::SETFLAGS));

    // cmp r0, #5
    let (op, _) = narrow(0x2805);
    assert_eq!(op, Op::CmpImm { n: R0, imm32: 5 });

    // adds r0, #1
    let (op, _) = narrow(0x3001);
    assert_eq!(
        op,
        Op::AddImm {
            n: R0,
            d: R0,
            imm32: 1
        }
    );

    // subs r2, #16
    let (op, _) = narrow(0x3A10);
    assert_eq!(
        op,
        Op::SubImm {
            n: R2,
            d: R2,
            imm32: 16
        }
    );
}

#[test]
fn shift_immediate_t1() {
    // lsls r1, r2, #3
    let (op, flags) = narrow(0x00D1);
    assert_eq!(
        op,
        Op::ShiftImm {
            d: R1,
            m: R2,
            shift: Shift {
                kind: ShiftType::Lsl,
                amount: 3
            }
        }
    );
    assert!(flags.contains(InstrFlags::SETFLAGS));

    // lsrs r0, r0, #32 is encoded with imm5 = 0.
    let (op, _) = narrow(0x0800);
    assert_eq!(
        op,
        Op::ShiftImm {
            d: R0,
            m: R0,
            shift: Shift {
                kind: ShiftType::Lsr,
                amount: 32
            }
        }
    );
}

#[test]
fn data_processing_register_t1() {
    // ands r0, r1
    let (op, _) = narrow(0x4008);
    assert_eq!(
        op,
        Op::AndReg {
            n: R0,
            m: R1,
            d: R0,
            shift: Shift::NONE
        }
    );

    // muls r0, r1, r0
    let (op, _) = narrow(0x4348);
    assert_eq!(op, Op::Mul { n: R1, m: R0, d: R0 });

    // rsbs r0, r1, #0 (negs)
    let (op, _) = narrow(0x4248);
    assert_eq!(
        op,
        Op::RsbImm {
            n: R1,
            d: R0,
            imm32: 0
        }
    );

    // lsls r3, r4 (register)
    let (op, _) = narrow(0x40A3);
    assert_eq!(
        op,
        Op::ShiftReg {
            n: R3,
            m: R4,
            d: R3,
            kind: ShiftType::Lsl
        }
    );
}

#[test]
fn special_data_and_branch_exchange() {
    // mov r8, r0 never sets flags.
    let (op, flags) = narrow(0x4680);
    assert_eq!(op, Op::MovReg { d: R8, m: R0 });
    assert!(!flags.contains(InstrFlags::SETFLAGS));

    // add r1, sp
    let (op, _) = narrow(0x4469);
    assert_eq!(
        op,
        Op::AddReg {
            n: R1,
            m: Sp,
            d: R1,
            shift: Shift::NONE
        }
    );

    // bx lr / blx r3
    assert_eq!(narrow(0x4770).0, Op::Bx { m: Lr });
    assert_eq!(narrow(0x4798).0, Op::Blx { m: R3 });
}

#[test]
fn load_store_encodings() {
    // ldr r0, [pc, #8]
    let (op, flags) = narrow(0x4802);
    assert_eq!(op, Op::LdrLit { t: R0, imm32: 8 });
    assert!(flags.contains(InstrFlags::ADD));

    // str r1, [r2, r3]
    assert_eq!(
        narrow(0x50D1).0,
        Op::StrReg {
            n: R2,
            m: R3,
            t: R1,
            shift: Shift::NONE
        }
    );

    // ldr r0, [r1, #4]
    assert_eq!(
        narrow(0x6848).0,
        Op::LdrImm {
            n: R1,
            t: R0,
            imm32: 4
        }
    );

    // strb r0, [r1, #1]
    assert_eq!(
        narrow(0x7048).0,
        Op::StrbImm {
            n: R1,
            t: R0,
            imm32: 1
        }
    );

    // ldrh r2, [r3, #6]
    assert_eq!(
        narrow(0x88DA).0,
        Op::LdrhImm {
            n: R3,
            t: R2,
            imm32: 6
        }
    );

    // str r0, [sp, #8] / ldr r0, [sp, #8]
    assert_eq!(
        narrow(0x9002).0,
        Op::StrImm {
            n: Sp,
            t: R0,
            imm32: 8
        }
    );
    assert_eq!(
        narrow(0x9802).0,
        Op::LdrImm {
            n: Sp,
            t: R0,
            imm32: 8
        }
    );
}

#[test]
fn sp_adjust_and_adr() {
    // add r1, sp, #12
    assert_eq!(
        narrow(0xA903).0,
        Op::AddImm {
            n: Sp,
            d: R1,
            imm32: 12
        }
    );
    // adr r0, .+16
    let (op, flags) = narrow(0xA004);
    assert_eq!(op, Op::Adr { d: R0, imm32: 16 });
    assert!(flags.contains(InstrFlags::ADD));
    // add sp, #8 / sub sp, #8
    assert_eq!(
        narrow(0xB002).0,
        Op::AddImm {
            n: Sp,
            d: Sp,
            imm32: 8
        }
    );
    assert_eq!(
        narrow(0xB082).0,
        Op::SubImm {
            n: Sp,
            d: Sp,
            imm32: 8
        }
    );
}

#[test]
fn misc_sixteen_bit() {
    // sxtb r0, r1 / uxth r2, r3
    assert_eq!(
        narrow(0xB248).0,
        Op::Sxtb {
            d: R0,
            m: R1,
            rotation: 0
        }
    );
    assert_eq!(
        narrow(0xB29A).0,
        Op::Uxth {
            d: R2,
            m: R3,
            rotation: 0
        }
    );

    // cbz r0, .+6 / cbnz r1, .+4
    let (op, flags) = narrow(0xB118);
    assert_eq!(op, Op::CbNz { n: R0, imm32: 6 });
    assert!(!flags.contains(InstrFlags::NONZERO));
    let (op, flags) = narrow(0xB911);
    assert_eq!(op, Op::CbNz { n: R1, imm32: 4 });
    assert!(flags.contains(InstrFlags::NONZERO));

    // push {r4, r5, lr} / pop {r4, r5, pc}
    assert_eq!(
        narrow(0xB530).0,
        Op::Push {
            registers: RegisterList(0x4030)
        }
    );
    assert_eq!(
        narrow(0xBD30).0,
        Op::Pop {
            registers: RegisterList(0x8030)
        }
    );

    // bkpt #0xAB
    assert_eq!(narrow(0xBEAB).0, Op::Bkpt { imm32: 0xAB });

    // nop and the other hints
    assert_eq!(narrow(0xBF00).0, Op::Nop);
    assert_eq!(narrow(0xBF10).0, Op::Nop); // yield
    assert_eq!(narrow(0xBF30).0, Op::Nop); // wfi
}

#[test]
fn it_instruction() {
    // it gt
    assert_eq!(
        narrow(0xBFC8).0,
        Op::It {
            firstcond: 0b1100,
            mask: 0b1000
        }
    );
    // ite gt
    assert_eq!(
        narrow(0xBFCC).0,
        Op::It {
            firstcond: 0b1100,
            mask: 0b1100
        }
    );
    // IT inside an IT block is unpredictable.
    let it = ItPosition {
        in_it_block: true,
        last_in_it_block: false,
    };
    assert!(matches!(
        decode(RawInstr::Narrow(0xBFC8), it),
        Err(DecodeError::Unpredictable { .. })
    ));
}

#[test]
fn load_store_multiple_t1() {
    // stmia r0!, {r1, r2}
    let (op, flags) = narrow(0xC006);
    assert_eq!(
        op,
        Op::Stm {
            n: R0,
            registers: RegisterList(0x06)
        }
    );
    assert!(flags.contains(InstrFlags::WBACK));

    // ldmia r0!, {r1, r2}: write-back because r0 is not in the list.
    let (op, flags) = narrow(0xC806);
    assert_eq!(
        op,
        Op::Ldm {
            n: R0,
            registers: RegisterList(0x06)
        }
    );
    assert!(flags.contains(InstrFlags::WBACK));

    // ldmia r0, {r0, r1}: no write-back, base is loaded.
    let (_, flags) = narrow(0xC803);
    assert!(!flags.contains(InstrFlags::WBACK));
}

#[test]
fn branches_svc_and_udf() {
    // beq .+4 (imm8 = 2)
    let (op, _) = narrow(0xD002);
    assert_eq!(
        op,
        Op::BCond {
            cond: Condition::Eq,
            imm32: 4
        }
    );

    // blt .-8 (imm8 = 0xFC)
    let (op, _) = narrow(0xDBFC);
    assert_eq!(
        op,
        Op::BCond {
            cond: Condition::Lt,
            imm32: (-8i32) as u32
        }
    );

    // svc #5
    assert_eq!(narrow(0xDF05).0, Op::Svc { imm32: 5 });

    // The 0b1110 condition is permanently undefined.
    assert!(matches!(
        decode(RawInstr::Narrow(0xDE00), ItPosition::OUTSIDE),
        Err(DecodeError::Undefined { .. })
    ));

    // b .+8 (imm11 = 4)
    assert_eq!(narrow(0xE004).0, Op::B { imm32: 8 });
    // b .-4 (imm11 = 0x7FE)
    assert_eq!(
        narrow(0xE7FE).0,
        Op::B {
            imm32: (-4i32) as u32
        }
    );
}

#[test]
fn conditional_branch_is_unpredictable_in_it_block() {
    let it = ItPosition {
        in_it_block: true,
        last_in_it_block: false,
    };
    assert!(matches!(
        decode(RawInstr::Narrow(0xD002), it),
        Err(DecodeError::Unpredictable { .. })
    ));
    // CBZ as well.
    assert!(matches!(
        decode(RawInstr::Narrow(0xB118), it),
        Err(DecodeError::Unpredictable { .. })
    ));
}

#[test]
fn empty_register_lists_are_rejected() {
    assert!(matches!(
        decode(RawInstr::Narrow(0xB400), ItPosition::OUTSIDE),
        Err(DecodeError::Unpredictable { .. })
    ));
    assert!(matches!(
        decode(RawInstr::Narrow(0xBC00), ItPosition::OUTSIDE),
        Err(DecodeError::Unpredictable { .. })
    ));
}
