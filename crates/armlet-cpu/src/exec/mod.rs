//! The execute stage.
//!
//! Every instruction follows one protocol: evaluate the condition gate, read
//! operands, apply the primitive, write the destination (PC writes route
//! through the branch helpers), optionally fold carry/overflow into the
//! APSR, then advance the PC and the IT state unless a branch was taken.

use bitflags::bitflags;

use armlet_isa::alu;
use armlet_isa::{ImmCarry, Instr, InstrFlags, Op, RegisterId, Shift};
use armlet_memory::MemoryBus;

use crate::error::CpuError;
use crate::exceptions::{pend_usage_fault, UsageFaultKind};
use crate::host::Hooks;
use crate::state::CpuState;
use crate::{it, pc};

mod loadstore;
mod memops;
mod system;

bitflags! {
    /// Step outcome bits the run loop folds together.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ExecFlags: u8 {
        const BKPT_EXIT = 1 << 0;
        const BKPT_ERROR_EXIT = 1 << 1;
        const SVC_EXIT = 1 << 2;
        const SVC_ERROR_EXIT = 1 << 3;
    }
}

impl ExecFlags {
    /// Any of the host-requested terminations.
    pub fn requests_exit(self) -> bool {
        self.intersects(
            ExecFlags::BKPT_EXIT
                | ExecFlags::BKPT_ERROR_EXIT
                | ExecFlags::SVC_EXIT
                | ExecFlags::SVC_ERROR_EXIT,
        )
    }

    pub fn requests_error_exit(self) -> bool {
        self.intersects(ExecFlags::BKPT_ERROR_EXIT | ExecFlags::SVC_ERROR_EXIT)
    }
}

/// Result of a data-processing primitive. `None` means "preserve the current
/// APSR bit" (logical ops leave V alone; non-rotating immediates leave C).
pub(crate) struct OpResult {
    value: u32,
    carry: Option<bool>,
    overflow: Option<bool>,
}

impl OpResult {
    fn arithmetic((value, carry, overflow): (u32, bool, bool)) -> OpResult {
        OpResult {
            value,
            carry: Some(carry),
            overflow: Some(overflow),
        }
    }

    fn logical(value: u32, carry: Option<bool>) -> OpResult {
        OpResult {
            value,
            carry,
            overflow: None,
        }
    }

    fn plain(value: u32) -> OpResult {
        OpResult {
            value,
            carry: None,
            overflow: None,
        }
    }
}

/// Sequential retire: IT advance plus PC advance.
pub(crate) fn retire(state: &mut CpuState, instr: &Instr) {
    it::it_advance(state);
    pc::advance(state, instr.is_wide());
}

fn apply_flags(state: &mut CpuState, r: &OpResult) {
    let n = r.value & 0x8000_0000 != 0;
    let z = r.value == 0;
    let c = r.carry.unwrap_or_else(|| state.flag_c());
    let v = r.overflow.unwrap_or_else(|| state.flag_v());
    state.set_nzcv(n, z, c, v);
}

/// Destination write for data-processing ops; a PC destination turns the
/// instruction into a branch.
fn write_result(
    state: &mut CpuState,
    instr: &Instr,
    d: RegisterId,
    r: OpResult,
) -> Result<ExecFlags, CpuError> {
    if d.is_pc() {
        pc::alu_write_pc(state, r.value);
        it::it_advance(state);
    } else {
        state.write_reg(d, r.value);
        if instr.flags.contains(InstrFlags::SETFLAGS) {
            apply_flags(state, &r);
        }
        retire(state, instr);
    }
    Ok(ExecFlags::empty())
}

/// Compare/test ops always update the flags and write nothing.
fn set_flags_only(state: &mut CpuState, instr: &Instr, r: OpResult) -> Result<ExecFlags, CpuError> {
    apply_flags(state, &r);
    retire(state, instr);
    Ok(ExecFlags::empty())
}

fn shifted_operand(state: &CpuState, m: RegisterId, shift: Shift) -> (u32, bool) {
    alu::shift_c(state.read_reg(m), shift, state.flag_c())
}

pub(crate) fn execute(
    state: &mut CpuState,
    bus: &mut MemoryBus,
    instr: &Instr,
    hooks: &mut Hooks<'_>,
) -> Result<ExecFlags, CpuError> {
    let passed = match instr.op {
        Op::BCond { cond, .. } => it::condition_holds(state, cond),
        // IT writes its own state; CBZ/CBNZ are architecturally
        // unconditional (they cannot sit inside an IT block).
        Op::It { .. } | Op::CbNz { .. } => true,
        _ => it::condition_passed(state),
    };
    if !passed {
        retire(state, instr);
        return Ok(ExecFlags::empty());
    }

    let carry_in = state.flag_c();
    match instr.op {
        // -- moves and logicals, immediate ---------------------------------
        Op::MovImm { d, imm } => write_result(state, instr, d, imm_result(imm)),
        Op::MvnImm { d, imm } => {
            write_result(state, instr, d, OpResult::logical(!imm.imm32, imm.carry))
        }
        Op::AndImm { n, d, imm } => {
            let value = state.read_reg(n) & imm.imm32;
            write_result(state, instr, d, OpResult::logical(value, imm.carry))
        }
        Op::BicImm { n, d, imm } => {
            let value = state.read_reg(n) & !imm.imm32;
            write_result(state, instr, d, OpResult::logical(value, imm.carry))
        }
        Op::OrrImm { n, d, imm } => {
            let value = state.read_reg(n) | imm.imm32;
            write_result(state, instr, d, OpResult::logical(value, imm.carry))
        }
        Op::EorImm { n, d, imm } => {
            let value = state.read_reg(n) ^ imm.imm32;
            write_result(state, instr, d, OpResult::logical(value, imm.carry))
        }
        Op::TstImm { n, imm } => {
            let value = state.read_reg(n) & imm.imm32;
            set_flags_only(state, instr, OpResult::logical(value, imm.carry))
        }
        Op::TeqImm { n, imm } => {
            let value = state.read_reg(n) ^ imm.imm32;
            set_flags_only(state, instr, OpResult::logical(value, imm.carry))
        }

        // -- arithmetic, immediate -----------------------------------------
        Op::AddImm { n, d, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), imm32, false);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::AdcImm { n, d, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), imm32, carry_in);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::SubImm { n, d, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), !imm32, true);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::SbcImm { n, d, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), !imm32, carry_in);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::RsbImm { n, d, imm32 } => {
            let r = alu::add_with_carry(!state.read_reg(n), imm32, true);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::CmpImm { n, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), !imm32, true);
            set_flags_only(state, instr, OpResult::arithmetic(r))
        }
        Op::CmnImm { n, imm32 } => {
            let r = alu::add_with_carry(state.read_reg(n), imm32, false);
            set_flags_only(state, instr, OpResult::arithmetic(r))
        }
        Op::Adr { d, imm32 } => {
            let base = state.read_reg(RegisterId::Pc) & !3;
            let value = if instr.flags.contains(InstrFlags::ADD) {
                base.wrapping_add(imm32)
            } else {
                base.wrapping_sub(imm32)
            };
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Movt { d, imm16 } => {
            let value = (state.read_reg(d) & 0xFFFF) | (u32::from(imm16) << 16);
            write_result(state, instr, d, OpResult::plain(value))
        }

        // -- moves and logicals, register ----------------------------------
        Op::MovReg { d, m } => {
            let value = state.read_reg(m);
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::MvnReg { d, m, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            write_result(state, instr, d, OpResult::logical(!shifted, Some(carry)))
        }
        Op::AndReg { n, m, d, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) & shifted;
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }
        Op::BicReg { n, m, d, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) & !shifted;
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }
        Op::OrrReg { n, m, d, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) | shifted;
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }
        Op::EorReg { n, m, d, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) ^ shifted;
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }
        Op::TstReg { n, m, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) & shifted;
            set_flags_only(state, instr, OpResult::logical(value, Some(carry)))
        }
        Op::TeqReg { n, m, shift } => {
            let (shifted, carry) = shifted_operand(state, m, shift);
            let value = state.read_reg(n) ^ shifted;
            set_flags_only(state, instr, OpResult::logical(value, Some(carry)))
        }

        // -- arithmetic, register ------------------------------------------
        Op::AddReg { n, m, d, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), shifted, false);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::AdcReg { n, m, d, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), shifted, carry_in);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::SubReg { n, m, d, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), !shifted, true);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::SbcReg { n, m, d, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), !shifted, carry_in);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::RsbReg { n, m, d, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(!state.read_reg(n), shifted, true);
            write_result(state, instr, d, OpResult::arithmetic(r))
        }
        Op::CmpReg { n, m, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), !shifted, true);
            set_flags_only(state, instr, OpResult::arithmetic(r))
        }
        Op::CmnReg { n, m, shift } => {
            let shifted = alu::shift(state.read_reg(m), shift, carry_in);
            let r = alu::add_with_carry(state.read_reg(n), shifted, false);
            set_flags_only(state, instr, OpResult::arithmetic(r))
        }

        // -- shifts --------------------------------------------------------
        Op::ShiftImm { d, m, shift } => {
            let (value, carry) = shifted_operand(state, m, shift);
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }
        Op::ShiftReg { n, m, d, kind } => {
            let amount = (state.read_reg(m) & 0xFF) as u8;
            let (value, carry) = alu::shift_c(
                state.read_reg(n),
                Shift { kind, amount },
                carry_in,
            );
            write_result(state, instr, d, OpResult::logical(value, Some(carry)))
        }

        // -- misc data processing ------------------------------------------
        Op::Clz { d, m } => {
            let value = alu::count_leading_zeros(state.read_reg(m));
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Sxtb { d, m, rotation } => {
            let rotated = state.read_reg(m).rotate_right(u32::from(rotation));
            write_result(state, instr, d, OpResult::plain(alu::sign_extend(rotated, 8)))
        }
        Op::Sxth { d, m, rotation } => {
            let rotated = state.read_reg(m).rotate_right(u32::from(rotation));
            write_result(state, instr, d, OpResult::plain(alu::sign_extend(rotated, 16)))
        }
        Op::Uxtb { d, m, rotation } => {
            let rotated = state.read_reg(m).rotate_right(u32::from(rotation));
            write_result(state, instr, d, OpResult::plain(rotated & 0xFF))
        }
        Op::Uxth { d, m, rotation } => {
            let rotated = state.read_reg(m).rotate_right(u32::from(rotation));
            write_result(state, instr, d, OpResult::plain(rotated & 0xFFFF))
        }
        Op::Bfi { n, d, lsb, msb } => {
            let width = u32::from(msb) - u32::from(lsb) + 1;
            let field_mask = (((1u64 << width) - 1) as u32) << lsb;
            let inserted = (state.read_reg(n) << lsb) & field_mask;
            let value = (state.read_reg(d) & !field_mask) | inserted;
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Ubfx { n, d, lsb, width_minus_1 } => {
            let msb = u32::from(lsb) + u32::from(width_minus_1);
            if msb > 31 {
                return Err(CpuError::Unpredictable);
            }
            let mask = ((1u64 << (u32::from(width_minus_1) + 1)) - 1) as u32;
            let value = (state.read_reg(n) >> lsb) & mask;
            write_result(state, instr, d, OpResult::plain(value))
        }

        // -- multiply and divide -------------------------------------------
        Op::Mul { n, m, d } => {
            let value = state.read_reg(n).wrapping_mul(state.read_reg(m));
            write_result(state, instr, d, OpResult::logical(value, None))
        }
        Op::Mla { n, m, a, d } => {
            let value = state
                .read_reg(n)
                .wrapping_mul(state.read_reg(m))
                .wrapping_add(state.read_reg(a));
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Mls { n, m, a, d } => {
            let value = state
                .read_reg(a)
                .wrapping_sub(state.read_reg(n).wrapping_mul(state.read_reg(m)));
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Umull { n, m, d_lo, d_hi } => {
            let product = u64::from(state.read_reg(n)) * u64::from(state.read_reg(m));
            write_long(state, instr, d_lo, d_hi, product)
        }
        Op::Smull { n, m, d_lo, d_hi } => {
            let product = i64::from(state.read_reg(n) as i32) * i64::from(state.read_reg(m) as i32);
            write_long(state, instr, d_lo, d_hi, product as u64)
        }
        Op::Umlal { n, m, d_lo, d_hi } => {
            let product = u64::from(state.read_reg(n)) * u64::from(state.read_reg(m));
            let acc = (u64::from(state.read_reg(d_hi)) << 32) | u64::from(state.read_reg(d_lo));
            write_long(state, instr, d_lo, d_hi, acc.wrapping_add(product))
        }
        Op::Smlal { n, m, d_lo, d_hi } => {
            let product = i64::from(state.read_reg(n) as i32) * i64::from(state.read_reg(m) as i32);
            let acc = ((u64::from(state.read_reg(d_hi)) << 32) | u64::from(state.read_reg(d_lo)))
                as i64;
            write_long(state, instr, d_lo, d_hi, acc.wrapping_add(product) as u64)
        }
        Op::Udiv { n, m, d } => {
            let divisor = state.read_reg(m);
            let value = if divisor == 0 {
                if state.div_0_trp() {
                    pend_usage_fault(state, UsageFaultKind::DivByZero);
                }
                0
            } else {
                state.read_reg(n) / divisor
            };
            write_result(state, instr, d, OpResult::plain(value))
        }
        Op::Sdiv { n, m, d } => {
            let divisor = state.read_reg(m) as i32;
            let value = if divisor == 0 {
                if state.div_0_trp() {
                    pend_usage_fault(state, UsageFaultKind::DivByZero);
                }
                0
            } else {
                (state.read_reg(n) as i32).wrapping_div(divisor) as u32
            };
            write_result(state, instr, d, OpResult::plain(value))
        }

        // -- branches ------------------------------------------------------
        Op::B { imm32 } | Op::BCond { imm32, .. } => {
            let target = state.read_reg(RegisterId::Pc).wrapping_add(imm32);
            pc::branch_write_pc(state, target);
            it::it_advance(state);
            Ok(ExecFlags::empty())
        }
        Op::Bl { imm32 } => {
            let next = state.read_reg(RegisterId::Pc);
            state.write_reg(RegisterId::Lr, next | 1);
            pc::branch_write_pc(state, next.wrapping_add(imm32));
            it::it_advance(state);
            Ok(ExecFlags::empty())
        }
        Op::Bx { m } => {
            let target = state.read_reg(m);
            pc::bx_write_pc(state, target)?;
            it::it_advance(state);
            Ok(ExecFlags::empty())
        }
        Op::Blx { m } => {
            let target = state.read_reg(m);
            let next = state.read_reg(RegisterId::Pc).wrapping_sub(2);
            state.write_reg(RegisterId::Lr, next | 1);
            pc::blx_write_pc(state, target)?;
            it::it_advance(state);
            Ok(ExecFlags::empty())
        }
        Op::CbNz { n, imm32 } => {
            let is_zero = state.read_reg(n) == 0;
            let branch_on_nonzero = instr.flags.contains(InstrFlags::NONZERO);
            if is_zero != branch_on_nonzero {
                let target = state.read_reg(RegisterId::Pc).wrapping_add(imm32);
                pc::branch_write_pc(state, target);
            } else {
                pc::advance(state, instr.is_wide());
            }
            Ok(ExecFlags::empty())
        }
        Op::TableBranch { n, m } => loadstore::table_branch(state, bus, instr, n, m),

        // -- loads and stores ----------------------------------------------
        Op::LdrLit { t, imm32 } => loadstore::ldr_literal(state, bus, instr, t, imm32),
        Op::LdrImm { n, t, imm32 } | Op::Ldrex { n, t, imm32 } => {
            loadstore::load_imm(state, bus, instr, n, t, imm32, loadstore::Width::Word, false)
        }
        Op::LdrbImm { n, t, imm32 } => {
            loadstore::load_imm(state, bus, instr, n, t, imm32, loadstore::Width::Byte, false)
        }
        Op::LdrhImm { n, t, imm32 } => {
            loadstore::load_imm(state, bus, instr, n, t, imm32, loadstore::Width::Half, false)
        }
        Op::LdrsbImm { n, t, imm32 } => {
            loadstore::load_imm(state, bus, instr, n, t, imm32, loadstore::Width::Byte, true)
        }
        Op::LdrshImm { n, t, imm32 } => {
            loadstore::load_imm(state, bus, instr, n, t, imm32, loadstore::Width::Half, true)
        }
        Op::StrImm { n, t, imm32 } => {
            loadstore::store_imm(state, bus, instr, n, t, imm32, loadstore::Width::Word)
        }
        Op::StrbImm { n, t, imm32 } => {
            loadstore::store_imm(state, bus, instr, n, t, imm32, loadstore::Width::Byte)
        }
        Op::StrhImm { n, t, imm32 } => {
            loadstore::store_imm(state, bus, instr, n, t, imm32, loadstore::Width::Half)
        }
        Op::Strex { n, t, d, imm32 } => loadstore::strex(state, bus, instr, n, t, d, imm32),
        Op::LdrReg { n, m, t, shift } => {
            loadstore::load_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Word, false)
        }
        Op::LdrbReg { n, m, t, shift } => {
            loadstore::load_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Byte, false)
        }
        Op::LdrhReg { n, m, t, shift } => {
            loadstore::load_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Half, false)
        }
        Op::LdrsbReg { n, m, t, shift } => {
            loadstore::load_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Byte, true)
        }
        Op::LdrshReg { n, m, t, shift } => {
            loadstore::load_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Half, true)
        }
        Op::StrReg { n, m, t, shift } => {
            loadstore::store_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Word)
        }
        Op::StrbReg { n, m, t, shift } => {
            loadstore::store_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Byte)
        }
        Op::StrhReg { n, m, t, shift } => {
            loadstore::store_reg(state, bus, instr, n, m, t, shift, loadstore::Width::Half)
        }
        Op::Ldrd { n, t, t2, imm32 } => loadstore::ldrd(state, bus, instr, n, t, t2, imm32),
        Op::Strd { n, t, t2, imm32 } => loadstore::strd(state, bus, instr, n, t, t2, imm32),
        Op::Ldm { n, registers } => loadstore::ldm(state, bus, instr, n, registers),
        Op::Stm { n, registers } => loadstore::stm(state, bus, instr, n, registers),
        Op::Push { registers } => loadstore::push(state, bus, instr, registers),
        Op::Pop { registers } => loadstore::pop(state, bus, instr, registers),

        // -- system --------------------------------------------------------
        Op::It { firstcond, mask } => {
            state.set_istate((firstcond << 4) | mask);
            // No IT advance: that would consume the state just written.
            pc::advance(state, instr.is_wide());
            Ok(ExecFlags::empty())
        }
        Op::Svc { imm32 } => system::svc(state, bus, instr, imm32, hooks),
        Op::Bkpt { imm32 } => system::bkpt(state, bus, instr, imm32, hooks),
        Op::Msr { n, sysm, mask } => system::msr(state, instr, n, sysm, mask),
        Op::Mrs { d, sysm } => system::mrs(state, instr, d, sysm),
        Op::Nop | Op::Dmb | Op::Dsb | Op::Isb => {
            retire(state, instr);
            Ok(ExecFlags::empty())
        }
    }
}

fn imm_result(imm: ImmCarry) -> OpResult {
    OpResult::logical(imm.imm32, imm.carry)
}

fn write_long(
    state: &mut CpuState,
    instr: &Instr,
    d_lo: RegisterId,
    d_hi: RegisterId,
    value: u64,
) -> Result<ExecFlags, CpuError> {
    state.write_reg(d_lo, value as u32);
    state.write_reg(d_hi, (value >> 32) as u32);
    retire(state, instr);
    Ok(ExecFlags::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_flags_exit_classification() {
        assert!(ExecFlags::BKPT_EXIT.requests_exit());
        assert!(ExecFlags::SVC_ERROR_EXIT.requests_exit());
        assert!(ExecFlags::SVC_ERROR_EXIT.requests_error_exit());
        assert!(!ExecFlags::BKPT_EXIT.requests_error_exit());
        assert!(!ExecFlags::empty().requests_exit());
    }
}
