//! ARMv7-M processor core: architectural state, fetch, decode dispatch, and
//! the execute stage.
//!
//! The core is deliberately passive about exceptions: faults are latched in
//! the pending set and the CFSR, and the surrounding run loop decides what a
//! latched fault means for the session. One [`CpuCore::step`] performs
//! exactly one fetch → decode → execute cycle.

mod error;
pub mod exceptions;
mod exec;
mod fetch;
mod host;
pub mod it;
pub mod pc;
mod state;

pub use error::CpuError;
pub use exec::ExecFlags;
pub use fetch::fetch;
pub use host::{BkptHandler, Hooks, HostCallError, HostRequest, SvcHandler};
pub use state::{apsr, ccr, control, epsr, CpuState, SpecialReg};

use armlet_decoder::{decode, DecodeError, ItPosition};
use armlet_memory::MemoryBus;

use exceptions::{pend_usage_fault, UsageFaultKind};

/// One ARMv7-M core bound to its architectural state.
///
/// The bus and the host delegates are borrowed per step, so the caller keeps
/// ownership of both (mirrors how the surrounding machine wires devices).
#[derive(Debug)]
pub struct CpuCore {
    pub state: CpuState,
}

impl CpuCore {
    /// Core reset: Thumb execution at `entry` (bit 0 = T), MSP = `sp`.
    pub fn new(entry: u32, sp: u32) -> CpuCore {
        CpuCore {
            state: CpuState::reset(entry, sp),
        }
    }

    /// Executes a single instruction.
    ///
    /// All side effects of the step (register/memory writes, flag updates,
    /// IT advance, PC update, latched exceptions) are visible when this
    /// returns; pending exceptions latched here are consumed by the caller
    /// between steps.
    pub fn step(
        &mut self,
        bus: &mut MemoryBus,
        hooks: &mut Hooks<'_>,
    ) -> Result<ExecFlags, CpuError> {
        if !self.state.thumb_state() {
            // Thumb-only core; leaving Thumb state is an INVSTATE fault.
            pend_usage_fault(&mut self.state, UsageFaultKind::InvState);
            return Err(CpuError::UsageFault(UsageFaultKind::InvState));
        }

        let raw = fetch::fetch(&mut self.state, bus)?;
        let it = ItPosition {
            in_it_block: it::in_it_block(&self.state),
            last_in_it_block: it::last_in_it_block(&self.state),
        };
        let instr = match decode(raw, it) {
            Ok(instr) => instr,
            Err(e) => {
                if matches!(
                    e,
                    DecodeError::Undefined { .. } | DecodeError::UnknownOpcode { .. }
                ) {
                    pend_usage_fault(&mut self.state, UsageFaultKind::UndefInstr);
                }
                return Err(e.into());
            }
        };
        exec::execute(&mut self.state, bus, &instr, hooks)
    }
}
