//! Delegate interface for BKPT and SVC host services.
//!
//! The executor hands BKPT/SVC immediates to a registered handler; the
//! handler answers with request flags. An unhandled instruction (no handler,
//! or no `OMIT_EXCEPTION` in the reply) pends the architectural exception
//! instead.

use bitflags::bitflags;
use thiserror::Error;

use armlet_memory::{BusError, MemoryBus};

use crate::state::CpuState;

bitflags! {
    /// What a BKPT/SVC handler asks of the run loop.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct HostRequest: u8 {
        /// Clean application exit.
        const EXIT = 1 << 0;
        /// Exit with an error status.
        const ERROR_EXIT = 1 << 1;
        /// The handler claimed the instruction; skip the exception.
        const OMIT_EXCEPTION = 1 << 2;
    }
}

/// Errors a host service can produce.
#[derive(Debug, Error)]
pub enum HostCallError {
    #[error("unsupported host operation {op:#x}")]
    Unsupported { op: u32 },
    #[error("unexpected argument to host operation {op:#x}")]
    Unexpected { op: u32 },
    #[error("argument out of range for host operation {op:#x}")]
    OutOfRange { op: u32 },
    #[error("open failed for {path:?}")]
    OpenFailed { path: String },
    #[error(transparent)]
    Memory(#[from] BusError),
    #[error("host i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Receiver of BKPT immediates (semihosting lives behind this).
pub trait BkptHandler {
    fn bkpt(
        &mut self,
        imm32: u32,
        state: &mut CpuState,
        bus: &mut MemoryBus,
    ) -> Result<HostRequest, HostCallError>;

    /// Status handed to the host process when an exit was requested.
    fn exit_status(&self) -> u32 {
        0
    }
}

/// Receiver of SVC immediates.
pub trait SvcHandler {
    fn svc(
        &mut self,
        imm32: u32,
        state: &mut CpuState,
        bus: &mut MemoryBus,
    ) -> Result<HostRequest, HostCallError>;
}

/// The delegates threaded through one execution step.
#[derive(Default)]
pub struct Hooks<'a> {
    pub bkpt: Option<&'a mut dyn BkptHandler>,
    pub svc: Option<&'a mut dyn SvcHandler>,
}
