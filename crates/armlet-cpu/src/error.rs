use armlet_decoder::DecodeError;
use armlet_memory::BusError;
use thiserror::Error;

use crate::exceptions::UsageFaultKind;
use crate::host::HostCallError;

/// Terminal error of a single execution step.
///
/// Memory errors arrive here only after the corresponding bus fault has been
/// latched in the CFSR; decode errors after UNDEFINSTR has been latched.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Memory(#[from] BusError),
    /// Execution-time UNPREDICTABLE (e.g. UBFX range past bit 31).
    #[error("unpredictable execution")]
    Unpredictable,
    /// Execution-time UNDEFINED (e.g. STM write-back with a mis-ordered base).
    #[error("undefined execution")]
    Undefined,
    /// Architecturally specified behavior this core does not model.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// A UsageFault that aborts the step (INVSTATE, UNALIGNED).
    #[error("usage fault: {0:?}")]
    UsageFault(UsageFaultKind),
    #[error(transparent)]
    Host(#[from] HostCallError),
}
