//! The assembled emulator: loader output + bus + CPU core + semihosting,
//! driven by a synchronous run loop.
//!
//! One `Machine` owns one processor state and its bus. Each iteration runs
//! the pre-step hook, consumes latched faults, executes one instruction,
//! folds the step's exit requests into the session, and runs the post-step
//! hook. Callers bound execution with a step budget; the loop only ever
//! stops between instructions.

use thiserror::Error;
use tracing::{debug, info};

use armlet_cpu::exceptions;
use armlet_cpu::{BkptHandler, CpuCore, CpuError, CpuState, ExecFlags, Hooks};
use armlet_elf::LoadedImage;
use armlet_memory::{BusError, MemoryBus};
use armlet_semihost::SemihostAgent;

/// Why `run` returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Clean exit requested through semihosting.
    Exit,
    /// Error exit requested through semihosting.
    ErrorExit,
    /// An unrecoverable fault was latched (or a step failed outright).
    Fault,
    /// The step budget ran out; the machine can be resumed.
    BudgetExhausted,
}

/// Final report of a run.
#[derive(Debug)]
pub struct RunExit {
    pub status: RunStatus,
    /// Guest-supplied exit status (EXIT_EXTENDED subcode; 0 for plain EXIT).
    pub exit_code: u32,
    pub steps: u64,
    /// The step error behind a `Fault` status, when there was one.
    pub error: Option<CpuError>,
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The image has no vector table and the caller supplied no stack.
    #[error("image provides no initial stack pointer")]
    MissingStackPointer,
}

/// Per-step observer; receives the state and the bus before (or after) each
/// step.
pub type StepHook = Box<dyn FnMut(&CpuState, &MemoryBus)>;

pub struct Machine {
    cpu: CpuCore,
    bus: MemoryBus,
    semihost: SemihostAgent,
    pre_step: Option<StepHook>,
    post_step: Option<StepHook>,
    flags: ExecFlags,
}

impl Machine {
    /// Builds a machine over an already-populated bus.
    pub fn new(bus: MemoryBus, entry: u32, sp: u32) -> Machine {
        Machine {
            cpu: CpuCore::new(entry, sp),
            bus,
            semihost: SemihostAgent::new(),
            pre_step: None,
            post_step: None,
            flags: ExecFlags::empty(),
        }
    }

    /// Builds a machine from loader output: one bus region per loadable
    /// segment, SP from the vector table.
    pub fn from_image(image: &LoadedImage) -> Result<Machine, MachineError> {
        Self::from_image_with_sp(image, image.initial_sp)
    }

    /// As [`Machine::from_image`], with the stack pointer overridden.
    pub fn from_image_with_sp(
        image: &LoadedImage,
        initial_sp: Option<u32>,
    ) -> Result<Machine, MachineError> {
        let sp = initial_sp.ok_or(MachineError::MissingStackPointer)?;
        let mut bus = MemoryBus::new();
        for region in &image.regions {
            let name = if region.writable { "ram" } else { "flash" };
            bus.register(name, region.base, region.data.clone(), region.writable)?;
        }
        debug!(
            entry = format_args!("{:#010x}", image.entry),
            sp = format_args!("{sp:#010x}"),
            regions = image.regions.len(),
            "machine assembled"
        );
        Ok(Machine::new(bus, image.entry, sp))
    }

    pub fn cpu(&self) -> &CpuCore {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuCore {
        &mut self.cpu
    }

    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    pub fn semihost(&self) -> &SemihostAgent {
        &self.semihost
    }

    /// Replaces the semihosting agent (e.g. to capture guest stdout).
    pub fn set_semihost(&mut self, agent: SemihostAgent) {
        self.semihost = agent;
    }

    pub fn set_pre_step(&mut self, hook: StepHook) {
        self.pre_step = Some(hook);
    }

    pub fn set_post_step(&mut self, hook: StepHook) {
        self.post_step = Some(hook);
    }

    /// Executes one instruction.
    pub fn step(&mut self) -> Result<ExecFlags, CpuError> {
        let mut hooks = Hooks {
            bkpt: Some(&mut self.semihost),
            svc: None,
        };
        self.cpu.step(&mut self.bus, &mut hooks)
    }

    /// Runs until the guest exits, a fault latches, or the optional step
    /// budget is exhausted.
    pub fn run(&mut self, max_steps: Option<u64>) -> RunExit {
        let mut steps = 0u64;
        loop {
            if let Some(budget) = max_steps {
                if steps >= budget {
                    debug!(steps, "step budget exhausted");
                    return self.exit(RunStatus::BudgetExhausted, steps, None);
                }
            }
            if let Some(hook) = self.pre_step.as_mut() {
                hook(&self.cpu.state, &self.bus);
            }
            // Pending faults are consumed between instructions; this core
            // does not take exceptions, so a latched fault ends the session.
            if exceptions::fault_pending(&self.cpu.state) {
                debug!(cfsr = format_args!("{:#010x}", self.cpu.state.cfsr()), "fault latched");
                return self.exit(RunStatus::Fault, steps, None);
            }
            let mut hooks = Hooks {
                bkpt: Some(&mut self.semihost),
                svc: None,
            };
            match self.cpu.step(&mut self.bus, &mut hooks) {
                Ok(flags) => {
                    steps += 1;
                    self.flags |= flags;
                    if flags.requests_exit() {
                        let status = if flags.requests_error_exit() {
                            RunStatus::ErrorExit
                        } else {
                            RunStatus::Exit
                        };
                        return self.exit(status, steps, None);
                    }
                }
                Err(error) => {
                    debug!(%error, pc = format_args!("{:#010x}", self.cpu.state.pc()), "step failed");
                    return self.exit(RunStatus::Fault, steps.wrapping_add(1), Some(error));
                }
            }
            if let Some(hook) = self.post_step.as_mut() {
                hook(&self.cpu.state, &self.bus);
            }
        }
    }

    fn exit(&self, status: RunStatus, steps: u64, error: Option<CpuError>) -> RunExit {
        let exit_code = self.semihost.exit_status();
        info!(?status, exit_code, steps, "run finished");
        RunExit {
            status,
            exit_code,
            steps,
            error,
        }
    }
}
