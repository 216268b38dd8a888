//! ARM semihosting over BKPT 0xAB.
//!
//! The guest selects an operation in r0 and points r1 at a parameter block;
//! the agent performs the host side (console output, clock, exit) and puts
//! the result back in r0. Only the terminal-oriented subset is implemented:
//! `:tt` handles for stdin/stdout/stderr, the `:semihosting-features` probe,
//! and the EXIT/EXIT_EXTENDED exit path.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, trace};

use armlet_cpu::{BkptHandler, CpuState, HostCallError, HostRequest};
use armlet_isa::RegisterId;
use armlet_memory::MemoryBus;

/// Semihosting operation selectors.
mod ops {
    pub const OPEN: u32 = 0x01;
    pub const CLOSE: u32 = 0x02;
    pub const WRITE: u32 = 0x05;
    pub const READ: u32 = 0x06;
    pub const IS_ERROR: u32 = 0x08;
    pub const IS_TTY: u32 = 0x09;
    pub const SEEK: u32 = 0x0A;
    pub const FLEN: u32 = 0x0C;
    pub const CLOCK: u32 = 0x10;
    pub const ERRNO: u32 = 0x13;
    pub const GET_CMDLINE: u32 = 0x15;
    pub const HEAPINFO: u32 = 0x16;
    pub const EXIT: u32 = 0x18;
    pub const EXIT_EXTENDED: u32 = 0x20;
}

/// `ADP_Stopped_ApplicationExit`: the one reason code that means success.
const REASON_APPLICATION_EXIT: u32 = 0x20026;

const HANDLE_STDIN: u32 = 1;
const HANDLE_STDOUT: u32 = 2;
const HANDLE_STDERR: u32 = 3;
const HANDLE_FEATURES: u32 = 4;

/// Magic + feature byte: EXIT_EXTENDED and separate stdout/stderr.
const FEATURE_DATA: [u8; 5] = [b'S', b'H', b'F', b'B', 0x03];

/// The BKPT immediate reserved for semihosting calls.
const SEMIHOST_BKPT_IMM: u32 = 0xAB;

/// Host side of the semihosting contract.
///
/// One agent lives for the whole emulator session; it remembers the read
/// cursor into the feature block and the exit status the guest reported.
pub struct SemihostAgent {
    started: Instant,
    features_pos: usize,
    exit_status: u32,
    stdout: Box<dyn Write + Send>,
}

impl Default for SemihostAgent {
    fn default() -> Self {
        SemihostAgent::new()
    }
}

impl SemihostAgent {
    pub fn new() -> SemihostAgent {
        SemihostAgent::with_stdout(Box::new(std::io::stdout()))
    }

    /// Test constructor: capture guest console output in any writer.
    pub fn with_stdout(stdout: Box<dyn Write + Send>) -> SemihostAgent {
        SemihostAgent {
            started: Instant::now(),
            features_pos: 0,
            exit_status: 0,
            stdout,
        }
    }

    fn read_args<const N: usize>(
        &self,
        state: &CpuState,
        bus: &MemoryBus,
    ) -> Result<[u32; N], HostCallError> {
        let block = state.read_reg(RegisterId::R1);
        let mut words = [0u32; N];
        for (i, word) in words.iter_mut().enumerate() {
            *word = bus.read_u32(block.wrapping_add(4 * i as u32))?;
        }
        Ok(words)
    }

    fn handle(
        &mut self,
        op: u32,
        state: &mut CpuState,
        bus: &mut MemoryBus,
    ) -> Result<(i32, HostRequest), HostCallError> {
        // Claimed calls never raise the architectural breakpoint exception.
        let mut request = HostRequest::OMIT_EXCEPTION;
        let ret: i32 = match op {
            ops::OPEN => {
                let [path_ptr, mode, path_len] = self.read_args(state, bus)?;
                let mut path = vec![0u8; path_len as usize];
                bus.read_bytes(path_ptr, &mut path)?;
                let path = String::from_utf8_lossy(&path).into_owned();
                debug!(path, mode, "semihost open");
                match path.as_str() {
                    ":tt" => match mode {
                        0..=3 => HANDLE_STDIN as i32,
                        4..=7 => HANDLE_STDOUT as i32,
                        8..=11 => HANDLE_STDERR as i32,
                        _ => return Err(HostCallError::OutOfRange { op }),
                    },
                    ":semihosting-features" => HANDLE_FEATURES as i32,
                    _ => return Err(HostCallError::OpenFailed { path }),
                }
            }
            ops::CLOSE => {
                let [handle] = self.read_args(state, bus)?;
                if !(HANDLE_STDIN..=HANDLE_FEATURES).contains(&handle) {
                    return Err(HostCallError::Unexpected { op });
                }
                0
            }
            ops::WRITE => {
                let [handle, ptr, len] = self.read_args(state, bus)?;
                if handle != HANDLE_STDOUT && handle != HANDLE_STDERR {
                    return Err(HostCallError::Unsupported { op });
                }
                let mut data = vec![0u8; len as usize];
                bus.read_bytes(ptr, &mut data)?;
                trace!(handle, len, "semihost write");
                self.stdout.write_all(&data)?;
                self.stdout.flush()?;
                // Zero unwritten bytes means everything went out.
                0
            }
            ops::READ => {
                let [handle, ptr, len] = self.read_args(state, bus)?;
                if handle != HANDLE_FEATURES {
                    return Err(HostCallError::Unsupported { op });
                }
                let remaining = &FEATURE_DATA[self.features_pos.min(FEATURE_DATA.len())..];
                let chunk = remaining.len().min(len as usize);
                bus.write_bytes(ptr, &remaining[..chunk])
                    .map_err(HostCallError::Memory)?;
                self.features_pos += chunk;
                // READ returns the number of bytes *not* transferred.
                (len as usize - chunk) as i32
            }
            ops::IS_TTY => {
                let [handle] = self.read_args(state, bus)?;
                match handle {
                    HANDLE_STDIN | HANDLE_STDOUT | HANDLE_STDERR => 1,
                    HANDLE_FEATURES => 0,
                    _ => return Err(HostCallError::Unexpected { op }),
                }
            }
            ops::IS_ERROR => {
                let [status] = self.read_args(state, bus)?;
                i32::from((status as i32) < 0)
            }
            ops::SEEK => {
                let [handle, pos] = self.read_args(state, bus)?;
                if handle != HANDLE_FEATURES {
                    return Err(HostCallError::Unexpected { op });
                }
                if pos as usize >= FEATURE_DATA.len() {
                    return Err(HostCallError::OutOfRange { op });
                }
                self.features_pos = pos as usize;
                0
            }
            ops::FLEN => {
                let [handle] = self.read_args(state, bus)?;
                match handle {
                    HANDLE_STDIN | HANDLE_STDOUT | HANDLE_STDERR => 0,
                    HANDLE_FEATURES => FEATURE_DATA.len() as i32,
                    _ => return Err(HostCallError::Unexpected { op }),
                }
            }
            ops::CLOCK => {
                let centiseconds = self.started.elapsed().as_millis() / 10;
                centiseconds as i32
            }
            ops::ERRNO => 0,
            ops::GET_CMDLINE => {
                // Accepted but not supported.
                -1
            }
            ops::HEAPINFO => {
                // The guest fills the block itself; r0 passes through.
                op as i32
            }
            ops::EXIT => {
                let reason = state.read_reg(RegisterId::R1);
                debug!(reason = format_args!("{reason:#x}"), "semihost exit");
                self.exit_status = 0;
                request |= if reason == REASON_APPLICATION_EXIT {
                    HostRequest::EXIT
                } else {
                    HostRequest::ERROR_EXIT
                };
                -1
            }
            ops::EXIT_EXTENDED => {
                let [reason, subcode] = self.read_args(state, bus)?;
                debug!(
                    reason = format_args!("{reason:#x}"),
                    subcode, "semihost exit_extended"
                );
                self.exit_status = subcode;
                request |= if reason == REASON_APPLICATION_EXIT {
                    HostRequest::EXIT
                } else {
                    HostRequest::ERROR_EXIT
                };
                -1
            }
            _ => return Err(HostCallError::Unsupported { op }),
        };
        Ok((ret, request))
    }
}

impl BkptHandler for SemihostAgent {
    fn bkpt(
        &mut self,
        imm32: u32,
        state: &mut CpuState,
        bus: &mut MemoryBus,
    ) -> Result<HostRequest, HostCallError> {
        if imm32 != SEMIHOST_BKPT_IMM {
            // Not a semihosting call; let the executor escalate.
            return Ok(HostRequest::empty());
        }
        let op = state.read_reg(RegisterId::R0);
        let (ret, request) = self.handle(op, state, bus)?;
        state.write_reg(RegisterId::R0, ret as u32);
        Ok(request)
    }

    fn exit_status(&self) -> u32 {
        self.exit_status
    }
}
