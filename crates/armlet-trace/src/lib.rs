//! Execution tracing: a Thumb disassembly formatter and a step observer
//! that logs each instruction with the register deltas it caused.

use std::fmt::Write as _;

use tracing::trace;

use armlet_cpu::{it, CpuState};
use armlet_decoder::{decode, ItPosition};
use armlet_isa::{RawInstr, RegisterId};
use armlet_memory::MemoryBus;

mod mnemonic;

pub use mnemonic::mnemonic;

/// Reads and decodes the instruction at the current PC without touching any
/// fault state; undecodable words render as raw hex.
pub fn disassemble_at(state: &CpuState, bus: &MemoryBus) -> String {
    let pc = state.pc();
    let Ok(hw1) = bus.read_u16(pc) else {
        return format!("<fetch fault at {pc:#010x}>");
    };
    let raw = if matches!(hw1 >> 11, 0b11101 | 0b11110 | 0b11111) {
        match bus.read_u16(pc.wrapping_add(2)) {
            Ok(hw2) => RawInstr::Wide(hw1, hw2),
            Err(_) => return format!("<fetch fault at {pc:#010x}>"),
        }
    } else {
        RawInstr::Narrow(hw1)
    };
    let it_pos = ItPosition {
        in_it_block: it::in_it_block(state),
        last_in_it_block: it::last_in_it_block(state),
    };
    match decode(raw, it_pos) {
        Ok(instr) => mnemonic(&instr, it::current_condition(state)),
        Err(_) => match raw {
            RawInstr::Narrow(hw) => format!(".short {hw:#06x}"),
            RawInstr::Wide(hw1, hw2) => format!(".word {:#010x}", (u32::from(hw1) << 16) | u32::from(hw2)),
        },
    }
}

/// Per-step trace sink. Attach [`Tracer::pre_step`] and [`Tracer::post_step`]
/// as the machine's hooks; every retired instruction produces one `trace!`
/// line with its mnemonic, and one with the registers it changed.
#[derive(Default)]
pub struct Tracer {
    snapshot: Option<Snapshot>,
}

struct Snapshot {
    pc: u32,
    text: String,
    regs: [u32; 16],
}

fn capture_regs(state: &CpuState) -> [u32; 16] {
    let mut regs = [0u32; 16];
    for reg in RegisterId::ALL {
        regs[reg.index()] = state.read_reg(reg);
    }
    regs
}

impl Tracer {
    pub fn new() -> Tracer {
        Tracer::default()
    }

    pub fn pre_step(&mut self, state: &CpuState, bus: &MemoryBus) {
        let text = disassemble_at(state, bus);
        trace!(pc = format_args!("{:#010x}", state.pc()), "{text}");
        self.snapshot = Some(Snapshot {
            pc: state.pc(),
            text,
            regs: capture_regs(state),
        });
    }

    pub fn post_step(&mut self, state: &CpuState, _bus: &MemoryBus) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let deltas = self.render_deltas(&snapshot, state);
        if !deltas.is_empty() {
            trace!(
                pc = format_args!("{:#010x}", snapshot.pc),
                "{} => {deltas}",
                snapshot.text
            );
        }
    }

    fn render_deltas(&self, snapshot: &Snapshot, state: &CpuState) -> String {
        let mut out = String::new();
        let now = capture_regs(state);
        for reg in RegisterId::ALL {
            // The PC always moves; only surprising register traffic is worth
            // a line.
            if reg == RegisterId::Pc {
                continue;
            }
            let (old, new) = (snapshot.regs[reg.index()], now[reg.index()]);
            if old != new {
                if !out.is_empty() {
                    out.push_str(", ");
                }
                let _ = write!(out, "{reg}: {old:#x} -> {new:#x}");
            }
        }
        out
    }
}
