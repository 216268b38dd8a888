//! Thumb / Thumb-2 instruction decoder.
//!
//! [`decode`] is a pure function from a raw halfword pair to a typed
//! [`Instr`]; it never touches processor state. The only context it needs is
//! the current IT position, because the 16-bit data-processing encodings set
//! flags exactly when they execute outside an IT block, and several branch
//! encodings are UNPREDICTABLE in the middle of one.
//!
//! Layout follows the ARMv7-M decode tree: a dispatch over the top bits of
//! the first halfword for 16-bit encodings, and a nested dispatch over the
//! op fields for 32-bit encodings.

use armlet_isa::{Instr, RawInstr};
use thiserror::Error;

mod thumb16;
mod thumb32;

/// Why an encoding failed to decode.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum DecodeError {
    /// No entry in the decode tree.
    #[error("unknown opcode {raw:#010x}")]
    UnknownOpcode { raw: u32 },
    /// A field constraint is violated (e.g. PC used where forbidden).
    #[error("unpredictable encoding {raw:#010x}")]
    Unpredictable { raw: u32 },
    /// Architecturally UNDEFINED encoding.
    #[error("undefined encoding {raw:#010x}")]
    Undefined { raw: u32 },
}

/// Where the instruction sits relative to an IT block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItPosition {
    pub in_it_block: bool,
    pub last_in_it_block: bool,
}

impl ItPosition {
    pub const OUTSIDE: ItPosition = ItPosition {
        in_it_block: false,
        last_in_it_block: false,
    };
}

/// Decodes a fetched instruction.
pub fn decode(raw: RawInstr, it: ItPosition) -> Result<Instr, DecodeError> {
    match raw {
        RawInstr::Narrow(hw) => thumb16::decode(hw, it),
        RawInstr::Wide(hw1, hw2) => thumb32::decode(hw1, hw2, it),
    }
}

pub(crate) fn raw_of(hw1: u16, hw2: Option<u16>) -> u32 {
    match hw2 {
        Some(hw2) => (u32::from(hw1) << 16) | u32::from(hw2),
        None => u32::from(hw1),
    }
}
