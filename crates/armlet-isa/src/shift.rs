/// Barrel-shifter operation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftType {
    Lsl,
    Lsr,
    Asr,
    Ror,
    Rrx,
}

/// A decoded shift descriptor: kind plus immediate amount.
///
/// Amounts are already canonicalized by [`decode_imm_shift`]: the zero-amount
/// LSR/ASR encodings arrive here as amount 32, and the zero-amount ROR
/// encoding as RRX.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shift {
    pub kind: ShiftType,
    pub amount: u8,
}

impl Shift {
    /// The identity shift, `LSL #0`.
    pub const NONE: Shift = Shift {
        kind: ShiftType::Lsl,
        amount: 0,
    };

    pub fn lsl(amount: u8) -> Shift {
        Shift {
            kind: ShiftType::Lsl,
            amount,
        }
    }
}

/// Canonicalizes an immediate shift field per the ARMv7-M `DecodeImmShift`
/// pseudocode: `ty` is the 2-bit type field, `imm5` the raw amount.
pub fn decode_imm_shift(ty: u32, imm5: u32) -> Shift {
    let imm5 = (imm5 & 0x1F) as u8;
    match ty & 0b11 {
        0b00 => Shift {
            kind: ShiftType::Lsl,
            amount: imm5,
        },
        0b01 => Shift {
            kind: ShiftType::Lsr,
            amount: if imm5 == 0 { 32 } else { imm5 },
        },
        0b10 => Shift {
            kind: ShiftType::Asr,
            amount: if imm5 == 0 { 32 } else { imm5 },
        },
        _ => {
            if imm5 == 0 {
                Shift {
                    kind: ShiftType::Rrx,
                    amount: 1,
                }
            } else {
                Shift {
                    kind: ShiftType::Ror,
                    amount: imm5,
                }
            }
        }
    }
}
