#![cfg(not(target_arch = "wasm32"))]

use armlet_isa::alu::{add_with_carry, shift_c, thumb_expand_imm_c};
use armlet_isa::{Shift, ShiftType};
use proptest::prelude::*;

proptest! {
    /// The 33-bit identity: `(carry << 32) | value == x + y + c`.
    #[test]
    fn add_with_carry_matches_wide_sum(x: u32, y: u32, c: bool) {
        let (value, carry, _) = add_with_carry(x, y, c);
        let wide = u64::from(x) + u64::from(y) + u64::from(c);
        prop_assert_eq!((u64::from(carry) << 32) | u64::from(value), wide);
    }

    /// Overflow is exactly the sign-disagreement predicate.
    #[test]
    fn add_with_carry_overflow_is_signed_disagreement(x: u32, y: u32, c: bool) {
        let (value, _, overflow) = add_with_carry(x, y, c);
        let signed = i64::from(x as i32) + i64::from(y as i32) + i64::from(c);
        prop_assert_eq!(overflow, signed != i64::from(value as i32));
    }

    /// In-range LSL/LSR agree with the native shift operators.
    #[test]
    fn shifts_match_native_operators(value: u32, amount in 1u8..32) {
        let (lsl, _) = shift_c(value, Shift { kind: ShiftType::Lsl, amount }, false);
        prop_assert_eq!(lsl, value << amount);
        let (lsr, _) = shift_c(value, Shift { kind: ShiftType::Lsr, amount }, false);
        prop_assert_eq!(lsr, value >> amount);
        let (asr, _) = shift_c(value, Shift { kind: ShiftType::Asr, amount }, false);
        prop_assert_eq!(asr, ((value as i32) >> amount) as u32);
        let (ror, _) = shift_c(value, Shift { kind: ShiftType::Ror, amount }, false);
        prop_assert_eq!(ror, value.rotate_right(u32::from(amount)));
    }

    /// Every modified immediate either splats the low byte or is a rotated
    /// byte with bit 7 forced.
    #[test]
    fn expanded_immediates_have_the_documented_shape(imm12 in 0u32..0x1000) {
        let (value, carry) = thumb_expand_imm_c(imm12);
        if imm12 >> 10 == 0 {
            prop_assert!(carry.is_none());
            let byte = imm12 & 0xFF;
            prop_assert!(
                value == byte
                    || value == (byte << 16 | byte)
                    || value == (byte << 24 | byte << 8)
                    || value == (byte << 24 | byte << 16 | byte << 8 | byte)
            );
        } else {
            prop_assert_eq!(carry, Some(value & 0x8000_0000 != 0));
            prop_assert_eq!(value.count_ones(), (0x80 | (imm12 & 0x7F)).count_ones());
        }
    }
}
