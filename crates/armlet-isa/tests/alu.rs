use armlet_isa::alu::{add_with_carry, count_leading_zeros, shift_c, sign_extend};
use armlet_isa::{decode_imm_shift, Shift, ShiftType};

#[test]
fn add_with_carry_wraps_and_reports_carry() {
    let (value, carry, overflow) = add_with_carry(0xFFFF_FFFF, 1, false);
    assert_eq!(value, 0);
    assert!(carry);
    assert!(!overflow);
}

#[test]
fn add_with_carry_signed_overflow() {
    let (value, carry, overflow) = add_with_carry(0x7FFF_FFFF, 1, false);
    assert_eq!(value, 0x8000_0000);
    assert!(!carry);
    assert!(overflow);

    // Two large negatives overflow the other way.
    let (value, carry, overflow) = add_with_carry(0x8000_0000, 0x8000_0000, false);
    assert_eq!(value, 0);
    assert!(carry);
    assert!(overflow);
}

#[test]
fn compare_is_subtract_with_borrow() {
    // CMP r, r: equal operands give Z=1 C=1.
    let (value, carry, overflow) = add_with_carry(0x1234, !0x1234u32, true);
    assert_eq!(value, 0);
    assert!(carry);
    assert!(!overflow);

    // 3 - 5 borrows: C=0.
    let (value, carry, _) = add_with_carry(3, !5u32, true);
    assert_eq!(value, (-2i32) as u32);
    assert!(!carry);
}

#[test]
fn lsl_shifts_carry_out_of_bit_31() {
    let (value, carry) = shift_c(0x8000_0001, Shift::lsl(1), false);
    assert_eq!(value, 2);
    assert!(carry);

    // Amount 0 is the identity and preserves the incoming carry.
    let (value, carry) = shift_c(0x8000_0001, Shift::lsl(0), true);
    assert_eq!(value, 0x8000_0001);
    assert!(carry);
}

#[test]
fn lsr_and_asr_amount_32() {
    let lsr32 = decode_imm_shift(0b01, 0);
    let (value, carry) = shift_c(0x8000_0000, lsr32, false);
    assert_eq!(value, 0);
    assert!(carry);

    let asr32 = decode_imm_shift(0b10, 0);
    let (value, carry) = shift_c(0x8000_0000, asr32, false);
    assert_eq!(value, 0xFFFF_FFFF);
    assert!(carry);
    let (value, carry) = shift_c(0x7FFF_FFFF, asr32, true);
    assert_eq!(value, 0);
    assert!(!carry);
}

#[test]
fn ror_carry_tracks_result_bit_31() {
    let shift = Shift {
        kind: ShiftType::Ror,
        amount: 4,
    };
    let (value, carry) = shift_c(0x0000_0018, shift, false);
    assert_eq!(value, 0x8000_0001);
    assert!(carry);
}

#[test]
fn rrx_rotates_through_carry() {
    let rrx = Shift {
        kind: ShiftType::Rrx,
        amount: 1,
    };
    let (value, carry) = shift_c(0x0000_0003, rrx, true);
    assert_eq!(value, 0x8000_0001);
    assert!(carry);

    let (value, carry) = shift_c(0x0000_0002, rrx, false);
    assert_eq!(value, 0x0000_0001);
    assert!(!carry);
}

#[test]
fn register_shift_amounts_above_32_flush_the_value() {
    let (value, carry) = shift_c(
        0xFFFF_FFFF,
        Shift {
            kind: ShiftType::Lsr,
            amount: 40,
        },
        true,
    );
    assert_eq!(value, 0);
    assert!(!carry);

    let (value, carry) = shift_c(0xFFFF_FFFF, Shift::lsl(40), true);
    assert_eq!(value, 0);
    assert!(!carry);
}

#[test]
fn clz_full_range() {
    assert_eq!(count_leading_zeros(0), 32);
    assert_eq!(count_leading_zeros(1), 31);
    assert_eq!(count_leading_zeros(0x8000_0000), 0);
}

#[test]
fn sign_extension() {
    assert_eq!(sign_extend(0x80, 8), 0xFFFF_FF80);
    assert_eq!(sign_extend(0x7F, 8), 0x7F);
    assert_eq!(sign_extend(0x8000, 16), 0xFFFF_8000);
}
