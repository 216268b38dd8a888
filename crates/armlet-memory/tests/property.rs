#![cfg(not(target_arch = "wasm32"))]

use armlet_memory::MemoryBus;
use proptest::prelude::*;

const RAM_BASE: u32 = 0x2000_0000;
const RAM_LEN: u32 = 0x1000;

proptest! {
    /// A store followed by a matching-width load at the same address in a
    /// writable region returns the stored value.
    #[test]
    fn store_load_round_trip_u32(off in 0u32..(RAM_LEN - 4), value: u32) {
        let mut bus = MemoryBus::new();
        bus.register_ram("sram", RAM_BASE, RAM_LEN).unwrap();
        bus.write_u32(RAM_BASE + off, value).unwrap();
        prop_assert_eq!(bus.read_u32(RAM_BASE + off).unwrap(), value);
    }

    #[test]
    fn store_load_round_trip_u16(off in 0u32..(RAM_LEN - 2), value: u16) {
        let mut bus = MemoryBus::new();
        bus.register_ram("sram", RAM_BASE, RAM_LEN).unwrap();
        bus.write_u16(RAM_BASE + off, value).unwrap();
        prop_assert_eq!(bus.read_u16(RAM_BASE + off).unwrap(), value);
    }

    /// Word stores decompose into the same bytes a byte-wise reader sees.
    #[test]
    fn words_are_little_endian(off in 0u32..(RAM_LEN - 4), value: u32) {
        let mut bus = MemoryBus::new();
        bus.register_ram("sram", RAM_BASE, RAM_LEN).unwrap();
        bus.write_u32(RAM_BASE + off, value).unwrap();
        for (i, expected) in value.to_le_bytes().into_iter().enumerate() {
            prop_assert_eq!(bus.read_u8(RAM_BASE + off + i as u32).unwrap(), expected);
        }
    }
}
