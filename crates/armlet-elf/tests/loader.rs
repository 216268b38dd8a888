use armlet_elf::{load, ElfError};

struct Segment {
    vaddr: u32,
    filesz: u32,
    memsz: u32,
    flags: u32,
    payload: Vec<u8>,
}

/// Builds a minimal ELF32 LE executable around the given segments.
fn build_elf(machine: u16, entry: u32, segments: &[Segment]) -> Vec<u8> {
    const EHSIZE: u32 = 52;
    const PHENTSIZE: u32 = 32;
    let phnum = segments.len() as u32;
    let mut out = Vec::new();

    // e_ident
    out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&EHSIZE.to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHSIZE as u16).to_le_bytes());
    out.extend_from_slice(&(PHENTSIZE as u16).to_le_bytes());
    out.extend_from_slice(&(phnum as u16).to_le_bytes());
    out.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

    let mut offset = EHSIZE + PHENTSIZE * phnum;
    for seg in segments {
        out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&seg.vaddr.to_le_bytes());
        out.extend_from_slice(&seg.vaddr.to_le_bytes()); // p_paddr
        out.extend_from_slice(&seg.filesz.to_le_bytes());
        out.extend_from_slice(&seg.memsz.to_le_bytes());
        out.extend_from_slice(&seg.flags.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes()); // p_align
        offset += seg.filesz;
    }
    for seg in segments {
        out.extend_from_slice(&seg.payload);
    }
    out
}

fn firmware_segments() -> Vec<Segment> {
    // Vector table: initial SP, then the reset vector.
    let mut code = Vec::new();
    code.extend_from_slice(&0x2000_1000u32.to_le_bytes());
    code.extend_from_slice(&0x0800_0009u32.to_le_bytes());
    code.extend_from_slice(&[0x00, 0xBF, 0x00, 0xBF]); // nop; nop
    vec![
        Segment {
            vaddr: 0x0800_0000,
            filesz: code.len() as u32,
            memsz: code.len() as u32,
            flags: 5, // R+X
            payload: code,
        },
        Segment {
            vaddr: 0x2000_0000,
            filesz: 4,
            memsz: 16, // .bss tail
            flags: 6, // R+W
            payload: vec![0xAA, 0xBB, 0xCC, 0xDD],
        },
    ]
}

#[test]
fn loads_an_arm_executable() {
    let elf = build_elf(40, 0x0800_0008, &firmware_segments());
    let image = load(&elf).unwrap();

    // Thumb bit forced on the entry.
    assert_eq!(image.entry, 0x0800_0009);
    assert_eq!(image.initial_sp, Some(0x2000_1000));

    assert_eq!(image.regions.len(), 2);
    let code = &image.regions[0];
    assert_eq!(code.base, 0x0800_0000);
    assert!(!code.writable);
    assert_eq!(&code.data[0..4], &0x2000_1000u32.to_le_bytes());

    let data = &image.regions[1];
    assert_eq!(data.base, 0x2000_0000);
    assert!(data.writable);
    // Zero-filled up to memsz.
    assert_eq!(data.data.len(), 16);
    assert_eq!(&data.data[0..4], &[0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(&data.data[4..], &[0u8; 12]);
}

#[test]
fn rejects_non_arm_machines() {
    let elf = build_elf(3, 0x0800_0008, &firmware_segments());
    assert!(matches!(load(&elf), Err(ElfError::WrongHeader { .. })));
}

#[test]
fn rejects_garbage() {
    assert!(matches!(
        load(b"not an elf at all"),
        Err(ElfError::NotValid { .. })
    ));
    assert!(matches!(load(&[]), Err(ElfError::NotValid { .. })));
}

#[test]
fn rejects_images_without_loadable_segments() {
    let elf = build_elf(40, 0x0800_0008, &[]);
    assert!(matches!(load(&elf), Err(ElfError::NotValid { .. })));
}

#[test]
fn entry_outside_any_segment_leaves_sp_unset() {
    let mut segments = firmware_segments();
    segments.remove(0);
    let elf = build_elf(40, 0x0800_0008, &segments);
    let image = load(&elf).unwrap();
    assert_eq!(image.initial_sp, None);
}
