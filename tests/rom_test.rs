use z64dec::checksum;
use z64dec::codec::CodecError;
use z64dec::dma::{DmaEntry, DmaTable, STRIDE};
use z64dec::{decompress_file, decompress_rom, dest_capacity};

const ROM_LEN: usize = 0x18_0000;
const TABLE: usize = 0x2000;
const DELETED: u32 = 0xffff_ffff;

// ── fixture ──────────────────────────────────────────────────────────────────

fn entry(v_start: u32, v_end: u32, p_start: u32, p_end: u32) -> [u8; 16] {
    let mut e = [0u8; 16];
    e[0..4].copy_from_slice(&v_start.to_be_bytes());
    e[4..8].copy_from_slice(&v_end.to_be_bytes());
    e[8..12].copy_from_slice(&p_start.to_be_bytes());
    e[12..16].copy_from_slice(&p_end.to_be_bytes());
    e
}

fn container(total: u32, blocks: &[&[u8]]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(b"LZ4H");
    v.extend_from_slice(&total.to_be_bytes());
    for b in blocks {
        v.extend_from_slice(&(b.len() as u32).to_be_bytes());
        v.extend_from_slice(b);
    }
    v
}

/// A rom with a six-entry table: boot, a second raw file, the table itself,
/// a deleted entry, a raw entry, and a container-compressed entry.
fn build_rom() -> (Vec<u8>, Vec<u8>) {
    let mut rom = vec![0u8; ROM_LEN];

    // boot block and the raw file after it
    for (i, b) in rom[..0x2000].iter_mut().enumerate() {
        *b = (i * 13 % 251) as u8;
    }
    // raw asset
    for (i, b) in rom[0x3000..0x3040].iter_mut().enumerate() {
        *b = 0xc0 + (i as u8 & 0x3f);
    }
    // compressed asset at p 0x5000
    let data: Vec<u8> = (0..0x800u32).map(|i| ((i * 31) % 251) as u8).collect();
    let blocks: Vec<Vec<u8>> = data.chunks(512).map(lz4_flex::compress).collect();
    let refs: Vec<&[u8]> = blocks.iter().map(|b| b.as_slice()).collect();
    let comp = container(data.len() as u32, &refs);
    rom[0x5000..0x5000 + comp.len()].copy_from_slice(&comp);

    let entries = [
        entry(0, 0x1060, 0, 0),
        entry(0x1060, 0x2000, 0x1060, 0),
        entry(TABLE as u32, (TABLE + 6 * STRIDE) as u32, TABLE as u32, 0),
        entry(DELETED, DELETED, DELETED, DELETED),
        entry(0x3000, 0x3040, 0x3000, 0),
        entry(
            0x4000,
            0x4000 + data.len() as u32,
            0x5000,
            0x5000 + comp.len() as u32,
        ),
    ];
    for (i, e) in entries.iter().enumerate() {
        rom[TABLE + i * STRIDE..TABLE + (i + 1) * STRIDE].copy_from_slice(e);
    }

    (rom, data)
}

// ── locator ──────────────────────────────────────────────────────────────────

#[test]
fn locator_finds_table_and_entry_count() {
    let (rom, _) = build_rom();
    let table = DmaTable::locate(&rom).unwrap();
    assert_eq!(table.offset, TABLE);
    assert_eq!(table.entries.len(), 6);
    assert_eq!(table.byte_len(), 6 * STRIDE);
    assert_eq!(table.entries[2].v_start as usize, TABLE);
}

#[test]
fn locator_rejects_candidate_without_self_reference() {
    let (mut rom, _) = build_rom();
    // Point the self entry one stride past the table's real offset.
    rom[TABLE + 2 * STRIDE..TABLE + 2 * STRIDE + 4]
        .copy_from_slice(&((TABLE + STRIDE) as u32).to_be_bytes());
    assert!(DmaTable::locate(&rom).is_err());
}

#[test]
fn locator_keeps_last_passing_candidate() {
    let (mut rom, _) = build_rom();
    // A second valid table later in the image; last one scanned wins.
    let second = 0x9000usize;
    let entries = [
        entry(0, 0x1060, 0, 0),
        entry(0x1060, 0x2000, 0x1060, 0),
        entry(second as u32, (second + 4 * STRIDE) as u32, second as u32, 0),
        entry(DELETED, DELETED, DELETED, DELETED),
    ];
    for (i, e) in entries.iter().enumerate() {
        rom[second + i * STRIDE..second + (i + 1) * STRIDE].copy_from_slice(e);
    }
    let table = DmaTable::locate(&rom).unwrap();
    assert_eq!(table.offset, second);
    assert_eq!(table.entries.len(), 4);
}

// ── sizing ───────────────────────────────────────────────────────────────────

#[test]
fn capacity_doubles_until_every_entry_fits() {
    let table = DmaTable {
        offset:  0,
        entries: vec![DmaEntry {
            v_start: 0,
            v_end:   2500,
            p_start: 0,
            p_end:   0,
        }],
    };
    // 1000 -> 2000 -> 4000, not exact sizing to 2500.
    assert_eq!(dest_capacity(1000, &table), 4000);
}

#[test]
fn capacity_ignores_deleted_entries() {
    let table = DmaTable {
        offset:  0,
        entries: vec![DmaEntry {
            v_start: DELETED,
            v_end:   DELETED,
            p_start: DELETED,
            p_end:   DELETED,
        }],
    };
    assert_eq!(dest_capacity(1000, &table), 1000);
}

// ── entry predicates ─────────────────────────────────────────────────────────

#[test]
fn deleted_and_invalid_entries_are_skipped() {
    let sentinel = DmaEntry {
        v_start: DELETED,
        v_end:   DELETED,
        p_start: DELETED,
        p_end:   DELETED,
    };
    let empty_virtual = DmaEntry { v_start: 0x100, v_end: 0x100, p_start: 0, p_end: 0 };
    let empty_physical = DmaEntry { v_start: 0, v_end: 0x100, p_start: 0x200, p_end: 0x200 };
    let live_raw = DmaEntry { v_start: 0, v_end: 0x100, p_start: 0, p_end: 0 };
    let live_compressed = DmaEntry { v_start: 0, v_end: 0x100, p_start: 0x200, p_end: 0x280 };

    assert!(sentinel.is_deleted());
    assert!(empty_virtual.is_deleted());
    assert!(empty_physical.is_deleted());
    assert!(!live_raw.is_deleted());
    assert!(!live_raw.is_compressed());
    assert!(!live_compressed.is_deleted());
    assert!(live_compressed.is_compressed());
}

// ── reconstruction ───────────────────────────────────────────────────────────

#[test]
fn reconstruction_end_to_end() {
    let (rom, data) = build_rom();
    let out = decompress_rom(&rom, None).unwrap();
    assert_eq!(out.len(), ROM_LEN);

    // Raw entries copied to their virtual ranges (checksum words at
    // 0x10..0x18 are restamped, so skip them when comparing the boot file).
    assert_eq!(out[..0x10], rom[..0x10]);
    assert_eq!(out[0x18..0x1060], rom[0x18..0x1060]);
    assert_eq!(out[0x1060..0x2000], rom[0x1060..0x2000]);
    assert_eq!(out[0x3000..0x3040], rom[0x3000..0x3040]);

    // The compressed entry decoded into place.
    assert_eq!(&out[0x4000..0x4000 + data.len()], &data[..]);

    // Every rewritten entry reads PStart = VStart, PEnd = 0; the deleted
    // entry is persisted untouched.
    let table = &out[TABLE..TABLE + 6 * STRIDE];
    let expect = [
        entry(0, 0x1060, 0, 0),
        entry(0x1060, 0x2000, 0x1060, 0),
        entry(TABLE as u32, (TABLE + 6 * STRIDE) as u32, TABLE as u32, 0),
        entry(DELETED, DELETED, DELETED, DELETED),
        entry(0x3000, 0x3040, 0x3000, 0),
        entry(0x4000, 0x4000 + data.len() as u32, 0x4000, 0),
    ];
    for (i, e) in expect.iter().enumerate() {
        assert_eq!(&table[i * STRIDE..(i + 1) * STRIDE], e, "entry {i}");
    }

    // The whole image matches an independently assembled expectation.
    let mut expected = vec![0u8; ROM_LEN];
    expected[..0x2000].copy_from_slice(&rom[..0x2000]);
    expected[0x3000..0x3040].copy_from_slice(&rom[0x3000..0x3040]);
    expected[0x4000..0x4000 + data.len()].copy_from_slice(&data);
    for (i, e) in expect.iter().enumerate() {
        expected[TABLE + i * STRIDE..TABLE + (i + 1) * STRIDE].copy_from_slice(e);
    }
    checksum::repair(&mut expected).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn reconstruction_is_deterministic() {
    let (rom, _) = build_rom();
    assert_eq!(
        decompress_rom(&rom, None).unwrap(),
        decompress_rom(&rom, None).unwrap()
    );
}

#[test]
fn unknown_asset_encoding_aborts_reconstruction() {
    let (mut rom, _) = build_rom();
    rom[0x5000..0x5004].copy_from_slice(b"ZZZZ");
    assert!(decompress_rom(&rom, None).is_err());
}

#[test]
fn rom_without_table_is_rejected() {
    let rom = vec![0u8; 0x4000];
    assert!(decompress_rom(&rom, None).is_err());
}

// ── checksum ─────────────────────────────────────────────────────────────────

#[test]
fn checksum_repair_is_idempotent() {
    let (rom, _) = build_rom();
    let mut once = decompress_rom(&rom, None).unwrap();
    let twice = {
        let mut img = once.clone();
        checksum::repair(&mut img).unwrap();
        img
    };
    checksum::repair(&mut once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn checksum_needs_a_full_megabyte() {
    let mut img = vec![0u8; 0x8_0000];
    assert!(checksum::repair(&mut img).is_err());
}

// ── standalone path ──────────────────────────────────────────────────────────

#[test]
fn standalone_file_decodes_by_header() {
    let data: Vec<u8> = (0..3000u32).map(|i| ((i * 17) % 255) as u8).collect();
    let blocks: Vec<Vec<u8>> = data.chunks(1024).map(lz4_flex::compress).collect();
    let refs: Vec<&[u8]> = blocks.iter().map(|b| b.as_slice()).collect();
    let file = container(data.len() as u32, &refs);
    assert_eq!(decompress_file(&file, None).unwrap(), data);
}

#[test]
fn standalone_file_with_unknown_header_fails() {
    assert!(matches!(
        decompress_file(b"ZZZZ\x00\x00\x00\x04data", None),
        Err(CodecError::UnknownEncoding { .. })
    ));
}

// ── file-level flow ──────────────────────────────────────────────────────────

#[test]
fn rom_survives_a_trip_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("game.z64");
    let out_path = dir.path().join("game.decompressed.z64");

    let (rom, _) = build_rom();
    std::fs::write(&in_path, &rom).unwrap();

    let comp = std::fs::read(&in_path).unwrap();
    let dec = decompress_rom(&comp, None).unwrap();
    std::fs::write(&out_path, &dec).unwrap();

    assert_eq!(std::fs::read(&out_path).unwrap(), dec);
}
