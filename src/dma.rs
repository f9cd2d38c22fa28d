//! dmadata — the rom's internal file-allocation table.
//!
//! # Wire format
//! 16-byte-stride entries of four big-endian u32 fields: VStart, VEnd,
//! PStart, PEnd.  Virtual addresses describe the decompressed layout,
//! physical addresses the on-cartridge layout.  PEnd == 0 means the entry
//! is stored raw at PStart; PEnd > 0 means [PStart,PEnd) holds a compressed
//! container whose decompressed length is VEnd − VStart.
//!
//! # Locating the table
//! The table is not pointed to by any header field; it is found by scanning
//! the image for the boot-block signature its first two entries always form,
//! then confirming the candidate with the self-reference invariant: the
//! entry at index 2 describes the table itself, so its VStart must equal the
//! candidate's own byte offset.  That same entry's virtual extent gives the
//! entry count.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Bytes per table entry.
pub const STRIDE: usize = 16;
/// The table describes itself at this entry index.
pub const SELF_INDEX: usize = 2;
/// Field sentinel marking a deleted entry.
pub const DELETED: u32 = 0xffff_ffff;

/// First 20 bytes of every table: the boot entry {0, 0x1060, 0, 0} and the
/// following entry's VStart repeating the boot block's end.
// TODO iQue images use 0x1050 for the boot block end
const SIGNATURE: [u8; 20] = [
    0x00, 0x00, 0x00, 0x00, // VStart
    0x00, 0x00, 0x10, 0x60, // VEnd (end of boot block)
    0x00, 0x00, 0x00, 0x00, // PStart
    0x00, 0x00, 0x00, 0x00, // PEnd
    0x00, 0x00, 0x10, 0x60, // VStart (next entry)
];

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to locate dmadata in rom")]
    NotFound,
    #[error("dmadata at {offset:#x} with {entries} entries extends past the {len}-byte image")]
    OutOfBounds {
        offset:  usize,
        entries: usize,
        len:     usize,
    },
}

// ── Entry ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaEntry {
    pub v_start: u32,
    pub v_end:   u32,
    pub p_start: u32,
    pub p_end:   u32,
}

impl DmaEntry {
    /// Read one entry from the front of `bytes` (at least [`STRIDE`] long).
    pub fn read(bytes: &[u8]) -> Self {
        Self {
            v_start: BigEndian::read_u32(&bytes[0..4]),
            v_end:   BigEndian::read_u32(&bytes[4..8]),
            p_start: BigEndian::read_u32(&bytes[8..12]),
            p_end:   BigEndian::read_u32(&bytes[12..16]),
        }
    }

    /// Write this entry to the front of `bytes` (at least [`STRIDE`] long).
    pub fn write(&self, bytes: &mut [u8]) {
        BigEndian::write_u32(&mut bytes[0..4], self.v_start);
        BigEndian::write_u32(&mut bytes[4..8], self.v_end);
        BigEndian::write_u32(&mut bytes[8..12], self.p_start);
        BigEndian::write_u32(&mut bytes[12..16], self.p_end);
    }

    /// Deleted or otherwise unusable: any sentinel field, an empty virtual
    /// range, or a nonzero physical range of zero length.  Skipped during
    /// reconstruction but still persisted verbatim.
    pub fn is_deleted(&self) -> bool {
        self.v_start == DELETED
            || self.v_end == DELETED
            || self.p_start == DELETED
            || self.p_end == DELETED
            || self.v_end <= self.v_start
            || (self.p_end != 0 && self.p_end == self.p_start)
    }

    /// Entries store raw bytes when PEnd is zero, a compressed container
    /// otherwise.
    pub fn is_compressed(&self) -> bool {
        self.p_end != 0
    }

    /// Decompressed byte count this entry describes.
    pub fn v_len(&self) -> usize {
        (self.v_end - self.v_start) as usize
    }
}

// ── Table ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DmaTable {
    /// Byte offset of the table inside the rom image.
    pub offset:  usize,
    /// Every entry, deleted ones included, in table order.
    pub entries: Vec<DmaEntry>,
}

impl DmaTable {
    /// Scan a rom image for its dmadata table.
    ///
    /// The scan walks the image at entry stride looking for [`SIGNATURE`]
    /// and keeps the last candidate whose index-2 entry points back at the
    /// candidate offset.  Coincidental signature matches elsewhere in the
    /// data fail that self-reference and are passed over.
    pub fn locate(rom: &[u8]) -> Result<Self, TableError> {
        if rom.len() < 33 {
            return Err(TableError::NotFound);
        }

        let mut found: Option<(usize, usize)> = None;
        let mut pos = 0usize;
        while pos < rom.len() - 32 {
            if rom[pos..pos + 20] == SIGNATURE && pos + 3 * STRIDE <= rom.len() {
                let own = DmaEntry::read(&rom[pos + SELF_INDEX * STRIDE..]);
                if own.v_start as usize == pos {
                    let count = (own.v_end as usize).saturating_sub(pos) / STRIDE;
                    found = Some((pos, count));
                    // keep scanning: the last passing candidate wins
                }
            }
            pos += STRIDE;
        }

        let (offset, count) = found.ok_or(TableError::NotFound)?;
        let end = offset + count * STRIDE;
        if count < SELF_INDEX + 1 || end > rom.len() {
            return Err(TableError::OutOfBounds {
                offset,
                entries: count,
                len: rom.len(),
            });
        }

        let entries = rom[offset..end]
            .chunks_exact(STRIDE)
            .map(DmaEntry::read)
            .collect();
        Ok(Self { offset, entries })
    }

    /// Serialized byte length of the whole table.
    pub fn byte_len(&self) -> usize {
        self.entries.len() * STRIDE
    }

    /// Serialize every entry (deleted ones verbatim) into `image` at the
    /// table's own offset, overwriting whatever decoding left there.
    /// `image` must cover `offset + byte_len()`.
    pub fn write_into(&self, image: &mut [u8]) {
        for (i, entry) in self.entries.iter().enumerate() {
            entry.write(&mut image[self.offset + i * STRIDE..]);
        }
    }
}
