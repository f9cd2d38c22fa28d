//! Rom reconstruction and standalone asset decompression.
//!
//! # Reconstruction
//! [`decompress_rom`] locates the dmadata table, sizes a zero-filled
//! destination image by doubling from the source length, then walks the
//! table: deleted entries are skipped, raw entries are copied, compressed
//! entries are decoded straight into their virtual range.  Each produced
//! entry is rewritten to describe its uncompressed form (PStart ← VStart,
//! PEnd ← 0), the whole table is serialized back at its original offset,
//! and the header checksum is repaired.  Any failure aborts the whole
//! reconstruction — a partially reconstructed rom is not useful output.
//!
//! # Standalone path
//! [`decompress_file`] decodes one compressed asset with no rom structure
//! involved, resolving its codec the same way.

use thiserror::Error;

use crate::checksum::{self, ChecksumError};
use crate::codec::{Codec, CodecError, CodecId, Registry};
use crate::dma::{DmaTable, TableError};

/// Fixed output capacity for standalone asset decompression (8 MiB —
/// larger than any packed asset this format family carries).
const FILE_CAPACITY: usize = 8 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum RomError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error("entry {index}: {source}")]
    Codec { index: usize, source: CodecError },
    #[error("entry {index}: physical range {start:#x}..{end:#x} outside the {len}-byte source image")]
    PhysicalRange {
        index: usize,
        start: u64,
        end:   u64,
        len:   usize,
    },
}

/// Destination sizing rule: start from the compressed image's length and
/// double while any live entry's virtual end exceeds the candidate.  The
/// slack over exact sizing is deliberate — decompressed images keep
/// rom-like sizes.
pub fn dest_capacity(src_len: usize, table: &DmaTable) -> usize {
    let mut size = src_len.max(1);
    for entry in table.entries.iter().filter(|e| !e.is_deleted()) {
        while (entry.v_end as usize) > size {
            size *= 2;
        }
    }
    size
}

/// Decompress a whole rom image.
///
/// Returns the reconstructed image at its full allocated size; the table
/// inside it has been rewritten to the uncompressed layout and the header
/// checksum restamped.
pub fn decompress_rom(rom: &[u8], codec_override: Option<CodecId>) -> Result<Vec<u8>, RomError> {
    let mut table = DmaTable::locate(rom)?;
    let mut dst = vec![0u8; dest_capacity(rom.len(), &table)];
    let mut registry = Registry::new();

    for (index, entry) in table.entries.iter_mut().enumerate() {
        if entry.is_deleted() {
            continue;
        }
        // dest_capacity grew dst past every live v_end, so the virtual
        // range is always in bounds here.
        let v_start = entry.v_start as usize;
        let v_end = entry.v_end as usize;

        if entry.is_compressed() {
            let p_start = entry.p_start as usize;
            let p_end = entry.p_end as usize;
            if p_start >= p_end || p_end > rom.len() {
                return Err(RomError::PhysicalRange {
                    index,
                    start: entry.p_start as u64,
                    end:   entry.p_end as u64,
                    len:   rom.len(),
                });
            }
            let src = &rom[p_start..p_end];
            registry
                .resolve(codec_override, src)
                .and_then(|codec| codec.decode(src, &mut dst[v_start..v_end]))
                .map_err(|source| RomError::Codec { index, source })?;
        } else {
            let p_start = entry.p_start as usize;
            let len = entry.v_len();
            if len > rom.len() || p_start > rom.len() - len {
                return Err(RomError::PhysicalRange {
                    index,
                    start: entry.p_start as u64,
                    end:   (p_start + len) as u64,
                    len:   rom.len(),
                });
            }
            dst[v_start..v_end].copy_from_slice(&rom[p_start..p_start + len]);
        }

        // The entry now describes uncompressed bytes at its virtual offset.
        entry.p_start = entry.v_start;
        entry.p_end = 0;
    }

    table.write_into(&mut dst);
    checksum::repair(&mut dst)?;
    Ok(dst)
}

/// Decompress one compressed asset in isolation.
pub fn decompress_file(file: &[u8], codec_override: Option<CodecId>) -> Result<Vec<u8>, CodecError> {
    let mut dst = vec![0u8; FILE_CAPACITY];
    let mut registry = Registry::new();
    let n = registry
        .resolve(codec_override, file)?
        .decode(file, &mut dst)?;
    dst.truncate(n);
    Ok(dst)
}
