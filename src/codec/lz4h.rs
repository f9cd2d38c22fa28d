//! Chunked LZ4-family container and its sequence decoder.
//!
//! # Container layout
//! ```text
//! [4-byte tag "LZ4H"] [4-byte BE total size; low 24 bits authoritative]
//! repeated: [4-byte BE block size] [block bytes]
//! ```
//! Blocks repeat until the concatenated output reaches the declared total.
//! Every block is self-contained: back-references never cross a block
//! boundary and no dictionary persists between blocks.
//!
//! # Sequence grammar (per block)
//! A block is a run of sequences.  Each sequence is a token byte (high
//! nibble literal-length code, low nibble match-length code), the literal
//! bytes, then a 2-byte little-endian back-reference distance and the match
//! length.  A nibble code of 15 is extended by summing further bytes while
//! each read byte equals 255.  Match lengths carry a +4 bias.  The final
//! sequence is a bare literal run that consumes the input exactly — there is
//! no trailing match.
//!
//! # Trust model
//! The originating device decoder trusts its own container format and skips
//! every bound check.  Here each of those assumptions is an explicit checked
//! precondition: truncated input, back-references past the region start, and
//! output past the destination all return [`CodecError`] instead of reading
//! or writing out of bounds.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{Codec, CodecError, CodecId};

/// Matches shorter than this are never encoded; the wire match-length code
/// is stored minus this bias.
const MIN_MATCH: usize = 4;

/// Largest uncompressed block one container chunk may carry.
const MAX_BLOCK_SIZE: usize = 64 * 1024;

/// Worst-case compressed size of a block of `n` bytes.
const fn compress_bound(n: usize) -> usize {
    n + n / 255 + 16
}

// ── Source cursor ────────────────────────────────────────────────────────────

/// Sequential reader over a compressed asset.  Stands in for the device DMA
/// transfer primitive: read exactly N bytes from the cursor, advance by N.
struct Source<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.buf.len() - self.pos {
            return Err(CodecError::Truncated { at: self.buf.len() });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    /// Copy exactly `dst.len()` bytes from the cursor into `dst`.
    fn transfer(&mut self, dst: &mut [u8]) -> Result<(), CodecError> {
        let bytes = self.take(dst.len())?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

// ── Sequence decoder ─────────────────────────────────────────────────────────

#[inline]
fn read_byte(src: &[u8], ip: &mut usize) -> Result<u8, CodecError> {
    let b = *src.get(*ip).ok_or(CodecError::Truncated { at: src.len() })?;
    *ip += 1;
    Ok(b)
}

/// Extended length: sum bytes while each read byte equals 255.  Consumes at
/// least one byte; the terminator is the only byte that may be below 255.
fn read_long_length(src: &[u8], ip: &mut usize) -> Result<usize, CodecError> {
    let mut total = 0usize;
    loop {
        let b = read_byte(src, ip)?;
        total += b as usize;
        if b != 255 {
            return Ok(total);
        }
    }
}

/// Decode one compressed block of sequences into the front of `dst`.
///
/// `dst` is the output region for this block only: back-references may not
/// reach before its start.  Returns the byte count produced, which the
/// caller advances its output cursor by.
pub fn decode_block(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let mut ip = 0usize;
    let mut op = 0usize;

    loop {
        let token = read_byte(src, &mut ip)?;

        // Literal run.
        let mut run = (token >> 4) as usize;
        if run == 15 {
            run += read_long_length(src, &mut ip)?;
        }
        if run > src.len() - ip {
            return Err(CodecError::Truncated { at: src.len() });
        }
        if run > dst.len() - op {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }
        dst[op..op + run].copy_from_slice(&src[ip..ip + run]);
        ip += run;
        op += run;

        // The final sequence is a bare literal run ending exactly at the
        // input's end.
        if ip == src.len() {
            break;
        }

        // Match.
        if src.len() - ip < 2 {
            return Err(CodecError::Truncated { at: src.len() });
        }
        let offset = LittleEndian::read_u16(&src[ip..ip + 2]) as usize;
        ip += 2;
        let mut len = (token & 0x0f) as usize;
        if len == 15 {
            len += read_long_length(src, &mut ip)?;
        }
        len += MIN_MATCH;

        if offset > op {
            return Err(CodecError::BadBackReference { offset, produced: op });
        }
        if len > dst.len() - op {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }

        // The match may overlap its own output (offset < len); copying one
        // byte at a time lets every byte observe the ones just written.
        let from = op - offset;
        for i in 0..len {
            dst[op + i] = dst[from + i];
        }
        op += len;
    }

    Ok(op)
}

// ── Container codec ──────────────────────────────────────────────────────────

/// Decoder for the chunked container.  Owns the staging buffer that one
/// decompression operation reuses across every block of every asset.
pub struct Lz4hCodec {
    scratch: Vec<u8>,
}

impl Lz4hCodec {
    pub fn new() -> Self {
        Self {
            scratch: vec![0u8; compress_bound(MAX_BLOCK_SIZE)],
        }
    }
}

impl Default for Lz4hCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for Lz4hCodec {
    fn id(&self) -> CodecId {
        CodecId::Lz4h
    }

    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        let mut src = Source::new(src);

        // Tag word.  Read and discarded, never validated: detection already
        // matched it, and an explicit override deliberately bypasses it.
        src.read_u32()?;
        let total = (src.read_u32()? & 0x00ff_ffff) as usize;
        if total > dst.len() {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }

        let mut out = 0usize;
        while out < total {
            let block_size = src.read_u32()? as usize;
            if block_size > self.scratch.len() {
                return Err(CodecError::BlockTooLarge {
                    size: block_size,
                    max:  self.scratch.len(),
                });
            }
            src.transfer(&mut self.scratch[..block_size])?;
            // Bounding the region at `total` keeps block N+1's back-references
            // and output inside the declared image even if a block overruns.
            out += decode_block(&self.scratch[..block_size], &mut dst[out..total])?;
        }

        Ok(out)
    }
}
