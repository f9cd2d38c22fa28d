//! aPLib decoder.
//!
//! The 8-byte header is the "APL0" tag and a big-endian u32 decompressed
//! size; the rest is the aPLib depack stream.  The first output byte is a
//! verbatim literal.  After that, tag bits (MSB-first, one tag byte at a
//! time) select between a literal, a gamma-coded match with repeat-offset
//! handling, a short one-byte match (whose zero offset ends the stream),
//! and a 4-bit nibble code that emits a single near byte or a zero.

use byteorder::{BigEndian, ByteOrder};

use super::{Codec, CodecError, CodecId};

const HEADER_SIZE: usize = 8;

struct TagReader<'a> {
    src:   &'a [u8],
    ip:    usize,
    tag:   u8,
    count: u8,
}

impl<'a> TagReader<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, ip: 0, tag: 0, count: 0 }
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .src
            .get(self.ip)
            .ok_or(CodecError::Truncated { at: self.src.len() })?;
        self.ip += 1;
        Ok(b)
    }

    fn bit(&mut self) -> Result<usize, CodecError> {
        if self.count == 0 {
            self.tag = self.byte()?;
            self.count = 8;
        }
        let b = (self.tag >> 7) as usize;
        self.tag <<= 1;
        self.count -= 1;
        Ok(b)
    }

    /// Elias-gamma-style code: build the value MSB-first, one data bit per
    /// continue bit.  Saturating, so a malformed prefix fails the range
    /// checks instead of wrapping.
    fn gamma(&mut self) -> Result<usize, CodecError> {
        let mut v = 1usize;
        loop {
            v = v.saturating_mul(2) + self.bit()?;
            if self.bit()? == 0 {
                return Ok(v);
            }
        }
    }
}

pub struct AplibCodec;

impl Codec for AplibCodec {
    fn id(&self) -> CodecId {
        CodecId::Aplib
    }

    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if src.len() < HEADER_SIZE {
            return Err(CodecError::Truncated { at: src.len() });
        }
        let total = BigEndian::read_u32(&src[4..8]) as usize;
        if total > dst.len() {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }

        let mut bits = TagReader::new(&src[HEADER_SIZE..]);
        let mut op = 0usize;
        let mut r0 = 0usize;
        // Set after any match; the gamma offset value 2 means "reuse r0"
        // only when the previous op was a literal.
        let mut last_was_match = false;

        if total == 0 {
            return Ok(0);
        }
        dst[op] = bits.byte()?;
        op += 1;

        loop {
            if bits.bit()? == 0 {
                if op >= total {
                    return Err(CodecError::OutputOverflow { capacity: total });
                }
                dst[op] = bits.byte()?;
                op += 1;
                last_was_match = false;
                continue;
            }

            if bits.bit()? == 0 {
                // Gamma match.
                let g = bits.gamma()?;
                let (offs, len) = if !last_was_match && g == 2 {
                    (r0, bits.gamma()?)
                } else {
                    let high = if last_was_match { g - 2 } else { g - 3 };
                    let offs = high.saturating_mul(256) + bits.byte()? as usize;
                    let mut len = bits.gamma()?;
                    if offs >= 32000 {
                        len += 1;
                    }
                    if offs >= 1280 {
                        len += 1;
                    }
                    if offs < 128 {
                        len += 2;
                    }
                    r0 = offs;
                    (offs, len)
                };
                copy_match(dst, &mut op, offs, len, total)?;
                last_was_match = true;
            } else if bits.bit()? == 0 {
                // Short match: 7-bit offset, 1-bit length; zero offset ends
                // the stream.
                let b = bits.byte()?;
                let offs = (b >> 1) as usize;
                if offs == 0 {
                    break;
                }
                let len = 2 + (b & 1) as usize;
                copy_match(dst, &mut op, offs, len, total)?;
                r0 = offs;
                last_was_match = true;
            } else {
                // Nibble code: emit one byte from a tiny offset, or a zero.
                let mut offs = 0usize;
                for _ in 0..4 {
                    offs = offs * 2 + bits.bit()?;
                }
                if op >= total {
                    return Err(CodecError::OutputOverflow { capacity: total });
                }
                if offs == 0 {
                    dst[op] = 0;
                } else {
                    if offs > op {
                        return Err(CodecError::BadBackReference {
                            offset:   offs,
                            produced: op,
                        });
                    }
                    dst[op] = dst[op - offs];
                }
                op += 1;
                last_was_match = false;
            }
        }

        Ok(op)
    }
}

fn copy_match(
    dst:   &mut [u8],
    op:    &mut usize,
    offs:  usize,
    len:   usize,
    total: usize,
) -> Result<(), CodecError> {
    if offs == 0 || offs > *op {
        return Err(CodecError::BadBackReference {
            offset:   offs,
            produced: *op,
        });
    }
    if len > total - *op {
        return Err(CodecError::OutputOverflow { capacity: total });
    }
    let from = *op - offs;
    for i in 0..len {
        dst[*op + i] = dst[from + i];
    }
    *op += len;
    Ok(())
}
