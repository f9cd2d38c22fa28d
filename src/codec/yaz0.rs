//! Yaz0 decoder.
//!
//! The 16-byte header is the "Yaz0" tag, a big-endian u32 decompressed size,
//! and 8 reserved bytes.  The stream is a sequence of groups: one code byte,
//! then 8 operations consumed MSB-first.  A set bit copies one literal byte;
//! a clear bit reads a 2-byte back-reference `NR RR` with distance R+1 and
//! length N+2, except N == 0 pulls a third byte giving length byte+0x12.

use byteorder::{BigEndian, ByteOrder};

use super::{Codec, CodecError, CodecId};

const HEADER_SIZE: usize = 16;

#[inline]
fn read_byte(src: &[u8], ip: &mut usize) -> Result<u8, CodecError> {
    let b = *src.get(*ip).ok_or(CodecError::Truncated { at: src.len() })?;
    *ip += 1;
    Ok(b)
}

pub struct Yaz0Codec;

impl Codec for Yaz0Codec {
    fn id(&self) -> CodecId {
        CodecId::Yaz0
    }

    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if src.len() < HEADER_SIZE {
            return Err(CodecError::Truncated { at: src.len() });
        }
        let total = BigEndian::read_u32(&src[4..8]) as usize;
        if total > dst.len() {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }

        let src = &src[HEADER_SIZE..];
        let mut ip = 0usize;
        let mut op = 0usize;
        let mut code = 0u8;
        let mut bits = 0u8;

        while op < total {
            if bits == 0 {
                code = read_byte(src, &mut ip)?;
                bits = 8;
            }
            if code & 0x80 != 0 {
                dst[op] = read_byte(src, &mut ip)?;
                op += 1;
            } else {
                let b1 = read_byte(src, &mut ip)? as usize;
                let b2 = read_byte(src, &mut ip)? as usize;
                let dist = ((b1 & 0x0f) << 8 | b2) + 1;
                let len = match b1 >> 4 {
                    0 => read_byte(src, &mut ip)? as usize + 0x12,
                    n => n + 2,
                };
                if dist > op {
                    return Err(CodecError::BadBackReference {
                        offset:   dist,
                        produced: op,
                    });
                }
                if len > total - op {
                    return Err(CodecError::OutputOverflow { capacity: total });
                }
                // Distances below the length self-overlap; copy byte-wise.
                let from = op - dist;
                for i in 0..len {
                    dst[op + i] = dst[from + i];
                }
                op += len;
            }
            code <<= 1;
            bits -= 1;
        }

        Ok(total)
    }
}
