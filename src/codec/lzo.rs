//! LZO1X decoder.
//!
//! The 8-byte header is the "LZO0" tag and a big-endian u32 decompressed
//! size; the rest is a standard LZO1X opcode stream.  Opcodes fall into a
//! literal-run class and four match classes (M1–M4) selected by the high
//! bits; every match carries a 2-bit trailing-literal count, and that count
//! is also the state that decides how the next sub-16 opcode is read.  The
//! stream ends at an M4 opcode whose distance bits are all zero.

use byteorder::{BigEndian, ByteOrder};

use super::{Codec, CodecError, CodecId};

const HEADER_SIZE: usize = 8;

#[inline]
fn read_byte(src: &[u8], ip: &mut usize) -> Result<u8, CodecError> {
    let b = *src.get(*ip).ok_or(CodecError::Truncated { at: src.len() })?;
    *ip += 1;
    Ok(b)
}

/// Zero-run length extension: each 0x00 byte adds 255, the first non-zero
/// byte terminates and is added on top of `base`.
fn read_run_length(src: &[u8], ip: &mut usize, base: usize) -> Result<usize, CodecError> {
    let mut n = base;
    loop {
        let b = read_byte(src, ip)?;
        if b == 0 {
            n += 255;
        } else {
            return Ok(n + b as usize);
        }
    }
}

pub struct LzoCodec;

impl Codec for LzoCodec {
    fn id(&self) -> CodecId {
        CodecId::Lzo
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

        // Trailing-literal state: 0 after a bare match, 1-3 after a match
        // with that many trailing literals, 4 after a literal run.
        let mut state = 0usize;

        // A first byte above 17 is an immediate literal run of (byte - 17).
        if let Some(&first) = src.first() {
            if first > 17 {
                ip += 1;
                let run = first as usize - 17;
                copy_literals(src, &mut ip, dst, &mut op, run, total)?;
                state = if run < 4 { run } else { 4 };
            }
        }

        loop {
            let t = read_byte(src, &mut ip)? as usize;
            let len;
            let dist;
            let trailing;

            if t < 16 {
                match state {
                    // Literal run: 3 + code, zero-extended.
                    0 => {
                        let run = if t == 0 {
                            read_run_length(src, &mut ip, 15)? + 3
                        } else {
                            t + 3
                        };
                        copy_literals(src, &mut ip, dst, &mut op, run, total)?;
                        state = 4;
                        continue;
                    }
                    // After a literal run: 3-byte match, distance 2049-3072.
                    4 => {
                        let b = read_byte(src, &mut ip)? as usize;
                        len = 3;
                        dist = (t >> 2) + (b << 2) + 2049;
                        trailing = t & 3;
                    }
                    // After 1-3 trailing literals: 2-byte match, near distance.
                    _ => {
                        let b = read_byte(src, &mut ip)? as usize;
                        len = 2;
                        dist = (t >> 2) + (b << 2) + 1;
                        trailing = t & 3;
                    }
                }
            } else if t >= 64 {
                // M2: length 3-8, distance 1-2048.
                let b = read_byte(src, &mut ip)? as usize;
                len = (t >> 5) + 1;
                dist = ((t >> 2) & 7) + (b << 3) + 1;
                trailing = t & 3;
            } else if t >= 32 {
                // M3: distance 1-16384, zero-extended length.
                let l = if t & 31 == 0 {
                    read_run_length(src, &mut ip, 31)?
                } else {
                    t & 31
                };
                let s0 = read_byte(src, &mut ip)? as usize;
                let s1 = read_byte(src, &mut ip)? as usize;
                let s = s0 | (s1 << 8);
                len = l + 2;
                dist = (s >> 2) + 1;
                trailing = s & 3;
            } else {
                // M4: distance 16384-49151, zero-extended length.  All-zero
                // distance bits mark the end of the stream.
                let l = if t & 7 == 0 {
                    read_run_length(src, &mut ip, 7)?
                } else {
                    t & 7
                };
                let s0 = read_byte(src, &mut ip)? as usize;
                let s1 = read_byte(src, &mut ip)? as usize;
                let s = s0 | (s1 << 8);
                let d = (s >> 2) + ((t & 8) << 11);
                if d == 0 {
                    break;
                }
                len = l + 2;
                dist = d + 0x4000;
                trailing = s & 3;
            }

            if dist > op {
                return Err(CodecError::BadBackReference {
                    offset:   dist,
                    produced: op,
                });
            }
            if len > total - op {
                return Err(CodecError::OutputOverflow { capacity: total });
            }
            // Near distances self-overlap; copy byte-wise.
            let from = op - dist;
            for i in 0..len {
                dst[op + i] = dst[from + i];
            }
            op += len;

            copy_literals(src, &mut ip, dst, &mut op, trailing, total)?;
            state = trailing;
        }

        Ok(op)
    }
}

fn copy_literals(
    src:   &[u8],
    ip:    &mut usize,
    dst:   &mut [u8],
    op:    &mut usize,
    n:     usize,
    total: usize,
) -> Result<(), CodecError> {
    if n > src.len() - *ip {
        return Err(CodecError::Truncated { at: src.len() });
    }
    if n > total - *op {
        return Err(CodecError::OutputOverflow { capacity: total });
    }
    dst[*op..*op + n].copy_from_slice(&src[*ip..*ip + n]);
    *ip += n;
    *op += n;
    Ok(())
}
