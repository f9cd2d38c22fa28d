//! UCL NRV2B decoder.
//!
//! The 8-byte header is the "UCL0" tag and a big-endian u32 decompressed
//! size; the rest is the NRV2B bit stream.  Bits are consumed MSB-first
//! from a byte buffer with a marker-bit reload.  Literals are flagged by a
//! set bit; matches carry a gamma-coded offset (value 2 reuses the previous
//! offset) and a 2-bit-then-gamma length, with a +1 length bonus for
//! offsets above 0xd00.  An offset word of 0xffffffff ends the stream.

use byteorder::{BigEndian, ByteOrder};

use super::{Codec, CodecError, CodecId};

const HEADER_SIZE: usize = 8;

struct BitReader<'a> {
    src: &'a [u8],
    ip:  usize,
    bb:  u32,
}

impl<'a> BitReader<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, ip: 0, bb: 0 }
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self
            .src
            .get(self.ip)
            .ok_or(CodecError::Truncated { at: self.src.len() })?;
        self.ip += 1;
        Ok(b)
    }

    /// MSB-first bit with marker reload: the low set bit tracks how much of
    /// the current byte remains.
    fn bit(&mut self) -> Result<usize, CodecError> {
        if self.bb & 0x7f == 0 {
            self.bb = self.byte()? as u32 * 2 + 1;
        } else {
            self.bb *= 2;
        }
        Ok(((self.bb >> 8) & 1) as usize)
    }
}

pub struct UclCodec;

impl Codec for UclCodec {
    fn id(&self) -> CodecId {
        CodecId::Ucl
    }

    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if src.len() < HEADER_SIZE {
            return Err(CodecError::Truncated { at: src.len() });
        }
        let total = BigEndian::read_u32(&src[4..8]) as usize;
        if total > dst.len() {
            return Err(CodecError::OutputOverflow { capacity: dst.len() });
        }

        let mut bits = BitReader::new(&src[HEADER_SIZE..]);
        let mut op = 0usize;
        let mut last_off = 1usize;

        loop {
            while bits.bit()? == 1 {
                if op >= total {
                    return Err(CodecError::OutputOverflow { capacity: total });
                }
                dst[op] = bits.byte()?;
                op += 1;
            }

            // Gamma-coded offset prefix.  Saturating arithmetic: a malformed
            // prefix ends up failing the range check instead of wrapping.
            let mut m_off = 1usize;
            loop {
                m_off = m_off.saturating_mul(2) + bits.bit()?;
                if bits.bit()? != 0 {
                    break;
                }
            }

            if m_off == 2 {
                m_off = last_off;
            } else {
                m_off = (m_off - 3).saturating_mul(256) + bits.byte()? as usize;
                if m_off == 0xffff_ffff {
                    break;
                }
                m_off += 1;
                last_off = m_off;
            }

            let mut m_len = bits.bit()? * 2 + bits.bit()?;
            if m_len == 0 {
                m_len = 1;
                loop {
                    m_len = m_len.saturating_mul(2) + bits.bit()?;
                    if bits.bit()? != 0 {
                        break;
                    }
                }
                m_len += 2;
            }
            if m_off > 0xd00 {
                m_len += 1;
            }
            let count = m_len.saturating_add(1);

            if m_off > op {
                return Err(CodecError::BadBackReference {
                    offset:   m_off,
                    produced: op,
                });
            }
            if count > total - op {
                return Err(CodecError::OutputOverflow { capacity: total });
            }
            let from = op - m_off;
            for i in 0..count {
                dst[op + i] = dst[from + i];
            }
            op += count;
        }

        Ok(op)
    }
}
