use std::io::{self, Read, Write};
use thiserror::Error;

/// Upper bound on the encoded size of a u64 varint.
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    #[error("Varint truncated")]
    Truncated,
    #[error("Varint exceeds {max} bytes", max = MAX_VARINT_LEN)]
    Overflow,
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize + 6) / 7
    }
}

/// Encode `value` into `buf` as a minimal base-128 varint, least-significant
/// group first, continuation bit set on every byte but the last. Returns the
/// number of bytes written.
pub fn encode_into(buf: &mut [u8; MAX_VARINT_LEN], mut value: u64) -> usize {
    let mut n = 0;
    while value >= 0x80 {
        buf[n] = (value as u8) | 0x80;
        value >>= 7;
        n += 1;
    }
    buf[n] = value as u8;
    n + 1
}

/// Encode `value` and write it to `w`. Returns the encoded length.
pub fn write_uvarint<W: Write>(w: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let n = encode_into(&mut buf, value);
    w.write_all(&buf[..n])?;
    Ok(n)
}

/// Decode one varint from the front of `buf`, returning the value and the
/// number of bytes consumed.
///
/// Non-minimal encodings are accepted; `Overflow` is returned once ten bytes
/// carry continuation bits or the tenth byte holds more than the single bit
/// still representable in a u64. `Truncated` means `buf` ended before a
/// terminating byte.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        if b < 0x80 {
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Err(VarintError::Overflow);
            }
            return Ok((value | (u64::from(b) << shift), i + 1));
        }
        value |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    if buf.len() >= MAX_VARINT_LEN {
        Err(VarintError::Overflow)
    } else {
        Err(VarintError::Truncated)
    }
}

/// Outcome of pulling one varint off a byte source.
///
/// `Eof` is distinct from `Truncated`: the former means the source ended
/// cleanly before the first byte (a legal stream boundary), the latter that
/// it died mid-varint. Callers translate these into positioned errors.
pub(crate) enum VarintRead {
    Value { value: u64, len: usize },
    Eof,
    Truncated { len: usize },
    Overflow,
}

pub(crate) fn read_uvarint<R: Read>(r: &mut R) -> io::Result<VarintRead> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for i in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        match r.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(if i == 0 {
                    VarintRead::Eof
                } else {
                    VarintRead::Truncated { len: i }
                });
            }
            Err(e) => return Err(e),
        }
        let b = byte[0];
        if b < 0x80 {
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return Ok(VarintRead::Overflow);
            }
            return Ok(VarintRead::Value {
                value: value | (u64::from(b) << shift),
                len: i + 1,
            });
        }
        value |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    Ok(VarintRead::Overflow)
}
