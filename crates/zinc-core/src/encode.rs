//! Consensus byte encoding: little-endian integers and CompactSize lengths.

use crate::error::EncodeError;

/// Number of bytes used to encode `n` as a CompactSize.
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append `n` as a CompactSize.
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Append a length-prefixed byte string.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Cursor over a byte slice for decoding.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], EncodeError> {
        if self.remaining() < n {
            return Err(EncodeError::UnexpectedEof {
                needed: n - self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], EncodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, EncodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, EncodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, EncodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, EncodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, EncodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize, rejecting non-minimal encodings.
    pub fn read_compact_size(&mut self) -> Result<u64, EncodeError> {
        let n = match self.read_u8()? {
            0xfd => {
                let v = self.read_u16()? as u64;
                if v < 0xfd {
                    return Err(EncodeError::NonCanonicalSize);
                }
                v
            }
            0xfe => {
                let v = self.read_u32()? as u64;
                if v <= 0xffff {
                    return Err(EncodeError::NonCanonicalSize);
                }
                v
            }
            0xff => {
                let v = self.read_u64()?;
                if v <= 0xffff_ffff {
                    return Err(EncodeError::NonCanonicalSize);
                }
                v
            }
            small => small as u64,
        };
        Ok(n)
    }

    /// Read a CompactSize that counts items or bytes still to come.
    ///
    /// Bounded by the remaining input so a hostile length cannot force a
    /// huge allocation.
    pub fn read_length(&mut self) -> Result<usize, EncodeError> {
        let n = self.read_compact_size()?;
        let remaining = self.remaining();
        if n > remaining as u64 {
            return Err(EncodeError::UnexpectedEof {
                needed: (n - remaining as u64).min(usize::MAX as u64) as usize,
            });
        }
        Ok(n as usize)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, EncodeError> {
        let len = self.read_length()?;
        Ok(self.read_bytes(len)?.to_vec())
    }
}
