//! Little-endian helpers shared by the tensor, metadata and dataset codecs

use super::error::DecodeError;

pub(crate) fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Length-prefixed (u32) byte string
pub(crate) fn put_str(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

/// Bounds-checked cursor over an encoded buffer
///
/// Every read names what it was reading so truncation errors say which
/// part of the structure was cut short.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                what,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>(what)?[0])
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        self.take_array(what).map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        self.take_array(what).map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self, what: &'static str) -> Result<u64, DecodeError> {
        self.take_array(what).map(u64::from_le_bytes)
    }

    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, DecodeError> {
        self.take_array(what).map(i32::from_le_bytes)
    }

    pub fn read_i64(&mut self, what: &'static str) -> Result<i64, DecodeError> {
        self.take_array(what).map(i64::from_le_bytes)
    }

    pub fn read_f32(&mut self, what: &'static str) -> Result<f32, DecodeError> {
        self.take_array(what).map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self, what: &'static str) -> Result<f64, DecodeError> {
        self.take_array(what).map(f64::from_le_bytes)
    }

    /// Read a u32 length-prefixed UTF-8 string
    pub fn read_str(&mut self, what: &'static str) -> Result<String, DecodeError> {
        let len = self.read_u32(what)? as usize;
        let raw = self.take(len, what)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8(what))
    }

    /// Fail if anything is left after a complete structure
    pub fn finish(&self, what: &'static str) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { what, count }),
        }
    }
}
