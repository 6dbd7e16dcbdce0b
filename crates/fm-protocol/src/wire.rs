//! Bounds-checked primitives for fixed-width fields.

use crate::{ProtocolError, ProtocolResult};

/// Width of every text field on the wire.
pub const TEXT_FIELD_LEN: usize = 255;

/// Longest text that still leaves room for a terminating NUL.
pub const MAX_TEXT_LEN: usize = TEXT_FIELD_LEN - 1;

pub(crate) struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Continue writing at the end of an existing buffer.
    pub(crate) fn append_to(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn put_bool(&mut self, value: bool) {
        self.put_u32(u32::from(value));
    }

    pub(crate) fn put_text(&mut self, field: &'static str, value: &str) -> ProtocolResult<()> {
        let bytes = value.as_bytes();
        if bytes.len() > MAX_TEXT_LEN {
            return Err(ProtocolError::FieldTooLong {
                field,
                len: bytes.len(),
                max: MAX_TEXT_LEN,
            });
        }
        self.buf.extend_from_slice(bytes);
        self.buf
            .resize(self.buf.len() + TEXT_FIELD_LEN - bytes.len(), 0);
        Ok(())
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(ProtocolError::SizeMismatch {
                len: self.buf.len(),
                record: self.pos + len,
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u32(&mut self) -> ProtocolResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn i32(&mut self) -> ProtocolResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn i64(&mut self) -> ProtocolResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn bool(&mut self) -> ProtocolResult<bool> {
        Ok(self.u32()? != 0)
    }

    /// Reads a NUL-padded text field; bytes after the first NUL are ignored.
    pub(crate) fn text(&mut self, field: &'static str) -> ProtocolResult<String> {
        let raw = self.take(TEXT_FIELD_LEN)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        String::from_utf8(raw[..end].to_vec()).map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
