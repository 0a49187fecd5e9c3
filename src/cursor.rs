//! Bounds-checked little-endian reader over an immutable byte buffer.

use crate::error::{PeError, Result};

/// A read position over the whole input.
///
/// Every read either returns the full value or `PeError::ShortRead`; nothing
/// is ever zero-filled.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of input.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Moves to an absolute offset. Seeking exactly to the end is allowed,
    /// seeking past it is not.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        match usize::try_from(offset) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                Ok(())
            }
            _ => Err(PeError::Unreachable {
                offset,
                len: self.data.len(),
            }),
        }
    }

    /// Advances the position, clamping at the end of input.
    pub fn skip(&mut self, count: usize) {
        self.pos = self.pos.saturating_add(count).min(self.data.len());
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(PeError::ShortRead {
                offset: self.pos,
                wanted: count,
                len: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a NUL-terminated string at `offset` without moving the cursor.
    ///
    /// Non-UTF-8 bytes are replaced; a string running into the end of input
    /// is an error.
    pub fn read_cstring_at(&self, offset: u64) -> Result<String> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start < self.data.len())
            .ok_or(PeError::Unreachable {
                offset,
                len: self.data.len(),
            })?;
        let tail = &self.data[start..];
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(PeError::UnterminatedString { offset: start })?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }
}
