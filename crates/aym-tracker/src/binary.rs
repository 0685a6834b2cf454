//! Read-only byte view used by every decoder.
//!
//! All reads are bounds-checked and report the absolute offset of the
//! failing access, including reads through sub-views.

use crate::error::{Result, TrackerError};

/// Borrowed view over module data.
#[derive(Debug, Clone, Copy)]
pub struct BinaryView<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> BinaryView<'a> {
    /// View over the whole slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, base: 0 }
    }

    /// Number of bytes in the view.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Underlying bytes.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Absolute offset of the first byte of this view.
    pub fn base(&self) -> usize {
        self.base
    }

    /// View limited to the first `max` bytes.
    pub fn truncated(&self, max: usize) -> Self {
        Self {
            data: &self.data[..self.data.len().min(max)],
            base: self.base,
        }
    }

    /// Sub-range starting at `offset`, at most `len` bytes long.
    ///
    /// Returns `None` if `offset` lies past the end.
    pub fn sub_view(&self, offset: usize, len: usize) -> Option<Self> {
        if offset > self.data.len() {
            return None;
        }
        let end = offset.saturating_add(len).min(self.data.len());
        Some(Self {
            data: &self.data[offset..end],
            base: self.base + offset,
        })
    }

    /// `len` bytes at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.ensure_range(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Fail unless `size` bytes are available at `offset`.
    pub fn ensure_range(&self, offset: usize, size: usize) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(TrackerError::UnexpectedEof {
                offset: self.base + offset,
                needed: size,
                available: self.base + self.data.len(),
            }),
        }
    }

    /// Byte at `offset`, if present.
    pub fn peek_u8(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    /// Unsigned byte.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.ensure_range(offset, 1)?;
        Ok(self.data[offset])
    }

    /// Signed byte.
    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        self.read_u8(offset).map(|b| b as i8)
    }

    /// Little-endian unsigned word.
    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Little-endian signed word.
    pub fn read_i16_le(&self, offset: usize) -> Result<i16> {
        self.read_u16_le(offset).map(|w| w as i16)
    }

    /// Fixed-size text field, trimmed of padding and non-printable bytes.
    pub fn read_text(&self, offset: usize, len: usize) -> Result<String> {
        let raw = self.bytes(offset, len)?;
        Ok(decode_text(raw))
    }
}

/// Convert a fixed-width 8-bit text field into a trimmed string.
pub(crate) fn decode_text(raw: &[u8]) -> String {
    let text: String = raw
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { ' ' })
        .collect();
    text.trim().to_owned()
}
