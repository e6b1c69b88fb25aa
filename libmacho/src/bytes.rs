//! Bounds-checked byte access
//!
//! Every structure in the decoder is read through [`ByteView`]. Offsets come
//! straight from the file, so all arithmetic is overflow-checked and every
//! read is validated against the buffer length before any byte is touched.

use std::ops::Range;

use crate::error::{MachoError, Result};

/// Byte order of the multi-byte fields in an image, announced by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Read-only view over the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Validate `[offset, offset + len)` against the buffer and return it as a range.
    pub fn range(&self, what: &'static str, offset: usize, len: usize) -> Result<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(MachoError::Truncated {
                what,
                offset,
                len,
                available: self.data.len(),
            }),
        }
    }

    pub fn slice(&self, what: &'static str, offset: usize, len: usize) -> Result<&'a [u8]> {
        let range = self.range(what, offset, len)?;
        Ok(&self.data[range])
    }

    fn array<const N: usize>(&self, what: &'static str, offset: usize) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.slice(what, offset, N)?);
        Ok(buf)
    }

    pub fn u8(&self, what: &'static str, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(what, offset)?[0])
    }

    pub fn u16(&self, what: &'static str, offset: usize) -> Result<u16> {
        let b = self.array(what, offset)?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        })
    }

    pub fn u32(&self, what: &'static str, offset: usize) -> Result<u32> {
        let b = self.array(what, offset)?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        })
    }

    /// Read a fixed-width, NUL-padded name field (segment and section names).
    pub fn fixed_name(&self, what: &'static str, offset: usize) -> Result<FixedName> {
        Ok(FixedName::from_padded(self.array(what, offset)?))
    }

    /// Locate the NUL-terminated run starting at `offset`.
    ///
    /// Returns `None` when `offset` is at or past the end of the buffer. A run
    /// with no terminator before the end of the buffer stops at the end.
    pub fn cstr_range(&self, offset: usize) -> Option<Range<usize>> {
        let tail = self.data.get(offset..).filter(|t| !t.is_empty())?;
        let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(offset..offset + len)
    }
}

/// A 16-byte name field with its NUL padding trimmed.
///
/// Stored inline so segments and sections stay independent of the buffer
/// while comparisons remain byte-exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedName {
    bytes: [u8; 16],
    len: u8,
}

impl FixedName {
    pub const WIDTH: usize = 16;

    pub fn from_padded(bytes: [u8; 16]) -> Self {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn matches(&self, name: impl AsRef<[u8]>) -> bool {
        self.as_bytes() == name.as_ref()
    }
}

impl std::fmt::Display for FixedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl std::fmt::Debug for FixedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_respect_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let le = ByteView::new(&data, Endian::Little);
        let be = ByteView::new(&data, Endian::Big);
        assert_eq!(le.u32("word", 0).unwrap(), 0x04030201);
        assert_eq!(be.u32("word", 0).unwrap(), 0x01020304);
        assert_eq!(le.u16("half", 2).unwrap(), 0x0403);
        assert_eq!(be.u16("half", 2).unwrap(), 0x0304);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let data = [0u8; 6];
        let view = ByteView::new(&data, Endian::Little);
        assert!(view.u32("word", 2).is_ok());
        let err = view.u32("word", 3).unwrap_err();
        assert!(err.is_truncated());
        assert!(view.u8("byte", 6).is_err());
    }

    #[test]
    fn test_overflowing_offset_is_truncated() {
        let data = [0u8; 4];
        let view = ByteView::new(&data, Endian::Little);
        assert!(view.range("huge", usize::MAX - 1, 4).unwrap_err().is_truncated());
    }

    #[test]
    fn test_cstr_range() {
        let data = b"abc\0de";
        let view = ByteView::new(data, Endian::Little);
        assert_eq!(view.cstr_range(0), Some(0..3));
        assert_eq!(view.cstr_range(3), Some(3..3));
        // Unterminated run stops at the end of the buffer
        assert_eq!(view.cstr_range(4), Some(4..6));
        assert_eq!(view.cstr_range(6), None);
        assert_eq!(view.cstr_range(100), None);
    }

    #[test]
    fn test_fixed_name_trims_padding() {
        let mut raw = [0u8; 16];
        raw[..6].copy_from_slice(b"__TEXT");
        let name = FixedName::from_padded(raw);
        assert_eq!(name.as_bytes(), b"__TEXT");
        assert!(name.matches("__TEXT"));
        assert!(!name.matches("__TEXT\0"));
        assert_eq!(name.to_string(), "__TEXT");

        let full = FixedName::from_padded(*b"0123456789abcdef");
        assert_eq!(full.as_bytes().len(), 16);
    }
}
