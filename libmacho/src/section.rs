use std::ops::Range;

use crate::bytes::{ByteView, FixedName};
use crate::error::Result;

/// Size of an on-disk section record.
pub const SECTION_SIZE: usize = 68;

const SECTION_TYPE: u32 = 0x000000FF;
const S_ZEROFILL: u32 = 0x1;
const S_GB_ZEROFILL: u32 = 0xC;
const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;

/// A section record following its segment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: FixedName,
    pub segment_name: FixedName,
    pub addr: u32,
    pub size: u32,
    pub offset: u32,
    /// Alignment as a power of two.
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

impl Section {
    pub fn parse(r: &ByteView<'_>, offset: usize) -> Result<Section> {
        r.range("section", offset, SECTION_SIZE)?;
        Ok(Section {
            name: r.fixed_name("section", offset)?,
            segment_name: r.fixed_name("section", offset + 16)?,
            addr: r.u32("section", offset + 32)?,
            size: r.u32("section", offset + 36)?,
            offset: r.u32("section", offset + 40)?,
            align: r.u32("section", offset + 44)?,
            reloff: r.u32("section", offset + 48)?,
            nreloc: r.u32("section", offset + 52)?,
            flags: r.u32("section", offset + 56)?,
            reserved1: r.u32("section", offset + 60)?,
            reserved2: r.u32("section", offset + 64)?,
        })
    }

    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// Zero-fill sections occupy address space but no file bytes.
    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.section_type(),
            S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
        )
    }

    /// File range holding the section's bytes, or `None` for zero-fill sections.
    pub fn file_range(&self) -> Option<Range<usize>> {
        if self.is_zerofill() {
            return None;
        }
        let start = self.offset as usize;
        Some(start..start + self.size as usize)
    }

    pub fn alignment_bytes(&self) -> u64 {
        1u64.checked_shl(self.align).unwrap_or(0)
    }
}
