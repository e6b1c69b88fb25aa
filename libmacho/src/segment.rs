//! Segment command decoding

use std::ops::Range;

use log::{debug, warn};

use crate::bytes::{ByteView, FixedName};
use crate::command::Command;
use crate::error::{MachoError, Result};
use crate::section::{SECTION_SIZE, Section};

/// Size of the segment command record, prologue included.
pub const SEGMENT_COMMAND_SIZE: usize = 56;

/// A decoded segment and its sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: FixedName,
    pub vmaddr: u32,
    pub vmsize: u32,
    pub fileoff: u32,
    pub filesize: u32,
    pub maxprot: u32,
    pub initprot: u32,
    pub flags: u32,
    /// Sections in on-disk order; always as many as the command declares.
    pub sections: Vec<Section>,
    /// Bytes of the buffer this segment maps, `[fileoff, fileoff + filesize)`.
    pub data: Range<usize>,
    /// File offset of the segment command itself.
    pub command_offset: usize,
}

impl Segment {
    pub fn parse(r: &ByteView<'_>, cmd: &Command) -> Result<Segment> {
        let off = cmd.offset;
        if (cmd.size as usize) < SEGMENT_COMMAND_SIZE {
            return Err(MachoError::malformed(
                cmd.index,
                off,
                format!("segment command is {} bytes, expected at least {SEGMENT_COMMAND_SIZE}", cmd.size),
            ));
        }
        r.range("segment command", off, SEGMENT_COMMAND_SIZE)?;

        let name = r.fixed_name("segment command", off + 8)?;
        let vmaddr = r.u32("segment command", off + 24)?;
        let vmsize = r.u32("segment command", off + 28)?;
        let fileoff = r.u32("segment command", off + 32)?;
        let filesize = r.u32("segment command", off + 36)?;
        let maxprot = r.u32("segment command", off + 40)?;
        let initprot = r.u32("segment command", off + 44)?;
        let nsects = r.u32("segment command", off + 48)? as usize;
        let flags = r.u32("segment command", off + 52)?;

        // The section array has to fit inside the command that declares it
        let array_len = nsects
            .checked_mul(SECTION_SIZE)
            .and_then(|n| n.checked_add(SEGMENT_COMMAND_SIZE));
        match array_len {
            Some(len) if len <= cmd.size as usize => {}
            _ => {
                return Err(MachoError::Truncated {
                    what: "section array",
                    offset: off + SEGMENT_COMMAND_SIZE,
                    len: nsects.saturating_mul(SECTION_SIZE),
                    available: cmd.size as usize - SEGMENT_COMMAND_SIZE,
                });
            }
        }

        let data = r.range("segment data", fileoff as usize, filesize as usize)?;

        let mut segment = Segment {
            name,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            flags,
            sections: Vec::with_capacity(nsects),
            data,
            command_offset: off,
        };
        let mut sect_off = off + SEGMENT_COMMAND_SIZE;
        for _ in 0..nsects {
            let section = Section::parse(r, sect_off)?;
            segment.check_section(r, cmd, &section)?;
            segment.sections.push(section);
            sect_off += SECTION_SIZE;
        }

        debug!(
            "segment {} at 0x{:08x}: file 0x{:x}+0x{:x}, {} sections",
            segment.name, vmaddr, fileoff, filesize, nsects
        );
        Ok(segment)
    }

    fn check_section(&self, r: &ByteView<'_>, cmd: &Command, section: &Section) -> Result<()> {
        let Some(range) = section.file_range() else {
            return Ok(());
        };
        if range.is_empty() {
            return Ok(());
        }
        r.range("section data", range.start, range.len())?;

        // A segment that maps no file bytes (dSYM companions) keeps its sections' original offsets
        if self.filesize == 0 {
            return Ok(());
        }
        if range.start < self.data.start || range.end > self.data.end {
            return Err(MachoError::malformed(
                cmd.index,
                cmd.offset,
                format!(
                    "section {} at file 0x{:x}+0x{:x} lies outside its segment's file range 0x{:x}..0x{:x}",
                    section.name,
                    range.start,
                    range.len(),
                    self.data.start,
                    self.data.end
                ),
            ));
        }
        if !self.maps_section(section) {
            warn!(
                "section {} at 0x{:08x} (file 0x{:x}) disagrees with segment {} mapping 0x{:08x} (file 0x{:x})",
                section.name, section.addr, section.offset, self.name, self.vmaddr, self.fileoff
            );
        }
        Ok(())
    }

    /// Whether a section's address and file offset agree with this segment's
    /// mapping, i.e. `addr - vmaddr == offset - fileoff`. Zero-fill and empty
    /// sections always agree.
    pub fn maps_section(&self, section: &Section) -> bool {
        if section.file_range().is_none_or(|r| r.is_empty()) {
            return true;
        }
        section.addr as i64 - self.vmaddr as i64 == section.offset as i64 - self.fileoff as i64
    }

    /// Find a section of this segment by exact name.
    pub fn get_section(&self, name: impl AsRef<[u8]>) -> Option<&Section> {
        let name = name.as_ref();
        self.sections.iter().find(|s| s.name.matches(name))
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Whether `offset` falls inside `[fileoff, fileoff + filesize)`.
    pub fn contains_offset(&self, offset: u64) -> bool {
        let start = self.fileoff as u64;
        offset >= start && offset < start + self.filesize as u64
    }

    /// Translate a file offset inside this segment to its virtual address.
    pub fn virtual_address(&self, offset: u64) -> Option<u32> {
        if !self.contains_offset(offset) {
            return None;
        }
        let delta = u32::try_from(offset - self.fileoff as u64).ok()?;
        self.vmaddr.checked_add(delta)
    }

    /// Translate a virtual address backed by file bytes to its file offset.
    pub fn file_offset(&self, vmaddr: u32) -> Option<usize> {
        let delta = vmaddr.checked_sub(self.vmaddr)?;
        if delta >= self.filesize {
            return None;
        }
        Some(self.fileoff as usize + delta as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::Endian;
    use crate::command::Command;
    use crate::fixture::{ImageBuilder, SectionSpec};
    use crate::header::HEADER_SIZE;

    fn parse_first(data: &[u8], endian: Endian) -> Result<Segment> {
        let view = ByteView::new(data, endian);
        let cmd = Command::parse(&view, HEADER_SIZE, 0)?;
        Segment::parse(&view, &cmd)
    }

    #[test]
    fn test_sections_in_disk_order() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x1000,
                0,
                0x400,
                &[
                    SectionSpec::new("__text", "__TEXT", 0x1200, 0x80, 0x200),
                    SectionSpec::new("__cstring", "__TEXT", 0x1280, 0x20, 0x280),
                    SectionSpec::new("__const", "__TEXT", 0x12A0, 0x10, 0x2A0),
                ],
            )
            .payload(0x3FF, &[0])
            .build();
        let seg = parse_first(&data, Endian::Little).unwrap();
        assert!(seg.name.matches("__TEXT"));
        assert_eq!(seg.section_count(), 3);
        let names: Vec<String> = seg.sections.iter().map(|s| s.name.to_string()).collect();
        assert_eq!(names, ["__text", "__cstring", "__const"]);
        assert_eq!(seg.data, 0..0x400);
        assert_eq!(seg.get_section("__cstring").unwrap().addr, 0x1280);
        assert!(seg.get_section("__data").is_none());
    }

    #[test]
    fn test_big_endian_segment() {
        let data = ImageBuilder::new(Endian::Big)
            .segment("__DATA", 0x8000, 0x100, 0x100, 0x100, &[])
            .payload(0x1FF, &[0])
            .build();
        let seg = parse_first(&data, Endian::Big).unwrap();
        assert_eq!(seg.vmaddr, 0x8000);
        assert_eq!(seg.fileoff, 0x100);
        assert_eq!(seg.data, 0x100..0x200);
        assert_eq!(seg.maxprot, 7);
        assert_eq!(seg.initprot, 5);
    }

    #[test]
    fn test_declared_sections_past_command_are_truncated() {
        let data = ImageBuilder::new(Endian::Little)
            .segment_declaring("__TEXT", 4, &[SectionSpec::new("__text", "__TEXT", 0, 0, 0)])
            .build();
        let err = parse_first(&data, Endian::Little).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_huge_section_count_is_truncated() {
        let data = ImageBuilder::new(Endian::Little)
            .segment_declaring("__TEXT", u32::MAX, &[])
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_truncated());
    }

    #[test]
    fn test_segment_data_past_buffer_is_truncated() {
        let data = ImageBuilder::new(Endian::Little)
            .segment("__LINKEDIT", 0x4000, 0x1000, 0x100, 0x1000, &[])
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_truncated());
    }

    #[test]
    fn test_section_outside_segment_is_malformed() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x100,
                0,
                0x100,
                &[SectionSpec::new("__text", "__TEXT", 0x1180, 0x100, 0x180)],
            )
            .payload(0x2FF, &[0])
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_malformed());
    }

    #[test]
    fn test_section_past_buffer_is_truncated() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x100,
                0,
                0x100,
                &[SectionSpec::new("__text", "__TEXT", 0x1000, 0x1000, 0x4000)],
            )
            .payload(0xFF, &[0])
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_truncated());
    }

    #[test]
    fn test_zerofill_section_needs_no_file_bytes() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__DATA",
                0x2000,
                0x2000,
                0,
                0,
                &[SectionSpec::new("__bss", "__DATA", 0x2000, 0x2000, 0).flags(0x1)],
            )
            .build();
        let seg = parse_first(&data, Endian::Little).unwrap();
        assert!(seg.sections[0].is_zerofill());
    }

    #[test]
    fn test_unmapped_segment_keeps_section_offsets() {
        // dsymutil output: __TEXT maps nothing but its sections keep their offsets
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x1000,
                0,
                0,
                &[SectionSpec::new("__text", "__TEXT", 0x1000, 0x80, 0)],
            )
            .payload(0xFF, &[0])
            .build();
        let seg = parse_first(&data, Endian::Little).unwrap();
        assert_eq!(seg.data, 0..0);
        assert_eq!(seg.sections[0].size, 0x80);
    }

    #[test]
    fn test_unmapped_segment_section_past_buffer_is_truncated() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x1000,
                0,
                0,
                &[SectionSpec::new("__text", "__TEXT", 0x1000, 0x80, 0x4000)],
            )
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_truncated());
    }

    #[test]
    fn test_maps_section() {
        let data = ImageBuilder::new(Endian::Little)
            .segment(
                "__TEXT",
                0x1000,
                0x400,
                0,
                0x400,
                &[
                    SectionSpec::new("__text", "__TEXT", 0x1200, 0x80, 0x200),
                    // address says 0x300, offset says 0x280: tolerated, reported
                    SectionSpec::new("__const", "__TEXT", 0x1300, 0x10, 0x280),
                    SectionSpec::new("__bss", "__TEXT", 0x1380, 0x40, 0).flags(0x1),
                ],
            )
            .payload(0x3FF, &[0])
            .build();
        let seg = parse_first(&data, Endian::Little).unwrap();
        assert!(seg.maps_section(&seg.sections[0]));
        assert!(!seg.maps_section(&seg.sections[1]));
        assert!(seg.maps_section(&seg.sections[2]));
    }

    #[test]
    fn test_short_segment_command_is_malformed() {
        let data = ImageBuilder::new(Endian::Little)
            .raw_command(crate::command::LC_SEGMENT, &[0u8; 16])
            .build();
        assert!(parse_first(&data, Endian::Little).unwrap_err().is_malformed());
    }

    #[test]
    fn test_translation() {
        let data = ImageBuilder::new(Endian::Little)
            .segment("__TEXT", 0x4000, 0x1000, 0x1000, 0x1000, &[])
            .payload(0x1FFF, &[0])
            .build();
        let seg = parse_first(&data, Endian::Little).unwrap();
        assert!(seg.contains_offset(0x1000));
        assert!(!seg.contains_offset(0x2000));
        assert_eq!(seg.virtual_address(0x1050), Some(0x4050));
        assert_eq!(seg.virtual_address(0xFFF), None);
        assert_eq!(seg.file_offset(0x4050), Some(0x1050));
        assert_eq!(seg.file_offset(0x5000), None);
        assert_eq!(seg.file_offset(0x3FFF), None);
    }
}
