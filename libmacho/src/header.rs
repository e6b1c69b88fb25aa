//! Mach-O file header

use log::debug;

use crate::bytes::{ByteView, Endian};
use crate::error::{MachoError, Result};

pub const MH_MAGIC: u32 = 0xFEEDFACE;
pub const MH_CIGAM: u32 = 0xCEFAEDFE;
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;
pub const MH_CIGAM_64: u32 = 0xCFFAEDFE;
pub const FAT_MAGIC: u32 = 0xCAFEBABE;
pub const FAT_CIGAM: u32 = 0xBEBAFECA;

/// Size of the on-disk header record.
pub const HEADER_SIZE: usize = 28;

/// Container format announced by the first four bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    MachO32(Endian),
    MachO64(Endian),
    Fat,
    Unknown,
}

impl FileFormat {
    /// Classify a file by its leading magic bytes.
    pub fn classify(magic: [u8; 4]) -> Self {
        match u32::from_be_bytes(magic) {
            MH_MAGIC => FileFormat::MachO32(Endian::Big),
            MH_CIGAM => FileFormat::MachO32(Endian::Little),
            MH_MAGIC_64 => FileFormat::MachO64(Endian::Big),
            MH_CIGAM_64 => FileFormat::MachO64(Endian::Little),
            FAT_MAGIC | FAT_CIGAM => FileFormat::Fat,
            _ => FileFormat::Unknown,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FileFormat::MachO32(_) => "32-bit Mach-O",
            FileFormat::MachO64(_) => "64-bit Mach-O",
            FileFormat::Fat => "universal (fat) binary",
            FileFormat::Unknown => "not a Mach-O file",
        }
    }
}

/// Check if the given bytes start with any recognized Mach-O magic
pub fn is_macho(bytes: &[u8]) -> bool {
    match bytes.get(..4) {
        Some(m) => FileFormat::classify([m[0], m[1], m[2], m[3]]) != FileFormat::Unknown,
        None => false,
    }
}

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Always [`MH_MAGIC`]; the on-disk byte order is kept in [`Header::endian`].
    pub magic: u32,
    pub cpu_type: u32,
    pub cpu_subtype: u32,
    pub file_type: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub endian: Endian,
}

impl Header {
    /// Decode the header at the start of `data`.
    ///
    /// Only the 32-bit layout is decoded; 64-bit and fat images are rejected
    /// with [`MachoError::UnsupportedFormat`].
    pub fn parse(data: &[u8]) -> Result<Header> {
        let probe = ByteView::new(data, Endian::Big);
        let raw = probe.u32("header magic", 0)?;
        let endian = match FileFormat::classify(raw.to_be_bytes()) {
            FileFormat::MachO32(endian) => endian,
            other => {
                return Err(MachoError::UnsupportedFormat {
                    magic: raw,
                    format: other.describe(),
                });
            }
        };

        let r = ByteView::new(data, endian);
        r.range("header", 0, HEADER_SIZE)?;
        let header = Header {
            magic: MH_MAGIC,
            cpu_type: r.u32("header", 4)?,
            cpu_subtype: r.u32("header", 8)?,
            file_type: r.u32("header", 12)?,
            ncmds: r.u32("header", 16)?,
            sizeofcmds: r.u32("header", 20)?,
            flags: r.u32("header", 24)?,
            endian,
        };
        debug!(
            "header: {:?}-endian, cputype 0x{:08x}, filetype {}, {} commands in {} bytes",
            endian, header.cpu_type, header.file_type, header.ncmds, header.sizeofcmds
        );
        Ok(header)
    }

    pub fn cpu_name(&self) -> &'static str {
        cpu_type_str(self.cpu_type)
    }

    pub fn file_type_name(&self) -> &'static str {
        file_type_str(self.file_type)
    }

    pub fn flag_names(&self) -> Vec<&'static str> {
        header_flag_names(self.flags)
    }
}

pub fn cpu_type_str(cpu_type: u32) -> &'static str {
    match cpu_type {
        1 => "VAX",
        6 => "MC680x0",
        7 => "x86 (i386)",
        0x01000007 => "x86_64",
        10 => "MC98000",
        11 => "HPPA",
        12 => "ARM",
        0x0100000C => "ARM64",
        0x0200000C => "ARM64_32",
        13 => "MC88000",
        14 => "SPARC",
        15 => "i860",
        18 => "PowerPC",
        0x01000012 => "PowerPC64",
        _ => "Unknown",
    }
}

pub fn file_type_str(ft: u32) -> &'static str {
    match ft {
        1 => "MH_OBJECT (relocatable)",
        2 => "MH_EXECUTE (executable)",
        3 => "MH_FVMLIB",
        4 => "MH_CORE (core dump)",
        5 => "MH_PRELOAD",
        6 => "MH_DYLIB (dynamic library)",
        7 => "MH_DYLINKER (dynamic linker)",
        8 => "MH_BUNDLE (bundle/plugin)",
        9 => "MH_DYLIB_STUB",
        10 => "MH_DSYM (debug symbols)",
        11 => "MH_KEXT_BUNDLE (kernel extension)",
        _ => "Unknown",
    }
}

pub fn header_flag_names(flags: u32) -> Vec<&'static str> {
    const NAMES: &[(u32, &str)] = &[
        (0x1, "NOUNDEFS"),
        (0x2, "INCRLINK"),
        (0x4, "DYLDLINK"),
        (0x8, "BINDATLOAD"),
        (0x10, "PREBOUND"),
        (0x20, "SPLIT_SEGS"),
        (0x80, "TWOLEVEL"),
        (0x100, "FORCE_FLAT"),
        (0x200, "NOMULTIDEFS"),
        (0x2000, "SUBSECTIONS_VIA_SYMBOLS"),
        (0x8000, "WEAK_DEFINES"),
        (0x10000, "BINDS_TO_WEAK"),
        (0x20000, "ALLOW_STACK_EXECUTION"),
        (0x200000, "PIE"),
        (0x1000000, "NO_HEAP_EXECUTION"),
    ];
    NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ImageBuilder;

    #[test]
    fn test_parse_little_endian_header() {
        let data = ImageBuilder::new(Endian::Little).cpu(12, 9).file_type(2).build();
        let header = Header::parse(&data).unwrap();
        assert_eq!(header.magic, MH_MAGIC);
        assert_eq!(header.endian, Endian::Little);
        assert_eq!(header.cpu_type, 12);
        assert_eq!(header.cpu_subtype, 9);
        assert_eq!(header.file_type, 2);
        assert_eq!(header.ncmds, 0);
        assert_eq!(header.cpu_name(), "ARM");
    }

    #[test]
    fn test_parse_big_endian_header() {
        let data = ImageBuilder::new(Endian::Big).cpu(18, 0).file_type(1).build();
        let header = Header::parse(&data).unwrap();
        assert_eq!(header.magic, MH_MAGIC);
        assert_eq!(header.endian, Endian::Big);
        assert_eq!(header.cpu_type, 18);
        assert_eq!(header.file_type_name(), "MH_OBJECT (relocatable)");
    }

    #[test]
    fn test_rejects_other_magics() {
        for magic in [MH_MAGIC_64, FAT_MAGIC, 0x7F454C46, 0] {
            let mut data = vec![0u8; 64];
            data[..4].copy_from_slice(&magic.to_be_bytes());
            let err = Header::parse(&data).unwrap_err();
            assert!(err.is_unsupported(), "magic 0x{magic:08x} should be rejected");
        }
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        assert!(Header::parse(&[]).unwrap_err().is_truncated());
        let data = ImageBuilder::new(Endian::Little).build();
        assert!(Header::parse(&data[..20]).unwrap_err().is_truncated());
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            FileFormat::classify([0xCE, 0xFA, 0xED, 0xFE]),
            FileFormat::MachO32(Endian::Little)
        );
        assert_eq!(
            FileFormat::classify([0xCF, 0xFA, 0xED, 0xFE]),
            FileFormat::MachO64(Endian::Little)
        );
        assert_eq!(FileFormat::classify([0xCA, 0xFE, 0xBA, 0xBE]), FileFormat::Fat);
        assert_eq!(FileFormat::classify(*b"\x7fELF"), FileFormat::Unknown);
        assert!(is_macho(&[0xFE, 0xED, 0xFA, 0xCE, 0]));
        assert!(!is_macho(&[0xFE, 0xED]));
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(header_flag_names(0x200085), vec!["NOUNDEFS", "DYLDLINK", "TWOLEVEL", "PIE"]);
        assert!(header_flag_names(0).is_empty());
    }
}
