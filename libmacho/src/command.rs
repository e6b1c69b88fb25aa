//! Load command prologue and kind classification

use log::trace;

use crate::bytes::ByteView;
use crate::error::{MachoError, Result};

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;

/// Size of the `cmd`/`cmdsize` prologue shared by every load command.
pub const PROLOGUE_SIZE: usize = 8;

/// Structural kind of a load command.
///
/// Only segments and symbol tables are decoded; everything else is recorded
/// by its raw code and skipped by its declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Segment,
    Symtab,
    Other(u32),
}

impl CommandKind {
    pub fn from_raw(cmd: u32) -> Self {
        match cmd {
            LC_SEGMENT => CommandKind::Segment,
            LC_SYMTAB => CommandKind::Symtab,
            other => CommandKind::Other(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            CommandKind::Segment => LC_SEGMENT,
            CommandKind::Symtab => LC_SYMTAB,
            CommandKind::Other(raw) => *raw,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        command_name(self.raw())
    }
}

/// A load command as it appears in the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// Declared size in bytes, prologue included.
    pub size: u32,
    /// File offset of the prologue.
    pub offset: usize,
    /// Position in the command stream.
    pub index: u32,
}

impl Command {
    /// Read the prologue at `offset`.
    pub fn parse(r: &ByteView<'_>, offset: usize, index: u32) -> Result<Command> {
        let cmd = r.u32("load command prologue", offset)?;
        let size = r.u32("load command prologue", offset + 4)?;
        if size == 0 {
            return Err(MachoError::malformed(index, offset, "command size is zero"));
        }
        if (size as usize) < PROLOGUE_SIZE {
            return Err(MachoError::malformed(
                index,
                offset,
                format!("command size {size} is smaller than its prologue"),
            ));
        }
        let kind = CommandKind::from_raw(cmd);
        trace!(
            "command #{index} at 0x{offset:x}: {} ({size} bytes)",
            kind.name().unwrap_or("unknown")
        );
        Ok(Command {
            kind,
            size,
            offset,
            index,
        })
    }

    /// Offset at which the following command starts.
    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }

    pub fn name(&self) -> Option<&'static str> {
        self.kind.name()
    }
}

/// Display name for a load command code.
pub fn command_name(cmd: u32) -> Option<&'static str> {
    Some(match cmd {
        0x01 => "LC_SEGMENT",
        0x02 => "LC_SYMTAB",
        0x03 => "LC_SYMSEG",
        0x04 => "LC_THREAD",
        0x05 => "LC_UNIXTHREAD",
        0x06 => "LC_LOADFVMLIB",
        0x07 => "LC_IDFVMLIB",
        0x08 => "LC_IDENT",
        0x09 => "LC_FVMFILE",
        0x0A => "LC_PREPAGE",
        0x0B => "LC_DYSYMTAB",
        0x0C => "LC_LOAD_DYLIB",
        0x0D => "LC_ID_DYLIB",
        0x0E => "LC_LOAD_DYLINKER",
        0x0F => "LC_ID_DYLINKER",
        0x10 => "LC_PREBOUND_DYLIB",
        0x11 => "LC_ROUTINES",
        0x12 => "LC_SUB_FRAMEWORK",
        0x13 => "LC_SUB_UMBRELLA",
        0x14 => "LC_SUB_CLIENT",
        0x15 => "LC_SUB_LIBRARY",
        0x16 => "LC_TWOLEVEL_HINTS",
        0x17 => "LC_PREBIND_CKSUM",
        0x80000018 => "LC_LOAD_WEAK_DYLIB",
        0x19 => "LC_SEGMENT_64",
        0x1A => "LC_ROUTINES_64",
        0x1B => "LC_UUID",
        0x8000001C => "LC_RPATH",
        0x1D => "LC_CODE_SIGNATURE",
        0x1E => "LC_SEGMENT_SPLIT_INFO",
        0x8000001F => "LC_REEXPORT_DYLIB",
        0x20 => "LC_LAZY_LOAD_DYLIB",
        0x21 => "LC_ENCRYPTION_INFO",
        0x22 => "LC_DYLD_INFO",
        0x80000022 => "LC_DYLD_INFO_ONLY",
        0x80000023 => "LC_LOAD_UPWARD_DYLIB",
        0x24 => "LC_VERSION_MIN_MACOSX",
        0x25 => "LC_VERSION_MIN_IPHONEOS",
        0x26 => "LC_FUNCTION_STARTS",
        0x27 => "LC_DYLD_ENVIRONMENT",
        0x80000028 => "LC_MAIN",
        0x29 => "LC_DATA_IN_CODE",
        0x2A => "LC_SOURCE_VERSION",
        0x2B => "LC_DYLIB_CODE_SIGN_DRS",
        0x2C => "LC_ENCRYPTION_INFO_64",
        0x2D => "LC_LINKER_OPTION",
        0x2E => "LC_LINKER_OPTIMIZATION_HINT",
        0x2F => "LC_VERSION_MIN_TVOS",
        0x30 => "LC_VERSION_MIN_WATCHOS",
        0x31 => "LC_NOTE",
        0x32 => "LC_BUILD_VERSION",
        _ => return None,
    })
}
