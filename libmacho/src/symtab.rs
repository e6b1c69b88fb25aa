//! Symbol table decoding
//!
//! A symtab command points at two regions of the file: an array of fixed-size
//! `nlist` entries and a string table. Each entry's name is resolved at load
//! time into a range of the owned buffer, so names are never copied.

use std::ops::Range;

use log::{debug, trace};

use crate::bytes::ByteView;
use crate::command::Command;
use crate::error::{MachoError, Result};

/// Size of the symtab command record, prologue included.
pub const SYMTAB_COMMAND_SIZE: usize = 24;
/// Size of one on-disk `nlist` entry.
pub const NLIST_SIZE: usize = 12;

const N_STAB: u8 = 0xE0;
const N_PEXT: u8 = 0x10;
const N_TYPE: u8 = 0x0E;
const N_EXT: u8 = 0x01;

/// The `N_TYPE` bits of a non-debug symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Undefined,
    Absolute,
    Section,
    Prebound,
    Indirect,
    Unknown(u8),
}

/// One symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Raw index into the string table.
    pub strx: u32,
    /// Location of the resolved name in the buffer, if it resolved.
    pub name: Option<Range<usize>>,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: u16,
    pub value: u32,
}

impl Symbol {
    pub fn is_stab(&self) -> bool {
        self.n_type & N_STAB != 0
    }

    pub fn is_external(&self) -> bool {
        self.n_type & N_EXT != 0
    }

    pub fn is_private_external(&self) -> bool {
        self.n_type & N_PEXT != 0
    }

    pub fn kind(&self) -> SymbolKind {
        match self.n_type & N_TYPE {
            0x0 => SymbolKind::Undefined,
            0x2 => SymbolKind::Absolute,
            0xE => SymbolKind::Section,
            0xC => SymbolKind::Prebound,
            0xA => SymbolKind::Indirect,
            other => SymbolKind::Unknown(other),
        }
    }
}

/// A symtab command together with its decoded entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symtab {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
    /// Entries in on-disk order.
    pub symbols: Vec<Symbol>,
    pub command_offset: usize,
}

impl Symtab {
    pub fn parse(r: &ByteView<'_>, cmd: &Command) -> Result<Symtab> {
        let off = cmd.offset;
        if (cmd.size as usize) < SYMTAB_COMMAND_SIZE {
            return Err(MachoError::malformed(
                cmd.index,
                off,
                format!("symtab command is {} bytes, expected {SYMTAB_COMMAND_SIZE}", cmd.size),
            ));
        }
        r.range("symtab command", off, SYMTAB_COMMAND_SIZE)?;
        let symoff = r.u32("symtab command", off + 8)?;
        let nsyms = r.u32("symtab command", off + 12)?;
        let stroff = r.u32("symtab command", off + 16)?;
        let strsize = r.u32("symtab command", off + 20)?;

        let array_len = (nsyms as usize).checked_mul(NLIST_SIZE).ok_or(MachoError::Truncated {
            what: "symbol array",
            offset: symoff as usize,
            len: usize::MAX,
            available: r.len(),
        })?;
        r.range("symbol array", symoff as usize, array_len)?;

        // The declared size is not trusted; names are bounded by the buffer instead
        if stroff as usize > r.len() {
            return Err(MachoError::Truncated {
                what: "string table",
                offset: stroff as usize,
                len: strsize as usize,
                available: r.len(),
            });
        }

        let mut symbols = Vec::with_capacity(nsyms as usize);
        for i in 0..nsyms as usize {
            let base = symoff as usize + i * NLIST_SIZE;
            let strx = r.u32("symbol", base)?;
            let name = if strx >= strsize {
                None
            } else {
                (stroff as usize)
                    .checked_add(strx as usize)
                    .and_then(|start| r.cstr_range(start))
            };
            if name.is_none() {
                trace!("symbol #{i}: string index 0x{strx:x} does not resolve");
            }
            symbols.push(Symbol {
                strx,
                name,
                n_type: r.u8("symbol", base + 4)?,
                n_sect: r.u8("symbol", base + 5)?,
                n_desc: r.u16("symbol", base + 6)?,
                value: r.u32("symbol", base + 8)?,
            });
        }

        debug!(
            "symtab: {} symbols at 0x{:x}, string table 0x{:x}+0x{:x}",
            nsyms, symoff, stroff, strsize
        );

        Ok(Symtab {
            symoff,
            nsyms,
            stroff,
            strsize,
            symbols,
            command_offset: off,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
