//! The loaded object and its query API

use std::path::Path;

use log::{debug, warn};

use crate::buffer::Buffer;
use crate::bytes::ByteView;
use crate::command::{Command, CommandKind, PROLOGUE_SIZE};
use crate::error::{MachoError, Result};
use crate::header::{HEADER_SIZE, Header};
use crate::section::Section;
use crate::segment::Segment;
use crate::symtab::{Symbol, Symtab};

/// A fully decoded Mach-O image.
///
/// The image owns its input bytes. Segments, sections and symbols refer to
/// them by range, and every borrowed view handed out by the query methods is
/// tied to the lifetime of the image. Nothing is mutated after [`MachO::load`]
/// returns, so a loaded image can be shared across threads freely.
pub struct MachO {
    buffer: Buffer,
    header: Header,
    commands: Vec<Command>,
    segments: Vec<Segment>,
    symtabs: Vec<Symtab>,
}

/// A symbol entry together with its resolved name.
#[derive(Debug, Clone, Copy)]
pub struct SymbolRef<'a> {
    pub name: Option<&'a [u8]>,
    pub entry: &'a Symbol,
    /// Index of the owning symtab in [`MachO::symtabs`].
    pub symtab: usize,
}

impl SymbolRef<'_> {
    pub fn value(&self) -> u32 {
        self.entry.value
    }
}

struct Decoded {
    header: Header,
    commands: Vec<Command>,
    segments: Vec<Segment>,
    symtabs: Vec<Symtab>,
}

fn decode(data: &[u8]) -> Result<Decoded> {
    let header = Header::parse(data)?;
    let r = ByteView::new(data, header.endian);

    // The whole declared command area has to be present before walking it
    r.range("load commands", HEADER_SIZE, header.sizeofcmds as usize)?;

    let capacity = (header.ncmds as usize).min(header.sizeofcmds as usize / PROLOGUE_SIZE);
    let mut commands = Vec::with_capacity(capacity);
    let mut segments = Vec::new();
    let mut symtabs = Vec::new();

    let mut offset = HEADER_SIZE;
    let mut consumed = 0u64;
    for index in 0..header.ncmds {
        let cmd = Command::parse(&r, offset, index)?;
        consumed += cmd.size as u64;
        if consumed > header.sizeofcmds as u64 {
            return Err(MachoError::malformed(
                index,
                offset,
                format!(
                    "commands run past the declared {} bytes of load commands",
                    header.sizeofcmds
                ),
            ));
        }

        match cmd.kind {
            CommandKind::Segment => segments.push(Segment::parse(&r, &cmd)?),
            CommandKind::Symtab => symtabs.push(Symtab::parse(&r, &cmd)?),
            CommandKind::Other(_) => {}
        }
        commands.push(cmd);
        offset = cmd.end();
    }

    debug!(
        "decoded {} commands: {} segments, {} symtabs",
        commands.len(),
        segments.len(),
        symtabs.len()
    );
    Ok(Decoded {
        header,
        commands,
        segments,
        symtabs,
    })
}

impl MachO {
    /// Read the file at `path` and decode it.
    pub fn open(path: impl AsRef<Path>) -> Result<MachO> {
        let path = path.as_ref();
        debug!("reading Mach-O image from {}", path.display());
        let buffer = Buffer::map(path).inspect_err(|e| {
            warn!("unable to read {}: {e}", path.display());
        })?;
        Self::load(buffer)
    }

    /// Take ownership of `buffer` and decode it in a single pass.
    ///
    /// Any structural error aborts the load; the buffer is dropped with it.
    pub fn load(buffer: impl Into<Buffer>) -> Result<MachO> {
        let buffer = buffer.into();
        let decoded = decode(&buffer).inspect_err(|e| {
            warn!("unable to load Mach-O image: {e}");
        })?;
        Ok(MachO {
            buffer,
            header: decoded.header,
            commands: decoded.commands,
            segments: decoded.segments,
            symtabs: decoded.symtabs,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn symtabs(&self) -> &[Symtab] {
        &self.symtabs
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Endian-aware reader over the image bytes.
    pub fn view(&self) -> ByteView<'_> {
        ByteView::new(&self.buffer, self.header.endian)
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        self.view().u16("u16", offset).ok()
    }

    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        self.view().u32("u32", offset).ok()
    }

    /// Resolved name of a symbol belonging to this image.
    pub fn symbol_name(&self, symbol: &Symbol) -> Option<&[u8]> {
        symbol.name.clone().and_then(|r| self.buffer.get(r))
    }

    /// All symbols of all symtabs, in load order.
    pub fn symbols(&self) -> impl Iterator<Item = SymbolRef<'_>> {
        self.symtabs.iter().enumerate().flat_map(move |(i, symtab)| {
            symtab.symbols.iter().map(move |entry| SymbolRef {
                name: self.symbol_name(entry),
                entry,
                symtab: i,
            })
        })
    }

    /// Value of the first symbol whose name matches `name` exactly.
    pub fn lookup_symbol(&self, name: impl AsRef<[u8]>) -> Option<u32> {
        let name = name.as_ref();
        self.symbols()
            .find(|s| s.name == Some(name))
            .map(|s| s.value())
    }

    /// Visit every named symbol with a nonzero value, in load order.
    pub fn enumerate_symbols<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], u32),
    {
        for sym in self.symbols() {
            if let Some(name) = sym.name
                && sym.value() != 0
            {
                visit(name, sym.value());
            }
        }
    }

    pub fn get_segment(&self, name: impl AsRef<[u8]>) -> Option<&Segment> {
        let name = name.as_ref();
        self.segments.iter().find(|s| s.name.matches(name))
    }

    /// Section `section` of the first segment named `segment`.
    pub fn get_section(&self, segment: impl AsRef<[u8]>, section: impl AsRef<[u8]>) -> Option<&Section> {
        self.get_segment(segment)?.get_section(section)
    }

    /// Translate a file offset to the virtual address of the segment mapping it.
    pub fn virtual_address(&self, file_offset: u64) -> Option<u32> {
        self.segments
            .iter()
            .find(|s| s.contains_offset(file_offset))
            .and_then(|s| s.virtual_address(file_offset))
    }

    /// Translate a virtual address backed by file bytes to its file offset.
    pub fn file_offset(&self, vmaddr: u32) -> Option<usize> {
        self.segments.iter().find_map(|s| s.file_offset(vmaddr))
    }

    /// Bytes mapped by a segment of this image.
    pub fn segment_data(&self, segment: &Segment) -> &[u8] {
        self.buffer.get(segment.data.clone()).unwrap_or_default()
    }

    /// File bytes of a section, or `None` for zero-fill sections.
    pub fn section_data(&self, section: &Section) -> Option<&[u8]> {
        self.buffer.get(section.file_range()?)
    }
}

impl std::fmt::Debug for MachO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachO")
            .field("len", &self.buffer.len())
            .field("header", &self.header)
            .field("commands", &self.commands.len())
            .field("segments", &self.segments)
            .field("symtabs", &self.symtabs.len())
            .finish()
    }
}
