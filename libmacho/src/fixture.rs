//! Mach-O image builder for tests
//!
//! Assembles header, load commands and payload bytes in either byte order.
//! Payload is placed at absolute file offsets so tests can point commands
//! at it directly.

use crate::bytes::Endian;
use crate::command::{LC_SEGMENT, LC_SYMTAB};
use crate::header::{HEADER_SIZE, MH_MAGIC};

pub struct SectionSpec {
    pub name: &'static str,
    pub segment: &'static str,
    pub addr: u32,
    pub size: u32,
    pub offset: u32,
    pub align: u32,
    pub flags: u32,
}

impl SectionSpec {
    pub fn new(name: &'static str, segment: &'static str, addr: u32, size: u32, offset: u32) -> Self {
        Self {
            name,
            segment,
            addr,
            size,
            offset,
            align: 2,
            flags: 0,
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

pub struct ImageBuilder {
    endian: Endian,
    cpu_type: u32,
    cpu_subtype: u32,
    file_type: u32,
    flags: u32,
    ncmds: Option<u32>,
    sizeofcmds: Option<u32>,
    commands: Vec<Vec<u8>>,
    payload: Vec<(usize, Vec<u8>)>,
}

impl ImageBuilder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            cpu_type: 12,
            cpu_subtype: 9,
            file_type: 2,
            flags: 0,
            ncmds: None,
            sizeofcmds: None,
            commands: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn cpu(mut self, cpu_type: u32, cpu_subtype: u32) -> Self {
        self.cpu_type = cpu_type;
        self.cpu_subtype = cpu_subtype;
        self
    }

    pub fn file_type(mut self, file_type: u32) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Override the declared command count.
    pub fn ncmds(mut self, ncmds: u32) -> Self {
        self.ncmds = Some(ncmds);
        self
    }

    /// Override the declared command-bytes total.
    pub fn sizeofcmds(mut self, sizeofcmds: u32) -> Self {
        self.sizeofcmds = Some(sizeofcmds);
        self
    }

    fn word(&self, out: &mut Vec<u8>, value: u32) {
        match self.endian {
            Endian::Little => out.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn half(&self, out: &mut Vec<u8>, value: u16) {
        match self.endian {
            Endian::Little => out.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn name16(out: &mut Vec<u8>, name: &str) {
        let mut field = [0u8; 16];
        let n = name.len().min(16);
        field[..n].copy_from_slice(&name.as_bytes()[..n]);
        out.extend_from_slice(&field);
    }

    /// Append a command with an arbitrary kind; `body` follows the prologue.
    pub fn raw_command(mut self, cmd: u32, body: &[u8]) -> Self {
        let mut out = Vec::new();
        self.word(&mut out, cmd);
        self.word(&mut out, (8 + body.len()) as u32);
        out.extend_from_slice(body);
        self.commands.push(out);
        self
    }

    /// Append a command whose declared size is `cmdsize` regardless of its body.
    pub fn sized_command(mut self, cmd: u32, cmdsize: u32, body_len: usize) -> Self {
        let mut out = Vec::new();
        self.word(&mut out, cmd);
        self.word(&mut out, cmdsize);
        out.resize(8 + body_len, 0);
        self.commands.push(out);
        self
    }

    pub fn segment(
        mut self,
        name: &str,
        vmaddr: u32,
        vmsize: u32,
        fileoff: u32,
        filesize: u32,
        sections: &[SectionSpec],
    ) -> Self {
        let cmd = self.segment_bytes(name, vmaddr, vmsize, fileoff, filesize, sections, None);
        self.commands.push(cmd);
        self
    }

    /// Segment command whose declared `nsects` differs from the records written.
    pub fn segment_declaring(mut self, name: &str, nsects: u32, sections: &[SectionSpec]) -> Self {
        let cmd = self.segment_bytes(name, 0, 0, 0, 0, sections, Some(nsects));
        self.commands.push(cmd);
        self
    }

    #[allow(clippy::too_many_arguments)]
    fn segment_bytes(
        &self,
        name: &str,
        vmaddr: u32,
        vmsize: u32,
        fileoff: u32,
        filesize: u32,
        sections: &[SectionSpec],
        nsects: Option<u32>,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        self.word(&mut out, LC_SEGMENT);
        self.word(&mut out, (56 + 68 * sections.len()) as u32);
        Self::name16(&mut out, name);
        self.word(&mut out, vmaddr);
        self.word(&mut out, vmsize);
        self.word(&mut out, fileoff);
        self.word(&mut out, filesize);
        self.word(&mut out, 7);
        self.word(&mut out, 5);
        self.word(&mut out, nsects.unwrap_or(sections.len() as u32));
        self.word(&mut out, 0);
        for s in sections {
            Self::name16(&mut out, s.name);
            Self::name16(&mut out, s.segment);
            self.word(&mut out, s.addr);
            self.word(&mut out, s.size);
            self.word(&mut out, s.offset);
            self.word(&mut out, s.align);
            self.word(&mut out, 0);
            self.word(&mut out, 0);
            self.word(&mut out, s.flags);
            self.word(&mut out, 0);
            self.word(&mut out, 0);
        }
        out
    }

    pub fn symtab(mut self, symoff: u32, nsyms: u32, stroff: u32, strsize: u32) -> Self {
        let mut out = Vec::new();
        self.word(&mut out, LC_SYMTAB);
        self.word(&mut out, 24);
        self.word(&mut out, symoff);
        self.word(&mut out, nsyms);
        self.word(&mut out, stroff);
        self.word(&mut out, strsize);
        self.commands.push(out);
        self
    }

    /// Encode `nlist` entries of `(n_strx, n_type, n_sect, n_desc, n_value)`.
    pub fn nlist(&self, entries: &[(u32, u8, u8, u16, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        for &(strx, ty, sect, desc, value) in entries {
            self.word(&mut out, strx);
            out.push(ty);
            out.push(sect);
            self.half(&mut out, desc);
            self.word(&mut out, value);
        }
        out
    }

    /// Encode a 32-bit word in the image's byte order.
    pub fn encode_word(&self, value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        self.word(&mut out, value);
        out
    }

    /// Place `bytes` at absolute file offset `offset`.
    pub fn payload(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.payload.push((offset, bytes.to_vec()));
        self
    }

    pub fn commands_size(&self) -> usize {
        self.commands.iter().map(|c| c.len()).sum()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let magic = match self.endian {
            Endian::Big => MH_MAGIC.to_be_bytes(),
            Endian::Little => MH_MAGIC.to_le_bytes(),
        };
        out.extend_from_slice(&magic);
        self.word(&mut out, self.cpu_type);
        self.word(&mut out, self.cpu_subtype);
        self.word(&mut out, self.file_type);
        self.word(&mut out, self.ncmds.unwrap_or(self.commands.len() as u32));
        self.word(&mut out, self.sizeofcmds.unwrap_or(self.commands_size() as u32));
        self.word(&mut out, self.flags);
        debug_assert_eq!(out.len(), HEADER_SIZE);
        for cmd in &self.commands {
            out.extend_from_slice(cmd);
        }
        for (offset, bytes) in &self.payload {
            let end = offset + bytes.len();
            if out.len() < end {
                out.resize(end, 0);
            }
            out[*offset..end].copy_from_slice(bytes);
        }
        out
    }
}
