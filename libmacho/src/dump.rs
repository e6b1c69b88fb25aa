//! Human-readable rendering of a loaded image
//!
//! Rendering is a read-only traversal. How much is printed is decided by the
//! [`DumpOptions`] passed in, never by global state.

use crate::command::Command;
use crate::header::Header;
use crate::macho::MachO;
use crate::segment::Segment;
use crate::symtab::{Symbol, SymbolKind, Symtab};

/// How much detail a dump includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Header and segment table
    Brief,
    /// Adds load commands, sections and symtab summaries
    #[default]
    Normal,
    /// Adds every symbol
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    pub verbosity: Verbosity,
    /// List individual symbols when verbosity is `Full`
    pub show_symbols: bool,
    /// Digits used for addresses and offsets
    pub hex_width: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            show_symbols: true,
            hex_width: 8,
        }
    }
}

impl DumpOptions {
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

const RULE: &str = "═══════════════════════════════════════════════════════════════\n";

fn banner(o: &mut String, title: &str) {
    o.push_str(RULE);
    o.push_str(&format!("  {title}\n"));
    o.push_str(RULE);
    o.push('\n');
}

/// Render the whole image as text.
pub fn render(macho: &MachO, opts: &DumpOptions) -> String {
    let mut o = String::new();
    o.push_str(&format_header(macho.header(), macho.len()));
    if opts.verbosity >= Verbosity::Normal {
        o.push_str(&format_commands(macho.commands()));
    }
    o.push_str(&format_segments(macho.segments(), opts));
    if opts.verbosity >= Verbosity::Normal {
        for (i, symtab) in macho.symtabs().iter().enumerate() {
            o.push_str(&format_symtab(macho, i, symtab, opts));
        }
    }
    o
}

fn format_header(header: &Header, file_len: usize) -> String {
    let mut o = String::new();
    banner(&mut o, "MACH-O HEADER");
    o.push_str(&format!("  Magic:        0x{:08X} ({:?} endian)\n", header.magic, header.endian));
    o.push_str(&format!(
        "  CPU type:     {} (0x{:08X}, subtype 0x{:08X})\n",
        header.cpu_name(),
        header.cpu_type,
        header.cpu_subtype
    ));
    o.push_str(&format!("  File type:    {}\n", header.file_type_name()));
    o.push_str(&format!("  Load cmds:    {}\n", header.ncmds));
    o.push_str(&format!("  Cmds size:    {}\n", human_size(header.sizeofcmds as u64)));
    let flags = header.flag_names();
    if flags.is_empty() {
        o.push_str(&format!("  Flags:        0x{:08X}\n", header.flags));
    } else {
        o.push_str(&format!("  Flags:        0x{:08X} ({})\n", header.flags, flags.join(", ")));
    }
    o.push_str(&format!("  File size:    {}\n", human_size(file_len as u64)));
    o.push('\n');
    o
}

fn format_commands(commands: &[Command]) -> String {
    let mut o = String::new();
    if commands.is_empty() {
        return o;
    }
    banner(&mut o, "LOAD COMMANDS");
    o.push_str("  #    Offset   Size     Command\n");
    o.push_str("  -    ------   ----     -------\n");
    for cmd in commands {
        let name = match cmd.name() {
            Some(n) => n.to_string(),
            None => format!("0x{:08X}", cmd.kind.raw()),
        };
        o.push_str(&format!(
            "  {:<4} {:08X} {:08X} {}\n",
            cmd.index, cmd.offset, cmd.size, name
        ));
    }
    o.push('\n');
    o
}

fn format_segments(segments: &[Segment], opts: &DumpOptions) -> String {
    let mut o = String::new();
    if segments.is_empty() {
        return o;
    }
    let w = opts.hex_width;
    banner(&mut o, "SEGMENTS & SECTIONS");
    o.push_str(&format!(
        "  {:<18} {:<w$} {:<w$} {:<w$} Prot\n",
        "Name", "Address", "Offset", "Size"
    ));
    o.push_str(&format!(
        "  {:<18} {:<w$} {:<w$} {:<w$} ----\n",
        "----", "-------", "------", "----"
    ));
    for seg in segments {
        let prot = format!("{}/{}", prot_str(seg.initprot), prot_str(seg.maxprot));
        o.push_str(&format!(
            "  {:<18} {:0w$X} {:0w$X} {:0w$X} {}\n",
            seg.name.to_string(),
            seg.vmaddr,
            seg.fileoff,
            seg.filesize,
            prot
        ));
        if opts.verbosity < Verbosity::Normal {
            continue;
        }
        for sect in &seg.sections {
            let fill = if sect.is_zerofill() { " zerofill" } else { "" };
            o.push_str(&format!(
                "    {:<16} {:0w$X} {:0w$X} {:0w$X} align 2^{}{}\n",
                sect.name.to_string(),
                sect.addr,
                sect.offset,
                sect.size,
                sect.align,
                fill
            ));
        }
    }
    o.push('\n');
    o
}

fn format_symtab(macho: &MachO, index: usize, symtab: &Symtab, opts: &DumpOptions) -> String {
    let mut o = String::new();
    let w = opts.hex_width;
    banner(&mut o, &format!("SYMBOL TABLE #{index} ({} symbols)", symtab.len()));
    o.push_str(&format!("  Symbols at:   0x{:0w$X}\n", symtab.symoff));
    o.push_str(&format!(
        "  Strings at:   0x{:0w$X} ({})\n",
        symtab.stroff,
        human_size(symtab.strsize as u64)
    ));
    let unnamed = symtab.symbols.iter().filter(|s| s.name.is_none()).count();
    if unnamed > 0 {
        o.push_str(&format!("  Unnamed:      {unnamed}\n"));
    }
    o.push('\n');

    if opts.verbosity < Verbosity::Full || !opts.show_symbols || symtab.is_empty() {
        return o;
    }

    o.push_str(&format!("  {:>width$}  {:<6} {:<8} Name\n", "Value", "Type", "Scope", width = w + 2));
    o.push_str(&format!("  {:>width$}  {:<6} {:<8} ----\n", "-----", "----", "-----", width = w + 2));
    for sym in &symtab.symbols {
        let name = match macho.symbol_name(sym) {
            Some(n) => String::from_utf8_lossy(n).into_owned(),
            None => "(no name)".to_string(),
        };
        o.push_str(&format!(
            "  0x{:0w$X}  {:<6} {:<8} {}\n",
            sym.value,
            type_str(sym),
            scope_str(sym),
            name
        ));
    }
    o.push('\n');
    o
}

fn type_str(sym: &Symbol) -> &'static str {
    if sym.is_stab() {
        return "STAB";
    }
    match sym.kind() {
        SymbolKind::Section => "SECT",
        SymbolKind::Indirect => "INDR",
        SymbolKind::Absolute => "ABS",
        SymbolKind::Prebound => "PBUD",
        SymbolKind::Undefined => "UNDEF",
        SymbolKind::Unknown(_) => "OTHER",
    }
}

fn scope_str(sym: &Symbol) -> &'static str {
    if sym.is_stab() {
        ""
    } else if sym.is_external() {
        "external"
    } else if sym.is_private_external() {
        "private"
    } else {
        "local"
    }
}

fn prot_str(prot: u32) -> String {
    format!(
        "{}{}{}",
        if prot & 1 != 0 { "r" } else { "-" },
        if prot & 2 != 0 { "w" } else { "-" },
        if prot & 4 != 0 { "x" } else { "-" },
    )
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
