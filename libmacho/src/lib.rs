//! libmacho - Mach-O object file decoder
//!
//! Decodes the 32-bit Mach-O container: the fixed header, the load command
//! stream, segment commands with their sections, and symbol tables with their
//! string tables. Everything is decoded in one pass into a [`MachO`], which
//! owns the input bytes and answers queries over them:
//! - symbol lookup and enumeration
//! - segment and section lookup by name
//! - file offset to virtual address translation
//!
//! Load commands other than `LC_SEGMENT` and `LC_SYMTAB` are recorded by kind
//! and size but not decoded. 64-bit and universal binaries are recognized and
//! rejected.
//!
//! ```no_run
//! use libmacho::MachO;
//!
//! let macho = MachO::open("a.out")?;
//! if let Some(addr) = macho.lookup_symbol("_main") {
//!     println!("_main at 0x{addr:08x}");
//! }
//! # Ok::<(), libmacho::MachoError>(())
//! ```

mod buffer;
mod bytes;
mod command;
pub mod dump;
mod error;
mod header;
mod macho;
mod section;
mod segment;
mod symtab;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use buffer::Buffer;
pub use bytes::{ByteView, Endian, FixedName};
pub use command::{Command, CommandKind, LC_SEGMENT, LC_SYMTAB, PROLOGUE_SIZE, command_name};
pub use dump::{DumpOptions, Verbosity};
pub use error::{MachoError, Result};
pub use header::{
    FAT_CIGAM, FAT_MAGIC, FileFormat, HEADER_SIZE, Header, MH_CIGAM, MH_CIGAM_64, MH_MAGIC,
    MH_MAGIC_64, is_macho,
};
pub use macho::{MachO, SymbolRef};
pub use section::{SECTION_SIZE, Section};
pub use segment::{SEGMENT_COMMAND_SIZE, Segment};
pub use symtab::{NLIST_SIZE, SYMTAB_COMMAND_SIZE, Symbol, SymbolKind, Symtab};
