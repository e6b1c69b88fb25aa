//! dwarfman - locate the DWARF abbreviation table of a Mach-O file

use std::process::ExitCode;

use libmacho::MachO;
use libmacho::dump::{self, DumpOptions, Verbosity};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("usage: ./dwarfman <mach-o>");
        return ExitCode::SUCCESS;
    }

    let macho = match MachO::open(&args[1]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Unable to load Mach-O file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let opts = DumpOptions::default().with_verbosity(Verbosity::Full);
    print!("{}", dump::render(&macho, &opts));

    println!("Getting __DWARF segment");
    if let Some(abbrev) = macho.get_section("__DWARF", "__debug_abbrev") {
        println!(
            "Found DWARF debug_abbrev section at 0x{:08x} and is 0x{:08x} bytes long",
            abbrev.offset, abbrev.size
        );
    }
    ExitCode::SUCCESS
}
