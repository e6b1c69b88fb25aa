//! machoman - Mach-O inspection tool
//!
//! Dumps header, load commands, segments and symbols, translates file
//! offsets to virtual addresses, looks up symbols and finds functions that
//! reference a given string.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use libmacho::{MachO, dump};

mod args;
mod config;
mod errors;
mod logger;
mod search;

use args::{Cli, Mode, Options};
use config::Config;
use errors::AppResult;
use search::Searcher;

fn main() -> ExitCode {
    let opts: Options = match Cli::try_parse() {
        Ok(cli) => cli.into(),
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    logger::init(opts.verbose);
    let config = Config::load();
    if config.general.verbose {
        logger::set_verbose(true);
    }

    let stdout = io::stdout();
    let result = run(&opts, &config, &mut stdout.lock());
    ExitCode::from(exit_status(&result))
}

/// Process exit status for the outcome of [`run`], reporting failures on stderr.
fn exit_status(result: &AppResult<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn run(opts: &Options, config: &Config, out: &mut impl Write) -> AppResult<()> {
    let macho = MachO::open(&opts.file)?;

    match &opts.mode {
        Mode::Info => {
            let mut dump_opts = config.dump.options();
            if let Some(verbosity) = opts.verbosity {
                dump_opts = dump_opts.with_verbosity(verbosity);
            }
            out.write_all(dump::render(&macho, &dump_opts).as_bytes())?;
        }
        Mode::Address(offset) => {
            if macho.segments().is_empty() {
                log::error!("no segments?");
            }
            match macho.virtual_address(*offset) {
                Some(vaddr) => writeln!(out, "0x{vaddr:08x}")?,
                None => writeln!(out, "Not found...")?,
            }
        }
        Mode::Search { pattern, regex } => {
            let matcher = search::compile(pattern, *regex)?;
            let hits = Searcher::new(&macho, &config.search).search(&matcher);
            if hits.is_empty() {
                writeln!(out, "string '{pattern}' not found!")?;
            }
            for hit in &hits {
                log::info!(
                    "match at 0x{:08x}, string at 0x{:08x} (vmaddr {})",
                    hit.match_offset,
                    hit.string_offset,
                    hit.vmaddr.map_or_else(|| "unmapped".to_string(), |a| format!("0x{a:08x}"))
                );
                for reference in &hit.references {
                    log::debug!(
                        "reference at 0x{:08x}, prologue at 0x{:08x}",
                        reference.offset,
                        reference.function_offset
                    );
                    writeln!(out, "function 0x{:08x}", reference.function.unwrap_or(0))?;
                }
            }
        }
        Mode::Lookup(name) => match macho.lookup_symbol(name) {
            Some(value) => writeln!(out, "0x{value:08x}")?,
            None => writeln!(out, "{name}: not found")?,
        },
        Mode::Symbols(filter) => {
            let filter = filter
                .as_deref()
                .map(regex::bytes::Regex::new)
                .transpose()?;
            let mut result = Ok(());
            macho.enumerate_symbols(|name, value| {
                if result.is_err() || filter.as_ref().is_some_and(|re| !re.is_match(name)) {
                    return;
                }
                result = writeln!(out, "0x{:08x} {}", value, String::from_utf8_lossy(name));
            });
            result?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use libmacho::Endian;
    use libmacho::fixture::{ImageBuilder, SectionSpec};

    use crate::errors::AppError;

    /// Image file with `__TEXT` at 0x1000 mapping file 0..0x400, the string
    /// "\0hello\0" at 0x300 referenced from a function at 0x200, and symbols
    /// `_main` (0x1200), `_helper` (0x1280) and `_zero` (value 0).
    struct TempImage(PathBuf);

    impl TempImage {
        fn new(tag: &str) -> Self {
            let b = ImageBuilder::new(Endian::Little).segment(
                "__TEXT",
                0x1000,
                0x400,
                0,
                0x400,
                &[SectionSpec::new("__text", "__TEXT", 0x1200, 0x100, 0x200)],
            );
            let entries = b.nlist(&[
                (1, 0x0F, 1, 0, 0x1200),
                (7, 0x0F, 1, 0, 0x1280),
                (15, 0x0F, 1, 0, 0),
            ]);
            let reference = b.encode_word(0x1301);
            let data = b
                .symtab(0x380, 3, 0x3B0, 21)
                .payload(0x200, &0xB580u16.to_le_bytes())
                .payload(0x208, &reference)
                .payload(0x300, b"\0hello\0")
                .payload(0x380, &entries)
                .payload(0x3B0, b"\0_main\0_helper\0_zero\0")
                .payload(0x3FF, &[0])
                .build();
            let path = std::env::temp_dir().join(format!("machoman-{tag}-{}.o", std::process::id()));
            std::fs::write(&path, data).unwrap();
            TempImage(path)
        }

        fn run(&self, mode: Mode) -> (AppResult<()>, String) {
            let opts = Options {
                file: self.0.clone(),
                mode,
                verbosity: None,
                verbose: false,
            };
            let mut out = Vec::new();
            let result = run(&opts, &Config::default(), &mut out);
            (result, String::from_utf8(out).unwrap())
        }
    }

    impl Drop for TempImage {
        fn drop(&mut self) {
            std::fs::remove_file(&self.0).ok();
        }
    }

    #[test]
    fn test_load_failure_exits_nonzero() {
        let opts = Options {
            file: std::env::temp_dir().join("machoman-does-not-exist.o"),
            mode: Mode::Info,
            verbosity: None,
            verbose: false,
        };
        let result = run(&opts, &Config::default(), &mut Vec::new());
        assert!(matches!(result, Err(AppError::Macho(_))));
        assert_eq!(exit_status(&result), 1);
        assert_eq!(exit_status(&Ok(())), 0);
    }

    #[test]
    fn test_garbage_file_is_a_load_failure() {
        let path = std::env::temp_dir().join(format!("machoman-garbage-{}.o", std::process::id()));
        std::fs::write(&path, b"not a mach-o file at all, just text").unwrap();
        let opts = Options {
            file: path.clone(),
            mode: Mode::Lookup("_main".into()),
            verbosity: None,
            verbose: false,
        };
        let result = run(&opts, &Config::default(), &mut Vec::new());
        std::fs::remove_file(&path).ok();
        assert_eq!(exit_status(&result), 1);
    }

    #[test]
    fn test_lookup() {
        let image = TempImage::new("lookup");
        let (result, out) = image.run(Mode::Lookup("_helper".into()));
        assert!(result.is_ok());
        assert_eq!(out, "0x00001280\n");

        let (result, out) = image.run(Mode::Lookup("_missing".into()));
        assert_eq!(exit_status(&result), 0);
        assert_eq!(out, "_missing: not found\n");
    }

    #[test]
    fn test_address() {
        let image = TempImage::new("address");
        let (result, out) = image.run(Mode::Address(0x210));
        assert!(result.is_ok());
        assert_eq!(out, "0x00001210\n");

        let (result, out) = image.run(Mode::Address(0x10000));
        assert_eq!(exit_status(&result), 0);
        assert_eq!(out, "Not found...\n");
    }

    #[test]
    fn test_symbols_listing_and_filter() {
        let image = TempImage::new("symbols");
        let (_, out) = image.run(Mode::Symbols(None));
        assert_eq!(out, "0x00001200 _main\n0x00001280 _helper\n");

        let (_, out) = image.run(Mode::Symbols(Some("^_h".into())));
        assert_eq!(out, "0x00001280 _helper\n");

        let (result, _) = image.run(Mode::Symbols(Some("(".into())));
        assert!(matches!(result, Err(AppError::Pattern(_))));
    }

    #[test]
    fn test_search() {
        let image = TempImage::new("search");
        let (result, out) = image.run(Mode::Search {
            pattern: "ell".into(),
            regex: false,
        });
        assert!(result.is_ok());
        assert_eq!(out, "function 0x00001200\n");

        let (_, out) = image.run(Mode::Search {
            pattern: "absent".into(),
            regex: false,
        });
        assert_eq!(out, "string 'absent' not found!\n");
    }

    #[test]
    fn test_info_dump() {
        let image = TempImage::new("info");
        let (result, out) = image.run(Mode::Info);
        assert!(result.is_ok());
        assert!(out.contains("MACH-O HEADER"));
        assert!(out.contains("__TEXT"));
        assert!(out.contains("SYMBOL TABLE #0"));
    }
}
