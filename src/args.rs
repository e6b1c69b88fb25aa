//! Command-line parsing

use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgGroup, Parser};

use libmacho::Verbosity;

#[derive(Parser, Debug)]
#[command(
    name = "machoman",
    about = "Inspect a 32-bit Mach-O file",
    arg_required_else_help = true,
    group(ArgGroup::new("mode").args(["address", "search", "lookup", "symbols"]))
)]
pub struct Cli {
    /// Mach-O file to inspect
    pub file: PathBuf,

    /// Get virtual address for given file offset (0x hex, 0 octal or decimal)
    #[arg(short = 'a', long, value_name = "OFFSET", value_parser = parse_offset)]
    pub address: Option<u64>,

    /// Search for STRING and print function addresses containing references to it
    #[arg(short = 's', long, value_name = "STRING", value_parser = NonEmptyStringValueParser::new())]
    pub search: Option<String>,

    /// Treat the search STRING as a regular expression
    #[arg(long, requires = "search")]
    pub regex: bool,

    /// Print the value of symbol NAME
    #[arg(short = 'y', long, value_name = "NAME")]
    pub lookup: Option<String>,

    /// List symbols, optionally filtered by REGEX
    #[arg(short = 'l', long, value_name = "REGEX", num_args = 0..=1)]
    pub symbols: Option<Option<String>>,

    /// Short info dump: header and segments
    #[arg(long, conflicts_with = "full")]
    pub brief: bool,

    /// Info dump including every symbol
    #[arg(long)]
    pub full: bool,

    /// Print decoder traces
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Header, command, segment and symbol dump
    Info,
    /// Virtual address of a file offset
    Address(u64),
    Search { pattern: String, regex: bool },
    Lookup(String),
    /// Symbol listing, optionally filtered by a regex
    Symbols(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub file: PathBuf,
    pub mode: Mode,
    pub verbosity: Option<Verbosity>,
    pub verbose: bool,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        let mode = if let Some(offset) = cli.address {
            Mode::Address(offset)
        } else if let Some(pattern) = cli.search {
            Mode::Search {
                pattern,
                regex: cli.regex,
            }
        } else if let Some(name) = cli.lookup {
            Mode::Lookup(name)
        } else if let Some(filter) = cli.symbols {
            Mode::Symbols(filter)
        } else {
            Mode::Info
        };
        let verbosity = if cli.brief {
            Some(Verbosity::Brief)
        } else if cli.full {
            Some(Verbosity::Full)
        } else {
            None
        };
        Options {
            file: cli.file,
            mode,
            verbosity,
            verbose: cli.verbose,
        }
    }
}

/// Parse an integer the way `%lli` does: `0x` hex, leading `0` octal, else decimal.
pub fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

fn parse_offset(s: &str) -> Result<u64, String> {
    parse_number(s).ok_or_else(|| format!("invalid offset '{s}'"))
}
