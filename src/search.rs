//! String reference search
//!
//! Finds code that references a string: every occurrence of the pattern is
//! widened to the start of its NUL-terminated string, translated to a virtual
//! address, and the image is scanned for 32-bit words holding that address.
//! From each reference the scan walks backwards a halfword at a time until it
//! meets a function prologue (Thumb `push {..., lr}` by default).

use regex::bytes::Regex;

use libmacho::MachO;

use crate::config::SearchConfig;
use crate::errors::AppResult;

/// Build the matcher for a search string, literal unless `regex` is set.
pub fn compile(pattern: &str, regex: bool) -> AppResult<Regex> {
    if regex {
        Ok(Regex::new(pattern)?)
    } else {
        Ok(Regex::new(&regex::escape(pattern))?)
    }
}

/// A word in the image holding the address of a matched string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// File offset of the referencing word
    pub offset: usize,
    /// File offset of the enclosing function's prologue
    pub function_offset: usize,
    /// Virtual address of the prologue
    pub function: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringHit {
    /// Offset where the pattern matched
    pub match_offset: usize,
    /// Offset of the first byte of the enclosing string
    pub string_offset: usize,
    /// Virtual address of the string, if a segment maps it
    pub vmaddr: Option<u32>,
    pub references: Vec<Reference>,
}

pub struct Searcher<'a> {
    macho: &'a MachO,
    config: &'a SearchConfig,
}

impl<'a> Searcher<'a> {
    pub fn new(macho: &'a MachO, config: &'a SearchConfig) -> Self {
        Self { macho, config }
    }

    /// Run the search. An empty result means the pattern never matched.
    pub fn search(&self, pattern: &Regex) -> Vec<StringHit> {
        let data = self.macho.data();
        let limit = match self.config.max_results {
            0 => usize::MAX,
            n => n,
        };
        let mut found = 0usize;
        let mut hits = Vec::new();

        for m in pattern.find_iter(data) {
            let string_offset = string_start(data, m.start());
            log::debug!(
                "Found match in string '{}', offset 0x{:08x}",
                String::from_utf8_lossy(cstr_at(data, string_offset)),
                string_offset
            );

            let vmaddr = self.macho.virtual_address(string_offset as u64);
            let mut references = Vec::new();
            match vmaddr {
                Some(vmaddr) if found < limit => {
                    log::debug!("Virtual address: 0x{vmaddr:08x}");
                    for reference in self.references_to(vmaddr) {
                        if found >= limit {
                            break;
                        }
                        found += 1;
                        references.push(reference);
                    }
                }
                Some(_) => {}
                None => {
                    log::warn!("could not get virtual address for offset 0x{string_offset:08x}");
                }
            }

            hits.push(StringHit {
                match_offset: m.start(),
                string_offset,
                vmaddr,
                references,
            });
        }
        hits
    }

    fn references_to(&self, vmaddr: u32) -> impl Iterator<Item = Reference> + '_ {
        (0..self.macho.len())
            .step_by(4)
            .filter(move |&offset| self.macho.read_u32(offset) == Some(vmaddr))
            .filter_map(move |offset| {
                log::debug!(
                    "found reference at offset 0x{:08x}, vaddr=0x{:08x}",
                    offset,
                    self.macho.virtual_address(offset as u64).unwrap_or(0)
                );
                let Some(function_offset) = self.prologue_before(offset) else {
                    log::debug!("no prologue before offset 0x{offset:08x}");
                    return None;
                };
                log::debug!("found push instruction at offset 0x{function_offset:08x}");
                Some(Reference {
                    offset,
                    function_offset,
                    function: self.macho.virtual_address(function_offset as u64),
                })
            })
    }

    /// Walk back from `offset` in halfword steps to the nearest prologue.
    fn prologue_before(&self, offset: usize) -> Option<usize> {
        let mut at = offset;
        loop {
            if let Some(half) = self.macho.read_u16(at)
                && half & self.config.prologue_mask == self.config.prologue_value
            {
                return Some(at);
            }
            at = at.checked_sub(2)?;
        }
    }
}

/// Start of the NUL-terminated string containing `offset`.
fn string_start(data: &[u8], offset: usize) -> usize {
    data[..offset]
        .iter()
        .rposition(|&b| b == 0)
        .map_or(0, |nul| nul + 1)
}

fn cstr_at(data: &[u8], offset: usize) -> &[u8] {
    let tail = &data[offset..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    &tail[..end]
}
