use thiserror::Error;

/// Errors produced while decoding a Mach-O image.
///
/// Every variant is fatal for the load that produced it: the decoder never
/// hands back a partially populated object.
#[derive(Error, Debug)]
pub enum MachoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: magic 0x{magic:08x} ({format})")]
    UnsupportedFormat { magic: u32, format: &'static str },

    #[error("truncated {what}: {len} bytes at offset 0x{offset:x} exceed buffer of {available} bytes")]
    Truncated {
        what: &'static str,
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("malformed load command #{index} at offset 0x{offset:x}: {reason}")]
    MalformedCommand {
        index: u32,
        offset: usize,
        reason: String,
    },
}

impl MachoError {
    pub(crate) fn malformed(index: u32, offset: usize, reason: impl Into<String>) -> Self {
        MachoError::MalformedCommand {
            index,
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, MachoError::Truncated { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MachoError::MalformedCommand { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, MachoError::UnsupportedFormat { .. })
    }
}

pub type Result<T> = std::result::Result<T, MachoError>;
