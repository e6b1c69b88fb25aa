use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

/// Bytes owned by a loaded image: either read into memory or mapped from disk.
#[derive(Debug)]
pub enum Buffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Buffer {
    /// Map the file at `path` read-only.
    ///
    /// Empty files cannot be mapped and come back as an empty owned buffer.
    pub fn map(path: &Path) -> std::io::Result<Buffer> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Buffer::Owned(Vec::new()));
        }
        // SAFETY: read-only mapping, owned by the returned buffer
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Buffer::Mapped(mmap))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Mapped(m) => m,
        }
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(v: Vec<u8>) -> Self {
        Buffer::Owned(v)
    }
}

impl From<&[u8]> for Buffer {
    fn from(v: &[u8]) -> Self {
        Buffer::Owned(v.to_vec())
    }
}

impl From<Mmap> for Buffer {
    fn from(m: Mmap) -> Self {
        Buffer::Mapped(m)
    }
}
