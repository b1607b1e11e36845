// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Uniform random-access byte source.
//!
//! A bag can be opened from a file path, in which case the file is
//! memory-mapped, or from an owned byte buffer. Either way the source is
//! immutable after construction and safe to share across threads; slices
//! borrow directly from the mapping or the buffer without copying.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use crate::core::{BagError, Result};

/// Random-access view over a bag's bytes.
pub struct ByteSource {
    repr: Repr,
}

enum Repr {
    Mapped { map: memmap2::Mmap, path: String },
    Owned(Vec<u8>),
}

impl ByteSource {
    /// Open a file and memory-map it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let file = File::open(path_ref).map_err(|e| BagError::Io {
            message: format!("failed to open '{path_str}': {e}"),
        })?;

        // The mapping is never mutated after this point and the wrapper
        // only hands out borrows tied to its own lifetime.
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| BagError::Io {
            message: format!("failed to mmap '{path_str}': {e}"),
        })?;

        Ok(Self {
            repr: Repr::Mapped {
                map,
                path: path_str,
            },
        })
    }

    /// Wrap an owned byte buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            repr: Repr::Owned(bytes),
        }
    }

    /// The complete contents.
    pub fn data(&self) -> &[u8] {
        match &self.repr {
            Repr::Mapped { map, .. } => map,
            Repr::Owned(bytes) => bytes,
        }
    }

    /// Total size in bytes.
    pub fn len(&self) -> u64 {
        self.data().len() as u64
    }

    /// True when the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// The file path, when file-backed.
    pub fn path(&self) -> Option<&str> {
        match &self.repr {
            Repr::Mapped { path, .. } => Some(path),
            Repr::Owned(_) => None,
        }
    }

    /// A borrowed view of `len` bytes at `offset`.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let data = self.data();
        let end = offset.checked_add(len as u64).ok_or_else(|| {
            BagError::read_past_end(offset, len, data.len() as u64)
        })?;
        if end > data.len() as u64 {
            return Err(BagError::read_past_end(offset, len, data.len() as u64));
        }
        Ok(&data[offset as usize..end as usize])
    }
}

impl Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("path", &self.path())
            .field("len", &self.len())
            .finish()
    }
}
