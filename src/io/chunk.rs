// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunk payload decompression into shared arenas.
//!
//! Every message issued from a chunk borrows the chunk's uncompressed
//! bytes, so those bytes live in a reference-counted [`ChunkArena`]. For
//! uncompressed chunks the arena borrows straight from the byte source;
//! `bz2` and `lz4` payloads inflate into an owned buffer sized by the
//! chunk's declared `size`, which the decoded length must match exactly.

use std::io::Read;
use std::sync::Arc;

use crate::core::{BagError, Result};
use crate::io::source::ByteSource;

/// Identifier for uncompressed chunks.
pub const COMPRESSION_NONE: &str = "none";
/// Identifier for bzip2-compressed chunks.
pub const COMPRESSION_BZ2: &str = "bz2";
/// Identifier for LZ4-frame-compressed chunks.
pub const COMPRESSION_LZ4: &str = "lz4";

/// The uncompressed bytes of one chunk, shared by every message read from
/// it. The chunk is freed once the reader has moved past it and no message
/// still holds a reference.
#[derive(Debug)]
pub struct ChunkArena {
    bytes: ArenaBytes,
}

#[derive(Debug)]
enum ArenaBytes {
    Source {
        source: Arc<ByteSource>,
        offset: usize,
        len: usize,
    },
    Owned(Vec<u8>),
}

impl ChunkArena {
    /// The uncompressed chunk payload.
    pub fn data(&self) -> &[u8] {
        match &self.bytes {
            ArenaBytes::Source {
                source,
                offset,
                len,
            } => &source.data()[*offset..*offset + *len],
            ArenaBytes::Owned(bytes) => bytes,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match &self.bytes {
            ArenaBytes::Source { len, .. } => *len,
            ArenaBytes::Owned(bytes) => bytes.len(),
        }
    }

    /// True when the chunk payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a chunk's payload into an arena.
///
/// `declared_size` is the chunk header's `size` field (the uncompressed
/// length); the payload occupies `data_len` bytes at `data_offset` in the
/// source.
pub fn decompress(
    source: &Arc<ByteSource>,
    compression: &str,
    declared_size: usize,
    data_offset: usize,
    data_len: usize,
) -> Result<Arc<ChunkArena>> {
    let raw = source.slice(data_offset as u64, data_len)?;

    let bytes = match compression {
        COMPRESSION_NONE => {
            if data_len != declared_size {
                return Err(BagError::size_mismatch(declared_size, data_len));
            }
            ArenaBytes::Source {
                source: source.clone(),
                offset: data_offset,
                len: data_len,
            }
        }
        COMPRESSION_BZ2 => {
            let mut out = Vec::with_capacity(declared_size);
            bzip2::read::BzDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| BagError::decompress("bz2", e.to_string()))?;
            if out.len() != declared_size {
                return Err(BagError::size_mismatch(declared_size, out.len()));
            }
            ArenaBytes::Owned(out)
        }
        COMPRESSION_LZ4 => {
            let mut out = Vec::with_capacity(declared_size);
            lz4_flex::frame::FrameDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| BagError::decompress("lz4", e.to_string()))?;
            if out.len() != declared_size {
                return Err(BagError::size_mismatch(declared_size, out.len()));
            }
            ArenaBytes::Owned(out)
        }
        other => return Err(BagError::unknown_compression(other)),
    };

    Ok(Arc::new(ChunkArena { bytes }))
}
