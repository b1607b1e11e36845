// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bag container I/O: byte sources, record framing, chunk decompression,
//! the open-time index, and the message view.

pub mod bag;
pub mod chunk;
pub mod index;
pub mod record;
pub mod source;
pub mod view;

pub use bag::{open_bag, open_bag_from_bytes, Bag};
pub use chunk::ChunkArena;
pub use index::{BagIndex, ChunkInfo, Connection, IndexEntry};
pub use source::ByteSource;
pub use view::{Message, MessageIter, View};
