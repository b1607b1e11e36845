// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The public bag handle.
//!
//! A [`Bag`] is a cheap-to-clone `Arc` around the byte source and the
//! index built at open time. All state is read-only after open, so any
//! number of views and iterators can share one bag across threads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::{BagError, Result, RosTime};
use crate::io::index::{self, BagIndex, ChunkInfo, Connection};
use crate::io::source::ByteSource;
use crate::io::view::{MessageIter, View};
use crate::schema::ObjectSchema;

/// An open bag file.
#[derive(Clone)]
pub struct Bag {
    inner: Arc<BagInner>,
}

struct BagInner {
    source: Arc<ByteSource>,
    index: BagIndex,
    by_topic: BTreeMap<String, Vec<Arc<Connection>>>,
}

impl Bag {
    /// Open a bag from a file path. The file is memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(ByteSource::open(path)?)
    }

    /// Open a bag from an in-memory byte buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_source(ByteSource::from_bytes(bytes.into()))
    }

    fn from_source(source: ByteSource) -> Result<Self> {
        let source = Arc::new(source);
        let index = index::build(&source)?;

        let mut by_topic = BTreeMap::new();
        for (topic, conn_ids) in &index.topics {
            let conns = conn_ids
                .iter()
                .filter_map(|id| index.connection(*id).cloned())
                .collect();
            by_topic.insert(topic.clone(), conns);
        }

        Ok(Bag {
            inner: Arc::new(BagInner {
                source,
                index,
                by_topic,
            }),
        })
    }

    /// Sorted list of topics recorded in the bag.
    pub fn topics(&self) -> Vec<&str> {
        self.inner.by_topic.keys().map(|s| s.as_str()).collect()
    }

    /// Connections grouped by topic.
    pub fn connections_by_topic(&self) -> &BTreeMap<String, Vec<Arc<Connection>>> {
        &self.inner.by_topic
    }

    /// The resolved schema for a topic's first connection.
    pub fn schema(&self, topic: &str) -> Result<Arc<ObjectSchema>> {
        let conns = self
            .inner
            .by_topic
            .get(topic)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BagError::out_of_range(topic, self.inner.by_topic.len()))?;
        conns[0].schema().map(Arc::clone)
    }

    /// Iterate over every message in timestamp order.
    pub fn read_messages(&self) -> Result<MessageIter> {
        let mut view = View::new();
        view.add_bag(self.clone());
        view.get_messages()
    }

    /// Iterate over messages on the given topics, in timestamp order.
    pub fn read_messages_on<S: AsRef<str>>(&self, topics: &[S]) -> Result<MessageIter> {
        let mut view = View::new();
        view.add_bag(self.clone());
        view.get_messages_on(topics)
    }

    /// Total recorded message count, summed over connections.
    pub fn message_count(&self) -> u64 {
        self.inner
            .index
            .connections
            .values()
            .map(|c| c.message_count)
            .sum()
    }

    /// Number of chunks in the bag.
    pub fn chunk_count(&self) -> usize {
        self.inner.index.chunks.len()
    }

    /// Per-chunk metadata in index order.
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.inner.index.chunks
    }

    /// Earliest message time, when known.
    pub fn start_time(&self) -> Option<RosTime> {
        self.inner.index.start_time()
    }

    /// Latest message time, when known.
    pub fn end_time(&self) -> Option<RosTime> {
        self.inner.index.end_time()
    }

    /// Whether the bag carried an index section (as opposed to being
    /// rebuilt by forward scan).
    pub fn is_indexed(&self) -> bool {
        self.inner.index.indexed
    }

    /// Look up a connection by id.
    pub fn connection(&self, id: u32) -> Option<&Arc<Connection>> {
        self.inner.index.connection(id)
    }

    pub(crate) fn index(&self) -> &BagIndex {
        &self.inner.index
    }

    pub(crate) fn source(&self) -> &Arc<ByteSource> {
        &self.inner.source
    }
}

impl std::fmt::Debug for Bag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bag")
            .field("path", &self.inner.source.path())
            .field("topics", &self.inner.by_topic.len())
            .field("chunks", &self.inner.index.chunks.len())
            .finish()
    }
}

/// Open a bag from a file path.
pub fn open_bag<P: AsRef<Path>>(path: P) -> Result<Bag> {
    Bag::open(path)
}

/// Open a bag from an in-memory byte buffer.
pub fn open_bag_from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Bag> {
    Bag::from_bytes(bytes)
}
