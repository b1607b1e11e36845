// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Time-ordered, topic-filtered message streams over one or more bags.
//!
//! Every chunk that can contain a wanted message is a potential source.
//! Sources activate lazily: the first chunk of each bag up front, later
//! chunks as soon as their start time could precede the next message to be
//! yielded. That keeps exactly one decoded chunk live per active source
//! while still merging correctly when chunks of one bag overlap in time.
//! The heap key is `(timestamp, bag order, chunk position, record
//! position)`, so ties are deterministic and dropping topics from the
//! filter never reorders the remaining messages.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::core::{BagError, Result, RosTime};
use crate::io::bag::Bag;
use crate::io::chunk::{self, ChunkArena};
use crate::io::index::Connection;
use crate::io::record::{read_record, OP_CONNECTION, OP_MESSAGE_DATA};
use crate::value::{root_value, RosValue};

/// One message yielded from a view.
///
/// The message holds its chunk's arena, so it stays valid after the
/// iterator that produced it is dropped.
pub struct Message {
    connection: Arc<Connection>,
    timestamp: RosTime,
    arena: Arc<ChunkArena>,
    offset: usize,
    len: usize,
}

impl Message {
    /// The topic this message was published on.
    pub fn topic(&self) -> &str {
        &self.connection.topic
    }

    /// The connection that produced this message.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The record timestamp.
    pub fn timestamp(&self) -> RosTime {
        self.timestamp
    }

    /// The serialized message bytes.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.arena.data()[self.offset..self.offset + self.len]
    }

    /// The lazily decoded value tree, rooted at the message type.
    pub fn value(&self) -> Result<RosValue<'_>> {
        let schema = self.connection.schema()?;
        Ok(root_value(schema, self.raw_bytes()))
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic())
            .field("timestamp", &self.timestamp)
            .field("len", &self.len)
            .finish()
    }
}

/// A query over one or more bags.
#[derive(Default)]
pub struct View {
    bags: Vec<Bag>,
}

impl View {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bag. Bags added earlier win timestamp ties.
    pub fn add_bag(&mut self, bag: Bag) -> &mut Self {
        self.bags.push(bag);
        self
    }

    /// The bags in this view, in insertion order.
    pub fn bags(&self) -> &[Bag] {
        &self.bags
    }

    /// Union of topics across all bags, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for bag in &self.bags {
            for topic in bag.topics() {
                set.insert(topic.to_string());
            }
        }
        set.into_iter().collect()
    }

    /// Connections grouped by topic, merged across bags.
    pub fn connections_by_topic(&self) -> BTreeMap<String, Vec<Arc<Connection>>> {
        let mut merged: BTreeMap<String, Vec<Arc<Connection>>> = BTreeMap::new();
        for bag in &self.bags {
            for (topic, conns) in bag.connections_by_topic() {
                merged
                    .entry(topic.clone())
                    .or_default()
                    .extend(conns.iter().cloned());
            }
        }
        merged
    }

    /// Stream every message across all bags in timestamp order.
    pub fn get_messages(&self) -> Result<MessageIter> {
        MessageIter::new(self.bags.clone(), None)
    }

    /// Stream messages on the given topics, in timestamp order.
    pub fn get_messages_on<S: AsRef<str>>(&self, topics: &[S]) -> Result<MessageIter> {
        let wanted: HashSet<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();
        MessageIter::new(self.bags.clone(), Some(wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MergeKey {
    time: u64,
    bag: usize,
    chunk_pos: u64,
    record_pos: usize,
}

#[derive(Debug, Clone, Copy)]
struct Planned {
    chunk_idx: usize,
    start: RosTime,
    pos: u64,
}

struct Peeked {
    conn_id: u32,
    time: RosTime,
    data_offset: usize,
    data_len: usize,
    record_pos: usize,
}

/// A live chunk being walked: the decoded arena plus the next matching
/// message-data record, if any.
struct SourceCursor {
    bag_idx: usize,
    chunk_pos: u64,
    arena: Arc<ChunkArena>,
    pos: usize,
    peeked: Option<Peeked>,
}

impl SourceCursor {
    /// Walk forward to the next message-data record passing the filter.
    /// Connection re-declarations and unknown records inside the chunk are
    /// skipped by their length prefix.
    fn advance(&mut self, filter: Option<&HashSet<u32>>) -> Result<()> {
        self.peeked = None;
        let data = self.arena.data();
        while self.pos < data.len() {
            let record_pos = self.pos;
            let rec = read_record(data, &mut self.pos)?;
            match rec.header.op()? {
                OP_MESSAGE_DATA => {
                    let conn_id = rec.header.conn()?;
                    if filter.map_or(true, |f| f.contains(&conn_id)) {
                        self.peeked = Some(Peeked {
                            conn_id,
                            time: rec.header.time()?,
                            data_offset: rec.data_offset,
                            data_len: rec.data.len(),
                            record_pos,
                        });
                        return Ok(());
                    }
                }
                OP_CONNECTION => {}
                op => {
                    debug!(op, "skipping unknown record inside chunk");
                }
            }
        }
        Ok(())
    }

    fn key(&self) -> Option<MergeKey> {
        self.peeked.as_ref().map(|p| MergeKey {
            time: p.time.as_nanos(),
            bag: self.bag_idx,
            chunk_pos: self.chunk_pos,
            record_pos: p.record_pos,
        })
    }
}

/// Pull iterator over merged messages. Yields `Err` once on failure and is
/// fused afterwards; messages already yielded stay valid.
pub struct MessageIter {
    bags: Vec<Bag>,
    filters: Vec<Option<HashSet<u32>>>,
    pending: Vec<VecDeque<Planned>>,
    cursors: Vec<Option<SourceCursor>>,
    heap: BinaryHeap<Reverse<(MergeKey, usize)>>,
    done: bool,
}

impl MessageIter {
    fn new(bags: Vec<Bag>, topics: Option<HashSet<String>>) -> Result<Self> {
        let mut filters = Vec::with_capacity(bags.len());
        let mut pending = Vec::with_capacity(bags.len());

        for bag in &bags {
            let conn_filter: Option<HashSet<u32>> = topics.as_ref().map(|wanted| {
                bag.index()
                    .topics
                    .iter()
                    .filter(|(topic, _)| wanted.contains(topic.as_str()))
                    .flat_map(|(_, ids)| ids.iter().copied())
                    .collect()
            });

            let chunks = &bag.index().chunks;
            let mut planned: Vec<Planned> = chunks
                .iter()
                .enumerate()
                .filter(|(_, info)| match &conn_filter {
                    Some(f) => !f.is_empty() && info.intersects(f),
                    None => true,
                })
                .map(|(chunk_idx, info)| Planned {
                    chunk_idx,
                    start: info.start_time,
                    pos: info.pos,
                })
                .collect();
            planned.sort_by_key(|p| (p.start, p.pos));

            filters.push(conn_filter);
            pending.push(VecDeque::from(planned));
        }

        let mut iter = MessageIter {
            bags,
            filters,
            pending,
            cursors: Vec::new(),
            heap: BinaryHeap::new(),
            done: false,
        };
        for bag_idx in 0..iter.bags.len() {
            iter.activate(bag_idx)?;
        }
        Ok(iter)
    }

    /// Decode the bag's next pending chunk and enqueue it, skipping chunks
    /// with no matching messages.
    fn activate(&mut self, bag_idx: usize) -> Result<()> {
        while let Some(planned) = self.pending[bag_idx].pop_front() {
            let bag = &self.bags[bag_idx];
            let info = &bag.index().chunks[planned.chunk_idx];
            let arena = chunk::decompress(
                bag.source(),
                &info.compression,
                info.uncompressed_size as usize,
                info.data_offset,
                info.data_len,
            )?;
            let mut cursor = SourceCursor {
                bag_idx,
                chunk_pos: info.pos,
                arena,
                pos: 0,
                peeked: None,
            };
            cursor.advance(self.filters[bag_idx].as_ref())?;
            if let Some(key) = cursor.key() {
                let slot = self.cursors.len();
                self.cursors.push(Some(cursor));
                self.heap.push(Reverse((key, slot)));
                return Ok(());
            }
        }
        Ok(())
    }

    fn pending_key(&self, bag_idx: usize) -> Option<MergeKey> {
        self.pending[bag_idx].front().map(|p| MergeKey {
            time: p.start.as_nanos(),
            bag: bag_idx,
            chunk_pos: p.pos,
            record_pos: 0,
        })
    }

    fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if self.heap.is_empty() {
                let mut activated = false;
                for bag_idx in 0..self.bags.len() {
                    if !self.pending[bag_idx].is_empty() {
                        self.activate(bag_idx)?;
                        activated = true;
                    }
                }
                if self.heap.is_empty() {
                    if !activated {
                        return Ok(None);
                    }
                    continue;
                }
            }

            let top_key = match self.heap.peek() {
                Some(Reverse((key, _))) => *key,
                None => continue,
            };

            // A pending chunk whose start time could precede the heap top
            // must go live before the top is final.
            let wake = (0..self.bags.len())
                .find(|&b| self.pending_key(b).is_some_and(|k| k <= top_key));
            if let Some(bag_idx) = wake {
                self.activate(bag_idx)?;
                continue;
            }

            let slot = match self.heap.pop() {
                Some(Reverse((_, slot))) => slot,
                None => continue,
            };

            let mut cursor = match self.cursors[slot].take() {
                Some(cursor) => cursor,
                None => continue,
            };
            let peeked = match cursor.peeked.take() {
                Some(peeked) => peeked,
                None => continue,
            };

            let bag = &self.bags[cursor.bag_idx];
            let connection = bag.connection(peeked.conn_id).cloned().ok_or_else(|| {
                BagError::corrupt_field(
                    "conn",
                    format!("message references unknown connection {}", peeked.conn_id),
                )
            })?;
            let message = Message {
                connection,
                timestamp: peeked.time,
                arena: cursor.arena.clone(),
                offset: peeked.data_offset,
                len: peeked.data_len,
            };

            cursor.advance(self.filters[cursor.bag_idx].as_ref())?;
            if let Some(key) = cursor.key() {
                self.heap.push(Reverse((key, slot)));
                self.cursors[slot] = Some(cursor);
            }
            return Ok(Some(message));
        }
    }
}

impl Iterator for MessageIter {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
