// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The bag index built at open time.
//!
//! Opening verifies the magic line, reads the bag header record, and then
//! replays the index section at `index_pos`: connection records and chunk
//! info records, followed by each chunk's trailing `index_data` records.
//! Unknown opcodes are fatal during index replay. A bag whose header says
//! `index_pos == 0` was never reindexed after recording; those fall back
//! to a tolerant forward scan that skips unknown records by their length
//! prefix and derives per-chunk metadata from the chunk payloads.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::core::{BagError, Result, RosTime};
use crate::io::chunk;
use crate::io::record::{
    check_magic, read_record, RecordHeader, MAGIC, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO,
    OP_CONNECTION, OP_INDEX_DATA, OP_MESSAGE_DATA,
};
use crate::io::source::ByteSource;
use crate::schema::{self, ObjectSchema};
use crate::value::Cursor;

/// A logical publisher endpoint for a topic.
///
/// Connection ids are unique within a bag; several connections may share a
/// topic. The message definition is parsed into a schema on first request
/// and cached, so all messages on the connection share one schema tree.
#[derive(Debug)]
pub struct Connection {
    /// Connection id, unique within the bag
    pub id: u32,
    /// Topic name
    pub topic: String,
    /// Message type (e.g. "nav_msgs/Odometry")
    pub datatype: String,
    /// md5sum of the message definition, as recorded
    pub md5sum: String,
    /// Raw .msg definition text
    pub message_definition: String,
    /// Publishing node name
    pub callerid: String,
    /// Whether the publisher latched
    pub latching: bool,
    /// Message count summed from chunk info records
    pub message_count: u64,
    schema: OnceLock<Arc<ObjectSchema>>,
}

impl Connection {
    fn from_records(header: &RecordHeader, info: &RecordHeader) -> Result<Self> {
        let topic = info
            .topic
            .clone()
            .or_else(|| header.topic.clone())
            .ok_or_else(|| BagError::missing_field("topic"))?;
        Ok(Connection {
            id: header.conn()?,
            topic,
            datatype: info
                .datatype
                .clone()
                .ok_or_else(|| BagError::missing_field("type"))?,
            md5sum: info
                .md5sum
                .clone()
                .ok_or_else(|| BagError::missing_field("md5sum"))?,
            message_definition: info
                .message_definition
                .clone()
                .ok_or_else(|| BagError::missing_field("message_definition"))?,
            callerid: info.callerid.clone().unwrap_or_default(),
            latching: info.latching.as_deref() == Some("1"),
            message_count: 0,
            schema: OnceLock::new(),
        })
    }

    /// Package scope, the part of the type before the first `/`.
    pub fn scope(&self) -> &str {
        self.datatype.split('/').next().unwrap_or("")
    }

    /// The resolved schema tree, parsed from the definition on first call.
    pub fn schema(&self) -> Result<&Arc<ObjectSchema>> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let resolved = schema::parse_and_resolve(&self.datatype, &self.message_definition)?;
        Ok(self.schema.get_or_init(|| resolved))
    }
}

/// One `(time, offset)` index entry for a message within a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Message timestamp
    pub time: RosTime,
    /// Offset of the message record within the uncompressed chunk
    pub offset: u32,
}

/// Everything known about one chunk without decompressing it.
#[derive(Debug)]
pub struct ChunkInfo {
    /// Offset of the chunk record in the file
    pub pos: u64,
    /// Earliest message timestamp in the chunk
    pub start_time: RosTime,
    /// Latest message timestamp in the chunk
    pub end_time: RosTime,
    /// `(connection id, message count)` pairs from the chunk info record
    pub connection_counts: Vec<(u32, u32)>,
    /// Compression identifier from the chunk header
    pub compression: String,
    /// Declared uncompressed payload size
    pub uncompressed_size: u32,
    /// Offset of the (compressed) payload in the file
    pub data_offset: usize,
    /// Length of the (compressed) payload
    pub data_len: usize,
    /// Per-connection index entries trailing the chunk record
    pub index: HashMap<u32, Vec<IndexEntry>>,
}

impl ChunkInfo {
    /// Total messages across all connections in this chunk.
    pub fn message_count(&self) -> u64 {
        self.connection_counts
            .iter()
            .map(|(_, n)| *n as u64)
            .sum()
    }

    /// True when the chunk holds messages for any of the given connections.
    pub fn intersects(&self, conn_ids: &std::collections::HashSet<u32>) -> bool {
        self.connection_counts.is_empty()
            || self
                .connection_counts
                .iter()
                .any(|(id, _)| conn_ids.contains(id))
    }
}

/// The immutable index of a bag, shared read-only by every view.
#[derive(Debug)]
pub struct BagIndex {
    /// Connections by id
    pub connections: HashMap<u32, Arc<Connection>>,
    /// Topic name to connection ids, in record order per topic
    pub topics: BTreeMap<String, Vec<u32>>,
    /// Chunks in index-section order
    pub chunks: Vec<ChunkInfo>,
    /// False when rebuilt by forward scan of an unindexed bag
    pub indexed: bool,
}

impl BagIndex {
    /// Look up a connection by id.
    pub fn connection(&self, id: u32) -> Option<&Arc<Connection>> {
        self.connections.get(&id)
    }

    /// Earliest chunk start time, ignoring unset times.
    pub fn start_time(&self) -> Option<RosTime> {
        self.chunks
            .iter()
            .map(|c| c.start_time)
            .filter(|t| !t.is_zero())
            .min()
    }

    /// Latest chunk end time.
    pub fn end_time(&self) -> Option<RosTime> {
        self.chunks
            .iter()
            .map(|c| c.end_time)
            .filter(|t| !t.is_zero())
            .max()
    }
}

/// Build the index by reading the bag's structural records.
pub fn build(source: &Arc<ByteSource>) -> Result<BagIndex> {
    let data = source.data();
    check_magic(data)?;

    let mut pos = MAGIC.len();
    let header_rec = read_record(data, &mut pos)?;
    let op = header_rec.header.op()?;
    if op != OP_BAG_HEADER {
        return Err(BagError::corrupt_field(
            "op",
            format!("expected bag header record, found opcode {op:#04x}"),
        ));
    }
    let index_pos = header_rec.header.index_pos()?;

    if index_pos == 0 {
        debug!("bag has no index section, falling back to forward scan");
        scan_forward(source, pos)
    } else {
        replay_index(source, index_pos)
    }
}

fn replay_index(source: &Arc<ByteSource>, index_pos: u64) -> Result<BagIndex> {
    let data = source.data();
    let mut conns: Vec<Connection> = Vec::new();
    let mut conn_slots: HashMap<u32, usize> = HashMap::new();
    let mut chunks: Vec<ChunkInfo> = Vec::new();

    let mut pos = index_pos as usize;
    while pos < data.len() {
        let rec = read_record(data, &mut pos)?;
        match rec.header.op()? {
            OP_CONNECTION => {
                let info = RecordHeader::parse(rec.data)?;
                let conn = Connection::from_records(&rec.header, &info)?;
                if conn_slots.contains_key(&conn.id) {
                    return Err(BagError::corrupt_field(
                        "conn",
                        format!("duplicate connection id {}", conn.id),
                    ));
                }
                conn_slots.insert(conn.id, conns.len());
                conns.push(conn);
            }
            OP_CHUNK_INFO => {
                let ver = rec.header.ver()?;
                if ver != 1 {
                    return Err(BagError::corrupt_field(
                        "ver",
                        format!("unsupported chunk info version {ver}"),
                    ));
                }
                let count = rec.header.count()? as usize;
                let mut cur = Cursor::new(rec.data);
                let mut counts = Vec::with_capacity(count);
                for _ in 0..count {
                    let conn = cur.read_u32("chunk info entry")?;
                    let n = cur.read_u32("chunk info entry")?;
                    counts.push((conn, n));
                }
                if !cur.is_at_end() {
                    return Err(BagError::corrupt_field(
                        "count",
                        "chunk info data longer than declared",
                    ));
                }
                chunks.push(ChunkInfo {
                    pos: rec.header.chunk_pos()?,
                    start_time: rec.header.start_time()?,
                    end_time: rec.header.end_time()?,
                    connection_counts: counts,
                    compression: String::new(),
                    uncompressed_size: 0,
                    data_offset: 0,
                    data_len: 0,
                    index: HashMap::new(),
                });
            }
            op => return Err(BagError::unknown_op(op)),
        }
    }

    // Each chunk record carries its own compression and size, and the
    // index_data records for the chunk follow it directly.
    for chunk in &mut chunks {
        let mut cpos = chunk.pos as usize;
        let rec = read_record(data, &mut cpos)?;
        if rec.header.op()? != OP_CHUNK {
            return Err(BagError::corrupt_field(
                "chunk_pos",
                format!("no chunk record at offset {}", chunk.pos),
            ));
        }
        chunk.compression = rec.header.compression()?.to_string();
        chunk.uncompressed_size = rec.header.size()?;
        chunk.data_offset = rec.data_offset;
        chunk.data_len = rec.data.len();

        while cpos < data.len() {
            let mut peek = cpos;
            let next = read_record(data, &mut peek)?;
            if next.header.op()? != OP_INDEX_DATA {
                break;
            }
            cpos = peek;
            let ver = next.header.ver()?;
            if ver != 1 {
                return Err(BagError::corrupt_field(
                    "ver",
                    format!("unsupported index data version {ver}"),
                ));
            }
            let conn = next.header.conn()?;
            let count = next.header.count()? as usize;
            let mut cur = Cursor::new(next.data);
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let time = cur.read_time("index entry")?;
                let offset = cur.read_u32("index entry")?;
                entries.push(IndexEntry { time, offset });
            }
            if !cur.is_at_end() {
                return Err(BagError::corrupt_field(
                    "count",
                    "index data longer than declared",
                ));
            }
            chunk.index.entry(conn).or_default().extend(entries);
        }
    }

    Ok(finish(conns, conn_slots, chunks, true))
}

fn scan_forward(source: &Arc<ByteSource>, mut pos: usize) -> Result<BagIndex> {
    let data = source.data();
    let mut conns: Vec<Connection> = Vec::new();
    let mut conn_slots: HashMap<u32, usize> = HashMap::new();
    let mut chunks: Vec<ChunkInfo> = Vec::new();

    while pos < data.len() {
        let rec = read_record(data, &mut pos)?;
        match rec.header.op()? {
            OP_CONNECTION => {
                let info = RecordHeader::parse(rec.data)?;
                let conn = Connection::from_records(&rec.header, &info)?;
                if !conn_slots.contains_key(&conn.id) {
                    conn_slots.insert(conn.id, conns.len());
                    conns.push(conn);
                }
            }
            OP_CHUNK => {
                let compression = rec.header.compression()?.to_string();
                let size = rec.header.size()?;
                let mut chunk = ChunkInfo {
                    pos: rec.pos as u64,
                    start_time: RosTime::ZERO,
                    end_time: RosTime::ZERO,
                    connection_counts: Vec::new(),
                    compression,
                    uncompressed_size: size,
                    data_offset: rec.data_offset,
                    data_len: rec.data.len(),
                    index: HashMap::new(),
                };
                scan_chunk_payload(source, &mut chunk, &mut conns, &mut conn_slots)?;
                chunks.push(chunk);
            }
            OP_INDEX_DATA | OP_CHUNK_INFO => {}
            op => {
                debug!(op, "skipping unknown record during forward scan");
            }
        }
    }

    Ok(finish(conns, conn_slots, chunks, false))
}

/// Decompress a chunk and derive its connections, per-connection counts
/// and time bounds from the payload records.
fn scan_chunk_payload(
    source: &Arc<ByteSource>,
    chunk: &mut ChunkInfo,
    conns: &mut Vec<Connection>,
    conn_slots: &mut HashMap<u32, usize>,
) -> Result<()> {
    let arena = chunk::decompress(
        source,
        &chunk.compression,
        chunk.uncompressed_size as usize,
        chunk.data_offset,
        chunk.data_len,
    )?;
    let payload = arena.data();

    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    let mut start: Option<RosTime> = None;
    let mut end: Option<RosTime> = None;

    let mut pos = 0usize;
    while pos < payload.len() {
        let rec = read_record(payload, &mut pos)?;
        match rec.header.op()? {
            OP_CONNECTION => {
                let info = RecordHeader::parse(rec.data)?;
                let conn = Connection::from_records(&rec.header, &info)?;
                if !conn_slots.contains_key(&conn.id) {
                    conn_slots.insert(conn.id, conns.len());
                    conns.push(conn);
                }
            }
            OP_MESSAGE_DATA => {
                let conn = rec.header.conn()?;
                let time = rec.header.time()?;
                *counts.entry(conn).or_insert(0) += 1;
                start = Some(start.map_or(time, |s: RosTime| s.min(time)));
                end = Some(end.map_or(time, |e: RosTime| e.max(time)));
            }
            op => {
                debug!(op, "skipping unknown record inside chunk");
            }
        }
    }

    chunk.connection_counts = counts.into_iter().collect();
    chunk.start_time = start.unwrap_or(RosTime::ZERO);
    chunk.end_time = end.unwrap_or(RosTime::ZERO);
    Ok(())
}

fn finish(
    mut conns: Vec<Connection>,
    conn_slots: HashMap<u32, usize>,
    chunks: Vec<ChunkInfo>,
    indexed: bool,
) -> BagIndex {
    for chunk in &chunks {
        for (conn_id, n) in &chunk.connection_counts {
            match conn_slots.get(conn_id) {
                Some(&slot) => conns[slot].message_count += *n as u64,
                None => warn!(conn = conn_id, "chunk info references unknown connection"),
            }
        }
    }

    let mut connections = HashMap::with_capacity(conns.len());
    let mut topics: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for conn in conns {
        topics.entry(conn.topic.clone()).or_default().push(conn.id);
        connections.insert(conn.id, Arc::new(conn));
    }

    BagIndex {
        connections,
        topics,
        chunks,
        indexed,
    }
}
