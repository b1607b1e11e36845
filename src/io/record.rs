// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record and field framing for the bag container.
//!
//! Every structural unit of a bag is a record:
//! `<header_len: u32><header><data_len: u32><data>`, where the header is a
//! sequence of `<field_len: u32><name>=<value>` pairs. The single-byte
//! `op` field tags the record kind. All framing integers are
//! little-endian.

use tracing::debug;

use crate::core::{BagError, Result, RosTime};
use crate::value::Cursor;

/// Message data record: `conn`, `time`; data is the serialized message.
pub const OP_MESSAGE_DATA: u8 = 0x02;
/// Bag header record: `index_pos`, `conn_count`, `chunk_count`.
pub const OP_BAG_HEADER: u8 = 0x03;
/// Index data record: `ver`, `conn`, `count`; data is `(time, offset)` pairs.
pub const OP_INDEX_DATA: u8 = 0x04;
/// Chunk record: `compression`, `size`; data is the (compressed) payload.
pub const OP_CHUNK: u8 = 0x05;
/// Chunk info record: `ver`, `chunk_pos`, times, `count`; data is
/// `(conn, count)` pairs.
pub const OP_CHUNK_INFO: u8 = 0x06;
/// Connection record: `conn`, `topic`; data is itself a header block.
pub const OP_CONNECTION: u8 = 0x07;

/// The version 2.0 magic line every bag starts with.
pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

/// Verify the magic line at the start of a bag.
pub fn check_magic(data: &[u8]) -> Result<()> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        let found = &data[..data.len().min(MAGIC.len())];
        return Err(BagError::bad_magic(
            String::from_utf8_lossy(found).into_owned(),
        ));
    }
    Ok(())
}

/// A decoded record borrowing its data from the surrounding buffer.
#[derive(Debug)]
pub struct Record<'a> {
    /// Parsed header fields
    pub header: RecordHeader,
    /// The record's data block
    pub data: &'a [u8],
    /// Offset of the record within the buffer
    pub pos: usize,
    /// Offset of the data block within the buffer
    pub data_offset: usize,
}

/// Read one record at `*pos`, advancing `*pos` past it.
pub fn read_record<'a>(buf: &'a [u8], pos: &mut usize) -> Result<Record<'a>> {
    let start = *pos;
    let tail = buf
        .get(start..)
        .ok_or_else(|| BagError::short_read("record", 8, 0))?;
    let mut cur = Cursor::new(tail);
    let header_bytes = cur.read_length_prefixed("record header")?;
    let data = cur.read_length_prefixed("record data")?;
    let header = RecordHeader::parse(header_bytes)?;
    let data_offset = start + 4 + header_bytes.len() + 4;
    *pos = start + cur.position();
    Ok(Record {
        header,
        data,
        pos: start,
        data_offset,
    })
}

/// Parsed `name=value` fields of a record header (or of a connection
/// record's data block, which shares the same encoding).
#[derive(Debug, Default, Clone)]
pub struct RecordHeader {
    pub op: Option<u8>,
    pub conn: Option<u32>,
    pub time: Option<RosTime>,
    pub topic: Option<String>,
    pub index_pos: Option<u64>,
    pub conn_count: Option<u32>,
    pub chunk_count: Option<u32>,
    pub chunk_pos: Option<u64>,
    pub start_time: Option<RosTime>,
    pub end_time: Option<RosTime>,
    pub compression: Option<String>,
    pub size: Option<u32>,
    pub ver: Option<u32>,
    pub count: Option<u32>,
    pub datatype: Option<String>,
    pub md5sum: Option<String>,
    pub message_definition: Option<String>,
    pub callerid: Option<String>,
    pub latching: Option<String>,
}

impl RecordHeader {
    /// Parse a header block into named fields.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut fields = RecordHeader::default();
        let mut cur = Cursor::new(bytes);
        while !cur.is_at_end() {
            let field = cur.read_length_prefixed("header field")?;
            let eq = field.iter().position(|&b| b == b'=').ok_or_else(|| {
                BagError::corrupt_field(
                    String::from_utf8_lossy(field).into_owned(),
                    "field has no '=' separator",
                )
            })?;
            fields.set(&field[..eq], &field[eq + 1..])?;
        }
        Ok(fields)
    }

    fn set(&mut self, name: &[u8], value: &[u8]) -> Result<()> {
        match name {
            b"op" => self.op = Some(u8_field("op", value)?),
            b"conn" => self.conn = Some(u32_field("conn", value)?),
            b"time" => self.time = Some(time_field("time", value)?),
            b"topic" => self.topic = Some(str_field(value)),
            b"index_pos" => self.index_pos = Some(u64_field("index_pos", value)?),
            b"conn_count" => self.conn_count = Some(u32_field("conn_count", value)?),
            b"chunk_count" => self.chunk_count = Some(u32_field("chunk_count", value)?),
            b"chunk_pos" => self.chunk_pos = Some(u64_field("chunk_pos", value)?),
            b"start_time" => self.start_time = Some(time_field("start_time", value)?),
            b"end_time" => self.end_time = Some(time_field("end_time", value)?),
            b"compression" => self.compression = Some(str_field(value)),
            b"size" => self.size = Some(u32_field("size", value)?),
            b"ver" => self.ver = Some(u32_field("ver", value)?),
            b"count" => self.count = Some(u32_field("count", value)?),
            b"type" => self.datatype = Some(str_field(value)),
            b"md5sum" => self.md5sum = Some(str_field(value)),
            b"message_definition" => self.message_definition = Some(str_field(value)),
            b"callerid" => self.callerid = Some(str_field(value)),
            b"latching" => self.latching = Some(str_field(value)),
            other => {
                debug!(
                    field = %String::from_utf8_lossy(other),
                    "ignoring unknown header field"
                );
            }
        }
        Ok(())
    }

    pub fn op(&self) -> Result<u8> {
        self.op.ok_or_else(|| BagError::missing_field("op"))
    }

    pub fn conn(&self) -> Result<u32> {
        self.conn.ok_or_else(|| BagError::missing_field("conn"))
    }

    pub fn time(&self) -> Result<RosTime> {
        self.time.ok_or_else(|| BagError::missing_field("time"))
    }

    pub fn index_pos(&self) -> Result<u64> {
        self.index_pos
            .ok_or_else(|| BagError::missing_field("index_pos"))
    }

    pub fn chunk_pos(&self) -> Result<u64> {
        self.chunk_pos
            .ok_or_else(|| BagError::missing_field("chunk_pos"))
    }

    pub fn start_time(&self) -> Result<RosTime> {
        self.start_time
            .ok_or_else(|| BagError::missing_field("start_time"))
    }

    pub fn end_time(&self) -> Result<RosTime> {
        self.end_time
            .ok_or_else(|| BagError::missing_field("end_time"))
    }

    pub fn compression(&self) -> Result<&str> {
        self.compression
            .as_deref()
            .ok_or_else(|| BagError::missing_field("compression"))
    }

    pub fn size(&self) -> Result<u32> {
        self.size.ok_or_else(|| BagError::missing_field("size"))
    }

    pub fn ver(&self) -> Result<u32> {
        self.ver.ok_or_else(|| BagError::missing_field("ver"))
    }

    pub fn count(&self) -> Result<u32> {
        self.count.ok_or_else(|| BagError::missing_field("count"))
    }

    pub fn topic(&self) -> Result<&str> {
        self.topic
            .as_deref()
            .ok_or_else(|| BagError::missing_field("topic"))
    }
}

fn str_field(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn u8_field(name: &str, value: &[u8]) -> Result<u8> {
    if value.len() != 1 {
        return Err(BagError::corrupt_field(
            name,
            format!("expected 1 byte, found {}", value.len()),
        ));
    }
    Ok(value[0])
}

fn u32_field(name: &str, value: &[u8]) -> Result<u32> {
    if value.len() != 4 {
        return Err(BagError::corrupt_field(
            name,
            format!("expected 4 bytes, found {}", value.len()),
        ));
    }
    Ok(u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
}

fn u64_field(name: &str, value: &[u8]) -> Result<u64> {
    if value.len() != 8 {
        return Err(BagError::corrupt_field(
            name,
            format!("expected 8 bytes, found {}", value.len()),
        ));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(value);
    Ok(u64::from_le_bytes(arr))
}

fn time_field(name: &str, value: &[u8]) -> Result<RosTime> {
    if value.len() != 8 {
        return Err(BagError::corrupt_field(
            name,
            format!("expected 8 bytes, found {}", value.len()),
        ));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(value);
    Ok(RosTime::from_le_bytes(arr))
}
