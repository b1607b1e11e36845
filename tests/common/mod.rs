// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests: a byte-level bag writer and
//! reference encoders for a few well-known message types.
//!
//! The writer produces real v2.0 framing: magic, bag header, chunks with
//! embedded connection records, trailing index_data records, and an index
//! section of connection and chunk info records.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};

// ============================================================================
// Record framing
// ============================================================================

pub fn field(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&((name.len() + 1 + value.len()) as u32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value);
    out
}

pub fn field_str(name: &str, value: &str) -> Vec<u8> {
    field(name, value.as_bytes())
}

pub fn field_u8(name: &str, value: u8) -> Vec<u8> {
    field(name, &[value])
}

pub fn field_u32(name: &str, value: u32) -> Vec<u8> {
    field(name, &value.to_le_bytes())
}

pub fn field_u64(name: &str, value: u64) -> Vec<u8> {
    field(name, &value.to_le_bytes())
}

pub fn field_time(name: &str, time: (u32, u32)) -> Vec<u8> {
    let mut value = Vec::new();
    value.extend_from_slice(&time.0.to_le_bytes());
    value.extend_from_slice(&time.1.to_le_bytes());
    field(name, &value)
}

pub fn record(header: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

// ============================================================================
// Bag builder
// ============================================================================

pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

const OP_MESSAGE_DATA: u8 = 0x02;
const OP_BAG_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

#[derive(Clone)]
pub struct ConnSpec {
    pub id: u32,
    pub topic: String,
    pub datatype: String,
    pub md5sum: String,
    pub definition: String,
    pub callerid: String,
    pub latching: bool,
}

#[derive(Clone)]
pub struct MsgSpec {
    pub conn: u32,
    pub time: (u32, u32),
    pub payload: Vec<u8>,
}

#[derive(Clone)]
pub struct ChunkSpec {
    pub compression: String,
    pub messages: Vec<MsgSpec>,
}

#[derive(Default)]
pub struct BagBuilder {
    connections: Vec<ConnSpec>,
    chunks: Vec<ChunkSpec>,
    omit_index: bool,
}

impl BagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&mut self, conn: ConnSpec) -> &mut Self {
        self.connections.push(conn);
        self
    }

    pub fn chunk(&mut self, compression: &str, messages: Vec<MsgSpec>) -> &mut Self {
        self.chunks.push(ChunkSpec {
            compression: compression.to_string(),
            messages,
        });
        self
    }

    /// Write a bag whose header says `index_pos == 0`, as a recorder that
    /// died before reindexing would leave it.
    pub fn omit_index(&mut self) -> &mut Self {
        self.omit_index = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_record_len =
            bag_header_record(0, self.connections.len() as u32, self.chunks.len() as u32).len();
        let base = MAGIC.len() + header_record_len;

        let mut body = Vec::new();
        let mut infos = Vec::new();

        for chunk in &self.chunks {
            let chunk_pos = (base + body.len()) as u64;

            // Uncompressed payload: connection records for the connections
            // used in this chunk, then the message records.
            let mut payload = Vec::new();
            let used: Vec<u32> = {
                let mut ids: Vec<u32> = chunk.messages.iter().map(|m| m.conn).collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            };
            for id in &used {
                if let Some(conn) = self.connections.iter().find(|c| c.id == *id) {
                    payload.extend(connection_record(conn));
                }
            }

            let mut offsets: BTreeMap<u32, Vec<((u32, u32), u32)>> = BTreeMap::new();
            for msg in &chunk.messages {
                let offset = payload.len() as u32;
                let mut header = Vec::new();
                header.extend(field_u8("op", OP_MESSAGE_DATA));
                header.extend(field_u32("conn", msg.conn));
                header.extend(field_time("time", msg.time));
                payload.extend(record(&header, &msg.payload));
                offsets.entry(msg.conn).or_default().push((msg.time, offset));
            }

            let compressed = compress(&chunk.compression, &payload);
            let mut chunk_header = Vec::new();
            chunk_header.extend(field_u8("op", OP_CHUNK));
            chunk_header.extend(field_str("compression", &chunk.compression));
            chunk_header.extend(field_u32("size", payload.len() as u32));
            body.extend(record(&chunk_header, &compressed));

            // Per-connection index_data records follow the chunk record.
            for (conn, entries) in &offsets {
                let mut header = Vec::new();
                header.extend(field_u8("op", OP_INDEX_DATA));
                header.extend(field_u32("ver", 1));
                header.extend(field_u32("conn", *conn));
                header.extend(field_u32("count", entries.len() as u32));
                let mut data = Vec::new();
                for (time, offset) in entries {
                    data.extend_from_slice(&time.0.to_le_bytes());
                    data.extend_from_slice(&time.1.to_le_bytes());
                    data.extend_from_slice(&offset.to_le_bytes());
                }
                body.extend(record(&header, &data));
            }

            let times: Vec<(u32, u32)> = chunk.messages.iter().map(|m| m.time).collect();
            let counts: Vec<(u32, u32)> = offsets
                .iter()
                .map(|(conn, entries)| (*conn, entries.len() as u32))
                .collect();
            infos.push((
                chunk_pos,
                times.iter().min().copied().unwrap_or((0, 0)),
                times.iter().max().copied().unwrap_or((0, 0)),
                counts,
            ));
        }

        let index_pos = (base + body.len()) as u64;

        let mut index = Vec::new();
        for conn in &self.connections {
            index.extend(connection_record(conn));
        }
        for (chunk_pos, start, end, counts) in &infos {
            let mut header = Vec::new();
            header.extend(field_u8("op", OP_CHUNK_INFO));
            header.extend(field_u32("ver", 1));
            header.extend(field_u64("chunk_pos", *chunk_pos));
            header.extend(field_time("start_time", *start));
            header.extend(field_time("end_time", *end));
            header.extend(field_u32("count", counts.len() as u32));
            let mut data = Vec::new();
            for (conn, count) in counts {
                data.extend_from_slice(&conn.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
            }
            index.extend(record(&header, &data));
        }

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        let written_index_pos = if self.omit_index { 0 } else { index_pos };
        out.extend(bag_header_record(
            written_index_pos,
            self.connections.len() as u32,
            self.chunks.len() as u32,
        ));
        out.extend(body);
        if !self.omit_index {
            out.extend(index);
        }
        out
    }
}

fn bag_header_record(index_pos: u64, conn_count: u32, chunk_count: u32) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend(field_u8("op", OP_BAG_HEADER));
    header.extend(field_u64("index_pos", index_pos));
    header.extend(field_u32("conn_count", conn_count));
    header.extend(field_u32("chunk_count", chunk_count));
    record(&header, &[])
}

fn connection_record(conn: &ConnSpec) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend(field_u8("op", OP_CONNECTION));
    header.extend(field_u32("conn", conn.id));
    header.extend(field_str("topic", &conn.topic));

    let mut data = Vec::new();
    data.extend(field_str("topic", &conn.topic));
    data.extend(field_str("type", &conn.datatype));
    data.extend(field_str("md5sum", &conn.md5sum));
    data.extend(field_str("message_definition", &conn.definition));
    data.extend(field_str("callerid", &conn.callerid));
    data.extend(field_str("latching", if conn.latching { "1" } else { "0" }));

    record(&header, &data)
}

fn compress(compression: &str, payload: &[u8]) -> Vec<u8> {
    match compression {
        "bz2" => {
            let mut out = Vec::new();
            bzip2::read::BzEncoder::new(payload, bzip2::Compression::best())
                .read_to_end(&mut out)
                .expect("bz2 encode");
            out
        }
        "lz4" => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
            encoder.write_all(payload).expect("lz4 encode");
            encoder.finish().expect("lz4 finish")
        }
        _ => payload.to_vec(),
    }
}

// ============================================================================
// Message definitions (gencpp-style, as recorded by rosbag)
// ============================================================================

const SEP: &str = "================================================================================";

pub fn odometry_definition() -> String {
    format!(
        "\
# This represents an estimate of a position and velocity in free space.
Header header
string child_frame_id
geometry_msgs/PoseWithCovariance pose
geometry_msgs/TwistWithCovariance twist
{SEP}
MSG: std_msgs/Header
uint32 seq
time stamp
string frame_id
{SEP}
MSG: geometry_msgs/PoseWithCovariance
geometry_msgs/Pose pose
float64[36] covariance
{SEP}
MSG: geometry_msgs/Pose
geometry_msgs/Point position
geometry_msgs/Quaternion orientation
{SEP}
MSG: geometry_msgs/Point
float64 x
float64 y
float64 z
{SEP}
MSG: geometry_msgs/Quaternion
float64 x
float64 y
float64 z
float64 w
{SEP}
MSG: geometry_msgs/TwistWithCovariance
geometry_msgs/Twist twist
float64[36] covariance
{SEP}
MSG: geometry_msgs/Twist
geometry_msgs/Vector3 linear
geometry_msgs/Vector3 angular
{SEP}
MSG: geometry_msgs/Vector3
float64 x
float64 y
float64 z
"
    )
}

pub fn laserscan_definition() -> String {
    format!(
        "\
# Single scan from a planar laser range-finder
Header header
float32 angle_min        # start angle of the scan [rad]
float32 angle_max        # end angle of the scan [rad]
float32 angle_increment
float32 time_increment
float32 scan_time
float32 range_min
float32 range_max
float32[] ranges
float32[] intensities
{SEP}
MSG: std_msgs/Header
uint32 seq
time stamp
string frame_id
"
    )
}

pub fn pointcloud2_definition() -> String {
    format!(
        "\
Header header
uint32 height
uint32 width
sensor_msgs/PointField[] fields
bool    is_bigendian
uint32  point_step
uint32  row_step
uint8[] data
bool is_dense
{SEP}
MSG: sensor_msgs/PointField
uint8 INT8    = 1
uint8 UINT8   = 2
uint8 INT16   = 3
uint8 UINT16  = 4
uint8 INT32   = 5
uint8 UINT32  = 6
uint8 FLOAT32 = 7
uint8 FLOAT64 = 8

string name
uint32 offset
uint8  datatype
uint32 count
{SEP}
MSG: std_msgs/Header
uint32 seq
time stamp
string frame_id
"
    )
}

// ============================================================================
// Connection specs matching the reference fixture
// ============================================================================

pub fn odometry_connection(id: u32) -> ConnSpec {
    ConnSpec {
        id,
        topic: "/base_pose_ground_truth".to_string(),
        datatype: "nav_msgs/Odometry".to_string(),
        md5sum: "cd5e73d190d741a2f92e81eda573aca7".to_string(),
        definition: odometry_definition(),
        callerid: "/play_1604515197096283663".to_string(),
        latching: false,
    }
}

pub fn laserscan_connection(id: u32) -> ConnSpec {
    ConnSpec {
        id,
        topic: "/base_scan".to_string(),
        datatype: "sensor_msgs/LaserScan".to_string(),
        md5sum: "90c7ef2dc6895d81024acba2ac42f369".to_string(),
        definition: laserscan_definition(),
        callerid: "/play_1604515197096283663".to_string(),
        latching: false,
    }
}

pub fn pointcloud_connection(id: u32) -> ConnSpec {
    ConnSpec {
        id,
        topic: "/luminar_pointcloud".to_string(),
        datatype: "sensor_msgs/PointCloud2".to_string(),
        md5sum: "1158d486dd51d683ce2f1be655c3c181".to_string(),
        definition: pointcloud2_definition(),
        callerid: "/play_1604515189845695821".to_string(),
        latching: false,
    }
}

// ============================================================================
// Message payload encoders
// ============================================================================

pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

pub fn put_header(buf: &mut Vec<u8>, seq: u32, stamp: (u32, u32), frame_id: &str) {
    buf.extend_from_slice(&seq.to_le_bytes());
    buf.extend_from_slice(&stamp.0.to_le_bytes());
    buf.extend_from_slice(&stamp.1.to_le_bytes());
    put_str(buf, frame_id);
}

pub fn odometry_payload(seq: u32, stamp: (u32, u32), position_x: f64) -> Vec<u8> {
    let mut buf = Vec::new();
    put_header(&mut buf, seq, stamp, "odom");
    put_str(&mut buf, "base_footprint");
    // pose.pose.position, pose.pose.orientation
    for v in [position_x, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    // pose.covariance
    for _ in 0..36 {
        buf.extend_from_slice(&0.0f64.to_le_bytes());
    }
    // twist.twist.linear, twist.twist.angular
    for _ in 0..6 {
        buf.extend_from_slice(&0.0f64.to_le_bytes());
    }
    // twist.covariance
    for _ in 0..36 {
        buf.extend_from_slice(&0.0f64.to_le_bytes());
    }
    buf
}

pub fn laserscan_payload(seq: u32, stamp: (u32, u32), ranges: &[f32]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_header(&mut buf, seq, stamp, "base_laser_link");
    for v in [-1.57f32, 1.57, 0.01, 0.0, 0.0, 0.1, 30.0] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&(ranges.len() as u32).to_le_bytes());
    for v in ranges {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    // intensities: empty
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf
}

pub fn pointcloud2_payload(seq: u32, stamp: (u32, u32)) -> Vec<u8> {
    let mut buf = Vec::new();
    put_header(&mut buf, seq, stamp, "luminar");
    buf.extend_from_slice(&1u32.to_le_bytes()); // height
    buf.extend_from_slice(&2u32.to_le_bytes()); // width
    buf.extend_from_slice(&3u32.to_le_bytes()); // fields
    for (name, offset) in [("x", 0u32), ("y", 4), ("z", 8)] {
        put_str(&mut buf, name);
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.push(7); // FLOAT32
        buf.extend_from_slice(&1u32.to_le_bytes());
    }
    buf.push(0); // is_bigendian
    buf.extend_from_slice(&12u32.to_le_bytes()); // point_step
    buf.extend_from_slice(&24u32.to_le_bytes()); // row_step
    buf.extend_from_slice(&24u32.to_le_bytes()); // data length
    for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.push(1); // is_dense
    buf
}

// ============================================================================
// The reference fixture: three topics, five messages each
// ============================================================================

pub const BASE_SEC: u32 = 1604515200;

/// Build the standard three-topic fixture: five messages per topic,
/// `header.seq` running 601..=605, split across a bz2 chunk and an
/// uncompressed chunk.
pub fn test_bag() -> Vec<u8> {
    let mut builder = BagBuilder::new();
    builder
        .connection(odometry_connection(1))
        .connection(laserscan_connection(2))
        .connection(pointcloud_connection(3));

    let mut first = Vec::new();
    let mut second = Vec::new();
    for i in 0..5u32 {
        let seq = 601 + i;
        let sec = BASE_SEC + i;
        let batch = vec![
            MsgSpec {
                conn: 2,
                time: (sec, 100),
                payload: laserscan_payload(seq, (sec, 100), &[1.5, 2.5, 3.5]),
            },
            MsgSpec {
                conn: 1,
                time: (sec, 200),
                payload: odometry_payload(seq, (sec, 200), 0.25 + i as f64),
            },
            MsgSpec {
                conn: 3,
                time: (sec, 300),
                payload: pointcloud2_payload(seq, (sec, 300)),
            },
        ];
        if i < 3 {
            first.extend(batch);
        } else {
            second.extend(batch);
        }
    }

    builder.chunk("bz2", first).chunk("none", second);
    builder.build()
}
