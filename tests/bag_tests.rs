// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Single-bag integration tests against the synthetic reference fixture.

mod common;

use std::io::Write;

use lazybag::{Bag, BagError, PrimitiveType, SchemaNode};

use common::{field_u8, record, test_bag};

#[test]
fn test_topics() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    assert_eq!(
        bag.topics(),
        ["/base_pose_ground_truth", "/base_scan", "/luminar_pointcloud"]
    );
}

#[test]
fn test_connections_by_topic() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let by_topic = bag.connections_by_topic();
    assert_eq!(by_topic.len(), 3);

    for (topic, conns) in by_topic {
        assert_eq!(conns.len(), 1);
        let conn = &conns[0];
        assert_eq!(&conn.topic, topic);
        assert!(conn.message_definition.contains("MSG: "));
        assert!(!conn.latching);
        assert_eq!(conn.message_count, 5);
    }

    let pose = &by_topic["/base_pose_ground_truth"][0];
    assert_eq!(pose.datatype, "nav_msgs/Odometry");
    assert_eq!(pose.scope(), "nav_msgs");
    assert_eq!(pose.md5sum, "cd5e73d190d741a2f92e81eda573aca7");
    assert_eq!(pose.callerid, "/play_1604515197096283663");

    let scan = &by_topic["/base_scan"][0];
    assert_eq!(scan.datatype, "sensor_msgs/LaserScan");
    assert_eq!(scan.md5sum, "90c7ef2dc6895d81024acba2ac42f369");

    let cloud = &by_topic["/luminar_pointcloud"][0];
    assert_eq!(cloud.scope(), "sensor_msgs");
    assert_eq!(cloud.callerid, "/play_1604515189845695821");
}

#[test]
fn test_pointcloud_schema_shape() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let schema = bag.schema("/luminar_pointcloud").unwrap();

    let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "header",
            "height",
            "width",
            "fields",
            "is_bigendian",
            "point_step",
            "row_step",
            "data",
            "is_dense"
        ]
    );

    let header = &schema.field("header").unwrap().node;
    let header_obj = header.object().expect("header is an object");
    let header_names: Vec<&str> = header_obj.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(header_names, ["seq", "stamp", "frame_id"]);

    match &schema.field("fields").unwrap().node {
        SchemaNode::ObjectArray { elem, len } => {
            assert_eq!(*len, None);
            let expected = [
                ("name", PrimitiveType::String),
                ("offset", PrimitiveType::UInt32),
                ("datatype", PrimitiveType::UInt8),
                ("count", PrimitiveType::UInt32),
            ];
            assert_eq!(elem.fields().len(), expected.len());
            for (field, (name, kind)) in elem.fields().iter().zip(expected) {
                assert_eq!(field.name, name);
                assert_eq!(field.node.primitive(), Some(kind));
            }
            // The PointField constants are recorded but carry no bytes
            assert_eq!(elem.constants.len(), 8);
        }
        other => panic!("expected object array, got {other:?}"),
    }

    match &schema.field("data").unwrap().node {
        SchemaNode::PrimitiveArray { elem, len } => {
            assert_eq!(*elem, PrimitiveType::UInt8);
            assert_eq!(*len, None);
        }
        other => panic!("expected uint8 array, got {other:?}"),
    }
}

#[test]
fn test_schema_is_cached_and_idempotent() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let first = bag.schema("/base_scan").unwrap();
    let second = bag.schema("/base_scan").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.name, "sensor_msgs/LaserScan");
}

#[test]
fn test_schema_for_unknown_topic() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    assert!(matches!(
        bag.schema("/missing").unwrap_err(),
        BagError::OutOfRange { .. }
    ));
}

#[test]
fn test_base_scan_messages() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let mut expected_seq = 601u32;

    for message in bag.read_messages_on(&["/base_scan"]).unwrap() {
        let message = message.unwrap();
        assert_eq!(message.topic(), "/base_scan");
        let value = message.value().unwrap();

        let header = value.get("header").unwrap();
        assert_eq!(header.get("seq").unwrap().as_u32().unwrap(), expected_seq);
        assert_eq!(
            header.get("frame_id").unwrap().as_str().unwrap(),
            "base_laser_link"
        );
        assert_eq!(value.get("scan_time").unwrap().as_f32().unwrap(), 0.0);

        let ranges_value = value.get("ranges").unwrap();
        let ranges = ranges_value.as_blob().unwrap();
        assert_eq!(ranges.elem_type(), PrimitiveType::Float32);
        assert!(!ranges.is_empty());
        for v in ranges.iter() {
            assert_ne!(v.as_f32().unwrap(), 0.0);
        }

        expected_seq += 1;
    }
    assert_eq!(expected_seq, 606);
}

#[test]
fn test_base_pose_messages() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let mut expected_seq = 601u32;

    for message in bag.read_messages_on(&["/base_pose_ground_truth"]).unwrap() {
        let message = message.unwrap();
        let value = message.value().unwrap();

        let header = value.get("header").unwrap();
        assert_eq!(header.get("seq").unwrap().as_u32().unwrap(), expected_seq);
        assert_eq!(header.get("frame_id").unwrap().as_str().unwrap(), "odom");

        let x = value
            .get("pose")
            .unwrap()
            .get("pose")
            .unwrap()
            .get("position")
            .unwrap()
            .get("x")
            .unwrap()
            .as_f64()
            .unwrap();
        assert_ne!(x, 0.0);

        let pose = value.get("pose").unwrap();
        let cov_value = pose.get("covariance").unwrap();
        let covariance = cov_value.as_blob().unwrap();
        assert_eq!(covariance.len(), 36);
        assert_eq!(covariance.elem_type(), PrimitiveType::Float64);
        for v in covariance.iter() {
            assert_eq!(v.as_f64().unwrap(), 0.0);
        }

        expected_seq += 1;
    }
    assert_eq!(expected_seq, 606);
}

#[test]
fn test_typed_accessor_mismatch() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let mut iter = bag.read_messages_on(&["/base_pose_ground_truth"]).unwrap();
    let message = iter.next().unwrap().unwrap();
    let value = message.value().unwrap();
    let x = value
        .get("pose")
        .unwrap()
        .get("pose")
        .unwrap()
        .get("position")
        .unwrap()
        .get("x")
        .unwrap();
    match x.as_i16().unwrap_err() {
        BagError::TypeMismatch { requested, actual } => {
            assert_eq!(requested, "int16");
            assert_eq!(actual, "float64");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    // The value stays usable after the failed access
    assert_ne!(x.as_f64().unwrap(), 0.0);
}

#[test]
fn test_full_stream_ordering_and_counts() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let mut last = None;
    let mut total = 0usize;
    let mut seen_topics = std::collections::BTreeSet::new();

    for message in bag.read_messages().unwrap() {
        let message = message.unwrap();
        let t = message.timestamp();
        if let Some(prev) = last {
            assert!(t >= prev, "timestamps must be non-decreasing");
        }
        last = Some(t);
        seen_topics.insert(message.topic().to_string());
        total += 1;
    }

    assert_eq!(total, 15);
    assert_eq!(seen_topics.len(), 3);
    assert_eq!(bag.message_count(), 15);
}

#[test]
fn test_per_connection_counts_match_stream() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let mut counted: std::collections::HashMap<u32, u64> = std::collections::HashMap::new();
    for message in bag.read_messages().unwrap() {
        let message = message.unwrap();
        *counted.entry(message.connection().id).or_insert(0) += 1;
    }
    for conns in bag.connections_by_topic().values() {
        for conn in conns {
            assert_eq!(counted.get(&conn.id).copied().unwrap_or(0), conn.message_count);
        }
    }
}

#[test]
fn test_file_and_bytes_equivalence() {
    let bytes = test_bag();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let from_file = Bag::open(file.path()).unwrap();
    let from_bytes = Bag::from_bytes(bytes).unwrap();

    assert_eq!(from_file.topics(), from_bytes.topics());
    assert_eq!(from_file.message_count(), from_bytes.message_count());

    let collect = |bag: &Bag| -> Vec<(String, u64, Vec<u8>)> {
        bag.read_messages()
            .unwrap()
            .map(|m| {
                let m = m.unwrap();
                (
                    m.topic().to_string(),
                    m.timestamp().as_nanos(),
                    m.raw_bytes().to_vec(),
                )
            })
            .collect()
    };
    assert_eq!(collect(&from_file), collect(&from_bytes));
}

#[test]
fn test_time_range() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    let start = bag.start_time().unwrap();
    let end = bag.end_time().unwrap();
    assert_eq!(start.secs, common::BASE_SEC);
    assert_eq!(end.secs, common::BASE_SEC + 4);
    assert!(start < end);
}

#[test]
fn test_chunk_index_matches_counts() {
    let bag = Bag::from_bytes(test_bag()).unwrap();
    assert_eq!(bag.chunk_count(), 2);
    for chunk in bag.chunks() {
        assert!(chunk.start_time <= chunk.end_time);
        assert!(chunk.message_count() > 0);
        for (conn, count) in &chunk.connection_counts {
            let entries = &chunk.index[conn];
            assert_eq!(entries.len() as u32, *count);
            for pair in entries.windows(2) {
                assert!(pair[0].time <= pair[1].time);
            }
        }
    }
}

#[test]
fn test_bad_magic() {
    let err = Bag::from_bytes(b"#NOTABAG V2.0\n".to_vec()).unwrap_err();
    assert!(matches!(err, BagError::BadMagic { .. }));
}

#[test]
fn test_truncated_bag() {
    let mut bytes = test_bag();
    bytes.truncate(bytes.len() - 7);
    let err = Bag::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, BagError::ShortRead { .. }));
}

#[test]
fn test_unknown_op_in_index_section_is_fatal() {
    let mut bytes = test_bag();
    bytes.extend(record(&field_u8("op", 0x99), b"future record"));
    let err = Bag::from_bytes(bytes).unwrap_err();
    match err {
        BagError::UnknownOp { op } => assert_eq!(op, 0x99),
        other => panic!("expected UnknownOp, got {other:?}"),
    }
}

#[test]
fn test_duplicate_connection_id_rejected() {
    let mut builder = common::BagBuilder::new();
    builder
        .connection(common::laserscan_connection(1))
        .connection(common::odometry_connection(1));
    builder.chunk(
        "none",
        vec![common::MsgSpec {
            conn: 1,
            time: (common::BASE_SEC, 0),
            payload: common::laserscan_payload(601, (common::BASE_SEC, 0), &[1.0]),
        }],
    );
    let err = Bag::from_bytes(builder.build()).unwrap_err();
    assert!(matches!(err, BagError::CorruptField { .. }));
}

#[test]
fn test_unindexed_bag_forward_scan() {
    let mut builder = common::BagBuilder::new();
    builder
        .connection(common::laserscan_connection(2))
        .omit_index();

    let mut msgs = Vec::new();
    for i in 0..4u32 {
        msgs.push(common::MsgSpec {
            conn: 2,
            time: (common::BASE_SEC + i, 0),
            payload: common::laserscan_payload(601 + i, (common::BASE_SEC + i, 0), &[2.0]),
        });
    }
    builder.chunk("bz2", msgs);

    let bag = Bag::from_bytes(builder.build()).unwrap();
    assert!(!bag.is_indexed());
    assert_eq!(bag.topics(), ["/base_scan"]);
    assert_eq!(bag.message_count(), 4);

    let mut seqs = Vec::new();
    for message in bag.read_messages().unwrap() {
        let message = message.unwrap();
        let value = message.value().unwrap();
        seqs.push(value.get("header").unwrap().get("seq").unwrap().as_u32().unwrap());
    }
    assert_eq!(seqs, [601, 602, 603, 604]);
}
