// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Lazybag
//!
//! Reader for ROS1 bag files (format v2.0) with lazy message decoding.
//!
//! - **[`Bag`]** - an open bag: topics, connections, schemas, messages
//! - **[`View`]** - a time-ordered, topic-filtered merge over one or more bags
//! - **[`RosValue`]** - a lazy value tree over a message's bytes; fields
//!   decode on access, and fixed-width primitive arrays expose their raw
//!   byte range for zero-copy consumption
//!
//! Message schemas come from the `.msg` definition text embedded in each
//! connection record; they are parsed once per connection and shared by
//! every message on it.
//!
//! ## Example: Reading messages
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bag = lazybag::open_bag("drive.bag")?;
//! for message in bag.read_messages_on(&["/base_scan"])? {
//!     let message = message?;
//!     let value = message.value()?;
//!     let seq = value.get("header")?.get("seq")?.as_u32()?;
//!     println!("{} @ {}: seq={}", message.topic(), message.timestamp(), seq);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Merging bags
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use lazybag::{Bag, View};
//!
//! let mut view = View::new();
//! view.add_bag(Bag::open("morning.bag")?);
//! view.add_bag(Bag::open("afternoon.bag")?);
//! for message in view.get_messages()? {
//!     let message = message?;
//!     println!("{} @ {}", message.topic(), message.timestamp());
//! }
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Schema parsing and resolution
pub mod schema;

// Lazy message values
pub mod value;

// Container I/O
pub mod io;

pub use crate::core::{BagError, Result, RosDuration, RosTime};
pub use crate::io::{open_bag, open_bag_from_bytes, Bag, Connection, Message, MessageIter, View};
pub use crate::schema::{ObjectSchema, PrimitiveType, SchemaField, SchemaNode};
pub use crate::value::{ArrayValue, BlobValue, ObjectValue, PrimitiveValue, RosValue};
