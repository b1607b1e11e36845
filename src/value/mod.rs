// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Lazy message values and the cursor they decode through.

pub mod cursor;
pub mod walker;

pub use cursor::Cursor;
pub use walker::{
    root_value, value_at, ArrayIter, ArrayValue, BlobValue, ObjectIter, ObjectValue,
    PrimitiveValue, RosValue,
};
