// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Lazy, schema-driven message values.
//!
//! A [`RosValue`] is a handle over a schema node and a byte range; it owns
//! neither. Nothing is decoded until asked for: looking up a field scans
//! just far enough to locate its extent, and the cumulative offset table an
//! object or array needs for that scan is built once per value and reused.
//! All wire integers and floats are little-endian.
//!
//! Fixed-width primitive arrays surface as a single [`BlobValue`] exposing
//! the contiguous byte range, element type and count, so bulk consumers can
//! take the bytes without an element-by-element walk.

use std::cell::OnceCell;
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{BagError, Result, RosDuration, RosTime};
use crate::schema::{ObjectSchema, PrimitiveType, SchemaNode};
use crate::value::cursor::Cursor;

/// A lazily decoded value borrowed from a message's bytes.
#[derive(Debug)]
pub enum RosValue<'a> {
    /// A single primitive
    Primitive(PrimitiveValue<'a>),
    /// An array of fixed-width primitives backed by a contiguous range
    Blob(BlobValue<'a>),
    /// A nested message
    Object(ObjectValue<'a>),
    /// An array of strings or nested messages
    Array(ArrayValue<'a>),
}

/// Entry point: the root value of a message.
pub fn root_value<'a>(schema: &'a ObjectSchema, bytes: &'a [u8]) -> RosValue<'a> {
    RosValue::Object(ObjectValue::new(schema, bytes))
}

impl<'a> RosValue<'a> {
    /// Kind label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RosValue::Primitive(p) => p.kind().name(),
            RosValue::Blob(_) | RosValue::Array(_) => "array",
            RosValue::Object(_) => "object",
        }
    }

    /// Look up a child field by name. Fails unless this value is an object.
    pub fn get(&self, name: &str) -> Result<RosValue<'a>> {
        match self {
            RosValue::Object(obj) => obj.get(name),
            other => Err(BagError::type_mismatch("object", other.type_name())),
        }
    }

    /// Look up a child by position: array element or object field.
    pub fn index(&self, i: usize) -> Result<RosValue<'a>> {
        match self {
            RosValue::Object(obj) => obj.get_index(i),
            RosValue::Array(arr) => arr.get(i),
            RosValue::Blob(blob) => blob.get(i),
            other => Err(BagError::type_mismatch("array", other.type_name())),
        }
    }

    /// This value as an object.
    pub fn as_object(&self) -> Result<&ObjectValue<'a>> {
        match self {
            RosValue::Object(obj) => Ok(obj),
            other => Err(BagError::type_mismatch("object", other.type_name())),
        }
    }

    /// This value as a variable-width element array.
    pub fn as_array(&self) -> Result<&ArrayValue<'a>> {
        match self {
            RosValue::Array(arr) => Ok(arr),
            other => Err(BagError::type_mismatch("array", other.type_name())),
        }
    }

    /// This value as a fixed-width primitive array.
    pub fn as_blob(&self) -> Result<&BlobValue<'a>> {
        match self {
            RosValue::Blob(blob) => Ok(blob),
            other => Err(BagError::type_mismatch("blob", other.type_name())),
        }
    }

    fn primitive(&self, requested: &'static str) -> Result<&PrimitiveValue<'a>> {
        match self {
            RosValue::Primitive(p) => Ok(p),
            other => Err(BagError::type_mismatch(requested, other.type_name())),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.primitive("bool")?.as_bool()
    }

    pub fn as_i8(&self) -> Result<i8> {
        self.primitive("int8")?.as_i8()
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.primitive("uint8")?.as_u8()
    }

    pub fn as_i16(&self) -> Result<i16> {
        self.primitive("int16")?.as_i16()
    }

    pub fn as_u16(&self) -> Result<u16> {
        self.primitive("uint16")?.as_u16()
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.primitive("int32")?.as_i32()
    }

    pub fn as_u32(&self) -> Result<u32> {
        self.primitive("uint32")?.as_u32()
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.primitive("int64")?.as_i64()
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.primitive("uint64")?.as_u64()
    }

    pub fn as_f32(&self) -> Result<f32> {
        self.primitive("float32")?.as_f32()
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.primitive("float64")?.as_f64()
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.primitive("string")?.as_str()
    }

    pub fn as_time(&self) -> Result<RosTime> {
        self.primitive("time")?.as_time()
    }

    pub fn as_duration(&self) -> Result<RosDuration> {
        self.primitive("duration")?.as_duration()
    }
}

// ============================================================================
// Primitive values
// ============================================================================

/// A single primitive value.
///
/// The byte slice is exactly the value's extent; construction has already
/// bounds-checked it against the schema, so decoding cannot run short.
#[derive(Debug)]
pub struct PrimitiveValue<'a> {
    kind: PrimitiveType,
    bytes: &'a [u8],
}

impl<'a> PrimitiveValue<'a> {
    /// The primitive kind of this value.
    pub fn kind(&self) -> PrimitiveType {
        self.kind
    }

    /// The value's exact wire bytes (strings include their length prefix).
    pub fn raw_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn expect(&self, want: PrimitiveType, requested: &'static str) -> Result<&'a [u8]> {
        if self.kind == want {
            Ok(self.bytes)
        } else {
            Err(BagError::type_mismatch(requested, self.kind.name()))
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        Ok(self.expect(PrimitiveType::Bool, "bool")?[0] != 0)
    }

    pub fn as_i8(&self) -> Result<i8> {
        Ok(self.expect(PrimitiveType::Int8, "int8")?[0] as i8)
    }

    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.expect(PrimitiveType::UInt8, "uint8")?[0])
    }

    pub fn as_i16(&self) -> Result<i16> {
        Ok(LittleEndian::read_i16(
            self.expect(PrimitiveType::Int16, "int16")?,
        ))
    }

    pub fn as_u16(&self) -> Result<u16> {
        Ok(LittleEndian::read_u16(
            self.expect(PrimitiveType::UInt16, "uint16")?,
        ))
    }

    pub fn as_i32(&self) -> Result<i32> {
        Ok(LittleEndian::read_i32(
            self.expect(PrimitiveType::Int32, "int32")?,
        ))
    }

    pub fn as_u32(&self) -> Result<u32> {
        Ok(LittleEndian::read_u32(
            self.expect(PrimitiveType::UInt32, "uint32")?,
        ))
    }

    pub fn as_i64(&self) -> Result<i64> {
        Ok(LittleEndian::read_i64(
            self.expect(PrimitiveType::Int64, "int64")?,
        ))
    }

    pub fn as_u64(&self) -> Result<u64> {
        Ok(LittleEndian::read_u64(
            self.expect(PrimitiveType::UInt64, "uint64")?,
        ))
    }

    pub fn as_f32(&self) -> Result<f32> {
        Ok(LittleEndian::read_f32(
            self.expect(PrimitiveType::Float32, "float32")?,
        ))
    }

    pub fn as_f64(&self) -> Result<f64> {
        Ok(LittleEndian::read_f64(
            self.expect(PrimitiveType::Float64, "float64")?,
        ))
    }

    pub fn as_time(&self) -> Result<RosTime> {
        let bytes = self.expect(PrimitiveType::Time, "time")?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(RosTime::from_le_bytes(arr))
    }

    pub fn as_duration(&self) -> Result<RosDuration> {
        let bytes = self.expect(PrimitiveType::Duration, "duration")?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(RosDuration::from_le_bytes(arr))
    }

    /// The string payload, validated as UTF-8.
    pub fn as_str(&self) -> Result<&'a str> {
        let bytes = self.expect(PrimitiveType::String, "string")?;
        std::str::from_utf8(&bytes[4..])
            .map_err(|e| BagError::parse("string value", e.to_string()))
    }
}

// ============================================================================
// Blob values
// ============================================================================

/// An array of fixed-width primitives backed by one contiguous byte range.
#[derive(Debug)]
pub struct BlobValue<'a> {
    elem: PrimitiveType,
    elem_size: usize,
    count: usize,
    bytes: &'a [u8],
}

impl<'a> BlobValue<'a> {
    /// Element type.
    pub fn elem_type(&self) -> PrimitiveType {
        self.elem
    }

    /// Element size in bytes.
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the blob has no elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The raw element bytes, `len() * elem_size()` long. This is the
    /// zero-copy export surface for buffer consumers.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode one element.
    pub fn get(&self, i: usize) -> Result<RosValue<'a>> {
        if i >= self.count {
            return Err(BagError::out_of_range(i.to_string(), self.count));
        }
        let start = i * self.elem_size;
        Ok(RosValue::Primitive(PrimitiveValue {
            kind: self.elem,
            bytes: &self.bytes[start..start + self.elem_size],
        }))
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = PrimitiveValue<'a>> + '_ {
        let kind = self.elem;
        self.bytes
            .chunks_exact(self.elem_size)
            .map(move |chunk| PrimitiveValue { kind, bytes: chunk })
    }
}

// ============================================================================
// Object values
// ============================================================================

/// A nested message value: a schema plus the byte range it starts at.
///
/// The per-field offset table is built on the first access that needs it
/// and memoized for the lifetime of this value.
#[derive(Debug)]
pub struct ObjectValue<'a> {
    schema: &'a ObjectSchema,
    bytes: &'a [u8],
    offsets: OnceCell<Box<[usize]>>,
}

impl<'a> ObjectValue<'a> {
    pub(crate) fn new(schema: &'a ObjectSchema, bytes: &'a [u8]) -> Self {
        Self {
            schema,
            bytes,
            offsets: OnceCell::new(),
        }
    }

    /// The schema this value decodes against.
    pub fn schema(&self) -> &'a ObjectSchema {
        self.schema
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.schema.fields().len()
    }

    /// True when the message type has no fields.
    pub fn is_empty(&self) -> bool {
        self.schema.fields().is_empty()
    }

    fn offsets(&self) -> Result<&[usize]> {
        if let Some(table) = self.offsets.get() {
            return Ok(table);
        }
        let fields = self.schema.fields();
        let mut table = Vec::with_capacity(fields.len() + 1);
        let mut pos = 0usize;
        table.push(0);
        for field in fields {
            pos += extent_of(&field.node, &self.bytes[pos..])?;
            table.push(pos);
        }
        Ok(self.offsets.get_or_init(|| table.into_boxed_slice()))
    }

    /// Total serialized length of this object.
    pub fn byte_len(&self) -> Result<usize> {
        let offsets = self.offsets()?;
        Ok(offsets[offsets.len() - 1])
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Result<RosValue<'a>> {
        let idx = self
            .schema
            .field_index(name)
            .ok_or_else(|| BagError::out_of_range(name, self.len()))?;
        self.get_index(idx)
    }

    /// Look up a field by position.
    pub fn get_index(&self, idx: usize) -> Result<RosValue<'a>> {
        let fields = self.schema.fields();
        if idx >= fields.len() {
            return Err(BagError::out_of_range(idx.to_string(), fields.len()));
        }
        let offsets = self.offsets()?;
        value_at(
            &fields[idx].node,
            &self.bytes[offsets[idx]..offsets[idx + 1]],
        )
    }

    /// Iterate over `(field name, value)` pairs in declaration order.
    pub fn iter(&self) -> ObjectIter<'_, 'a> {
        ObjectIter {
            value: self,
            idx: 0,
        }
    }
}

/// Ordered iterator over an object's fields.
#[derive(Debug)]
pub struct ObjectIter<'v, 'a> {
    value: &'v ObjectValue<'a>,
    idx: usize,
}

impl<'v, 'a> Iterator for ObjectIter<'v, 'a> {
    type Item = Result<(&'a str, RosValue<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let fields = self.value.schema.fields();
        if self.idx >= fields.len() {
            return None;
        }
        let name = fields[self.idx].name.as_str();
        let item = self.value.get_index(self.idx).map(|v| (name, v));
        self.idx += 1;
        Some(item)
    }
}

// ============================================================================
// Array values
// ============================================================================

#[derive(Debug)]
enum ArrayElem<'a> {
    Primitive(PrimitiveType),
    Object(&'a ObjectSchema),
}

/// An array whose elements are variable-width: strings or nested messages.
///
/// Element offsets are computed on first access and memoized, giving O(1)
/// repeated indexing.
#[derive(Debug)]
pub struct ArrayValue<'a> {
    elem: ArrayElem<'a>,
    count: usize,
    bytes: &'a [u8],
    offsets: OnceCell<Box<[usize]>>,
}

impl<'a> ArrayValue<'a> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn elem_extent(&self, bytes: &[u8]) -> Result<usize> {
        match &self.elem {
            ArrayElem::Primitive(p) => primitive_extent(*p, bytes),
            ArrayElem::Object(obj) => object_extent(obj, bytes),
        }
    }

    fn offsets(&self) -> Result<&[usize]> {
        if let Some(table) = self.offsets.get() {
            return Ok(table);
        }
        let mut table = Vec::with_capacity(self.count + 1);
        let mut pos = 0usize;
        table.push(0);
        for _ in 0..self.count {
            pos += self.elem_extent(&self.bytes[pos..])?;
            table.push(pos);
        }
        Ok(self.offsets.get_or_init(|| table.into_boxed_slice()))
    }

    /// Look up an element by position.
    pub fn get(&self, i: usize) -> Result<RosValue<'a>> {
        if i >= self.count {
            return Err(BagError::out_of_range(i.to_string(), self.count));
        }
        let offsets = self.offsets()?;
        let slice = &self.bytes[offsets[i]..offsets[i + 1]];
        match &self.elem {
            ArrayElem::Primitive(p) => Ok(RosValue::Primitive(PrimitiveValue {
                kind: *p,
                bytes: slice,
            })),
            ArrayElem::Object(obj) => Ok(RosValue::Object(ObjectValue::new(obj, slice))),
        }
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> ArrayIter<'_, 'a> {
        ArrayIter {
            value: self,
            idx: 0,
        }
    }
}

/// Ordered iterator over an array's elements.
#[derive(Debug)]
pub struct ArrayIter<'v, 'a> {
    value: &'v ArrayValue<'a>,
    idx: usize,
}

impl<'v, 'a> Iterator for ArrayIter<'v, 'a> {
    type Item = Result<RosValue<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.value.count {
            return None;
        }
        let item = self.value.get(self.idx);
        self.idx += 1;
        Some(item)
    }
}

// ============================================================================
// Walking
// ============================================================================

/// Build the value for a schema node at the start of `bytes`.
pub fn value_at<'a>(node: &'a SchemaNode, bytes: &'a [u8]) -> Result<RosValue<'a>> {
    match node {
        SchemaNode::Primitive(p) => {
            let extent = primitive_extent(*p, bytes)?;
            Ok(RosValue::Primitive(PrimitiveValue {
                kind: *p,
                bytes: &bytes[..extent],
            }))
        }
        SchemaNode::Object(obj) => Ok(RosValue::Object(ObjectValue::new(obj, bytes))),
        SchemaNode::PrimitiveArray { elem, len } => {
            let (count, prefix) = array_count(*len, bytes)?;
            let body = &bytes[prefix..];
            match elem.size() {
                Some(elem_size) => {
                    let need = count
                        .checked_mul(elem_size)
                        .ok_or_else(|| BagError::short_read("array body", usize::MAX, body.len()))?;
                    if body.len() < need {
                        return Err(BagError::short_read("array body", need, body.len()));
                    }
                    Ok(RosValue::Blob(BlobValue {
                        elem: *elem,
                        elem_size,
                        count,
                        bytes: &body[..need],
                    }))
                }
                None => Ok(RosValue::Array(ArrayValue {
                    elem: ArrayElem::Primitive(*elem),
                    count,
                    bytes: body,
                    offsets: OnceCell::new(),
                })),
            }
        }
        SchemaNode::ObjectArray { elem, len } => {
            let (count, prefix) = array_count(*len, bytes)?;
            Ok(RosValue::Array(ArrayValue {
                elem: ArrayElem::Object(elem.as_ref()),
                count,
                bytes: &bytes[prefix..],
                offsets: OnceCell::new(),
            }))
        }
    }
}

/// Serialized length of the value a schema node describes at the start of
/// `bytes`. Fixed-size subtrees are answered without scanning.
pub(crate) fn extent_of(node: &SchemaNode, bytes: &[u8]) -> Result<usize> {
    match node {
        SchemaNode::Primitive(p) => primitive_extent(*p, bytes),
        SchemaNode::Object(obj) => object_extent(obj, bytes),
        SchemaNode::PrimitiveArray { elem, len } => {
            let (count, prefix) = array_count(*len, bytes)?;
            match elem.size() {
                Some(elem_size) => {
                    let need = count
                        .checked_mul(elem_size)
                        .ok_or_else(|| BagError::short_read("array body", usize::MAX, 0))?;
                    let total = prefix + need;
                    if bytes.len() < total {
                        return Err(BagError::short_read("array body", total, bytes.len()));
                    }
                    Ok(total)
                }
                None => {
                    let mut pos = prefix;
                    for _ in 0..count {
                        pos += primitive_extent(*elem, &bytes[pos..])?;
                    }
                    Ok(pos)
                }
            }
        }
        SchemaNode::ObjectArray { elem, len } => {
            let (count, prefix) = array_count(*len, bytes)?;
            let mut pos = prefix;
            for _ in 0..count {
                pos += object_extent(elem, &bytes[pos..])?;
            }
            Ok(pos)
        }
    }
}

fn primitive_extent(p: PrimitiveType, bytes: &[u8]) -> Result<usize> {
    match p.size() {
        Some(n) => {
            if bytes.len() < n {
                return Err(BagError::short_read(p.name(), n, bytes.len()));
            }
            Ok(n)
        }
        None => {
            let mut cur = Cursor::new(bytes);
            let payload = cur.read_length_prefixed("string")?;
            Ok(4 + payload.len())
        }
    }
}

fn object_extent(obj: &ObjectSchema, bytes: &[u8]) -> Result<usize> {
    if let Some(n) = obj.fixed_size() {
        if bytes.len() < n {
            return Err(BagError::short_read("object", n, bytes.len()));
        }
        return Ok(n);
    }
    let mut pos = 0usize;
    for field in obj.fields() {
        pos += extent_of(&field.node, &bytes[pos..])?;
    }
    Ok(pos)
}

fn array_count(len: Option<usize>, bytes: &[u8]) -> Result<(usize, usize)> {
    match len {
        Some(n) => Ok((n, 0)),
        None => {
            let mut cur = Cursor::new(bytes);
            let count = cur.read_u32("array length")? as usize;
            Ok((count, 4))
        }
    }
}

// ============================================================================
// Display
// ============================================================================

const DISPLAY_ELEMS: usize = 8;

impl fmt::Display for PrimitiveValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PrimitiveType::Bool => write!(f, "{}", self.bytes[0] != 0),
            PrimitiveType::Int8 => write!(f, "{}", self.bytes[0] as i8),
            PrimitiveType::UInt8 => write!(f, "{}", self.bytes[0]),
            PrimitiveType::Int16 => write!(f, "{}", LittleEndian::read_i16(self.bytes)),
            PrimitiveType::UInt16 => write!(f, "{}", LittleEndian::read_u16(self.bytes)),
            PrimitiveType::Int32 => write!(f, "{}", LittleEndian::read_i32(self.bytes)),
            PrimitiveType::UInt32 => write!(f, "{}", LittleEndian::read_u32(self.bytes)),
            PrimitiveType::Int64 => write!(f, "{}", LittleEndian::read_i64(self.bytes)),
            PrimitiveType::UInt64 => write!(f, "{}", LittleEndian::read_u64(self.bytes)),
            PrimitiveType::Float32 => write!(f, "{}", LittleEndian::read_f32(self.bytes)),
            PrimitiveType::Float64 => write!(f, "{}", LittleEndian::read_f64(self.bytes)),
            PrimitiveType::String => {
                write!(f, "{:?}", String::from_utf8_lossy(&self.bytes[4..]))
            }
            PrimitiveType::Time => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(self.bytes);
                write!(f, "{}", RosTime::from_le_bytes(arr))
            }
            PrimitiveType::Duration => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(self.bytes);
                write!(f, "{}", RosDuration::from_le_bytes(arr))
            }
        }
    }
}

impl fmt::Display for BlobValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, elem) in self.iter().take(DISPLAY_ELEMS).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{elem}")?;
        }
        if self.count > DISPLAY_ELEMS {
            write!(f, ", ... {} total", self.count)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for ObjectValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, entry) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match entry {
                Ok((name, value)) => write!(f, "{name}: {value}")?,
                Err(_) => {
                    f.write_str("<error>")?;
                    break;
                }
            }
        }
        f.write_str("}")
    }
}

impl fmt::Display for ArrayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.iter().take(DISPLAY_ELEMS).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match entry {
                Ok(value) => write!(f, "{value}")?,
                Err(_) => {
                    f.write_str("<error>")?;
                    break;
                }
            }
        }
        if self.count > DISPLAY_ELEMS {
            write!(f, ", ... {} total", self.count)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for RosValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosValue::Primitive(p) => p.fmt(f),
            RosValue::Blob(b) => b.fmt(f),
            RosValue::Object(o) => o.fmt(f),
            RosValue::Array(a) => a.fmt(f),
        }
    }
}
