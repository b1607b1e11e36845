// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bounds-checked little-endian cursor over a byte slice.
//!
//! ROS1 serialization is packed with no padding, so unlike CDR there is no
//! alignment to track. Every read either returns the decoded value or fails
//! with a short read naming what was being decoded.

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{BagError, Result, RosDuration, RosTime};

/// Cursor over a borrowed byte slice.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position within the slice.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// True when the cursor has consumed the whole slice.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Take `n` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(BagError::short_read(context, n, self.remaining()));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize, context: &'static str) -> Result<()> {
        self.read_bytes(n, context).map(|_| ())
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_bytes(1, context)?[0])
    }

    pub fn read_i8(&mut self, context: &'static str) -> Result<i8> {
        Ok(self.read_u8(context)? as i8)
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2, context)?))
    }

    pub fn read_i16(&mut self, context: &'static str) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read_bytes(2, context)?))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4, context)?))
    }

    pub fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4, context)?))
    }

    pub fn read_u64(&mut self, context: &'static str) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8, context)?))
    }

    pub fn read_i64(&mut self, context: &'static str) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.read_bytes(8, context)?))
    }

    pub fn read_f32(&mut self, context: &'static str) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4, context)?))
    }

    pub fn read_f64(&mut self, context: &'static str) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8, context)?))
    }

    /// Read the 8-byte `(sec, nsec)` time layout.
    pub fn read_time(&mut self, context: &'static str) -> Result<RosTime> {
        let buf = self.read_bytes(8, context)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(buf);
        Ok(RosTime::from_le_bytes(arr))
    }

    /// Read the 8-byte signed `(sec, nsec)` duration layout.
    pub fn read_duration(&mut self, context: &'static str) -> Result<RosDuration> {
        let buf = self.read_bytes(8, context)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(buf);
        Ok(RosDuration::from_le_bytes(arr))
    }

    /// Read a length-prefixed string, returning the raw bytes after the
    /// 4-byte length.
    pub fn read_length_prefixed(&mut self, context: &'static str) -> Result<&'a [u8]> {
        let len = self.read_u32(context)? as usize;
        self.read_bytes(len, context)
    }
}
