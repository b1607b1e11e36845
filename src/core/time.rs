// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS time and duration types.
//!
//! Bags record timestamps as `(sec: u32, nsec: u32)` pairs serialized
//! little-endian. Durations use signed components and may be negative.

use std::fmt;
use std::ops::{Add, Sub};

const NSEC_PER_SEC: i64 = 1_000_000_000;

/// A point in time as recorded by ROS: seconds and nanoseconds since the
/// Unix epoch, both unsigned 32-bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosTime {
    /// Whole seconds
    pub secs: u32,
    /// Nanoseconds within the second
    pub nsecs: u32,
}

impl RosTime {
    /// The zero timestamp.
    pub const ZERO: RosTime = RosTime { secs: 0, nsecs: 0 };

    /// Create a timestamp from seconds and nanoseconds.
    pub fn new(secs: u32, nsecs: u32) -> Self {
        RosTime { secs, nsecs }
    }

    /// Decode from the 8-byte little-endian wire layout.
    pub fn from_le_bytes(buf: [u8; 8]) -> Self {
        RosTime {
            secs: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            nsecs: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// Reconstruct from total nanoseconds since the epoch.
    pub fn from_nanos(nanos: u64) -> Self {
        RosTime {
            secs: (nanos / NSEC_PER_SEC as u64) as u32,
            nsecs: (nanos % NSEC_PER_SEC as u64) as u32,
        }
    }

    /// Total nanoseconds since the epoch.
    pub fn as_nanos(&self) -> u64 {
        self.secs as u64 * NSEC_PER_SEC as u64 + self.nsecs as u64
    }

    /// Fractional seconds since the epoch.
    pub fn to_sec(&self) -> f64 {
        self.secs as f64 + self.nsecs as f64 * 1e-9
    }

    /// Total nanoseconds since the epoch as a signed value.
    pub fn to_nsec(&self) -> i64 {
        self.as_nanos() as i64
    }

    /// True for the all-zero timestamp, which bags use as "unset".
    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nsecs == 0
    }
}

impl fmt::Display for RosTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nsecs)
    }
}

impl Sub for RosTime {
    type Output = RosDuration;

    fn sub(self, rhs: RosTime) -> RosDuration {
        RosDuration::from_nanos(self.to_nsec() - rhs.to_nsec())
    }
}

impl Add<RosDuration> for RosTime {
    type Output = RosTime;

    fn add(self, rhs: RosDuration) -> RosTime {
        let total = self.to_nsec() + rhs.to_nsec();
        RosTime::from_nanos(total.max(0) as u64)
    }
}

/// A span of time: signed seconds and nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosDuration {
    /// Whole seconds, may be negative
    pub secs: i32,
    /// Nanoseconds, carries the sign of the duration
    pub nsecs: i32,
}

impl RosDuration {
    /// Create a duration from seconds and nanoseconds.
    pub fn new(secs: i32, nsecs: i32) -> Self {
        RosDuration { secs, nsecs }
    }

    /// Decode from the 8-byte little-endian wire layout.
    pub fn from_le_bytes(buf: [u8; 8]) -> Self {
        RosDuration {
            secs: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            nsecs: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// Reconstruct from total signed nanoseconds.
    pub fn from_nanos(nanos: i64) -> Self {
        RosDuration {
            secs: (nanos / NSEC_PER_SEC) as i32,
            nsecs: (nanos % NSEC_PER_SEC) as i32,
        }
    }

    /// Fractional seconds.
    pub fn to_sec(&self) -> f64 {
        self.secs as f64 + self.nsecs as f64 * 1e-9
    }

    /// Total nanoseconds.
    pub fn to_nsec(&self) -> i64 {
        self.secs as i64 * NSEC_PER_SEC + self.nsecs as i64
    }
}

impl fmt::Display for RosDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sec())
    }
}
