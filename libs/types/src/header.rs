//! Message Header
//!
//! Attached by value to every top-level message kind.

use crate::geometry::same_bits;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Routing and bookkeeping metadata shared by top-level messages. The stamp
/// compares by bit pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    /// Sequence number, assigned by the caller and monotonic per publisher
    pub seq: u64,
    /// Frame or origin identifier
    pub frame_id: String,
    /// Seconds since the Unix epoch
    pub stamp: f64,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.frame_id == other.frame_id && same_bits(self.stamp, other.stamp)
    }
}

impl Eq for Header {}

impl Header {
    /// Create a header stamped with the current wall-clock time
    pub fn new(seq: u64, frame_id: impl Into<String>) -> Self {
        Self {
            seq,
            frame_id: frame_id.into(),
            stamp: now_seconds(),
        }
    }

    /// Create a header with an explicit timestamp
    pub fn with_stamp(seq: u64, frame_id: impl Into<String>, stamp: f64) -> Self {
        Self {
            seq,
            frame_id: frame_id.into(),
            stamp,
        }
    }

    /// Refresh the timestamp to the current wall-clock time
    pub fn touch(&mut self) {
        self.stamp = now_seconds();
    }

    /// Advance the sequence number and return the new value
    pub fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Age of this header relative to now, in seconds (negative if stamped in the future)
    pub fn age_secs(&self) -> f64 {
        now_seconds() - self.stamp
    }
}

/// Current wall-clock time as floating-point seconds since the Unix epoch
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header_is_stamped() {
        let header = Header::new(7, "base_link");
        assert_eq!(header.seq, 7);
        assert_eq!(header.frame_id, "base_link");
        assert!(header.stamp > 1_600_000_000.0);
        assert!(header.age_secs() >= 0.0);
    }

    #[test]
    fn test_stamp_compares_by_bits() {
        let unknown = Header::with_stamp(1, "map", f64::NAN);
        assert_eq!(unknown, unknown.clone());
        assert_ne!(Header::with_stamp(1, "map", 0.0), Header::with_stamp(1, "map", -0.0));
    }

    #[test]
    fn test_next_seq_wraps() {
        let mut header = Header::with_stamp(u64::MAX, "map", 0.0);
        assert_eq!(header.next_seq(), 0);
        assert_eq!(header.next_seq(), 1);
    }
}
