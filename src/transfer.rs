//! Chunked Result Transfer
//!
//! Streams the result buffer to the master as fixed-size chunks of
//! concatenated 20-byte records. A record may straddle two chunks; the
//! master reassembles the byte stream.

use crate::config::RECORD_BYTES;
use crate::protocol::{encode_record, ResponseSink};
use crate::types::ResultPoint;

/// Byte-granular read position inside the serialized result buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferCursor {
    /// Record currently being sent
    pub point_index: usize,
    /// Bytes of that record already sent (`< RECORD_BYTES`)
    pub byte_offset: usize,
}

impl TransferCursor {
    /// Cursor at the start of the buffer
    pub const START: Self = Self {
        point_index: 0,
        byte_offset: 0,
    };

    /// Absolute byte position in the serialized stream
    #[must_use]
    pub const fn position(self) -> usize {
        self.point_index * RECORD_BYTES + self.byte_offset
    }

    /// Cursor moved forward by `bytes`
    #[must_use]
    pub const fn advance(self, bytes: usize) -> Self {
        let pos = self.position() + bytes;
        Self {
            point_index: pos / RECORD_BYTES,
            byte_offset: pos % RECORD_BYTES,
        }
    }

    /// Bytes left to send for a buffer of `count` records
    #[must_use]
    pub const fn remaining_bytes(self, count: usize) -> usize {
        (count * RECORD_BYTES).saturating_sub(self.position())
    }

    /// Whether every byte of `count` records has been sent
    #[must_use]
    pub const fn is_complete(self, count: usize) -> bool {
        self.remaining_bytes(count) == 0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TransferCursor {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "point {} +{}", self.point_index, self.byte_offset);
    }
}

/// Serialize the next chunk into `out` and return the advanced cursor
///
/// The chunk is `min(remaining, capacity, out.free())` bytes long. The
/// cursor moves only by the bytes `out` actually accepted.
pub fn serialize_chunk<S: ResponseSink + ?Sized>(
    points: &[ResultPoint],
    cursor: TransferCursor,
    capacity: usize,
    out: &mut S,
) -> TransferCursor {
    let mut budget = cursor
        .remaining_bytes(points.len())
        .min(capacity)
        .min(out.free());
    let mut cursor = cursor;

    while budget > 0 {
        let Some(point) = points.get(cursor.point_index) else {
            break;
        };
        let record = encode_record(point);
        let tail = &record[cursor.byte_offset..];
        let take = tail.len().min(budget);
        let accepted = out.extend(&tail[..take]);
        cursor = cursor.advance(accepted);
        if accepted < take {
            break;
        }
        budget -= take;
    }

    cursor
}
