//! State carried between successive extractions from one component.

use crate::stream::geometry::PacketPos;
use crate::Timestamp;

/// Where the previous extraction stopped. Pass the same cursor to the next
/// call to continue exactly where the last one ended, a chunked extraction
/// then yields the same samples and timestamps as a single call would.
///
/// Create one per component with [`Cursor::new`] (or
/// [`Component::cursor`](crate::Component::cursor)), never share it between
/// components. The time origin is taken from the component's descriptor on
/// the first extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// File offset of the next packet to read, always a packet boundary
    pub(crate) last_index: u64,
    /// Payload bytes read but not yet emitted, they precede the packet at
    /// `last_index` in the payload stream
    pub(crate) carry: Vec<u8>,
    /// Offset in the payload stream of the first carried byte
    pub(crate) saved_bytes: u64,
    pub(crate) prev_data_byte_counter: Option<u32>,
    /// No sample has been emitted yet
    pub(crate) is_first_chunk: bool,
    /// The carried bytes hold the start of a frame that continues in the
    /// next packet
    pub(crate) is_same_dps: bool,
    /// Timestamp of the last emitted frame, before that the component's
    /// time offset (`ioffset`)
    pub(crate) time_origin: Timestamp,
    /// Packet where the payload stream starts, `None` until the file is
    /// first inspected
    pub(crate) stream_origin: Option<PacketPos>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_index: 0,
            carry: Vec::new(),
            saved_bytes: 0,
            prev_data_byte_counter: None,
            is_first_chunk: true,
            is_same_dps: false,
            time_origin: 0.0,
            stream_origin: None,
        }
    }

    /// Start counting time from `ioffset`, only while nothing was read yet.
    pub(crate) fn seed_time_origin(&mut self, ioffset: Timestamp) {
        if self.is_fresh() {
            self.time_origin = ioffset;
        }
    }

    /// Bytes of a partial frame or sample carried over to the next call
    #[must_use]
    pub fn missing_bytes(&self) -> usize {
        self.carry.len()
    }

    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    #[must_use]
    pub fn saved_bytes(&self) -> u64 {
        self.saved_bytes
    }

    #[must_use]
    pub fn prev_data_byte_counter(&self) -> Option<u32> {
        self.prev_data_byte_counter
    }

    #[must_use]
    pub fn is_first_chunk(&self) -> bool {
        self.is_first_chunk
    }

    #[must_use]
    pub fn is_same_dps(&self) -> bool {
        self.is_same_dps
    }

    #[must_use]
    pub fn time_origin(&self) -> Timestamp {
        self.time_origin
    }

    /// True until the first call that had to touch the file.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.stream_origin.is_none()
    }

    /// Nothing has been read since the stream origin was determined
    pub(crate) fn untouched(&self) -> bool {
        self.carry.is_empty()
            && self.saved_bytes == 0
            && self
                .stream_origin
                .is_some_and(|origin| origin.raw_offset() == self.last_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cursor_is_fresh() {
        let cursor = Cursor::new();
        assert!(cursor.is_fresh());
        assert!(cursor.is_first_chunk());
        assert!(!cursor.is_same_dps());
        assert_eq!(cursor.missing_bytes(), 0);
        assert_eq!(cursor.last_index(), 0);
        assert_eq!(cursor.time_origin(), 0.0);
        assert!(!cursor.untouched());
    }

    #[test]
    fn time_origin_seeded_once() {
        let mut cursor = Cursor::new();
        cursor.seed_time_origin(0.25);
        assert_eq!(cursor.time_origin(), 0.25);

        cursor.stream_origin = Some(PacketPos::ZERO);
        cursor.seed_time_origin(3.0);
        assert_eq!(cursor.time_origin(), 0.25);
    }

    #[test]
    fn untouched_after_origin() {
        let mut cursor = Cursor::new();
        cursor.stream_origin = Some(PacketPos(68));
        cursor.last_index = 68;
        assert!(cursor.untouched());
        cursor.last_index = 136;
        assert!(!cursor.untouched());
    }
}
