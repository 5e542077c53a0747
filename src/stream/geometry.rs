use core::fmt;
use std::ops::Sub;

use crate::descriptor::COUNTER_SIZE;

/// An offset from the start of the file where a packet (its counter) starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PacketPos(pub(crate) u64);

impl PacketPos {
    pub(crate) const ZERO: Self = Self(0);

    pub(crate) fn raw_offset(&self) -> u64 {
        self.0
    }

    pub(crate) fn payload_start(&self) -> u64 {
        self.0 + COUNTER_SIZE as u64
    }

    pub(crate) fn next(&self, geometry: PacketGeometry) -> Self {
        Self(self.0 + geometry.packet_size() as u64)
    }
}

impl Sub<PacketPos> for PacketPos {
    type Output = u64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

/// An offset into the payload stream, the concatenation of all packet
/// payloads with the counters left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct StreamPos(pub(crate) u64);

impl StreamPos {
    pub(crate) fn raw_offset(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream byte {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PacketGeometry {
    payload: usize,
}

impl PacketGeometry {
    pub(crate) fn from_payload_size(payload: usize) -> Self {
        assert!(payload > 0, "packets must carry payload");
        Self { payload }
    }

    pub(crate) fn payload_size(&self) -> usize {
        self.payload
    }

    pub(crate) fn packet_size(&self) -> usize {
        self.payload + COUNTER_SIZE
    }

    /// Number of complete packets in `len` bytes
    pub(crate) fn complete_packets(&self, len: u64) -> u64 {
        len / self.packet_size() as u64
    }

    /// Payload bytes in the complete packets following `origin`
    pub(crate) fn stream_len(&self, origin: PacketPos, file_len: u64) -> u64 {
        let len = file_len.saturating_sub(origin.raw_offset());
        self.complete_packets(len) * self.payload as u64
    }

    /// The packet holding stream byte `pos` and how far into its payload
    /// that byte lies.
    pub(crate) fn locate(&self, origin: PacketPos, pos: StreamPos) -> (PacketPos, usize) {
        let packet = pos.0 / self.payload as u64;
        let within = pos.0 % self.payload as u64;
        let start = origin.0 + packet * self.packet_size() as u64;
        (
            PacketPos(start),
            usize::try_from(within).expect("smaller then payload which is a usize"),
        )
    }

    /// Stream offset of the first payload byte of the packet at `packet`
    pub(crate) fn stream_start(&self, origin: PacketPos, packet: PacketPos) -> StreamPos {
        let index = (packet - origin) / self.packet_size() as u64;
        StreamPos(index * self.payload as u64)
    }
}
