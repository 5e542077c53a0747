//! Reads the transport packets of a component file and reassembles their
//! payload into frames or samples.
//!
//! A component file is a sequence of packets, each a little endian `u32`
//! counter followed by a fixed size payload. The counter holds the running
//! total of payload bytes the device produced, consecutive counters must
//! differ by exactly the payload size. Frames do not align to packets, the
//! tail of one packet and the head of the next can form one frame. Those
//! leftover bytes are kept in the [`Cursor`] between calls.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::mem;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace, warn};

use crate::cursor::Cursor;
use crate::descriptor::COUNTER_SIZE;
use crate::layout::FrameLayout;
use crate::Timestamp;

pub(crate) mod geometry;
use geometry::{PacketGeometry, PacketPos, StreamPos};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not open component file at {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Could not read packets from {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(
        "Data corrupted in {path}: packet at byte {offset} has counter {found} \
        while {expected} was expected. Consecutive counters should differ by \
        exactly the payload size"
    )]
    Corrupted {
        path: PathBuf,
        offset: u64,
        found: u32,
        expected: u32,
    },
    #[error("No data at byte {offset} in {path} (file is {file_len} bytes long)")]
    NoDataAtIndex {
        path: PathBuf,
        offset: u64,
        file_len: u64,
    },
}

/// Stop condition for [`PacketReader::read_window`]
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target {
    /// Emit this many bytes, always a whole number of samples
    Bytes(u64),
    /// Emit frames up to and including the first with a timestamp at or
    /// after `end`. While `skip_head` is set frames at or before `start` are
    /// dropped, skipping ends at the first emitted frame.
    Frames {
        start: Timestamp,
        end: Option<Timestamp>,
        skip_head: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Plan {
    /// Payload bytes to drop before the target applies
    pub(crate) skip: u64,
    pub(crate) target: Target,
}

#[derive(Debug)]
pub(crate) struct Collected {
    /// Whole frames (or samples) in stream order
    pub(crate) bytes: Vec<u8>,
    /// Stream offset of the first collected byte
    pub(crate) first: StreamPos,
    /// Timestamp of the last frame dropped while skipping the window head
    pub(crate) skipped_ts: Option<Timestamp>,
}

pub(crate) struct PacketReader {
    file: BufReader<File>,
    path: PathBuf,
    file_len: u64,
    /// Offset the file is at, saves a seek for sequential reads
    position: u64,
    geometry: PacketGeometry,
}

impl std::fmt::Debug for PacketReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReader")
            .field("path", &self.path)
            .field("file_len", &self.file_len)
            .field("payload_size", &self.geometry.payload_size())
            .finish()
    }
}

impl PacketReader {
    pub(crate) fn open(path: &Path, geometry: PacketGeometry) -> Result<Self, Error> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::Open {
                path: path.to_owned(),
                source,
            })?
            .len();
        Ok(Self {
            file: BufReader::new(file),
            path: path.to_owned(),
            file_len,
            position: 0,
            geometry,
        })
    }

    pub(crate) fn geometry(&self) -> PacketGeometry {
        self.geometry
    }

    /// Payload bytes available after the stream origin
    pub(crate) fn stream_len(&self, origin: PacketPos) -> u64 {
        self.geometry.stream_len(origin, self.file_len)
    }

    fn io_err(&self, source: io::Error) -> Error {
        Error::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn no_data(&self, offset: u64) -> Error {
        Error::NoDataAtIndex {
            path: self.path.clone(),
            offset,
            file_len: self.file_len,
        }
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        if offset + buf.len() as u64 > self.file_len {
            return Err(self.no_data(offset));
        }
        if offset != self.position {
            self.file
                .seek(SeekFrom::Start(offset))
                .map_err(|e| self.io_err(e))?;
        }
        self.file.read_exact(buf).map_err(|e| self.io_err(e))?;
        self.position = offset + buf.len() as u64;
        Ok(())
    }

    fn counter_at(&mut self, packet: PacketPos) -> Result<u32, Error> {
        let mut counter = [0u8; COUNTER_SIZE];
        self.read_at(packet.raw_offset(), &mut counter)?;
        Ok(u32::from_le_bytes(counter))
    }

    /// Decide where the payload stream starts. Some devices restart their
    /// counter after writing the first packet, that packet is then dropped.
    #[instrument(level = "debug", skip(cursor))]
    pub(crate) fn establish_origin(&mut self, cursor: &mut Cursor) -> Result<PacketPos, Error> {
        if let Some(origin) = cursor.stream_origin {
            return Ok(origin);
        }
        if self.geometry.complete_packets(self.file_len) == 0 {
            return Err(self.no_data(0));
        }

        let mut origin = PacketPos::ZERO;
        if self.geometry.complete_packets(self.file_len) >= 2 {
            let first = self.counter_at(PacketPos::ZERO)?;
            let second = self.counter_at(PacketPos::ZERO.next(self.geometry))?;
            let step = second.wrapping_sub(first);
            if step != self.geometry.payload_size() as u32 && first == 0 {
                warn!(
                    "Counter restarted after the first packet in {} \
                    (first: {first}, second: {second}), dropping the first packet",
                    self.path.display()
                );
                origin = PacketPos::ZERO.next(self.geometry);
            }
        }

        cursor.stream_origin = Some(origin);
        cursor.last_index = origin.raw_offset();
        cursor.saved_bytes = 0;
        cursor.carry.clear();
        cursor.prev_data_byte_counter = None;
        Ok(origin)
    }

    /// Position the cursor on the packet holding stream byte `target`.
    /// Returns the number of bytes in that packet before `target`, these
    /// still have to be skipped. The counter of the first packet read after
    /// the jump is not checked against anything.
    pub(crate) fn jump(&self, cursor: &mut Cursor, target: StreamPos) -> u64 {
        let origin = cursor.stream_origin.expect("origin established before jumping");
        let (packet, within) = self.geometry.locate(origin, target);
        debug!("jumping to packet at byte {} for {target}", packet.raw_offset());
        cursor.last_index = packet.raw_offset();
        cursor.saved_bytes = self.geometry.stream_start(origin, packet).raw_offset();
        cursor.carry.clear();
        cursor.is_same_dps = false;
        cursor.prev_data_byte_counter = None;
        within as u64
    }

    /// Read the timestamp of a frame without touching the cursor.
    pub(crate) fn frame_timestamp(
        &mut self,
        origin: PacketPos,
        layout: &FrameLayout,
        frame: u64,
    ) -> Result<Timestamp, Error> {
        let start = frame * layout.frame_size() as u64 + layout.data_bytes as u64;
        let mut bytes = [0u8; 8];
        let mut filled = 0;
        while filled < bytes.len() {
            let (packet, within) = self
                .geometry
                .locate(origin, StreamPos(start + filled as u64));
            let n = (self.geometry.payload_size() - within).min(bytes.len() - filled);
            let offset = packet.payload_start() + within as u64;
            self.read_at(offset, &mut bytes[filled..filled + n])?;
            filled += n;
        }
        Ok(f64::from_le_bytes(bytes))
    }

    /// Append the payload of the packet at the cursor to `chest` and move
    /// the cursor past it. Returns false if there is no complete packet left.
    fn read_packet_into(&mut self, cursor: &mut Cursor, chest: &mut Vec<u8>) -> Result<bool, Error> {
        let packet = PacketPos(cursor.last_index);
        if packet.raw_offset() + self.geometry.packet_size() as u64 > self.file_len {
            return Ok(false);
        }

        let counter = self.counter_at(packet)?;
        if let Some(prev) = cursor.prev_data_byte_counter {
            let expected = prev.wrapping_add(self.geometry.payload_size() as u32);
            if counter != expected {
                return Err(Error::Corrupted {
                    path: self.path.clone(),
                    offset: packet.raw_offset(),
                    found: counter,
                    expected,
                });
            }
        }

        let filled = chest.len();
        chest.resize(filled + self.geometry.payload_size(), 0);
        self.read_at(packet.payload_start(), &mut chest[filled..])?;
        trace!("read packet at {}, counter: {counter}", packet.raw_offset());

        cursor.prev_data_byte_counter = Some(counter);
        cursor.last_index = packet.next(self.geometry).raw_offset();
        Ok(true)
    }

    /// Collect the bytes the plan asks for. Bytes that were read but not
    /// emitted stay in the cursor for the next call, emitted bytes are moved
    /// out without copying.
    #[instrument(level = "debug", skip(cursor, layout), fields(last_index = cursor.last_index))]
    pub(crate) fn read_window(
        &mut self,
        cursor: &mut Cursor,
        layout: &FrameLayout,
        plan: Plan,
    ) -> Result<Collected, Error> {
        let mut chest = mem::take(&mut cursor.carry);
        let mut pos = 0usize;
        let mut emit_start: Option<usize> = None;
        let mut stream_pos = cursor.saved_bytes;
        let mut skip = plan.skip;
        let mut skipped_ts = None;
        let mut skip_head = matches!(plan.target, Target::Frames { skip_head: true, .. });

        let result = loop {
            let skipped = skip.min((chest.len() - pos) as u64);
            pos += skipped as usize;
            skip -= skipped;

            let done = skip == 0
                && match plan.target {
                    Target::Bytes(wanted) => {
                        let start = *emit_start.get_or_insert(pos);
                        let emitted = (pos - start) as u64;
                        let available = chest.len() - pos;
                        let whole = available - available % layout.sample_size();
                        let take = (wanted - emitted).min(whole as u64) as usize;
                        pos += take;
                        emitted + take as u64 == wanted
                    }
                    Target::Frames { start, end, .. } => {
                        let size = layout.frame_size();
                        let mut reached_end = false;
                        while chest.len() - pos >= size {
                            let frame = &chest[pos..pos + size];
                            let ts = frame_ts(frame, layout);
                            if skip_head && ts <= start {
                                skipped_ts = Some(ts);
                                pos += size;
                                continue;
                            }
                            skip_head = false;
                            emit_start.get_or_insert(pos);
                            pos += size;
                            if end.is_some_and(|end| ts >= end) {
                                reached_end = true;
                                break;
                            }
                        }
                        reached_end
                    }
                };
            if done {
                break Ok(());
            }

            if emit_start.is_none() {
                // nothing to keep in front of pos yet
                chest.drain(..pos);
                stream_pos += pos as u64;
                pos = 0;
            }
            match self.read_packet_into(cursor, &mut chest) {
                Ok(true) => (),
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = result {
            // keep the cursor valid, the caller may retry or give up
            cursor.carry = chest;
            cursor.saved_bytes = stream_pos;
            return Err(e);
        }

        let emit_start = emit_start.unwrap_or(pos);
        let carry = chest.split_off(pos);
        chest.drain(..emit_start);
        let first = StreamPos(stream_pos + emit_start as u64);

        cursor.saved_bytes = stream_pos + pos as u64;
        cursor.is_same_dps = !carry.is_empty();
        cursor.carry = carry;

        debug!(
            "collected {} bytes from {first}, carrying {}",
            chest.len(),
            cursor.missing_bytes()
        );
        Ok(Collected {
            bytes: chest,
            first,
            skipped_ts,
        })
    }
}

pub(crate) fn frame_ts(frame: &[u8], layout: &FrameLayout) -> Timestamp {
    let bytes = frame[layout.data_bytes..layout.frame_size()]
        .try_into()
        .expect("frame has 8 timestamp bytes after the data");
    f64::from_le_bytes(bytes)
}
