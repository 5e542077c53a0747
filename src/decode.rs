//! Split collected frames into typed samples and their timestamps.

use tracing::debug;

use crate::cursor::Cursor;
use crate::layout::FrameLayout;
use crate::stream::{self, Collected};
use crate::Timestamp;

pub mod dtype;
mod timestamps;

pub use dtype::Values;

/// Samples of one chunk, `dim` values per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    dim: usize,
    values: Values,
}

impl Samples {
    pub(crate) fn new(dim: usize, values: Values) -> Self {
        debug_assert_eq!(values.len() % dim, 0);
        Self { dim, values }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of samples (rows)
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &Values {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Values {
        self.values
    }

    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if column >= self.dim {
            return None;
        }
        self.values.get_f64(row * self.dim + column)
    }

    /// One `Vec` per sample, values converted to `f64`
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.len())
            .map(|row| {
                (0..self.dim)
                    .filter_map(|column| self.get(row, column))
                    .collect()
            })
            .collect()
    }

    pub(crate) fn map_values(self, f: impl FnOnce(Values) -> Values) -> Self {
        Self {
            dim: self.dim,
            values: f(self.values),
        }
    }
}

/// The result of one extraction: samples and one timestamp per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub timestamps: Vec<Timestamp>,
    pub samples: Samples,
}

impl Chunk {
    pub(crate) fn empty(layout: &FrameLayout) -> Self {
        Self {
            timestamps: Vec::new(),
            samples: Samples::new(layout.dim, Values::with_capacity(layout.data_type, 0)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoder<'a> {
    pub(crate) layout: &'a FrameLayout,
    /// Time origin of the component, samples without timestamps are placed
    /// relative to it
    pub(crate) ioffset: Timestamp,
    pub(crate) timestamp_recovery: bool,
}

impl Decoder<'_> {
    pub(crate) fn decode(&self, cursor: &mut Cursor, collected: Collected) -> Chunk {
        if self.layout.has_timestamps() {
            self.decode_frames(cursor, collected)
        } else {
            self.decode_samples(cursor, collected)
        }
    }

    /// Samples without embedded timestamps sit on the nominal rate grid
    /// counted from the start of the stream.
    fn decode_samples(&self, cursor: &mut Cursor, collected: Collected) -> Chunk {
        let layout = self.layout;
        let sample_size = layout.sample_size();
        let first = collected.first.raw_offset() / sample_size as u64;
        let n = collected.bytes.len() / sample_size;

        let mut values = Values::with_capacity(layout.data_type, n * layout.dim);
        values.extend_from_le(layout.data_type, &collected.bytes[..n * sample_size]);
        let timestamps: Vec<_> = (0..n as u64)
            .map(|i| self.ioffset + (first + i) as f64 * layout.nominal_period)
            .collect();

        if let Some(last) = timestamps.last() {
            cursor.time_origin = *last;
            cursor.is_first_chunk = false;
        }
        Chunk {
            timestamps,
            samples: Samples::new(layout.dim, values),
        }
    }

    fn decode_frames(&self, cursor: &mut Cursor, collected: Collected) -> Chunk {
        let layout = self.layout;
        let frame_size = layout.frame_size();
        let mut bytes = collected.bytes;
        let mut frame_ts: Vec<_> = bytes
            .chunks_exact(frame_size)
            .map(|frame| stream::frame_ts(frame, layout))
            .collect();

        let prev = collected.skipped_ts.unwrap_or(cursor.time_origin);
        if self.timestamp_recovery && layout.frame_period > 0.0 {
            let reference = if cursor.is_first_chunk && collected.skipped_ts.is_none() {
                None
            } else {
                Some(prev)
            };
            let repaired = timestamps::repair(&mut frame_ts, &mut bytes, layout, reference);
            if repaired > 0 {
                debug!("repaired {repaired} frame timestamps");
            }
        }

        let mut values = Values::with_capacity(
            layout.data_type,
            frame_ts.len() * layout.samples_per_frame * layout.dim,
        );
        for frame in bytes.chunks_exact(frame_size) {
            values.extend_from_le(layout.data_type, &frame[..layout.data_bytes]);
        }

        let mut timestamps = timestamps::interpolate(&frame_ts, prev, layout);
        if timestamps.iter().any(|ts| !ts.is_finite()) {
            let keep: Vec<_> = timestamps.iter().map(|ts| ts.is_finite()).collect();
            values.retain_rows(layout.dim, &keep);
            timestamps.retain(|ts| ts.is_finite());
            debug!(
                "dropped {} samples without a usable timestamp",
                keep.len() - timestamps.len()
            );
        }

        if let Some(last) = frame_ts.last().copied().or(collected.skipped_ts) {
            cursor.time_origin = last;
        }
        if !frame_ts.is_empty() {
            cursor.is_first_chunk = false;
        }
        Chunk {
            timestamps,
            samples: Samples::new(layout.dim, values),
        }
    }
}
