use tracing::instrument;

use crate::layout::FrameLayout;
use crate::stream::geometry::PacketPos;
use crate::stream::{self, PacketReader};
use crate::Timestamp;

/// Frame that should hold the window start if the device kept its nominal
/// rate, moved back a few frames to absorb clock drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Estimate {
    pub(crate) frame: u64,
}

impl Estimate {
    /// `None` if the layout has no rate to estimate with or the stream holds
    /// no complete frame.
    pub(crate) fn new(
        layout: &FrameLayout,
        start: Timestamp,
        total_frames: u64,
        lookback: u64,
    ) -> Option<Self> {
        let rate = layout.rate?;
        let last = total_frames.checked_sub(1)?;
        let samples = (rate * start).floor();
        let frames = (samples / layout.samples_per_frame as f64).floor() as u64;
        Some(Self {
            frame: frames.saturating_sub(lookback).min(last),
        })
    }

    /// Step back until the frame's own timestamp lies at or before `start`.
    #[instrument(level = "debug", skip(reader, layout), ret)]
    pub(crate) fn refine(
        self,
        reader: &mut PacketReader,
        origin: PacketPos,
        layout: &FrameLayout,
        start: Timestamp,
    ) -> Result<u64, stream::Error> {
        let mut frame = self.frame;
        while frame > 0 && reader.frame_timestamp(origin, layout, frame)? > start {
            frame -= 1;
        }
        Ok(frame)
    }
}
