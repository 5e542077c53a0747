//! Turn a requested time window into a read plan for the packet reader.

use tracing::{debug, instrument};

use crate::cursor::Cursor;
use crate::layout::FrameLayout;
use crate::stream::geometry::{PacketPos, StreamPos};
use crate::stream::{self, PacketReader, Plan, Target};
use crate::Timestamp;

mod estimate;
pub(crate) use estimate::Estimate;

/// A requested time window, clamped to the acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Window {
    pub(crate) start: Timestamp,
    /// `None` reads till the end of the data, only when the duration of the
    /// acquisition is unknown
    pub(crate) end: Option<Timestamp>,
}

impl Window {
    /// Returns `None` if the window can not contain data: it starts after
    /// the acquisition ended or ends before it starts. A negative or missing
    /// end means till the end of the acquisition.
    pub(crate) fn new(
        start: Timestamp,
        end: Option<Timestamp>,
        duration: Option<Timestamp>,
    ) -> Option<Self> {
        let start = start.max(0.0);
        if duration.is_some_and(|duration| start > duration) {
            return None;
        }
        let end = end.filter(|end| *end >= 0.0);
        let end = match (end, duration) {
            (Some(end), Some(duration)) => Some(end.min(duration)),
            (None, Some(duration)) => Some(duration),
            (end, None) => end,
        };
        if end.is_some_and(|end| end < start) {
            return None;
        }
        Some(Self { start, end })
    }
}

/// Returns `None` if there is nothing to read for this window.
#[instrument(level = "debug", skip(reader, cursor, layout), ret)]
pub(crate) fn plan(
    reader: &mut PacketReader,
    cursor: &mut Cursor,
    layout: &FrameLayout,
    window: Window,
    lookback: u64,
) -> Result<Option<Plan>, stream::Error> {
    let origin = reader.establish_origin(cursor)?;
    if layout.has_timestamps() {
        plan_frames(reader, cursor, origin, layout, window, lookback).map(Some)
    } else {
        Ok(plan_samples(reader, cursor, origin, layout, window))
    }
}

fn plan_frames(
    reader: &mut PacketReader,
    cursor: &mut Cursor,
    origin: PacketPos,
    layout: &FrameLayout,
    window: Window,
    lookback: u64,
) -> Result<Plan, stream::Error> {
    let untouched = cursor.untouched();
    let target = Target::Frames {
        start: window.start,
        end: window.end,
        skip_head: untouched || window.start > cursor.time_origin,
    };
    let sequential = Plan { skip: 0, target };
    if !untouched || window.start <= 0.0 {
        return Ok(sequential);
    }

    let frame_size = layout.frame_size() as u64;
    let total_frames = reader.stream_len(origin) / frame_size;
    let Some(estimate) = Estimate::new(layout, window.start, total_frames, lookback) else {
        return Ok(sequential);
    };
    let frame = estimate.refine(reader, origin, layout, window.start)?;
    if frame == 0 {
        return Ok(sequential);
    }

    let skip = reader.jump(cursor, StreamPos(frame * frame_size));
    Ok(Plan { skip, target })
}

/// Samples without timestamps are placed on the nominal rate grid, the
/// window maps directly to a range of sample indices.
fn plan_samples(
    reader: &mut PacketReader,
    cursor: &mut Cursor,
    origin: PacketPos,
    layout: &FrameLayout,
    window: Window,
) -> Option<Plan> {
    let sample_size = layout.sample_size() as u64;
    let total = reader.stream_len(origin) / sample_size;
    let (first, end) = match layout.rate {
        Some(rate) => {
            let first = (rate * window.start).floor() as u64;
            let end = window
                .end
                .map(|end| (rate * end).floor() as u64)
                .unwrap_or(total);
            (first, end.min(total))
        }
        None => (0, total),
    };

    let untouched = cursor.untouched();
    let first = if untouched {
        first
    } else {
        first.max(cursor.saved_bytes / sample_size)
    };
    if first >= end {
        debug!("no samples in window, first: {first}, end: {end}");
        return None;
    }

    let skip = if untouched {
        reader.jump(cursor, StreamPos(first * sample_size))
    } else {
        first * sample_size - cursor.saved_bytes
    };
    Some(Plan {
        skip,
        target: Target::Bytes((end - first) * sample_size),
    })
}
