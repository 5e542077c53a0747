use std::iter;

use itertools::Itertools;
use tracing::warn;

use crate::layout::FrameLayout;
use crate::Timestamp;

/// A gap between frames larger then this many frame periods is not spread
/// over the frame's samples, they are placed one period before the frame's
/// timestamp instead.
pub(crate) const STRETCH_LIMIT: f64 = 1.33;
/// Bounds, in frame periods, on a plausible gap between two frames
pub(crate) const PLAUSIBLE_GAP: (f64, f64) = (0.1, 10.0);

/// Replace implausible frame timestamps by the previous one plus a frame
/// period and zero the frame's data. Returns the number of repaired frames.
pub(crate) fn repair(
    frame_ts: &mut [Timestamp],
    frames: &mut [u8],
    layout: &FrameLayout,
    mut reference: Option<Timestamp>,
) -> usize {
    let period = layout.frame_period;
    let (low, high) = (PLAUSIBLE_GAP.0 * period, PLAUSIBLE_GAP.1 * period);
    let mut repaired = 0;

    for (ts, frame) in frame_ts
        .iter_mut()
        .zip(frames.chunks_exact_mut(layout.frame_size()))
    {
        if let Some(prev) = reference {
            let gap = (*ts - prev).abs();
            // written so that NaN fails the check
            if !(gap >= low && gap <= high) {
                warn!(
                    "Implausible frame timestamp {ts} after {prev} (expected \
                    gap: {period}), replacing it and zeroing the frame's data"
                );
                *ts = prev + period;
                frame[..layout.data_bytes].fill(0);
                repaired += 1;
            }
        }
        reference = Some(*ts);
    }
    repaired
}

/// Timestamps for every sample in the frames. The samples of a frame are
/// spread evenly between the previous frame's timestamp and its own.
pub(crate) fn interpolate(
    frame_ts: &[Timestamp],
    prev: Timestamp,
    layout: &FrameLayout,
) -> Vec<Timestamp> {
    let per_frame = layout.samples_per_frame;
    if per_frame == 1 {
        return frame_ts.to_vec();
    }

    let period = layout.frame_period;
    let mut timestamps = Vec::with_capacity(frame_ts.len() * per_frame);
    for (prev, ts) in iter::once(prev)
        .chain(frame_ts.iter().copied())
        .tuple_windows()
    {
        let low = if period > 0.0 && (ts - prev).abs() > STRETCH_LIMIT * period {
            ts - period
        } else {
            prev
        };
        let step = (ts - low) / per_frame as f64;
        timestamps.extend((0..per_frame).map(|j| low + step * j as f64));
    }
    timestamps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ComponentDescriptor, DataType, Kind, Sensor, SensorCategory};

    fn layout(samples_per_ts: u32) -> FrameLayout {
        let sensor = Sensor::new(SensorCategory::Mems, 1).with_odr(10.0);
        let descriptor = ComponentDescriptor::new(Kind::Sensor(sensor), DataType::Int8)
            .with_samples_per_ts(samples_per_ts);
        FrameLayout::resolve("acc", &descriptor).unwrap()
    }

    #[test]
    fn spread_between_frames() {
        let layout = layout(4);
        let timestamps = interpolate(&[0.4, 0.8], 0.0, &layout);
        assert_eq!(
            timestamps,
            vec![
                0.0,
                0.1,
                0.2,
                0.30000000000000004,
                0.4,
                0.5,
                0.6000000000000001,
                0.7000000000000001
            ]
        );
    }

    #[test]
    fn gap_not_stretched() {
        let layout = layout(2);
        // frame period is 0.2, a 1.0 gap is too long to spread over
        let timestamps = interpolate(&[1.0], 0.0, &layout);
        assert_eq!(timestamps, vec![0.8, 0.9]);
    }

    #[test]
    fn single_sample_frames_keep_their_timestamp() {
        let layout = layout(1);
        assert_eq!(interpolate(&[0.1, 0.2], 0.0, &layout), vec![0.1, 0.2]);
    }

    #[test]
    fn repair_zeroes_data() {
        let layout = layout(1);
        let mut frame_ts = vec![0.1, 7.0, 0.3];
        let mut frames = vec![0u8; layout.frame_size() * 3];
        frames[layout.frame_size()] = 42;
        let repaired = repair(&mut frame_ts, &mut frames, &layout, Some(0.0));
        assert_eq!(repaired, 1);
        assert_eq!(frame_ts, vec![0.1, 0.2, 0.3]);
        assert_eq!(frames[layout.frame_size()], 0);
    }

    #[test]
    fn repair_rejects_nan() {
        let layout = layout(1);
        let mut frame_ts = vec![f64::NAN];
        let mut frames = vec![7u8; layout.frame_size()];
        assert_eq!(repair(&mut frame_ts, &mut frames, &layout, Some(1.0)), 1);
        assert_eq!(frame_ts, vec![1.1]);
    }
}
