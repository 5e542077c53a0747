use std::fs;
use std::path::Path;

use hsdlog::descriptor::{
    ComponentDescriptor, DataType, Kind, PacketSizes, Sensor, SensorCategory,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;
use temp_dir::TempDir;

/// Writes a component capture the way a datalogger does: the payload stream
/// cut into packets, each prefixed by a running byte counter.
#[derive(Debug)]
pub struct CaptureWriter {
    payload_size: usize,
    next_counter: u32,
    pending: Vec<u8>,
    packets: Vec<u8>,
}

impl CaptureWriter {
    pub fn new(payload_size: usize) -> Self {
        Self {
            payload_size,
            next_counter: 0,
            pending: Vec::new(),
            packets: Vec::new(),
        }
    }

    /// Counter for the next packet, later packets count on from it
    pub fn set_next_counter(&mut self, counter: u32) {
        self.next_counter = counter;
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        while self.pending.len() >= self.payload_size {
            let payload: Vec<u8> = self.pending.drain(..self.payload_size).collect();
            self.packets
                .extend_from_slice(&self.next_counter.to_le_bytes());
            self.packets.extend_from_slice(&payload);
            self.next_counter = self.next_counter.wrapping_add(self.payload_size as u32);
        }
    }

    pub fn push_frame(&mut self, data: &[u8], ts: f64) {
        self.push(data);
        self.push(&ts.to_le_bytes());
    }

    pub fn push_f32_frame(&mut self, values: &[f32], ts: f64) {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push_frame(&data, ts);
    }

    pub fn push_i16(&mut self, values: &[i16]) {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(&data);
    }

    pub fn packets_written(&self) -> usize {
        self.packets.len() / (self.payload_size + 4)
    }

    /// Bytes pushed that do not yet fill a packet
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Complete packets only, a partial packet is never written by the
    /// device.
    pub fn finish(self) -> Vec<u8> {
        self.packets
    }

    pub fn write(self, path: impl AsRef<Path>) {
        fs::write(path, self.finish()).unwrap();
    }
}

/// Values `0, 1, 2, ..` for `frames` frames of `samples_per_frame` samples of
/// `dim` channels. Frame `i` gets timestamp `(i + 1) * frame_period`
/// distorted by `drift`, a factor on the period.
pub fn write_f32_frames(
    writer: &mut CaptureWriter,
    frames: usize,
    samples_per_frame: usize,
    dim: usize,
    frame_period: f64,
    drift: f64,
) -> (Vec<f32>, Vec<f64>) {
    let per_frame = samples_per_frame * dim;
    let mut values = Vec::new();
    let mut timestamps = Vec::new();
    for i in 0..frames {
        let frame: Vec<f32> = (i * per_frame..(i + 1) * per_frame)
            .map(|v| v as f32)
            .collect();
        let ts = (i + 1) as f64 * frame_period * drift;
        writer.push_f32_frame(&frame, ts);
        values.extend(frame);
        timestamps.push(ts);
    }
    (values, timestamps)
}

/// Mems sensor descriptor with the same packet size for every transport
pub fn mems_descriptor(
    dim: usize,
    data_type: DataType,
    odr: f64,
    samples_per_ts: u32,
    payload_size: usize,
) -> ComponentDescriptor {
    let sensor = Sensor::new(SensorCategory::Mems, dim).with_odr(odr);
    ComponentDescriptor::new(Kind::Sensor(sensor), data_type)
        .with_samples_per_ts(samples_per_ts)
        .with_packet_sizes(PacketSizes {
            sd: Some(payload_size + 4),
            usb: Some(payload_size),
            ble: Some(payload_size),
            serial: Some(payload_size),
        })
}

/// Sorted points in `0..end`, the same for the same seed
pub fn random_splits(seed: u64, count: usize, end: f64) -> Vec<f64> {
    let mut rng = Xoshiro128StarStar::seed_from_u64(seed);
    let mut splits: Vec<f64> = (0..count).map(|_| rng.random_range(0.0..end)).collect();
    splits.sort_by(f64::total_cmp);
    splits
}

/// A temporary acquisition folder
#[derive(Debug)]
pub struct AcquisitionDir {
    dir: TempDir,
}

impl AcquisitionDir {
    /// Acquisition of `duration` seconds (less then an hour) recorded over
    /// `interface`
    pub fn new(duration: f64, interface: u64) -> Self {
        assert!(duration < 3600.0);
        let dir = TempDir::new().unwrap();
        let millis = (duration * 1000.0).round() as u64;
        let end = format!(
            "2024-05-01T12:{:02}:{:02}.{:03}Z",
            millis / 60_000,
            (millis / 1000) % 60,
            millis % 1000
        );
        let info = serde_json::json!({
            "start_time": "2024-05-01T12:00:00.000Z",
            "end_time": end,
            "interface": interface,
        });
        fs::write(
            dir.child("acquisition_info.json"),
            serde_json::to_string_pretty(&info).unwrap(),
        )
        .unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_component(&self, name: &str, writer: CaptureWriter) {
        writer.write(self.dir.child(format!("{name}.dat")));
    }

    pub fn write_ispu_format(&self, outputs: &[(&str, &str)]) {
        let output: Vec<_> = outputs
            .iter()
            .map(|(name, kind)| serde_json::json!({"name": name, "type": kind}))
            .collect();
        fs::write(
            self.dir.child("ispu_output_format.json"),
            serde_json::json!({ "output": output }).to_string(),
        )
        .unwrap();
    }
}
