#![allow(dead_code, unused_imports)]
use std::path::Path;

use hsdlog::descriptor::Transport;
use hsdlog::{Chunk, Component, ComponentDescriptor, Cursor, Values};
use hsdlog_test_support::CaptureWriter;

pub fn setup_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::builder()
        .from_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ignore_err = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init();
}

/// Write `writer` to `dir/name.dat` and open it as a usb component
pub fn component(
    dir: &Path,
    name: &str,
    descriptor: ComponentDescriptor,
    writer: CaptureWriter,
) -> Component {
    let path = dir.join(format!("{name}.dat"));
    writer.write(&path);
    Component::open(path, name, descriptor, Transport::Usb).unwrap()
}

/// Extract the windows between consecutive splits with one cursor, the
/// last window runs till the end of the data.
pub fn extract_in_windows(component: &Component, splits: &[f64], raw: bool) -> Vec<Chunk> {
    let mut cursor = component.cursor();
    let mut starts = vec![0.0];
    starts.extend_from_slice(splits);
    let mut chunks = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied();
        chunks.push(component.extract(&mut cursor, *start, end, raw).unwrap());
    }
    chunks
}

pub fn concat_timestamps(chunks: &[Chunk]) -> Vec<f64> {
    chunks
        .iter()
        .flat_map(|chunk| chunk.timestamps.iter().copied())
        .collect()
}

pub fn concat_rows(chunks: &[Chunk]) -> Vec<Vec<f64>> {
    chunks.iter().flat_map(|chunk| chunk.samples.rows()).collect()
}

pub fn as_f32(chunk: &Chunk) -> &[f32] {
    match chunk.samples.values() {
        Values::F32(values) => values,
        other => panic!("expected f32 values, got: {other:?}"),
    }
}
