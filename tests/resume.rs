use hsdlog::{DataType, Values};
use hsdlog_test_support::{mems_descriptor, random_splits, write_f32_frames, CaptureWriter};
use itertools::Itertools;
use pretty_assertions::assert_eq;
use rstest::rstest;
use temp_dir::TempDir;

mod shared;
use shared::{component, concat_rows, concat_timestamps, extract_in_windows, setup_tracing};

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(42)]
fn chunked_frames_same_as_single_call(#[case] seed: u64) {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    // frames of 128 bytes in packets of 100, most frames span two packets
    let mut writer = CaptureWriter::new(100);
    let (values, _) = write_f32_frames(&mut writer, 50, 10, 3, 0.1, 1.0);
    assert_eq!(writer.pending(), 0);
    let descriptor = mems_descriptor(3, DataType::Float32, 100.0, 10, 100);
    let component = component(test_dir.path(), "iis3dwb_acc", descriptor, writer);

    let full = component.extract_all(true).unwrap();
    assert_eq!(full.samples.into_values(), Values::F32(values));

    let full = component.extract_all(true).unwrap();
    let splits = random_splits(seed, 6, 5.0);
    let chunks = extract_in_windows(&component, &splits, true);
    assert_eq!(concat_timestamps(&chunks), full.timestamps);
    assert_eq!(concat_rows(&chunks), full.samples.rows());
}

#[rstest]
#[case(DataType::Int16, 3, 64)]
#[case(DataType::Int24, 2, 64)]
#[case(DataType::UInt8, 5, 30)]
fn chunked_samples_same_as_single_call(
    #[case] data_type: DataType,
    #[case] dim: usize,
    #[case] payload: usize,
) {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut writer = CaptureWriter::new(payload);
    let bytes: Vec<u8> = (0..payload * 40).map(|i| (i * 7 % 251) as u8).collect();
    writer.push(&bytes);
    let descriptor = mems_descriptor(dim, data_type, 50.0, 0, payload);
    let component = component(test_dir.path(), "lps22hh_press", descriptor, writer);

    let full = component.extract_all(true).unwrap();
    let sample_size = dim * data_type.size();
    assert_eq!(full.len(), payload * 40 / sample_size);

    for seed in 0..4 {
        let splits = random_splits(seed, 8, full.len() as f64 / 50.0);
        let chunks = extract_in_windows(&component, &splits, true);
        assert_eq!(concat_timestamps(&chunks), full.timestamps);
        assert_eq!(concat_rows(&chunks), full.samples.rows());
    }
}

#[test]
fn samples_on_nominal_grid() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut writer = CaptureWriter::new(64);
    writer.push_i16(&(0..320).collect_vec());
    let descriptor =
        mems_descriptor(2, DataType::Int16, 50.0, 0, 64).with_ioffset(0.5);
    let component = component(test_dir.path(), "lps22hh_press", descriptor, writer);

    let chunks = extract_in_windows(&component, &[0.3, 1.0], true);
    assert_eq!(chunks[0].len(), 15);
    assert_eq!(chunks[1].len(), 35);
    assert_eq!(chunks[2].len(), 160 - 50);

    let timestamps = concat_timestamps(&chunks);
    for (i, ts) in timestamps.iter().enumerate() {
        assert_eq!(*ts, 0.5 + i as f64 * (1.0 / 50.0));
    }
    assert_eq!(chunks[1].samples.get(0, 0), Some(30.0));
    assert_eq!(chunks[1].samples.get(0, 1), Some(31.0));
}

#[test]
fn cursor_carries_partial_frame() {
    setup_tracing();

    let test_dir = TempDir::new().unwrap();
    let mut writer = CaptureWriter::new(100);
    write_f32_frames(&mut writer, 25, 10, 3, 0.1, 1.0);
    let descriptor = mems_descriptor(3, DataType::Float32, 100.0, 10, 100);
    let component = component(test_dir.path(), "iis3dwb_acc", descriptor, writer);

    let mut cursor = component.cursor();
    let chunk = component.extract(&mut cursor, 0.0, Some(0.25), true).unwrap();
    // frames with timestamps 0.1, 0.2 and 0.3, the last reaches the end
    assert_eq!(chunk.len(), 30);
    assert!(!cursor.is_first_chunk());
    assert_eq!(cursor.time_origin(), 0.30000000000000004);
    // 3 packets hold 300 bytes, three frames take 384, the 4th packet
    // leaves 16 bytes of the next frame
    assert_eq!(cursor.last_index(), 4 * 104);
    assert_eq!(cursor.missing_bytes(), 16);
    assert!(cursor.is_same_dps());
    assert_eq!(cursor.saved_bytes(), 384);
}
