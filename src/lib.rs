//! Decode the raw capture files of a sensor datalogger into samples with
//! timestamps, in resumable chunks.

pub mod acquisition;
pub mod component;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod layout;
mod scale;
mod seek;
pub mod stream;

pub use acquisition::{Acquisition, BatchItem};
pub use component::Component;
pub use config::ExtractConfig;
pub use cursor::Cursor;
pub use decode::{Chunk, Samples, Values};
pub use descriptor::{ComponentDescriptor, DataType, Transport};
pub use error::Error;
pub use layout::FrameLayout;

/// Seconds since the start of the acquisition
pub type Timestamp = f64;

/// Extract the samples of one component between `start_time` and
/// `end_time` in seconds. An `end_time` below zero reads till the end of
/// the acquisition. Pass the same `cursor` to continue where the previous
/// call stopped.
///
/// # Errors
/// See [`Acquisition::extract`].
pub fn extract(
    acquisition: &Acquisition,
    component_name: &str,
    descriptor: &ComponentDescriptor,
    cursor: &mut Cursor,
    start_time: Timestamp,
    end_time: Timestamp,
    raw_mode: bool,
) -> Result<Chunk, Error> {
    acquisition.extract(
        component_name,
        descriptor,
        cursor,
        start_time,
        end_time,
        raw_mode,
    )
}
