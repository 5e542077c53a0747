//! One component's capture file and everything needed to decode it.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::ExtractConfig;
use crate::cursor::Cursor;
use crate::decode::{Chunk, Decoder};
use crate::descriptor::{ComponentDescriptor, Kind, Transport};
use crate::layout::FrameLayout;
use crate::scale::Scaling;
use crate::seek::{self, Window};
use crate::stream::geometry::PacketGeometry;
use crate::stream::PacketReader;
use crate::{Error, Timestamp};

/// File extension of raw component captures
pub const DATA_EXTENSION: &str = "dat";

#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    path: PathBuf,
    descriptor: ComponentDescriptor,
    layout: FrameLayout,
    geometry: PacketGeometry,
    /// Length of the acquisition, windows are clamped to it
    duration: Option<Timestamp>,
    config: ExtractConfig,
}

impl Component {
    /// Resolve the layout of the component's frames. Fails before any file is
    /// read if the descriptor does not describe a decodable component.
    ///
    /// # Errors
    /// If the descriptor is incomplete for the transport or the component kind
    /// or if the data file does not exist.
    pub fn open(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        descriptor: ComponentDescriptor,
        transport: Transport,
    ) -> Result<Self, Error> {
        let name = name.into();
        let path = path.as_ref().to_owned();
        let layout = FrameLayout::resolve(&name, &descriptor)?;
        let payload = descriptor.packet_sizes.payload_size(transport)?;
        debug!("component {name} has layout: {layout:?}, payload: {payload}");

        if !path.is_file() {
            return Err(Error::MissingFile {
                component: name,
                path,
            });
        }

        Ok(Self {
            name,
            path,
            descriptor,
            layout,
            geometry: PacketGeometry::from_payload_size(payload),
            duration: None,
            config: ExtractConfig::default(),
        })
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Timestamp) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    #[must_use]
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// A cursor positioned at the start of this component's data
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new()
    }

    /// Samples and timestamps between `start` and `end` (seconds since
    /// the acquisition started). `end` of `None` or negative reads till the
    /// end of the acquisition, or of the data if the acquisition's duration is
    /// not known. Continue from a previous call by passing the same
    /// cursor. In `raw` mode values keep the datatype of the file, otherwise
    /// they are scaled to `f32` physical units.
    ///
    /// # Errors
    /// When the file is corrupt, shorter then needed or can not be read.
    /// The cursor stays consistent and may be used again after an error.
    #[instrument(level = "debug", skip(self, cursor), fields(component = %self.name))]
    pub fn extract(
        &self,
        cursor: &mut Cursor,
        start: Timestamp,
        end: Option<Timestamp>,
        raw: bool,
    ) -> Result<Chunk, Error> {
        let Some(window) = Window::new(start, end, self.duration) else {
            debug!("window outside acquisition, nothing to extract");
            return Ok(self.scaled(Chunk::empty(&self.layout), raw));
        };

        let mut reader = PacketReader::open(&self.path, self.geometry)?;
        cursor.seed_time_origin(self.descriptor.ioffset);
        let plan = seek::plan(
            &mut reader,
            cursor,
            &self.layout,
            window,
            self.config.lookback_frames,
        )?;
        let Some(plan) = plan else {
            return Ok(self.scaled(Chunk::empty(&self.layout), raw));
        };
        let collected = reader.read_window(cursor, &self.layout, plan)?;

        let decoder = Decoder {
            layout: &self.layout,
            ioffset: self.descriptor.ioffset,
            timestamp_recovery: self.config.timestamp_recovery
                && matches!(self.descriptor.kind, Kind::Sensor(_))
                && !self.layout.auxiliary,
        };
        let chunk = decoder.decode(cursor, collected);
        Ok(self.scaled(chunk, raw))
    }

    fn scaled(&self, chunk: Chunk, raw: bool) -> Chunk {
        let scaling = Scaling::new(&self.name, &self.descriptor, &self.layout, raw);
        Chunk {
            timestamps: chunk.timestamps,
            samples: scaling.apply(chunk.samples),
        }
    }

    /// Everything in the file, scaled unless `raw`.
    ///
    /// # Errors
    /// See [`Component::extract`].
    pub fn extract_all(&self, raw: bool) -> Result<Chunk, Error> {
        let mut cursor = self.cursor();
        self.extract(&mut cursor, 0.0, None, raw)
    }
}
