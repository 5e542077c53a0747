//! An acquisition folder: per component capture files plus the metadata
//! describing the session.

use std::fs;
use std::path::{Path, PathBuf};

use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::component::{Component, DATA_EXTENSION};
use crate::config::ExtractConfig;
use crate::cursor::Cursor;
use crate::decode::Chunk;
use crate::descriptor::{ComponentDescriptor, Transport};
use crate::layout::is_ispu;
use crate::Timestamp;

pub const INFO_FILE: &str = "acquisition_info.json";
pub const ISPU_FORMAT_FILE: &str = "ispu_output_format.json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid timestamp {text:?} in acquisition info: {source}")]
    Timestamp { text: String, source: jiff::Error },
    #[error("Acquisition ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        start: jiff::Timestamp,
        end: jiff::Timestamp,
    },
    #[error("Transport in acquisition info is not valid: {0}")]
    Transport(#[from] crate::descriptor::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawInfo {
    start_time: String,
    end_time: String,
    interface: u64,
}

/// Session metadata from `acquisition_info.json`
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionInfo {
    pub start_time: jiff::Timestamp,
    pub end_time: jiff::Timestamp,
    pub transport: Transport,
}

impl AcquisitionInfo {
    /// # Errors
    /// If the text is not valid json, a timestamp is malformed or the
    /// transport selector is unknown.
    pub fn from_json(text: &str, path: &Path) -> Result<Self, Error> {
        let raw: RawInfo = serde_json::from_str(text).map_err(|source| Error::Json {
            path: path.to_owned(),
            source,
        })?;
        let info = Self {
            start_time: parse_iso8601(&raw.start_time)?,
            end_time: parse_iso8601(&raw.end_time)?,
            transport: Transport::from_selector(raw.interface)?,
        };
        if info.end_time < info.start_time {
            return Err(Error::EndBeforeStart {
                start: info.start_time,
                end: info.end_time,
            });
        }
        Ok(info)
    }

    /// Seconds between start and end
    #[must_use]
    pub fn duration(&self) -> Timestamp {
        self.end_time.duration_since(self.start_time).as_secs_f64()
    }
}

/// Devices write either an instant with offset or a bare local time, the
/// latter is taken as UTC.
fn parse_iso8601(text: &str) -> Result<jiff::Timestamp, Error> {
    let err = |source| Error::Timestamp {
        text: text.to_owned(),
        source,
    };
    if let Ok(ts) = text.parse::<jiff::Timestamp>() {
        return Ok(ts);
    }
    let civil: DateTime = text.parse().map_err(err)?;
    civil
        .to_zoned(TimeZone::UTC)
        .map(|zoned| zoned.timestamp())
        .map_err(err)
}

/// Layout of the outputs of the in-sensor processing unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IspuOutputFormat {
    pub output: Vec<IspuOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IspuOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One component to extract in [`Acquisition::extract_all`]
#[derive(Debug)]
pub struct BatchItem<'a> {
    pub name: &'a str,
    pub descriptor: &'a ComponentDescriptor,
    pub cursor: &'a mut Cursor,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    folder: PathBuf,
    info: AcquisitionInfo,
    ispu_format: Option<IspuOutputFormat>,
    config: ExtractConfig,
}

impl Acquisition {
    /// Read the acquisition metadata in `folder`. The ispu output format is
    /// optional, it is only needed to open ispu components.
    ///
    /// # Errors
    /// If `acquisition_info.json` is missing or invalid, or an ispu output
    /// format is present but invalid.
    #[instrument(level = "debug", skip_all, fields(folder = %folder.as_ref().display()))]
    pub fn open(folder: impl AsRef<Path>) -> Result<Self, Error> {
        let folder = folder.as_ref().to_owned();
        let info_path = folder.join(INFO_FILE);
        let text = read(&info_path)?;
        let info = AcquisitionInfo::from_json(&text, &info_path)?;

        let ispu_path = folder.join(ISPU_FORMAT_FILE);
        let ispu_format = if ispu_path.is_file() {
            let text = read(&ispu_path)?;
            let format = serde_json::from_str(&text).map_err(|source| Error::Json {
                path: ispu_path,
                source,
            })?;
            Some(format)
        } else {
            None
        };

        info!(
            "opened acquisition lasting {}s over {}",
            info.duration(),
            info.transport
        );
        Ok(Self {
            folder,
            info,
            ispu_format,
            config: ExtractConfig::default(),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the extraction options in the ron file at `path`.
    ///
    /// # Errors
    /// If the file can not be read or is not a valid config.
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let config = ExtractConfig::load(path)?;
        debug!("extraction config: {config:?}");
        Ok(self.with_config(config))
    }

    #[must_use]
    pub fn info(&self) -> &AcquisitionInfo {
        &self.info
    }

    #[must_use]
    pub fn duration(&self) -> Timestamp {
        self.info.duration()
    }

    #[must_use]
    pub fn ispu_format(&self) -> Option<&IspuOutputFormat> {
        self.ispu_format.as_ref()
    }

    #[must_use]
    pub fn component_path(&self, name: &str) -> PathBuf {
        self.folder.join(format!("{name}.{DATA_EXTENSION}"))
    }

    /// # Errors
    /// If the component can not be decoded with this descriptor, its file is
    /// missing, or it is an ispu component while the acquisition has no ispu
    /// output format.
    pub fn component(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
    ) -> Result<Component, crate::Error> {
        if is_ispu(name) && self.ispu_format.is_none() {
            return Err(crate::Error::MissingIspuFormat {
                component: name.to_owned(),
            });
        }
        let component = Component::open(
            self.component_path(name),
            name,
            descriptor.clone(),
            self.info.transport,
        )?;
        Ok(component
            .with_duration(self.duration())
            .with_config(self.config))
    }

    /// Extract one component's window, `end` below zero reads till the end
    /// of the acquisition.
    ///
    /// # Errors
    /// See [`Acquisition::component`] and [`Component::extract`].
    pub fn extract(
        &self,
        name: &str,
        descriptor: &ComponentDescriptor,
        cursor: &mut Cursor,
        start: Timestamp,
        end: Timestamp,
        raw: bool,
    ) -> Result<Chunk, crate::Error> {
        let end = (end >= 0.0).then_some(end);
        self.component(name, descriptor)?
            .extract(cursor, start, end, raw)
    }

    /// Extract the same window from each component in turn. A failing
    /// component is logged and does not stop the others.
    pub fn extract_all<'a>(
        &self,
        items: impl IntoIterator<Item = BatchItem<'a>>,
        start: Timestamp,
        end: Timestamp,
        raw: bool,
    ) -> Vec<(String, Result<Chunk, crate::Error>)> {
        items
            .into_iter()
            .map(|item| {
                let res = self.extract(item.name, item.descriptor, item.cursor, start, end, raw);
                if let Err(e) = &res {
                    error!("Could not extract component {}: {e}", item.name);
                }
                (item.name.to_owned(), res)
            })
            .collect()
    }
}

fn read(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}
