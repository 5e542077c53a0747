//! Options for extraction, optionally loaded from a ron file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read extraction config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Extraction config is not valid ron: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Could not serialize extraction config: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Replace implausible frame timestamps of sensors and zero their data
    pub timestamp_recovery: bool,
    /// Frames to step back from the estimated start when jumping into a
    /// file, absorbs clock drift
    pub lookback_frames: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timestamp_recovery: false,
            lookback_frames: 2,
        }
    }
}

impl ExtractConfig {
    /// # Errors
    /// If the text is not a valid ron encoded config.
    pub fn from_ron(text: &str) -> Result<Self, Error> {
        Ok(ron::from_str(text)?)
    }

    /// # Errors
    /// If the file can not be read or does not hold a valid config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_ron(&text)
    }

    /// # Errors
    /// Never for this type, kept for symmetry with `from_ron`.
    pub fn to_ron(&self) -> Result<String, Error> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = ExtractConfig::from_ron("(timestamp_recovery: true)").unwrap();
        assert_eq!(
            config,
            ExtractConfig {
                timestamp_recovery: true,
                lookback_frames: 2,
            }
        );
    }

    #[test]
    fn ron_roundtrip() {
        let config = ExtractConfig {
            timestamp_recovery: false,
            lookback_frames: 5,
        };
        let text = config.to_ron().unwrap();
        assert_eq!(ExtractConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn load_from_file() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = dir.child("extract.ron");
        fs::write(&path, "(lookback_frames: 4)").unwrap();
        let config = ExtractConfig::load(&path).unwrap();
        assert_eq!(config.lookback_frames, 4);
        assert!(!config.timestamp_recovery);
    }

    #[test]
    fn invalid_ron() {
        assert!(matches!(
            ExtractConfig::from_ron("(lookback_frames: \"many\")"),
            Err(Error::Parse(_))
        ));
    }
}
