use std::path::PathBuf;

use crate::{acquisition, config, descriptor, layout, stream};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid component descriptor: {0}")]
    Descriptor(#[from] descriptor::Error),
    #[error("Could not determine frame layout: {0}")]
    Layout(#[from] layout::Error),
    #[error("Could not read component data: {0}")]
    Reading(#[from] stream::Error),
    #[error(
        "No ispu output format for component {component}. Place an \
        `ispu_output_format.json` describing the ispu outputs in the \
        acquisition folder"
    )]
    MissingIspuFormat { component: String },
    #[error("No data file for component {component}, expected it at {path}")]
    MissingFile { component: String, path: PathBuf },
    #[error("Problem with acquisition metadata: {0}")]
    Acquisition(#[from] acquisition::Error),
    #[error("Could not load extraction config: {0}")]
    Config(#[from] config::Error),
}

impl Error {
    /// The descriptor or metadata does not allow decoding, retrying will not
    /// help.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Descriptor(_)
                | Error::Layout(_)
                | Error::MissingIspuFormat { .. }
                | Error::Acquisition(acquisition::Error::Transport(_))
        )
    }

    /// The packet counters show bytes went missing or were duplicated.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Reading(stream::Error::Corrupted { .. }))
    }

    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::Reading(stream::Error::NoDataAtIndex { .. }))
    }
}
