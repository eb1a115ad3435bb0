use std::time::Duration;

use narrata_data::DataError;
use thiserror::Error;

use crate::MediaDataId;

/// Errors that can occur in audio media operations.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio: missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("audio: negative time offset: {0}")]
    NegativeTimeOffset(String),

    #[error("audio: time offset out of bounds: {what} (begin {begin:?}, end {end:?}, limit {limit:?})")]
    TimeOffsetOutOfBounds {
        what: &'static str,
        begin: Duration,
        end: Duration,
        limit: Duration,
    },

    #[error("audio: invalid data format: {0}")]
    InvalidDataFormat(String),

    #[error("audio: invalid argument: {0}")]
    InvalidArgument(String),

    #[error("audio: unknown media data {0}")]
    UnknownMediaData(MediaDataId),

    #[error("audio: serialization failed: {0}")]
    SerializationFailed(String),

    #[error("audio: cancelled")]
    Cancelled,

    #[error("audio: {0}")]
    Data(#[from] DataError),

    #[error("audio: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio: config: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl AudioError {
    pub(crate) fn out_of_bounds(
        what: &'static str,
        begin: Duration,
        end: Duration,
        limit: Duration,
    ) -> Self {
        Self::TimeOffsetOutOfBounds {
            what,
            begin,
            end,
            limit,
        }
    }
}

impl From<serde_json::Error> for AudioError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationFailed(e.to_string())
    }
}

/// Result type for audio media operations.
pub type AudioResult<T> = Result<T, AudioError>;
