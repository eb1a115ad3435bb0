//! Error types for data provider operations.

use std::fmt;

use thiserror::Error;

use crate::ProviderId;

/// Which kind of stream is open on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Read,
    Write,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Read => write!(f, "read"),
            StreamKind::Write => write!(f, "write"),
        }
    }
}

/// Errors that can occur in data provider operations.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("data: missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("data: provider {id}: a {open} stream is already open")]
    StreamAlreadyOpen { id: ProviderId, open: StreamKind },

    #[error("data: provider {0}: already written")]
    ProviderSealed(ProviderId),

    #[error("data: provider {0}: deleted")]
    ProviderDeleted(ProviderId),

    #[error("data: data is missing: {0}")]
    DataIsMissing(String),

    #[error("data: unknown provider id {0}")]
    UnknownProviderId(ProviderId),

    #[error("data: duplicate provider id {0}")]
    DuplicateProviderId(ProviderId),

    #[error("data: unsupported: {0}")]
    Unsupported(String),

    #[error("data: io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for data provider operations.
pub type DataResult<T> = Result<T, DataError>;
