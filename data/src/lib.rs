//! Data providers: opaque byte blobs with stream discipline.
//!
//! A [`DataProvider`] stores one payload (for audio, a RIFF/WAVE file) under
//! a manager-unique [`ProviderId`]. Providers are written exactly once and
//! are read-only afterwards. A write stream excludes every other stream;
//! any number of read streams may be open at the same time.
//!
//! The [`DataProviderManager`] is the sole owner of provider lifetimes. It
//! hands out ids, resolves them, and sweeps providers that no media
//! references anymore.
//!
//! # Example
//!
//! ```rust
//! use narrata_data::{DataProviderFactory, DataProviderManager};
//! use std::io::{Read, Write};
//!
//! let manager = DataProviderManager::in_memory();
//! let provider = manager.create("application/octet-stream").unwrap();
//! assert_eq!(provider.id().as_str(), "DPID0000");
//!
//! let mut w = provider.output_stream().unwrap();
//! w.write_all(b"hello").unwrap();
//! w.close().unwrap();
//!
//! let mut buf = Vec::new();
//! provider.input_stream().unwrap().read_to_end(&mut buf).unwrap();
//! assert_eq!(buf, b"hello");
//! ```

mod error;
mod file;
mod id;
mod manager;
mod provider;

pub use error::{DataError, DataResult, StreamKind};
pub use file::extension_for_mime;
pub use id::ProviderId;
pub use manager::{DataProviderFactory, DataProviderManager, ProviderUsage, Storage, StoredData};
pub use provider::{DataProvider, ProviderReader, ProviderWriter};

/// Mime type of RIFF/WAVE audio payloads.
pub const MIME_AUDIO_WAV: &str = "audio/x-wav";
