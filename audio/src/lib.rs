//! Audio asset storage and splicing.
//!
//! This crate represents logical audio tracks as ordered lists of clips over
//! byte-backed data providers:
//!
//! - `pcm`: PCM format arithmetic and the RIFF/WAVE codec
//! - `media`: clips, composed reads, and the [`AudioMediaData`] edit engine
//! - `presentation`: the owner of one provider manager and its media
//! - `persist`: saving and loading a presentation as a JSON document
//! - `config`: YAML presentation settings
//!
//! # Example
//!
//! ```rust
//! use narrata_audio::media::AudioMediaData;
//! use narrata_audio::pcm::{Chunk, DataChunk, PcmFormat, SilenceChunk};
//! use narrata_data::DataProviderManager;
//! use std::io::Read;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let manager = Arc::new(DataProviderManager::in_memory());
//! let format = PcmFormat::CD_MONO;
//! let mut media = AudioMediaData::new(manager, format);
//!
//! let silence = SilenceChunk::new(format, Duration::from_millis(1000));
//! media.append(&mut silence.reader(), None).unwrap();
//!
//! let tone = DataChunk::tone(format, Duration::from_millis(500), 100, 8000);
//! media.insert(&mut tone.reader(), Duration::from_millis(500), None).unwrap();
//! assert_eq!(media.duration(), Duration::from_millis(1500));
//!
//! let mut out = Vec::new();
//! media
//!     .read(Duration::from_millis(500), Some(Duration::from_millis(1000)))
//!     .unwrap()
//!     .read_to_end(&mut out)
//!     .unwrap();
//! assert_eq!(out, tone.as_bytes());
//! ```

mod error;

pub mod config;
pub mod media;
pub mod pcm;
pub mod persist;
pub mod presentation;

pub use config::{PresentationConfig, StorageConfig, load_config};
pub use error::{AudioError, AudioResult};
pub use media::{AudioMediaData, AudioMediaEvent, Clip, ComposedStream};
pub use pcm::PcmFormat;
pub use persist::{NoProgress, Progress};
pub use presentation::{MediaDataId, MediaDataManager, Presentation};
