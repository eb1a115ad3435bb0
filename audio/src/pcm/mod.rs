//! PCM (Pulse Code Modulation) format handling.
//!
//! # Key Types
//!
//! - [`PcmFormat`]: sample layout and the time ↔ byte arithmetic every clip
//!   boundary goes through
//! - [`WaveHeader`]: what a RIFF/WAVE header declares about its payload
//! - [`Chunk`]: in-memory PCM sources ([`DataChunk`], [`SilenceChunk`])
//!
//! # Example
//!
//! ```rust
//! use narrata_audio::pcm::{Chunk, PcmFormat, SilenceChunk};
//! use std::time::Duration;
//!
//! let format = PcmFormat::CD_MONO;
//! assert_eq!(format.time_to_byte_offset(Duration::from_millis(500)), 44100);
//!
//! let silence = SilenceChunk::new(format, Duration::from_millis(100));
//! assert_eq!(silence.len(), 8820);
//! ```

mod chunk;
mod format;
mod wav;

pub use chunk::{Chunk, DataChunk, SilenceChunk};
pub use format::PcmFormat;
pub use wav::{
    RIFF_WAVE_HEADER_LEN, WaveHeader, parse_riff_wave_header, riff_wave_header,
    write_riff_wave_header,
};
