//! PCM audio format definitions and time ↔ byte arithmetic.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AudioError, AudioResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Describes the sample layout of uncompressed PCM audio.
///
/// Invalid layouts (zero rate, zero channels, bit depth that is not a
/// positive multiple of 8) cannot be constructed, so `block_align` and
/// `byte_rate` are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFormat", into = "RawFormat")]
pub struct PcmFormat {
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
}

#[derive(Serialize, Deserialize)]
struct RawFormat {
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
}

impl PcmFormat {
    /// Creates a format, validating the layout.
    pub fn new(sample_rate: u32, bits_per_sample: u16, channels: u16) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidDataFormat(
                "sample rate must be positive".into(),
            ));
        }
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 {
            return Err(AudioError::InvalidDataFormat(format!(
                "bits per sample must be a positive multiple of 8, got {bits_per_sample}"
            )));
        }
        if channels == 0 {
            return Err(AudioError::InvalidDataFormat(
                "channel count must be at least 1".into(),
            ));
        }
        let format = Self {
            sample_rate,
            bits_per_sample,
            channels,
        };
        if u16::try_from(format.block_align_wide()).is_err()
            || u32::try_from(format.byte_rate_wide()).is_err()
        {
            return Err(AudioError::InvalidDataFormat(format!(
                "{format} does not fit a RIFF/WAVE header"
            )));
        }
        Ok(format)
    }

    /// 16-bit mono at the given rate.
    pub const fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    /// 16-bit stereo at the given rate.
    pub const fn stereo16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channels: 2,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Bytes per multi-channel sample frame.
    pub fn block_align(&self) -> u16 {
        self.block_align_wide() as u16
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        self.byte_rate_wide() as u32
    }

    fn block_align_wide(&self) -> u64 {
        self.channels as u64 * (self.bits_per_sample as u64 / 8)
    }

    fn byte_rate_wide(&self) -> u64 {
        self.block_align_wide() * self.sample_rate as u64
    }

    /// Returns true if both formats have the same rate, depth and channels.
    pub fn is_compatible_with(&self, other: &PcmFormat) -> bool {
        self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
            && self.channels == other.channels
    }

    /// Rounds a byte count down to a whole number of frames.
    pub fn align_down(&self, bytes: u64) -> u64 {
        bytes - bytes % self.block_align() as u64
    }

    /// Converts a time offset to a frame-aligned byte offset.
    ///
    /// `floor(t * byte_rate)` computed on whole nanoseconds, then truncated
    /// to a multiple of `block_align`. For millisecond offsets this is
    /// exactly `floor(ms * byte_rate / 1000)` rounded down to a frame.
    pub fn time_to_byte_offset(&self, t: Duration) -> u64 {
        let raw = t.as_nanos() * self.byte_rate() as u128 / NANOS_PER_SEC;
        self.align_down(raw as u64)
    }

    /// Converts a byte count to the shortest duration that covers it.
    ///
    /// Rounds up to the next nanosecond so that
    /// `time_to_byte_offset(byte_offset_to_time(b)) == b` for every
    /// frame-aligned `b`.
    pub fn byte_offset_to_time(&self, bytes: u64) -> Duration {
        let rate = self.byte_rate() as u128;
        let nanos = (bytes as u128 * NANOS_PER_SEC).div_ceil(rate);
        Duration::from_nanos(nanos as u64)
    }

    /// Number of sample frames in `bytes`.
    pub fn frames(&self, bytes: u64) -> u64 {
        bytes / self.block_align() as u64
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::CD_MONO
    }
}

// Common format presets
impl PcmFormat {
    /// 16kHz mono (speech)
    pub const MONO_16K: PcmFormat = PcmFormat::mono16(16000);
    /// 22.05kHz mono
    pub const MONO_22K: PcmFormat = PcmFormat::mono16(22050);
    /// 44.1kHz mono
    pub const CD_MONO: PcmFormat = PcmFormat::mono16(44100);
    /// 44.1kHz stereo (CD quality)
    pub const CD_STEREO: PcmFormat = PcmFormat::stereo16(44100);
    /// 48kHz stereo
    pub const STEREO_48K: PcmFormat = PcmFormat::stereo16(48000);
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {}-bit, {} ch",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}

impl TryFrom<RawFormat> for PcmFormat {
    type Error = AudioError;

    fn try_from(raw: RawFormat) -> Result<Self, Self::Error> {
        Self::new(raw.sample_rate, raw.bits_per_sample, raw.channels)
    }
}

impl From<PcmFormat> for RawFormat {
    fn from(f: PcmFormat) -> Self {
        Self {
            sample_rate: f.sample_rate,
            bits_per_sample: f.bits_per_sample,
            channels: f.channels,
        }
    }
}
