//! Clips: time windows into one provider's PCM payload.

use std::time::Duration;

use narrata_data::{DataProviderManager, ProviderId};
use tracing::trace;

use super::composed::SubStream;
use crate::pcm::{PcmFormat, WaveHeader, parse_riff_wave_header};
use crate::{AudioError, AudioResult};

/// A window `[clip_begin, clip_end)` of the audio stored in one provider.
///
/// Times are relative to the start of the provider's PCM data. A clip with
/// no explicit end is tied to the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    provider: ProviderId,
    begin: Duration,
    end: Option<Duration>,
    format: PcmFormat,
    media_duration: Duration,
}

impl Clip {
    /// Opens a clip over `provider`, validating the window against the
    /// provider's header.
    pub fn open(
        manager: &DataProviderManager,
        provider: ProviderId,
        begin: Duration,
        end: Option<Duration>,
    ) -> AudioResult<Self> {
        let header = read_header(manager, &provider)?;
        let clip = Self {
            provider,
            begin,
            end: None,
            format: header.format,
            media_duration: raw_duration(&header),
        };
        clip.with_window(begin, end)
    }

    /// A clip spanning the whole payload of `provider`.
    pub fn whole(manager: &DataProviderManager, provider: ProviderId) -> AudioResult<Self> {
        Self::open(manager, provider, Duration::ZERO, None)
    }

    pub fn provider_id(&self) -> &ProviderId {
        &self.provider
    }

    pub fn clip_begin(&self) -> Duration {
        self.begin
    }

    /// The explicit end, or `None` when tied to the end of the payload.
    pub fn clip_end(&self) -> Option<Duration> {
        self.end
    }

    pub fn is_tied_to_end(&self) -> bool {
        self.end.is_none()
    }

    /// Format declared by the provider's header.
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Duration of the provider's whole payload.
    pub fn media_duration(&self) -> Duration {
        self.media_duration
    }

    pub fn effective_end(&self) -> Duration {
        self.end.unwrap_or(self.media_duration)
    }

    pub fn duration(&self) -> Duration {
        self.effective_end() - self.begin
    }

    /// Payload byte range covered by the clip, relative to the PCM data.
    pub fn byte_range(&self) -> (u64, u64) {
        (
            self.format.time_to_byte_offset(self.begin),
            self.format.time_to_byte_offset(self.effective_end()),
        )
    }

    pub fn byte_len(&self) -> u64 {
        let (start, stop) = self.byte_range();
        stop - start
    }

    /// Re-reads the provider's current header.
    pub fn header(&self, manager: &DataProviderManager) -> AudioResult<WaveHeader> {
        read_header(manager, &self.provider)
    }

    /// Opens a read view over `[sub_begin, sub_end)` of the clip.
    ///
    /// The window is checked against the provider's current header on every
    /// call. `sub_end` of `None` reads to the end of the clip.
    pub fn read(
        &self,
        manager: &DataProviderManager,
        sub_begin: Duration,
        sub_end: Option<Duration>,
    ) -> AudioResult<SubStream> {
        let provider = manager.get_provider(&self.provider)?;
        let mut reader = provider.input_stream()?;
        let header = parse_riff_wave_header(&mut reader)?;
        check_payload_len(&header, provider.len()?)?;
        if !header.format.is_compatible_with(&self.format) {
            return Err(AudioError::InvalidDataFormat(format!(
                "provider {} now holds {}, clip expects {}",
                self.provider, header.format, self.format
            )));
        }
        let raw = raw_duration(&header);
        let end = self.end.unwrap_or(raw);
        if self.begin > end || end > raw {
            return Err(AudioError::InvalidDataFormat(format!(
                "clip {:?}..{:?} no longer fits provider {} of {:?}",
                self.begin, end, self.provider, raw
            )));
        }

        let duration = end - self.begin;
        let sub_end = sub_end.unwrap_or(duration);
        if sub_begin > sub_end || sub_end > duration {
            return Err(AudioError::out_of_bounds(
                "clip read", sub_begin, sub_end, duration,
            ));
        }
        let start = header.format.time_to_byte_offset(self.begin + sub_begin);
        let stop = header.format.time_to_byte_offset(self.begin + sub_end);
        trace!(
            "audio: clip {} read bytes {}..{}",
            self.provider, start, stop
        );
        Ok(SubStream::new(reader, header.data_offset + start, stop - start))
    }

    /// A clip with the same window over a copy of the provider, created in
    /// the same manager.
    pub fn copy(&self, manager: &DataProviderManager) -> AudioResult<Self> {
        let copy = manager.copy_provider(&self.provider)?;
        Ok(self.with_provider(copy.id()))
    }

    /// A clip with the same window over a copy of the provider, created in
    /// `target`.
    pub fn export_to(
        &self,
        manager: &DataProviderManager,
        target: &DataProviderManager,
    ) -> AudioResult<Self> {
        let copy = manager.export_provider(&self.provider, target)?;
        Ok(self.with_provider(copy.id()))
    }

    /// Same window and content-equal providers.
    pub fn content_eq(
        &self,
        manager: &DataProviderManager,
        other: &Clip,
        other_manager: &DataProviderManager,
    ) -> AudioResult<bool> {
        if self.begin != other.begin || self.end != other.end {
            return Ok(false);
        }
        let a = manager.get_provider(&self.provider)?;
        let b = other_manager.get_provider(&other.provider)?;
        Ok(a.content_eq(&b)?)
    }

    /// The same provider under a new window.
    pub(crate) fn with_window(&self, begin: Duration, end: Option<Duration>) -> AudioResult<Self> {
        let limit = self.media_duration;
        let effective = end.unwrap_or(limit);
        if begin > effective || effective > limit {
            return Err(AudioError::out_of_bounds("clip window", begin, effective, limit));
        }
        Ok(Self {
            provider: self.provider.clone(),
            begin,
            end,
            format: self.format,
            media_duration: self.media_duration,
        })
    }

    pub(crate) fn with_provider(&self, provider: ProviderId) -> Self {
        Self {
            provider,
            ..self.clone()
        }
    }

    /// Cuts the clip `rel` into its window. Either side may be empty.
    pub(crate) fn split_at(&self, rel: Duration) -> AudioResult<(Self, Self)> {
        let at = self.begin + rel.min(self.duration());
        Ok((self.with_window(self.begin, Some(at))?, self.with_window(at, self.end)?))
    }
}

fn read_header(manager: &DataProviderManager, id: &ProviderId) -> AudioResult<WaveHeader> {
    let provider = manager.get_provider(id)?;
    let header = parse_riff_wave_header(&mut provider.input_stream()?)?;
    check_payload_len(&header, provider.len()?)?;
    Ok(header)
}

fn check_payload_len(header: &WaveHeader, provider_len: u64) -> AudioResult<()> {
    if header.data_offset + header.data_len > provider_len {
        return Err(AudioError::InvalidDataFormat(format!(
            "header declares {} data bytes at {}, payload has {}",
            header.data_len, header.data_offset, provider_len
        )));
    }
    Ok(())
}

fn raw_duration(header: &WaveHeader) -> Duration {
    header
        .format
        .byte_offset_to_time(header.format.align_down(header.data_len))
}
