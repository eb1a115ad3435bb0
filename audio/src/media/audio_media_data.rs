//! The splicing engine: one logical audio track as an ordered clip list.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Duration;

use narrata_data::{
    DataProvider, DataProviderFactory, DataProviderManager, MIME_AUDIO_WAV, ProviderId,
    ProviderUsage,
};
use tracing::{debug, warn};

use super::clip::Clip;
use super::composed::ComposedStream;
use super::events::{AudioMediaEvent, EventEmitter, SubscriptionId};
use crate::pcm::{PcmFormat, parse_riff_wave_header, write_riff_wave_header};
use crate::{AudioError, AudioResult};

const COPY_BUF_LEN: usize = 64 * 1024;

/// An ordered, gap-free sequence of clips addressed as one audio track.
///
/// Every edit builds the new clip list on the side and swaps it in only
/// after all steps succeeded. Providers created by a failed edit are
/// deleted again. Listeners are notified after the swap.
#[derive(Debug)]
pub struct AudioMediaData {
    manager: Arc<DataProviderManager>,
    format: PcmFormat,
    mime_type: String,
    clips: Vec<Clip>,
    events: EventEmitter,
}

impl AudioMediaData {
    /// Creates an empty media whose audio is stored as `audio/x-wav`.
    pub fn new(manager: Arc<DataProviderManager>, format: PcmFormat) -> Self {
        Self {
            manager,
            format,
            mime_type: MIME_AUDIO_WAV.to_string(),
            clips: Vec::new(),
            events: EventEmitter::default(),
        }
    }

    /// Creates an empty media storing its providers under `mime_type`.
    pub fn with_mime_type(
        manager: Arc<DataProviderManager>,
        format: PcmFormat,
        mime_type: impl Into<String>,
    ) -> AudioResult<Self> {
        let mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            return Err(AudioError::MissingArgument("mime type"));
        }
        Ok(Self {
            mime_type,
            ..Self::new(manager, format)
        })
    }

    pub(crate) fn from_clips(
        manager: Arc<DataProviderManager>,
        format: PcmFormat,
        mime_type: String,
        clips: Vec<Clip>,
    ) -> AudioResult<Self> {
        if let Some(clip) = clips.iter().find(|c| !c.format().is_compatible_with(&format)) {
            return Err(AudioError::InvalidDataFormat(format!(
                "clip over {} holds {}, media is {}",
                clip.provider_id(),
                clip.format(),
                format
            )));
        }
        let clips = clips.into_iter().filter(|c| !c.duration().is_zero()).collect();
        Ok(Self {
            manager,
            format,
            mime_type,
            clips,
            events: EventEmitter::default(),
        })
    }

    pub fn manager(&self) -> &Arc<DataProviderManager> {
        &self.manager
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Changes the PCM format. Only allowed while the media holds no clips.
    pub fn set_pcm_format(&mut self, format: PcmFormat) -> AudioResult<()> {
        if format == self.format {
            return Ok(());
        }
        if !self.clips.is_empty() {
            return Err(AudioError::InvalidDataFormat(format!(
                "cannot change format from {} to {} once audio was added",
                self.format, format
            )));
        }
        self.format = format;
        self.events.emit(AudioMediaEvent::FormatChanged { format });
        Ok(())
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Sum of the clip durations.
    pub fn duration(&self) -> Duration {
        total_duration(&self.clips)
    }

    /// Number of PCM bytes a full read returns.
    pub fn pcm_length_in_bytes(&self) -> u64 {
        self.clips.iter().map(Clip::byte_len).sum()
    }

    pub fn has_actual_data(&self) -> bool {
        !self.clips.is_empty()
    }

    /// Registers a listener for committed edits.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&AudioMediaEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Stores raw PCM from `reader` in a new provider and appends it.
    ///
    /// With `duration`, exactly that much audio is read; otherwise the
    /// reader is drained and a trailing partial frame is dropped. Returns
    /// the duration that was added.
    pub fn append(
        &mut self,
        reader: &mut dyn Read,
        duration: Option<Duration>,
    ) -> AudioResult<Duration> {
        let limit = duration.map(|d| self.format.time_to_byte_offset(d));
        self.append_bytes(reader, limit)
    }

    /// Appends the payload of a RIFF/WAVE stream in this media's format.
    pub fn append_riff_wave(&mut self, reader: &mut dyn Read) -> AudioResult<Duration> {
        let header = parse_riff_wave_header(reader)?;
        if !header.format.is_compatible_with(&self.format) {
            return Err(AudioError::InvalidDataFormat(format!(
                "wave holds {}, media is {}",
                header.format, self.format
            )));
        }
        self.append_bytes(reader, Some(header.format.align_down(header.data_len)))
    }

    fn append_bytes(
        &mut self,
        reader: &mut dyn Read,
        limit: Option<u64>,
    ) -> AudioResult<Duration> {
        let at = self.duration();
        let Some(clip) = self.store_pcm(reader, limit)? else {
            return Ok(Duration::ZERO);
        };
        let added = clip.duration();
        self.clips.push(clip);
        debug!("audio: appended {:?} at {:?}", added, at);
        self.events.emit(AudioMediaEvent::AudioInserted { at, duration: added });
        Ok(added)
    }

    /// Stores raw PCM from `reader` and inserts it at `at`.
    ///
    /// A clip straddling `at` is split around the new audio. Inserting at
    /// the end appends.
    pub fn insert(
        &mut self,
        reader: &mut dyn Read,
        at: Duration,
        duration: Option<Duration>,
    ) -> AudioResult<Duration> {
        let total = self.duration();
        if at > total {
            return Err(AudioError::out_of_bounds("insert", at, at, total));
        }
        let (head, tail) = cut(&self.clips, at)?;
        let limit = duration.map(|d| self.format.time_to_byte_offset(d));
        let Some(clip) = self.store_pcm(reader, limit)? else {
            return Ok(Duration::ZERO);
        };
        let added = clip.duration();
        self.clips = join(head, [clip], tail);
        debug!("audio: inserted {:?} at {:?}", added, at);
        self.events.emit(AudioMediaEvent::AudioInserted { at, duration: added });
        Ok(added)
    }

    /// Removes `[begin, end)`. `end` of `None` removes to the end.
    pub fn remove(&mut self, begin: Duration, end: Option<Duration>) -> AudioResult<()> {
        let end = self.check_range("remove", begin, end)?;
        if begin == end {
            return Ok(());
        }
        self.clips = remove_range(&self.clips, begin, end)?;
        debug!(
            "audio: removed {:?}..{:?}, {} clips left",
            begin,
            end,
            self.clips.len()
        );
        self.events.emit(AudioMediaEvent::AudioRemoved {
            at: begin,
            duration: end - begin,
        });
        Ok(())
    }

    /// Replaces `[begin, end)` with PCM from `reader` in one edit.
    pub fn replace(
        &mut self,
        reader: &mut dyn Read,
        begin: Duration,
        end: Duration,
        duration: Option<Duration>,
    ) -> AudioResult<Duration> {
        let end = self.check_range("replace", begin, Some(end))?;
        let remaining = remove_range(&self.clips, begin, end)?;
        let (head, tail) = cut(&remaining, begin)?;
        let limit = duration.map(|d| self.format.time_to_byte_offset(d));
        let clip = self.store_pcm(reader, limit)?;
        let added = clip.as_ref().map_or(Duration::ZERO, Clip::duration);
        self.clips = join(head, clip, tail);
        debug!("audio: replaced {:?}..{:?} by {:?}", begin, end, added);
        if end > begin {
            self.events.emit(AudioMediaEvent::AudioRemoved {
                at: begin,
                duration: end - begin,
            });
        }
        if !added.is_zero() {
            self.events.emit(AudioMediaEvent::AudioInserted {
                at: begin,
                duration: added,
            });
        }
        Ok(added)
    }

    /// Removes every clip. Providers are left to the liveness sweep.
    pub fn clear(&mut self) {
        if self.clips.is_empty() {
            return;
        }
        let duration = self.duration();
        self.clips.clear();
        self.events.emit(AudioMediaEvent::AudioRemoved {
            at: Duration::ZERO,
            duration,
        });
    }

    /// Opens one stream over the PCM of `[begin, end)`.
    pub fn read(&self, begin: Duration, end: Option<Duration>) -> AudioResult<ComposedStream> {
        let end = self.check_range("read", begin, end)?;
        if begin == end {
            return Ok(ComposedStream::empty());
        }
        let (_, rest) = cut(&self.clips, begin)?;
        let (window, _) = cut(&rest, end - begin)?;
        let parts = window
            .iter()
            .map(|clip| clip.read(&self.manager, Duration::ZERO, None))
            .collect::<AudioResult<Vec<_>>>()?;
        Ok(ComposedStream::new(parts))
    }

    /// Reads the whole track into memory.
    pub fn read_all(&self) -> AudioResult<Vec<u8>> {
        let mut stream = self.read(Duration::ZERO, None)?;
        let mut buf = Vec::with_capacity(stream.len() as usize);
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Moves everything at and after `at` into a new media.
    pub fn split(&mut self, at: Duration) -> AudioResult<AudioMediaData> {
        let total = self.duration();
        if at > total {
            return Err(AudioError::out_of_bounds("split", at, at, total));
        }
        let (head, tail) = cut(&self.clips, at)?;
        let mut tail_media = Self::new(self.manager.clone(), self.format);
        tail_media.mime_type = self.mime_type.clone();
        tail_media.clips = tail;
        self.clips = head;

        let moved = tail_media.duration();
        debug!("audio: split at {:?}, moved {:?}", at, moved);
        if !moved.is_zero() {
            self.events.emit(AudioMediaEvent::AudioRemoved { at, duration: moved });
            tail_media.events.emit(AudioMediaEvent::AudioInserted {
                at: Duration::ZERO,
                duration: moved,
            });
        }
        Ok(tail_media)
    }

    /// Appends all of `other`'s audio and empties `other`.
    ///
    /// Providers of a media from another manager are exported into this
    /// media's manager first. Incompatible formats leave both unchanged.
    pub fn merge_with(&mut self, other: &mut AudioMediaData) -> AudioResult<()> {
        if !self.format.is_compatible_with(&other.format) {
            return Err(AudioError::InvalidDataFormat(format!(
                "cannot merge {} into {}",
                other.format, self.format
            )));
        }
        let clips = if Arc::ptr_eq(&self.manager, &other.manager) {
            other.clips.clone()
        } else {
            export_clips(&other.clips, &other.manager, &self.manager)?
        };
        let at = self.duration();
        let added = total_duration(&clips);
        self.clips.extend(clips);
        other.clips.clear();

        debug!("audio: merged {:?} at {:?}", added, at);
        if !added.is_zero() {
            self.events.emit(AudioMediaEvent::AudioInserted { at, duration: added });
            other.events.emit(AudioMediaEvent::AudioRemoved {
                at: Duration::ZERO,
                duration: added,
            });
        }
        Ok(())
    }

    /// Rewrites the whole track into one fresh provider.
    pub fn defragment(&mut self) -> AudioResult<()> {
        if self.clips.is_empty() {
            return Ok(());
        }
        let expected = self.pcm_length_in_bytes();
        let mut stream = self.read(Duration::ZERO, None)?;
        let clip = self.store_pcm(&mut stream, Some(expected))?;
        drop(stream);
        let before = self.clips.len();
        self.clips = clip.into_iter().collect();
        debug!("audio: defragmented {} clips into {}", before, self.clips.len());
        Ok(())
    }

    /// Deep copy: every referenced provider is duplicated once.
    pub fn copy(&self) -> AudioResult<AudioMediaData> {
        self.export_to(self.manager.clone())
    }

    /// Deep copy into `target`.
    pub fn export_to(&self, target: Arc<DataProviderManager>) -> AudioResult<AudioMediaData> {
        let clips = export_clips(&self.clips, &self.manager, &target)?;
        let mut copy = Self::new(target, self.format);
        copy.mime_type = self.mime_type.clone();
        copy.clips = clips;
        Ok(copy)
    }

    pub fn used_provider_ids(&self) -> BTreeSet<ProviderId> {
        self.clips.iter().map(|c| c.provider_id().clone()).collect()
    }

    /// Same format and clip-wise equal windows over equal payloads.
    pub fn content_eq(&self, other: &AudioMediaData) -> AudioResult<bool> {
        if !self.format.is_compatible_with(&other.format) || self.clips.len() != other.clips.len() {
            return Ok(false);
        }
        for (a, b) in self.clips.iter().zip(&other.clips) {
            if !a.content_eq(&self.manager, b, &other.manager)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_range(
        &self,
        what: &'static str,
        begin: Duration,
        end: Option<Duration>,
    ) -> AudioResult<Duration> {
        let total = self.duration();
        let end = end.unwrap_or(total);
        if begin > end || end > total {
            return Err(AudioError::out_of_bounds(what, begin, end, total));
        }
        Ok(end)
    }

    /// Writes `reader` as a RIFF/WAVE payload into a new provider and
    /// returns a clip spanning it. Nothing is kept for empty input.
    fn store_pcm(&self, reader: &mut dyn Read, limit: Option<u64>) -> AudioResult<Option<Clip>> {
        let provider = self.manager.create(&self.mime_type)?;
        let id = provider.id();
        let written = match write_wave(&provider, reader, &self.format, limit) {
            Ok(n) => n,
            Err(e) => {
                discard(&self.manager, &id);
                return Err(e);
            }
        };
        if written == 0 {
            discard(&self.manager, &id);
            return Ok(None);
        }
        match Clip::whole(&self.manager, id.clone()) {
            Ok(clip) => Ok(Some(clip)),
            Err(e) => {
                discard(&self.manager, &id);
                Err(e)
            }
        }
    }
}

impl ProviderUsage for AudioMediaData {
    fn used_provider_ids(&self) -> BTreeSet<ProviderId> {
        AudioMediaData::used_provider_ids(self)
    }
}

fn total_duration(clips: &[Clip]) -> Duration {
    clips.iter().map(Clip::duration).sum()
}

/// Splits a clip list at `at`. Zero-length pieces are dropped.
fn cut(clips: &[Clip], at: Duration) -> AudioResult<(Vec<Clip>, Vec<Clip>)> {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut start = Duration::ZERO;
    for clip in clips {
        let duration = clip.duration();
        if start + duration <= at {
            head.push(clip.clone());
        } else if start >= at {
            tail.push(clip.clone());
        } else {
            let (before, after) = clip.split_at(at - start)?;
            head.extend(Some(before).filter(|c| !c.duration().is_zero()));
            tail.extend(Some(after).filter(|c| !c.duration().is_zero()));
        }
        start += duration;
    }
    Ok((head, tail))
}

fn remove_range(clips: &[Clip], begin: Duration, end: Duration) -> AudioResult<Vec<Clip>> {
    let (head, rest) = cut(clips, begin)?;
    let (_, tail) = cut(&rest, end - begin)?;
    let mut clips = head;
    clips.extend(tail);
    Ok(clips)
}

fn join(head: Vec<Clip>, middle: impl IntoIterator<Item = Clip>, tail: Vec<Clip>) -> Vec<Clip> {
    let mut clips = head;
    clips.extend(middle);
    clips.extend(tail);
    clips
}

/// Copies the providers behind `clips` into `target`, once per provider.
fn export_clips(
    clips: &[Clip],
    source: &DataProviderManager,
    target: &DataProviderManager,
) -> AudioResult<Vec<Clip>> {
    let mut copies: BTreeMap<ProviderId, ProviderId> = BTreeMap::new();
    let mut out = Vec::with_capacity(clips.len());
    for clip in clips {
        let id = clip.provider_id();
        if let Some(copy) = copies.get(id) {
            out.push(clip.with_provider(copy.clone()));
            continue;
        }
        match source.export_provider(id, target) {
            Ok(copy) => {
                copies.insert(id.clone(), copy.id());
                out.push(clip.with_provider(copy.id()));
            }
            Err(e) => {
                for copy in copies.values() {
                    discard(target, copy);
                }
                return Err(e.into());
            }
        }
    }
    Ok(out)
}

fn discard(manager: &DataProviderManager, id: &ProviderId) {
    if let Err(e) = manager.delete_provider(id) {
        warn!("audio: discarding provider {} failed: {}", id, e);
    }
}

fn write_wave(
    provider: &DataProvider,
    reader: &mut dyn Read,
    format: &PcmFormat,
    limit: Option<u64>,
) -> AudioResult<u64> {
    let mut w = provider.output_stream()?;
    write_riff_wave_header(&mut w, format, 0)?;
    let written = match limit {
        Some(n) => {
            let written = copy_frames(&mut reader.take(n), &mut w, format)?;
            if written < n {
                return Err(AudioError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("pcm stream ended after {written} of {n} bytes"),
                )));
            }
            written
        }
        None => copy_frames(reader, &mut w, format)?,
    };
    w.seek(SeekFrom::Start(0))?;
    write_riff_wave_header(&mut w, format, written)?;
    w.close()?;
    Ok(written)
}

/// Copies whole frames only; a trailing partial frame is dropped.
fn copy_frames<R, W>(r: &mut R, w: &mut W, format: &PcmFormat) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUF_LEN];
    let mut filled = 0;
    let mut written = 0u64;
    loop {
        let n = match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        filled += n;
        let whole = format.align_down(filled as u64) as usize;
        w.write_all(&buf[..whole])?;
        buf.copy_within(whole..filled, 0);
        filled -= whole;
        written += whole as u64;
    }
    Ok(written)
}
