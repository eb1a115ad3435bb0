//! Saving and loading a presentation's audio.
//!
//! The document is JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "providers": [
//!     { "id": "DPID0000", "mime_type": "audio/x-wav", "file": "00000000.wav" },
//!     { "id": "DPID0001", "mime_type": "audio/x-wav", "data": "UklGRi..." }
//!   ],
//!   "media": [
//!     {
//!       "id": 0,
//!       "format": { "sample_rate": 44100, "bits_per_sample": 16, "channels": 1 },
//!       "mime_type": "audio/x-wav",
//!       "clips": [
//!         { "provider": "DPID0000", "clip_begin_ns": 0, "clip_end_ns": 500000000 },
//!         { "provider": "DPID0001", "clip_begin_ns": 0 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Providers are inlined as base64 for memory storage and referenced by a
//! file name relative to the content directory for file storage. A clip
//! without `clip_end_ns` is tied to the end of its provider.

use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use narrata_data::{MIME_AUDIO_WAV, ProviderId, Storage, StoredData};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::media::{AudioMediaData, Clip};
use crate::pcm::PcmFormat;
use crate::presentation::{MediaDataId, Presentation};
use crate::{AudioError, AudioResult};

/// Version written into saved documents.
pub const DOCUMENT_VERSION: u32 = 1;

/// Receives progress at element boundaries of a save or load.
///
/// Returning `false` cancels the operation with [`AudioError::Cancelled`].
pub trait Progress {
    fn step(&mut self, done: usize, total: usize) -> bool;
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn step(&mut self, _done: usize, _total: usize) -> bool {
        true
    }
}

impl<F> Progress for F
where
    F: FnMut(usize, usize) -> bool,
{
    fn step(&mut self, done: usize, total: usize) -> bool {
        self(done, total)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    providers: Vec<ProviderRecord>,
    #[serde(default)]
    media: Vec<MediaRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProviderRecord {
    id: ProviderId,
    mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Base64Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaRecord {
    id: MediaDataId,
    format: PcmFormat,
    #[serde(default = "default_mime_type")]
    mime_type: String,
    #[serde(default)]
    clips: Vec<ClipRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClipRecord {
    provider: ProviderId,
    clip_begin_ns: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clip_end_ns: Option<i64>,
}

fn default_mime_type() -> String {
    MIME_AUDIO_WAV.to_string()
}

/// Provider bytes, serialized as standard base64.
#[derive(Clone, PartialEq, Eq)]
struct Base64Payload(Vec<u8>);

impl fmt::Debug for Base64Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base64Payload({} bytes)", self.0.len())
    }
}

impl Serialize for Base64Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.as_bytes())
            .map(Base64Payload)
            .map_err(serde::de::Error::custom)
    }
}

impl Presentation {
    /// Writes every provider and media as one document.
    ///
    /// Nothing is written if the save is cancelled or fails.
    pub fn save(&self, writer: impl Write, progress: &mut dyn Progress) -> AudioResult<()> {
        let data = self.data_provider_manager();
        let providers = data.providers();
        let total = providers.len() + self.media().len();
        let inline = data.storage() == Storage::Memory;
        let mut done = 0;

        let mut doc = Document {
            version: DOCUMENT_VERSION,
            providers: Vec::with_capacity(providers.len()),
            media: Vec::with_capacity(self.media().len()),
        };
        for provider in providers {
            check(progress, done, total)?;
            done += 1;
            if !provider.is_sealed() {
                warn!("audio: skipping unwritten provider {}", provider.id());
                continue;
            }
            let (data, file) = if inline {
                (Some(Base64Payload(provider.read_all()?)), None)
            } else {
                (None, provider.file_name())
            };
            doc.providers.push(ProviderRecord {
                id: provider.id(),
                mime_type: provider.mime_type().to_string(),
                data,
                file,
            });
        }
        for (id, media) in self.media().iter() {
            check(progress, done, total)?;
            done += 1;
            doc.media.push(MediaRecord {
                id,
                format: media.format(),
                mime_type: media.mime_type().to_string(),
                clips: media
                    .clips()
                    .iter()
                    .map(clip_record)
                    .collect::<AudioResult<_>>()?,
            });
        }
        check(progress, done, total)?;

        serde_json::to_writer_pretty(writer, &doc)?;
        debug!(
            "audio: saved {} providers and {} media",
            doc.providers.len(),
            doc.media.len()
        );
        Ok(())
    }

    /// Loads a document into this presentation and returns the ids of the
    /// loaded media.
    ///
    /// A media is registered only after all its clips resolved. On failure
    /// or cancellation, providers and media loaded before the failing
    /// element stay in place.
    pub fn load_into(
        &mut self,
        reader: impl Read,
        progress: &mut dyn Progress,
    ) -> AudioResult<Vec<MediaDataId>> {
        let doc: Document = serde_json::from_reader(reader)?;
        if doc.version != DOCUMENT_VERSION {
            return Err(AudioError::SerializationFailed(format!(
                "unsupported document version {}",
                doc.version
            )));
        }
        let total = doc.providers.len() + doc.media.len();
        let mut done = 0;

        for record in doc.providers {
            check(progress, done, total)?;
            done += 1;
            let stored = match (record.data, record.file) {
                (Some(data), None) => StoredData::Inline(Bytes::from(data.0)),
                (None, Some(file)) => StoredData::File(file),
                _ => {
                    return Err(AudioError::SerializationFailed(format!(
                        "provider {} needs exactly one of data and file",
                        record.id
                    )));
                }
            };
            self.data_provider_manager()
                .restore(record.id, &record.mime_type, stored)?;
        }

        let mut loaded = Vec::with_capacity(doc.media.len());
        for record in doc.media {
            check(progress, done, total)?;
            done += 1;
            if self.media().contains(record.id) {
                return Err(AudioError::SerializationFailed(format!(
                    "duplicate media {}",
                    record.id
                )));
            }
            let manager = self.data_provider_manager().clone();
            let clips = record
                .clips
                .into_iter()
                .map(|c| {
                    let begin = duration_from_nanos(c.clip_begin_ns)?;
                    let end = c.clip_end_ns.map(duration_from_nanos).transpose()?;
                    Clip::open(&manager, c.provider, begin, end)
                })
                .collect::<AudioResult<Vec<_>>>()?;
            let media = AudioMediaData::from_clips(manager, record.format, record.mime_type, clips)?;
            self.media_mut().insert_with_id(record.id, media)?;
            loaded.push(record.id);
        }
        check(progress, done, total)?;

        debug!("audio: loaded {} media", loaded.len());
        Ok(loaded)
    }
}

fn check(progress: &mut dyn Progress, done: usize, total: usize) -> AudioResult<()> {
    if progress.step(done, total) {
        Ok(())
    } else {
        Err(AudioError::Cancelled)
    }
}

fn clip_record(clip: &Clip) -> AudioResult<ClipRecord> {
    Ok(ClipRecord {
        provider: clip.provider_id().clone(),
        clip_begin_ns: duration_to_nanos(clip.clip_begin())?,
        clip_end_ns: clip.clip_end().map(duration_to_nanos).transpose()?,
    })
}

fn duration_to_nanos(d: Duration) -> AudioResult<i64> {
    i64::try_from(d.as_nanos())
        .map_err(|_| AudioError::SerializationFailed(format!("{d:?} does not fit 64-bit nanoseconds")))
}

fn duration_from_nanos(ns: i64) -> AudioResult<Duration> {
    u64::try_from(ns)
        .map(Duration::from_nanos)
        .map_err(|_| AudioError::NegativeTimeOffset(format!("{ns} ns")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PresentationConfig, StorageConfig};
    use crate::pcm::{Chunk, DataChunk};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn sample(p: &mut Presentation) -> MediaDataId {
        let id = p.create_audio_media_data().unwrap();
        let format = p.config().default_format;
        let m = p.get_mut(id).unwrap();
        m.append(&mut DataChunk::tone(format, ms(100), 20, 900).reader(), None)
            .unwrap();
        m.insert(&mut DataChunk::tone(format, ms(30), 8, 300).reader(), ms(40), None)
            .unwrap();
        id
    }

    fn save_to_vec(p: &Presentation) -> Vec<u8> {
        let mut out = Vec::new();
        p.save(&mut out, &mut NoProgress).unwrap();
        out
    }

    #[test]
    fn test_memory_round_trip() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let id = sample(&mut p);
        let doc = save_to_vec(&p);

        let mut loaded = Presentation::new(PresentationConfig::default(), None);
        let ids = loaded.load_into(doc.as_slice(), &mut NoProgress).unwrap();
        assert_eq!(ids, vec![id]);

        let (a, b) = (p.get(id).unwrap(), loaded.get(id).unwrap());
        assert_eq!(a.clips(), b.clips());
        assert_eq!(a.read_all().unwrap(), b.read_all().unwrap());
        assert!(a.content_eq(b).unwrap());
        assert_eq!(loaded.data_provider_manager().len(), 2);
    }

    #[test]
    fn test_tied_end_is_absent() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        sample(&mut p);
        let json: serde_json::Value = serde_json::from_slice(&save_to_vec(&p)).unwrap();
        let clips = json["media"][0]["clips"].as_array().unwrap();
        assert_eq!(clips.len(), 3);
        assert_eq!(clips[0]["clip_end_ns"], 40_000_000);
        assert!(clips[1].get("clip_end_ns").is_none());
        assert!(clips[2].get("clip_end_ns").is_none());
        assert_eq!(clips[2]["clip_begin_ns"], 40_000_000);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = PresentationConfig {
            storage: StorageConfig::File {
                content_dir: "content".into(),
            },
            ..PresentationConfig::default()
        };
        let mut p = Presentation::new(config.clone(), Some(dir.path()));
        let id = sample(&mut p);
        let doc = save_to_vec(&p);
        let json: serde_json::Value = serde_json::from_slice(&doc).unwrap();
        assert!(json["providers"][0]["file"].is_string());
        assert!(json["providers"][0].get("data").is_none());

        let mut loaded = Presentation::new(config, Some(dir.path()));
        loaded.load_into(doc.as_slice(), &mut NoProgress).unwrap();
        assert_eq!(
            loaded.get(id).unwrap().read_all().unwrap(),
            p.get(id).unwrap().read_all().unwrap()
        );
    }

    #[test]
    fn test_negative_time() {
        let doc = r#"{
            "version": 1,
            "providers": [],
            "media": [{
                "id": 0,
                "format": {"sample_rate": 44100, "bits_per_sample": 16, "channels": 1},
                "clips": [{"provider": "DPID0000", "clip_begin_ns": -5}]
            }]
        }"#;
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let err = p.load_into(doc.as_bytes(), &mut NoProgress).unwrap_err();
        assert!(matches!(err, AudioError::NegativeTimeOffset(_)));
        assert!(p.media().is_empty());
    }

    #[test]
    fn test_unknown_provider() {
        let doc = r#"{
            "version": 1,
            "media": [{
                "id": 0,
                "format": {"sample_rate": 44100, "bits_per_sample": 16, "channels": 1},
                "clips": [{"provider": "DPID0004", "clip_begin_ns": 0}]
            }]
        }"#;
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let err = p.load_into(doc.as_bytes(), &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            AudioError::Data(narrata_data::DataError::UnknownProviderId(_))
        ));
    }

    #[test]
    fn test_malformed_documents() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        for doc in [
            "{",
            r#"{"version": 2}"#,
            r#"{"version": 1, "providers": [{"id": "DPID0000", "mime_type": "audio/x-wav"}]}"#,
            r#"{"version": 1, "providers": [{"id": "DPID0000", "mime_type": "audio/x-wav", "data": "!!"}]}"#,
        ] {
            let err = p.load_into(doc.as_bytes(), &mut NoProgress).unwrap_err();
            assert!(
                matches!(err, AudioError::SerializationFailed(_)),
                "{doc}: {err}"
            );
        }
    }

    #[test]
    fn test_duplicate_ids() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        sample(&mut p);
        let doc = save_to_vec(&p);

        let err = p.load_into(doc.as_slice(), &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            AudioError::Data(narrata_data::DataError::DuplicateProviderId(_))
        ));
    }

    #[test]
    fn test_cancel_keeps_completed_media() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let first = sample(&mut p);
        let second = sample(&mut p);
        let doc = save_to_vec(&p);

        // 4 providers, then the first media; cancel before the second
        let mut loaded = Presentation::new(PresentationConfig::default(), None);
        let mut stop_before_second_media = |done: usize, _total: usize| done < 5;
        let err = loaded
            .load_into(doc.as_slice(), &mut stop_before_second_media)
            .unwrap_err();
        assert!(matches!(err, AudioError::Cancelled));
        assert!(loaded.media().contains(first));
        assert!(!loaded.media().contains(second));
        assert_eq!(
            loaded.get(first).unwrap().read_all().unwrap(),
            p.get(first).unwrap().read_all().unwrap()
        );
    }

    #[test]
    fn test_cancel_save_writes_nothing() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        sample(&mut p);
        let mut out = Vec::new();
        let err = p.save(&mut out, &mut |_: usize, _: usize| false).unwrap_err();
        assert!(matches!(err, AudioError::Cancelled));
        assert!(out.is_empty());
    }
}
