//! The owning presentation: one provider manager and its audio media.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use narrata_data::{DataProviderManager, ProviderId, ProviderUsage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{PresentationConfig, StorageConfig};
use crate::media::AudioMediaData;
use crate::pcm::PcmFormat;
use crate::{AudioError, AudioResult};

/// Identifier of a media within a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaDataId(u64);

impl MediaDataId {
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MD{:04}", self.0)
    }
}

impl FromStr for MediaDataId {
    type Err = AudioError;

    /// Accepts `MD0003` as well as `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("MD").unwrap_or(s);
        digits
            .parse()
            .map(Self)
            .map_err(|_| AudioError::InvalidArgument(format!("bad media id {s:?}")))
    }
}

/// Registry of the audio media of one presentation.
#[derive(Debug, Default)]
pub struct MediaDataManager {
    media: BTreeMap<MediaDataId, AudioMediaData>,
    next: u64,
}

impl MediaDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `media` under the next free id.
    pub fn insert(&mut self, media: AudioMediaData) -> MediaDataId {
        while self.media.contains_key(&MediaDataId(self.next)) {
            self.next += 1;
        }
        let id = MediaDataId(self.next);
        self.next += 1;
        self.media.insert(id, media);
        id
    }

    /// Registers `media` under `id`. Fails if the id is taken.
    pub fn insert_with_id(&mut self, id: MediaDataId, media: AudioMediaData) -> AudioResult<()> {
        if self.media.contains_key(&id) {
            return Err(AudioError::InvalidArgument(format!("media {id} already exists")));
        }
        self.media.insert(id, media);
        Ok(())
    }

    pub fn contains(&self, id: MediaDataId) -> bool {
        self.media.contains_key(&id)
    }

    pub fn get(&self, id: MediaDataId) -> AudioResult<&AudioMediaData> {
        self.media.get(&id).ok_or(AudioError::UnknownMediaData(id))
    }

    pub fn get_mut(&mut self, id: MediaDataId) -> AudioResult<&mut AudioMediaData> {
        self.media.get_mut(&id).ok_or(AudioError::UnknownMediaData(id))
    }

    pub fn remove(&mut self, id: MediaDataId) -> AudioResult<AudioMediaData> {
        self.media.remove(&id).ok_or(AudioError::UnknownMediaData(id))
    }

    pub fn ids(&self) -> Vec<MediaDataId> {
        self.media.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaDataId, &AudioMediaData)> {
        self.media.iter().map(|(id, m)| (*id, m))
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}

/// A document's audio: the provider manager plus every managed media.
#[derive(Debug)]
pub struct Presentation {
    config: PresentationConfig,
    data: Arc<DataProviderManager>,
    media: MediaDataManager,
}

impl Presentation {
    /// Creates an empty presentation. A relative content directory is
    /// resolved against `base`.
    pub fn new(config: PresentationConfig, base: Option<&Path>) -> Self {
        let data = Arc::new(DataProviderManager::new(config.storage(base)));
        Self {
            config,
            data,
            media: MediaDataManager::new(),
        }
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    pub fn data_provider_manager(&self) -> &Arc<DataProviderManager> {
        &self.data
    }

    pub fn media(&self) -> &MediaDataManager {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut MediaDataManager {
        &mut self.media
    }

    /// Every media the liveness sweep has to respect.
    pub fn list_all_managed_media_data(&self) -> Vec<&AudioMediaData> {
        self.media.iter().map(|(_, m)| m).collect()
    }

    /// Creates an empty media in the configured default format.
    pub fn create_audio_media_data(&mut self) -> AudioResult<MediaDataId> {
        self.create_audio_media_data_with_format(self.config.default_format)
    }

    pub fn create_audio_media_data_with_format(
        &mut self,
        format: PcmFormat,
    ) -> AudioResult<MediaDataId> {
        let media =
            AudioMediaData::with_mime_type(self.data.clone(), format, self.config.mime_type.clone())?;
        let id = self.media.insert(media);
        debug!("audio: created media {} ({})", id, format);
        Ok(id)
    }

    pub fn get(&self, id: MediaDataId) -> AudioResult<&AudioMediaData> {
        self.media.get(id)
    }

    pub fn get_mut(&mut self, id: MediaDataId) -> AudioResult<&mut AudioMediaData> {
        self.media.get_mut(id)
    }

    /// Splits media `id` at `at` and registers the tail as a new media.
    pub fn split_media(&mut self, id: MediaDataId, at: Duration) -> AudioResult<MediaDataId> {
        let tail = self.media.get_mut(id)?.split(at)?;
        Ok(self.media.insert(tail))
    }

    /// Moves all audio of `from` to the end of `into`. `from` stays
    /// registered, empty.
    pub fn merge_media(&mut self, into: MediaDataId, from: MediaDataId) -> AudioResult<()> {
        if into == from {
            return Err(AudioError::InvalidArgument(format!(
                "cannot merge media {into} into itself"
            )));
        }
        self.media.get(into)?;
        let mut source = self.media.remove(from)?;
        let result = self
            .media
            .get_mut(into)
            .and_then(|target| target.merge_with(&mut source));
        self.media.media.insert(from, source);
        result
    }

    /// Unregisters a media. Its providers are left to the liveness sweep.
    pub fn remove_media(&mut self, id: MediaDataId) -> AudioResult<AudioMediaData> {
        self.media.remove(id)
    }

    /// Removes every provider no managed media references.
    pub fn remove_unused_providers(&self, delete: bool) -> AudioResult<Vec<ProviderId>> {
        let removed = self.data.remove_unused_providers(self, delete)?;
        info!("audio: liveness sweep removed {} providers", removed.len());
        Ok(removed)
    }

    /// Moves the content directory and updates the configuration.
    pub fn relocate(&mut self, new_dir: &Path, delete_source: bool) -> AudioResult<()> {
        self.data.relocate(new_dir, delete_source)?;
        self.config.storage = StorageConfig::from(&self.data.storage());
        Ok(())
    }
}

impl ProviderUsage for Presentation {
    fn used_provider_ids(&self) -> BTreeSet<ProviderId> {
        self.list_all_managed_media_data()
            .into_iter()
            .flat_map(|m| m.used_provider_ids())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::{Chunk, SilenceChunk};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn silence(format: PcmFormat, d: u64) -> SilenceChunk {
        SilenceChunk::new(format, ms(d))
    }

    #[test]
    fn test_media_ids() {
        assert_eq!(MediaDataId::new(7).to_string(), "MD0007");
        assert_eq!("MD0012".parse::<MediaDataId>().unwrap(), MediaDataId::new(12));
        assert_eq!("3".parse::<MediaDataId>().unwrap(), MediaDataId::new(3));
        assert!("MDx".parse::<MediaDataId>().is_err());
    }

    #[test]
    fn test_create_and_split() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let id = p.create_audio_media_data().unwrap();
        let format = p.get(id).unwrap().format();
        p.get_mut(id)
            .unwrap()
            .append(&mut silence(format, 300).reader(), None)
            .unwrap();

        let tail = p.split_media(id, ms(100)).unwrap();
        assert_ne!(tail, id);
        assert_eq!(p.get(id).unwrap().duration(), ms(100));
        assert_eq!(p.get(tail).unwrap().duration(), ms(200));
        assert_eq!(p.list_all_managed_media_data().len(), 2);

        p.merge_media(id, tail).unwrap();
        assert_eq!(p.get(id).unwrap().duration(), ms(300));
        assert!(p.get(tail).unwrap().clips().is_empty());
    }

    #[test]
    fn test_merge_errors_keep_media() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let a = p.create_audio_media_data().unwrap();
        let b = p
            .create_audio_media_data_with_format(PcmFormat::MONO_22K)
            .unwrap();
        p.get_mut(b)
            .unwrap()
            .append(&mut silence(PcmFormat::MONO_22K, 50).reader(), None)
            .unwrap();

        assert!(matches!(
            p.merge_media(a, b).unwrap_err(),
            AudioError::InvalidDataFormat(_)
        ));
        assert_eq!(p.get(b).unwrap().duration(), ms(50));
        assert!(p.merge_media(a, a).is_err());
        assert!(matches!(
            p.merge_media(MediaDataId::new(99), b).unwrap_err(),
            AudioError::UnknownMediaData(_)
        ));
        assert!(p.media().contains(b));
    }

    #[test]
    fn test_remove_unused_providers() {
        let mut p = Presentation::new(PresentationConfig::default(), None);
        let a = p.create_audio_media_data().unwrap();
        let b = p.create_audio_media_data().unwrap();
        let format = p.config().default_format;
        for id in [a, b] {
            let m = p.get_mut(id).unwrap();
            m.append(&mut silence(format, 100).reader(), None).unwrap();
            m.append(&mut silence(format, 100).reader(), None).unwrap();
        }
        p.get_mut(a).unwrap().remove(ms(0), Some(ms(100))).unwrap();
        let removed_media = p.remove_media(b).unwrap();
        assert_eq!(p.data_provider_manager().len(), 4);

        let removed = p.remove_unused_providers(true).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(p.data_provider_manager().len(), 1);
        assert_eq!(p.get(a).unwrap().read_all().unwrap().len(), 8820);
        assert!(removed_media.read_all().is_err());
    }
}
