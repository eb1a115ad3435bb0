//! Data provider manager: the id → provider registry of one presentation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::file;
use crate::provider::Backing;
use crate::{DataError, DataProvider, DataResult, ProviderId};

/// Where a manager keeps provider payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Payloads live in memory.
    Memory,
    /// Each payload is one file under `content_dir`.
    File { content_dir: PathBuf },
}

/// Payload of a provider restored from a saved document.
#[derive(Debug, Clone)]
pub enum StoredData {
    /// The payload bytes themselves.
    Inline(Bytes),
    /// A file name relative to the content directory.
    File(String),
}

/// Creates providers for a mime type.
///
/// Media code never constructs providers directly; it asks a factory.
pub trait DataProviderFactory {
    fn create(&self, mime_type: &str) -> DataResult<DataProvider>;
}

/// Reports which providers are referenced by live media.
pub trait ProviderUsage {
    fn used_provider_ids(&self) -> BTreeSet<ProviderId>;
}

/// Owner of all providers of one presentation.
pub struct DataProviderManager {
    state: Mutex<ManagerState>,
}

pub(crate) struct ManagerState {
    pub(crate) providers: BTreeMap<ProviderId, DataProvider>,
    pub(crate) storage: Storage,
    next_index: u64,
    pub(crate) next_file_index: u64,
}

impl DataProviderManager {
    pub fn new(storage: Storage) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                providers: BTreeMap::new(),
                storage,
                next_index: 0,
                next_file_index: 0,
            }),
        }
    }

    /// Creates a manager that keeps payloads in memory.
    pub fn in_memory() -> Self {
        Self::new(Storage::Memory)
    }

    /// Creates a manager that keeps one file per provider under `dir`.
    pub fn with_content_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Storage::File {
            content_dir: dir.into(),
        })
    }

    pub fn storage(&self) -> Storage {
        self.state.lock().storage.clone()
    }

    pub fn content_dir(&self) -> Option<PathBuf> {
        match &self.state.lock().storage {
            Storage::File { content_dir } => Some(content_dir.clone()),
            Storage::Memory => None,
        }
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, ManagerState> {
        self.state.lock()
    }

    pub fn len(&self) -> usize {
        self.state.lock().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.state.lock().providers.contains_key(id)
    }

    /// Returns all provider ids in order.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.state.lock().providers.keys().cloned().collect()
    }

    /// Returns handles to all providers, ordered by id.
    pub fn providers(&self) -> Vec<DataProvider> {
        self.state.lock().providers.values().cloned().collect()
    }

    /// Resolves an id. Fails if this manager does not own it.
    pub fn get_provider(&self, id: &ProviderId) -> DataResult<DataProvider> {
        self.state
            .lock()
            .providers
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::UnknownProviderId(id.clone()))
    }

    /// Creates an empty provider under the next unused sequential id.
    pub fn add_provider(&self, mime_type: &str) -> DataResult<DataProvider> {
        if mime_type.trim().is_empty() {
            return Err(DataError::MissingArgument("mime type"));
        }
        let mut state = self.state.lock();
        let id = state.next_id();
        let backing = state.new_backing(mime_type)?;
        let provider = DataProvider::new(id.clone(), mime_type, backing);
        state.providers.insert(id.clone(), provider.clone());
        debug!("data: created provider {} ({})", id, mime_type);
        Ok(provider)
    }

    /// Registers a sealed provider under a given id, as read from a saved
    /// document.
    pub fn restore(
        &self,
        id: ProviderId,
        mime_type: &str,
        data: StoredData,
    ) -> DataResult<DataProvider> {
        if mime_type.trim().is_empty() {
            return Err(DataError::MissingArgument("mime type"));
        }
        let mut state = self.state.lock();
        if state.providers.contains_key(&id) {
            return Err(DataError::DuplicateProviderId(id));
        }
        let storage = state.storage.clone();
        let provider = match (data, storage) {
            (StoredData::Inline(bytes), Storage::Memory) => {
                DataProvider::sealed(id.clone(), mime_type, Backing::Memory(bytes))
            }
            (StoredData::Inline(bytes), Storage::File { .. }) => {
                let backing = state.new_backing(mime_type)?;
                let provider = DataProvider::new(id.clone(), mime_type, backing);
                provider.write_all(&bytes)?;
                provider
            }
            (StoredData::File(name), Storage::File { content_dir }) => {
                file::check_relative_name(&name)?;
                let path = content_dir.join(&name);
                if !path.is_file() {
                    return Err(DataError::DataIsMissing(path.display().to_string()));
                }
                let backing = Backing::File {
                    root: content_dir,
                    name,
                };
                DataProvider::sealed(id.clone(), mime_type, backing)
            }
            (StoredData::File(name), Storage::Memory) => {
                return Err(DataError::Unsupported(format!(
                    "file payload {name} in a memory-backed manager"
                )));
            }
        };
        if let Some(next) = id.sequence_index().and_then(|n| n.checked_add(1)) {
            state.next_index = state.next_index.max(next);
        }
        state.providers.insert(id.clone(), provider.clone());
        debug!("data: restored provider {}", id);
        Ok(provider)
    }

    /// Detaches a provider without touching its payload.
    pub fn remove_provider(&self, id: &ProviderId) -> DataResult<DataProvider> {
        self.state
            .lock()
            .providers
            .remove(id)
            .ok_or_else(|| DataError::UnknownProviderId(id.clone()))
    }

    /// Deletes a provider's payload and retires its id.
    pub fn delete_provider(&self, id: &ProviderId) -> DataResult<()> {
        let mut state = self.state.lock();
        let provider = state
            .providers
            .get(id)
            .ok_or_else(|| DataError::UnknownProviderId(id.clone()))?;
        provider.delete()?;
        state.providers.remove(id);
        Ok(())
    }

    /// Re-keys a provider: removes it and adds it again under `new_id`.
    pub fn set_provider_id(&self, id: &ProviderId, new_id: ProviderId) -> DataResult<()> {
        let mut state = self.state.lock();
        if state.providers.contains_key(&new_id) {
            return Err(DataError::DuplicateProviderId(new_id));
        }
        let provider = state
            .providers
            .remove(id)
            .ok_or_else(|| DataError::UnknownProviderId(id.clone()))?;
        provider.set_id(new_id.clone());
        state.providers.insert(new_id, provider);
        Ok(())
    }

    /// Creates a new provider in this manager holding a copy of `id`'s bytes.
    pub fn copy_provider(&self, id: &ProviderId) -> DataResult<DataProvider> {
        let source = self.get_provider(id)?;
        copy_into(&source, self)
    }

    /// Creates a provider in `target` holding a copy of `id`'s bytes.
    pub fn export_provider(
        &self,
        id: &ProviderId,
        target: &DataProviderManager,
    ) -> DataResult<DataProvider> {
        let source = self.get_provider(id)?;
        copy_into(&source, target)
    }

    /// Removes every provider not referenced by `usage`.
    ///
    /// With `delete`, the payloads are discarded as well. Returns the ids
    /// that were removed. If any unused provider has an open stream,
    /// nothing is removed.
    pub fn remove_unused_providers(
        &self,
        usage: &dyn ProviderUsage,
        delete: bool,
    ) -> DataResult<Vec<ProviderId>> {
        let used = usage.used_provider_ids();
        let mut state = self.state.lock();
        let unused: Vec<ProviderId> = state
            .providers
            .keys()
            .filter(|id| !used.contains(*id))
            .cloned()
            .collect();
        for id in &unused {
            if let Some(provider) = state.providers.get(id) {
                if let Some(open) = provider.open_stream() {
                    return Err(DataError::StreamAlreadyOpen {
                        id: id.clone(),
                        open,
                    });
                }
            }
        }
        for id in &unused {
            if delete {
                if let Some(provider) = state.providers.get(id) {
                    provider.delete()?;
                }
            }
            state.providers.remove(id);
        }
        debug!(
            "data: removed {} unused providers (delete={})",
            unused.len(),
            delete
        );
        Ok(unused)
    }
}

impl ManagerState {
    fn next_id(&mut self) -> ProviderId {
        let mut n = self.next_index;
        while self.providers.contains_key(&ProviderId::sequential(n)) {
            n += 1;
        }
        self.next_index = n + 1;
        ProviderId::sequential(n)
    }

    fn new_backing(&mut self, mime_type: &str) -> DataResult<Backing> {
        match self.storage.clone() {
            Storage::Memory => Ok(Backing::Memory(Bytes::new())),
            Storage::File { content_dir } => {
                let name = file::generate_file_name(self, &content_dir, mime_type);
                Ok(Backing::File {
                    root: content_dir,
                    name,
                })
            }
        }
    }
}

impl DataProviderFactory for DataProviderManager {
    fn create(&self, mime_type: &str) -> DataResult<DataProvider> {
        self.add_provider(mime_type)
    }
}

impl Default for DataProviderManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for DataProviderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DataProviderManager")
            .field("storage", &state.storage)
            .field("providers", &state.providers.len())
            .finish()
    }
}

fn copy_into(source: &DataProvider, target: &DataProviderManager) -> DataResult<DataProvider> {
    let mut reader = source.input_stream()?;
    let copy = target.create(source.mime_type())?;
    let result = copy
        .output_stream()
        .and_then(|mut w| {
            std::io::copy(&mut reader, &mut w)?;
            w.close()
        });
    if let Err(e) = result {
        if let Err(cleanup) = target.delete_provider(&copy.id()) {
            warn!("data: discarding copy {} failed: {}", copy.id(), cleanup);
        }
        return Err(e);
    }
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uses(BTreeSet<ProviderId>);

    impl ProviderUsage for Uses {
        fn used_provider_ids(&self) -> BTreeSet<ProviderId> {
            self.0.clone()
        }
    }

    #[test]
    fn test_sequential_ids() {
        let m = DataProviderManager::in_memory();
        let a = m.create("audio/x-wav").unwrap();
        let b = m.create("audio/x-wav").unwrap();
        assert_eq!(a.id().as_str(), "DPID0000");
        assert_eq!(b.id().as_str(), "DPID0001");
        assert_eq!(m.len(), 2);
        assert!(m.get_provider(&a.id()).unwrap().same_provider(&a));
    }

    #[test]
    fn test_unknown_id() {
        let m = DataProviderManager::in_memory();
        let id = ProviderId::sequential(9);
        assert!(matches!(
            m.get_provider(&id),
            Err(DataError::UnknownProviderId(_))
        ));
        assert!(matches!(
            m.remove_provider(&id),
            Err(DataError::UnknownProviderId(_))
        ));
    }

    #[test]
    fn test_empty_mime_rejected() {
        let m = DataProviderManager::in_memory();
        assert!(matches!(
            m.create(""),
            Err(DataError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_next_id_skips_restored() {
        let m = DataProviderManager::in_memory();
        m.restore(
            ProviderId::sequential(0),
            "audio/x-wav",
            StoredData::Inline(Bytes::from_static(b"x")),
        )
        .unwrap();
        m.restore(
            ProviderId::sequential(5),
            "audio/x-wav",
            StoredData::Inline(Bytes::from_static(b"y")),
        )
        .unwrap();
        let next = m.create("audio/x-wav").unwrap();
        assert_eq!(next.id(), ProviderId::sequential(6));
    }

    #[test]
    fn test_restore_duplicate() {
        let m = DataProviderManager::in_memory();
        let id = ProviderId::new("voice").unwrap();
        m.restore(id.clone(), "audio/x-wav", StoredData::Inline(Bytes::new()))
            .unwrap();
        assert!(matches!(
            m.restore(id, "audio/x-wav", StoredData::Inline(Bytes::new())),
            Err(DataError::DuplicateProviderId(_))
        ));
    }

    #[test]
    fn test_restored_provider_is_sealed() {
        let m = DataProviderManager::in_memory();
        let p = m
            .restore(
                ProviderId::sequential(0),
                "audio/x-wav",
                StoredData::Inline(Bytes::from_static(b"payload")),
            )
            .unwrap();
        assert!(p.is_sealed());
        assert_eq!(p.read_all().unwrap(), b"payload");
    }

    #[test]
    fn test_set_provider_id() {
        let m = DataProviderManager::in_memory();
        let p = m.create("audio/x-wav").unwrap();
        let old = p.id();
        let new = ProviderId::new("renamed").unwrap();
        m.set_provider_id(&old, new.clone()).unwrap();
        assert!(!m.contains(&old));
        assert_eq!(m.get_provider(&new).unwrap().id(), new);

        let other = m.create("audio/x-wav").unwrap();
        assert!(matches!(
            m.set_provider_id(&other.id(), new),
            Err(DataError::DuplicateProviderId(_))
        ));
    }

    #[test]
    fn test_copy_and_export() {
        let m = DataProviderManager::in_memory();
        let p = m.create("audio/x-wav").unwrap();
        p.write_all(b"content").unwrap();

        let copy = m.copy_provider(&p.id()).unwrap();
        assert_ne!(copy.id(), p.id());
        assert!(copy.content_eq(&p).unwrap());

        let other = DataProviderManager::in_memory();
        let exported = m.export_provider(&p.id(), &other).unwrap();
        assert_eq!(exported.id().as_str(), "DPID0000");
        assert!(other.contains(&exported.id()));
        assert!(exported.content_eq(&p).unwrap());
    }

    #[test]
    fn test_remove_unused_providers() {
        let m = DataProviderManager::in_memory();
        let keep = m.create("audio/x-wav").unwrap();
        let drop_me = m.create("audio/x-wav").unwrap();
        keep.write_all(b"k").unwrap();
        drop_me.write_all(b"d").unwrap();

        let usage = Uses([keep.id()].into_iter().collect());
        let removed = m.remove_unused_providers(&usage, true).unwrap();

        assert_eq!(removed, vec![drop_me.id()]);
        assert!(m.contains(&keep.id()));
        assert!(!m.contains(&drop_me.id()));
        assert!(drop_me.is_deleted());
        assert!(!keep.is_deleted());
    }

    #[test]
    fn test_delete_provider_refused_while_reading() {
        let m = DataProviderManager::in_memory();
        let p = m.create("audio/x-wav").unwrap();
        p.write_all(b"x").unwrap();
        let r = p.input_stream().unwrap();
        assert!(m.delete_provider(&p.id()).is_err());
        assert!(m.contains(&p.id()));
        drop(r);
        m.delete_provider(&p.id()).unwrap();
        assert!(!m.contains(&p.id()));
    }

    #[test]
    fn test_restore_largest_sequential_id() {
        let m = DataProviderManager::in_memory();
        let last = ProviderId::sequential(u64::MAX);
        m.restore(last.clone(), "audio/x-wav", StoredData::Inline(Bytes::new()))
            .unwrap();
        assert!(m.contains(&last));
        assert_eq!(m.create("audio/x-wav").unwrap().id(), ProviderId::sequential(0));
    }

    #[test]
    fn test_remove_unused_refused_while_reading() {
        let m = DataProviderManager::in_memory();
        let providers: Vec<DataProvider> = (0..3)
            .map(|i| {
                let p = m.create("audio/x-wav").unwrap();
                p.write_all(&[i]).unwrap();
                p
            })
            .collect();
        let reader = providers[2].input_stream().unwrap();

        let usage = Uses(BTreeSet::new());
        assert!(matches!(
            m.remove_unused_providers(&usage, true),
            Err(DataError::StreamAlreadyOpen { .. })
        ));
        assert_eq!(m.len(), 3);
        assert!(providers.iter().all(|p| !p.is_deleted()));

        drop(reader);
        assert_eq!(m.remove_unused_providers(&usage, true).unwrap().len(), 3);
        assert!(m.is_empty());
    }

    #[test]
    fn test_failed_export_leaves_no_provider() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let m = DataProviderManager::in_memory();
        let p = m.create("audio/x-wav").unwrap();
        p.write_all(b"content").unwrap();

        let target = DataProviderManager::with_content_dir(&not_a_dir);
        assert!(m.export_provider(&p.id(), &target).is_err());
        assert!(target.is_empty());
    }
}
