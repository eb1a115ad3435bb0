//! Data provider and its scoped read/write streams.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{DataError, DataResult, ProviderId, StreamKind};

/// A handle to one stored byte payload.
///
/// Handles are cheap to clone and share the provider state. The owning
/// [`DataProviderManager`](crate::DataProviderManager) decides the lifetime
/// of the payload; a handle kept past `delete` only yields errors.
///
/// # Semantics
///
/// - **Write**: exactly one pass, allowed only while no other stream is open.
///   Closing or dropping the writer seals the provider.
/// - **Read**: any number of readers, refused while the writer is open.
/// - **Delete**: refused while any stream is open.
#[derive(Clone)]
pub struct DataProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    mime_type: String,
    state: Mutex<ProviderState>,
}

struct ProviderState {
    id: ProviderId,
    stage: Stage,
    readers: usize,
    writing: bool,
    backing: Backing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Empty,
    Sealed,
    Deleted,
}

/// Where the payload bytes live.
#[derive(Debug, Clone)]
pub(crate) enum Backing {
    Memory(Bytes),
    File { root: PathBuf, name: String },
}

impl DataProvider {
    pub(crate) fn new(id: ProviderId, mime_type: &str, backing: Backing) -> Self {
        Self::with_stage(id, mime_type, backing, Stage::Empty)
    }

    /// Creates a provider over bytes that already exist.
    pub(crate) fn sealed(id: ProviderId, mime_type: &str, backing: Backing) -> Self {
        Self::with_stage(id, mime_type, backing, Stage::Sealed)
    }

    fn with_stage(id: ProviderId, mime_type: &str, backing: Backing, stage: Stage) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                mime_type: mime_type.to_string(),
                state: Mutex::new(ProviderState {
                    id,
                    stage,
                    readers: 0,
                    writing: false,
                    backing,
                }),
            }),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.inner.state.lock().id.clone()
    }

    pub(crate) fn set_id(&self, id: ProviderId) {
        self.inner.state.lock().id = id;
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    /// Returns true once the single write pass has completed.
    pub fn is_sealed(&self) -> bool {
        self.inner.state.lock().stage == Stage::Sealed
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.state.lock().stage == Stage::Deleted
    }

    /// Returns the kind of stream currently open, if any.
    pub fn open_stream(&self) -> Option<StreamKind> {
        stream_of(&self.inner.state.lock())
    }

    /// Returns true if both handles refer to the same provider.
    pub fn same_provider(&self, other: &DataProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the file name relative to the content directory, for
    /// file-backed providers.
    pub fn file_name(&self) -> Option<String> {
        match &self.inner.state.lock().backing {
            Backing::File { name, .. } => Some(name.clone()),
            Backing::Memory(_) => None,
        }
    }

    pub(crate) fn set_root(&self, new_root: &Path) {
        if let Backing::File { root, .. } = &mut self.inner.state.lock().backing {
            *root = new_root.to_path_buf();
        }
    }

    /// Returns the payload length in bytes. An unwritten provider is empty.
    pub fn len(&self) -> DataResult<u64> {
        let state = self.inner.state.lock();
        match state.stage {
            Stage::Deleted => return Err(DataError::ProviderDeleted(state.id.clone())),
            Stage::Empty => return Ok(0),
            Stage::Sealed => {}
        }
        match &state.backing {
            Backing::Memory(bytes) => Ok(bytes.len() as u64),
            Backing::File { root, name } => {
                let path = root.join(name);
                match fs::metadata(&path) {
                    Ok(meta) => Ok(meta.len()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        Err(DataError::DataIsMissing(path.display().to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    pub fn is_empty(&self) -> DataResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens a read cursor over the payload.
    ///
    /// Fails if the write stream is open or there is no payload.
    pub fn input_stream(&self) -> DataResult<ProviderReader> {
        let mut state = self.inner.state.lock();
        if state.writing {
            return Err(DataError::StreamAlreadyOpen {
                id: state.id.clone(),
                open: StreamKind::Write,
            });
        }
        match state.stage {
            Stage::Deleted => return Err(DataError::ProviderDeleted(state.id.clone())),
            Stage::Empty => {
                return Err(DataError::DataIsMissing(format!(
                    "provider {} has no payload",
                    state.id
                )));
            }
            Stage::Sealed => {}
        }
        let source = match &state.backing {
            Backing::Memory(bytes) => ReadSource::Memory(Cursor::new(bytes.clone())),
            Backing::File { root, name } => {
                let path = root.join(name);
                match File::open(&path) {
                    Ok(file) => ReadSource::File(BufReader::new(file)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(DataError::DataIsMissing(path.display().to_string()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        state.readers += 1;
        Ok(ReadSource::into_reader(source, self.clone()))
    }

    /// Opens the single write pass.
    ///
    /// Fails if any stream is open or the provider was already written.
    pub fn output_stream(&self) -> DataResult<ProviderWriter> {
        let mut state = self.inner.state.lock();
        if let Some(open) = stream_of(&state) {
            return Err(DataError::StreamAlreadyOpen {
                id: state.id.clone(),
                open,
            });
        }
        match state.stage {
            Stage::Deleted => return Err(DataError::ProviderDeleted(state.id.clone())),
            Stage::Sealed => return Err(DataError::ProviderSealed(state.id.clone())),
            Stage::Empty => {}
        }
        let sink = match &state.backing {
            Backing::Memory(_) => WriteSink::Memory(Cursor::new(Vec::new())),
            Backing::File { root, name } => {
                fs::create_dir_all(root)?;
                WriteSink::File(BufWriter::new(File::create(root.join(name))?))
            }
        };
        state.writing = true;
        Ok(ProviderWriter {
            provider: self.clone(),
            sink: Some(sink),
        })
    }

    /// Reads the whole payload.
    pub fn read_all(&self) -> DataResult<Vec<u8>> {
        let mut reader = self.input_stream()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Writes `data` as the single write pass and seals the provider.
    pub fn write_all(&self, data: &[u8]) -> DataResult<()> {
        let mut writer = self.output_stream()?;
        writer.write_all(data)?;
        writer.close()?;
        Ok(())
    }

    /// Compares the payloads of two providers byte by byte.
    pub fn content_eq(&self, other: &DataProvider) -> DataResult<bool> {
        if self.same_provider(other) {
            return Ok(true);
        }
        if self.mime_type() != other.mime_type() || self.len()? != other.len()? {
            return Ok(false);
        }
        let mut a = self.input_stream()?;
        let mut b = other.input_stream()?;
        let mut buf_a = [0u8; 8192];
        let mut buf_b = [0u8; 8192];
        loop {
            let n = fill(&mut a, &mut buf_a)?;
            let m = fill(&mut b, &mut buf_b)?;
            if n != m || buf_a[..n] != buf_b[..m] {
                return Ok(false);
            }
            if n == 0 {
                return Ok(true);
            }
        }
    }

    /// Discards the payload. Refused while any stream is open.
    pub(crate) fn delete(&self) -> DataResult<()> {
        let mut state = self.inner.state.lock();
        if let Some(open) = stream_of(&state) {
            return Err(DataError::StreamAlreadyOpen {
                id: state.id.clone(),
                open,
            });
        }
        if state.stage == Stage::Deleted {
            return Ok(());
        }
        match &mut state.backing {
            Backing::Memory(bytes) => *bytes = Bytes::new(),
            Backing::File { root, name } => match fs::remove_file(root.join(&*name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        state.stage = Stage::Deleted;
        debug!("data: deleted provider {}", state.id);
        Ok(())
    }

    fn release_reader(&self) {
        let mut state = self.inner.state.lock();
        state.readers = state.readers.saturating_sub(1);
    }

    fn finish_write(&self, payload: Option<Bytes>) {
        let mut state = self.inner.state.lock();
        if let Some(bytes) = payload {
            state.backing = Backing::Memory(bytes);
        }
        state.writing = false;
        state.stage = Stage::Sealed;
    }
}

impl fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DataProvider")
            .field("id", &state.id)
            .field("mime_type", &self.inner.mime_type)
            .field("stage", &state.stage)
            .finish()
    }
}

fn stream_of(state: &ProviderState) -> Option<StreamKind> {
    if state.writing {
        Some(StreamKind::Write)
    } else if state.readers > 0 {
        Some(StreamKind::Read)
    } else {
        None
    }
}

/// Reads until `buf` is full or the reader is exhausted.
fn fill(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

enum ReadSource {
    Memory(Cursor<Bytes>),
    File(BufReader<File>),
}

impl ReadSource {
    fn into_reader(self, provider: DataProvider) -> ProviderReader {
        ProviderReader {
            provider,
            source: self,
        }
    }
}

/// Read cursor over a provider's payload.
///
/// The provider counts the reader as open until it is dropped.
pub struct ProviderReader {
    provider: DataProvider,
    source: ReadSource,
}

impl ProviderReader {
    pub fn provider(&self) -> &DataProvider {
        &self.provider
    }
}

impl Read for ProviderReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            ReadSource::Memory(c) => c.read(buf),
            ReadSource::File(f) => f.read(buf),
        }
    }
}

impl Seek for ProviderReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.source {
            ReadSource::Memory(c) => c.seek(pos),
            ReadSource::File(f) => f.seek(pos),
        }
    }
}

impl Drop for ProviderReader {
    fn drop(&mut self) {
        self.provider.release_reader();
    }
}

enum WriteSink {
    Memory(Cursor<Vec<u8>>),
    File(BufWriter<File>),
}

/// The single write pass of a provider.
///
/// [`close`](ProviderWriter::close) seals the provider and reports flush
/// errors. Dropping an unclosed writer seals it as well.
pub struct ProviderWriter {
    provider: DataProvider,
    sink: Option<WriteSink>,
}

impl ProviderWriter {
    pub fn provider(&self) -> &DataProvider {
        &self.provider
    }

    /// Flushes, seals the provider, and returns the payload length.
    pub fn close(mut self) -> DataResult<u64> {
        self.finish()
    }

    fn finish(&mut self) -> DataResult<u64> {
        let Some(sink) = self.sink.take() else {
            return Ok(0);
        };
        match sink {
            WriteSink::Memory(cursor) => {
                let data = Bytes::from(cursor.into_inner());
                let len = data.len() as u64;
                self.provider.finish_write(Some(data));
                Ok(len)
            }
            WriteSink::File(mut w) => {
                let result = w.flush().and_then(|_| w.get_ref().metadata());
                self.provider.finish_write(None);
                Ok(result?.len())
            }
        }
    }

    fn sink(&mut self) -> io::Result<&mut WriteSink> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::other("provider writer is closed"))
    }
}

impl Write for ProviderWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink()? {
            WriteSink::Memory(c) => c.write(buf),
            WriteSink::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink()? {
            WriteSink::Memory(_) => Ok(()),
            WriteSink::File(f) => f.flush(),
        }
    }
}

impl Seek for ProviderWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.sink()? {
            WriteSink::Memory(c) => c.seek(pos),
            WriteSink::File(f) => f.seek(pos),
        }
    }
}

impl Drop for ProviderWriter {
    fn drop(&mut self) {
        if self.sink.is_some() {
            if let Err(e) = self.finish() {
                warn!("data: closing writer of {} failed: {}", self.provider.id(), e);
            }
        }
    }
}
