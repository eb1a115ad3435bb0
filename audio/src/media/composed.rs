//! Bounded and concatenated read views over provider payloads.

use std::io::{self, Read, Seek, SeekFrom};

use narrata_data::ProviderReader;

/// A window `[start, start + len)` of one provider's payload.
///
/// Holds the provider's read stream open until dropped.
pub struct SubStream {
    inner: ProviderReader,
    start: u64,
    len: u64,
    pos: u64,
    synced: bool,
}

impl SubStream {
    pub(crate) fn new(inner: ProviderReader, start: u64, len: u64) -> Self {
        Self {
            inner,
            start,
            len,
            pos: 0,
            synced: false,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for SubStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        if !self.synced {
            self.inner.seek(SeekFrom::Start(self.start + self.pos))?;
            self.synced = true;
        }
        let want = (self.len - self.pos).min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "provider {} ended {} bytes early",
                    self.inner.provider().id(),
                    self.len - self.pos
                ),
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SubStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let next = seek_target(pos, self.pos, self.len)?;
        if next != self.pos {
            self.pos = next;
            self.synced = false;
        }
        Ok(self.pos)
    }
}

/// Read-only concatenation of several sub-streams.
///
/// Serves one audio read across clips without copying payloads.
pub struct ComposedStream {
    parts: Vec<SubStream>,
    offsets: Vec<u64>,
    len: u64,
    pos: u64,
}

impl ComposedStream {
    pub fn new(parts: Vec<SubStream>) -> Self {
        let parts: Vec<SubStream> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        let mut offsets = Vec::with_capacity(parts.len());
        let mut len = 0;
        for part in &parts {
            offsets.push(len);
            len += part.len();
        }
        Self {
            parts,
            offsets,
            len,
            pos: 0,
        }
    }

    /// A stream with no bytes.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of underlying byte ranges.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

impl Read for ComposedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let index = self.offsets.partition_point(|&o| o <= self.pos) - 1;
        let rel = self.pos - self.offsets[index];
        let part = &mut self.parts[index];
        if part.position() != rel {
            part.seek(SeekFrom::Start(rel))?;
        }
        let n = part.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ComposedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(pos, self.pos, self.len)?;
        Ok(self.pos)
    }
}

fn seek_target(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::Current(d) => current.checked_add_signed(d),
        SeekFrom::End(d) => len.checked_add_signed(d),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrata_data::{DataProvider, DataProviderFactory, DataProviderManager};

    fn provider(manager: &DataProviderManager, data: &[u8]) -> DataProvider {
        let p = manager.create("application/octet-stream").unwrap();
        p.write_all(data).unwrap();
        p
    }

    #[test]
    fn test_sub_stream_window() {
        let manager = DataProviderManager::in_memory();
        let p = provider(&manager, b"0123456789");

        let mut sub = SubStream::new(p.input_stream().unwrap(), 2, 5);
        let mut out = String::new();
        sub.read_to_string(&mut out).unwrap();
        assert_eq!(out, "23456");

        sub.seek(SeekFrom::Start(3)).unwrap();
        out.clear();
        sub.read_to_string(&mut out).unwrap();
        assert_eq!(out, "56");
        assert!(sub.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn test_sub_stream_short_provider() {
        let manager = DataProviderManager::in_memory();
        let p = provider(&manager, b"0123");

        let mut sub = SubStream::new(p.input_stream().unwrap(), 2, 5);
        let mut out = Vec::new();
        let err = sub.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_composed_stream() {
        let manager = DataProviderManager::in_memory();
        let a = provider(&manager, b"aaaaXXXX");
        let b = provider(&manager, b"YYbbbb");

        let mut stream = ComposedStream::new(vec![
            SubStream::new(a.input_stream().unwrap(), 0, 4),
            SubStream::new(a.input_stream().unwrap(), 0, 0),
            SubStream::new(b.input_stream().unwrap(), 2, 4),
            SubStream::new(a.input_stream().unwrap(), 4, 2),
        ]);
        assert_eq!(stream.len(), 10);
        assert_eq!(stream.part_count(), 3);

        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "aaaabbbbXX");

        stream.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abb");

        stream.seek(SeekFrom::End(-1)).unwrap();
        out.clear();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "X");
    }

    #[test]
    fn test_composed_stream_releases_readers() {
        let manager = DataProviderManager::in_memory();
        let a = provider(&manager, b"abc");

        let stream = ComposedStream::new(vec![SubStream::new(a.input_stream().unwrap(), 0, 3)]);
        assert!(a.open_stream().is_some());
        drop(stream);
        assert!(a.open_stream().is_none());
    }

    #[test]
    fn test_empty() {
        let mut stream = ComposedStream::empty();
        assert!(stream.is_empty());
        let mut out = Vec::new();
        assert_eq!(stream.read_to_end(&mut out).unwrap(), 0);
    }
}

impl std::fmt::Debug for SubStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubStream")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ComposedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedStream")
            .field("parts", &self.parts)
            .field("offsets", &self.offsets)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish()
    }
}
