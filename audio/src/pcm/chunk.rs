//! Audio chunk types: in-memory PCM sources for a given format.

use std::io::{self, Read, Write};
use std::time::Duration;

use super::PcmFormat;

/// A chunk of audio data.
pub trait Chunk {
    /// Returns the length of the audio data in bytes.
    fn len(&self) -> u64;

    /// Returns true if the chunk is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the audio format of this chunk.
    fn format(&self) -> PcmFormat;

    /// Returns the duration covered by the chunk.
    fn duration(&self) -> Duration {
        self.format().byte_offset_to_time(self.len())
    }

    /// Writes the audio data to the writer.
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64>;

    /// Returns a reader over the audio data.
    fn reader(&self) -> Box<dyn Read + '_>;
}

/// A chunk of raw audio data.
#[derive(Debug, Clone)]
pub struct DataChunk {
    data: Vec<u8>,
    format: PcmFormat,
}

impl DataChunk {
    /// Creates a new data chunk. Trailing bytes of a partial frame are
    /// dropped.
    pub fn new(format: PcmFormat, mut data: Vec<u8>) -> Self {
        data.truncate(format.align_down(data.len() as u64) as usize);
        Self { data, format }
    }

    /// Creates a chunk from interleaved 16-bit samples.
    pub fn from_samples(format: PcmFormat, samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(format, data)
    }

    /// Creates a square-wave tone of `duration`, useful as a recognizable
    /// test signal. Samples are little-endian two's complement, sign
    /// extended or truncated to the format's depth.
    pub fn tone(format: PcmFormat, duration: Duration, period_frames: u64, amplitude: i16) -> Self {
        let len = format.time_to_byte_offset(duration);
        let sample_bytes = (format.bits_per_sample() / 8) as usize;
        let period = period_frames.max(2);
        let mut data = Vec::with_capacity(len as usize);
        for i in 0..format.frames(len) {
            let v = if (i % period) < period / 2 { amplitude } else { -amplitude };
            let sample = (v as i32).to_le_bytes();
            let fill = if v < 0 { 0xff } else { 0 };
            for _ in 0..format.channels() {
                for b in 0..sample_bytes {
                    data.push(*sample.get(b).unwrap_or(&fill));
                }
            }
        }
        Self::new(format, data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the chunk and returns the underlying data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl Chunk for DataChunk {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        w.write_all(&self.data)?;
        Ok(self.data.len() as u64)
    }

    fn reader(&self) -> Box<dyn Read + '_> {
        Box::new(self.data.as_slice())
    }
}

/// A chunk that produces silence of a specified duration.
#[derive(Debug, Clone)]
pub struct SilenceChunk {
    duration: Duration,
    len: u64,
    format: PcmFormat,
}

impl SilenceChunk {
    /// Creates a new silence chunk with the given format and duration.
    pub fn new(format: PcmFormat, duration: Duration) -> Self {
        let len = format.time_to_byte_offset(duration);
        Self {
            duration,
            len,
            format,
        }
    }

    /// Returns the requested duration of the silence.
    pub fn requested_duration(&self) -> Duration {
        self.duration
    }
}

/// Static buffer of zeros for writing silence efficiently.
static EMPTY_BYTES: [u8; 32000] = [0u8; 32000];

impl Chunk for SilenceChunk {
    fn len(&self) -> u64 {
        self.len
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        let mut remaining = self.len;
        let mut written = 0u64;

        while remaining > 0 {
            let to_write = remaining.min(EMPTY_BYTES.len() as u64) as usize;
            w.write_all(&EMPTY_BYTES[..to_write])?;
            written += to_write as u64;
            remaining -= to_write as u64;
        }

        Ok(written)
    }

    fn reader(&self) -> Box<dyn Read + '_> {
        Box::new(io::repeat(0).take(self.len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_chunk_drops_partial_frame() {
        let chunk = DataChunk::new(PcmFormat::CD_STEREO, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_from_samples() {
        let chunk = DataChunk::from_samples(PcmFormat::CD_MONO, &[1, -1]);
        assert_eq!(chunk.as_bytes(), &[1, 0, 0xff, 0xff]);
    }

    #[test]
    fn test_silence_chunk() {
        let format = PcmFormat::CD_MONO;
        let chunk = SilenceChunk::new(format, Duration::from_millis(1000));

        assert_eq!(chunk.len(), 88200);
        assert_eq!(chunk.format(), format);
        assert_eq!(chunk.duration(), Duration::from_secs(1));

        let mut buf = Vec::new();
        chunk.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 88200);
        assert!(buf.iter().all(|&b| b == 0));

        let mut read = Vec::new();
        chunk.reader().read_to_end(&mut read).unwrap();
        assert_eq!(read, buf);
    }

    #[test]
    fn test_tone() {
        let format = PcmFormat::CD_MONO;
        let tone = DataChunk::tone(format, Duration::from_millis(500), 100, 1000);
        assert_eq!(tone.len(), 44100);
        assert_eq!(tone.duration(), Duration::from_millis(500));
        assert!(tone.as_bytes().iter().any(|&b| b != 0));

        let stereo = DataChunk::tone(PcmFormat::CD_STEREO, Duration::from_millis(10), 8, 500);
        assert_eq!(stereo.len(), 1764);
        assert_eq!(&stereo.as_bytes()[0..2], &stereo.as_bytes()[2..4]);
    }
}
