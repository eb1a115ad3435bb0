//! RIFF/WAVE header codec.
//!
//! The canonical header written here is 44 bytes:
//!
//! ```text
//! [4B "RIFF"] [4B 36 + dataSize] [4B "WAVE"]
//! [4B "fmt "] [4B 16] [2B format=1] [2B channels]
//! [4B sampleRate] [4B byteRate] [2B blockAlign] [2B bitsPerSample]
//! [4B "data"] [4B dataSize]
//! ```
//!
//! All multi-byte values are little-endian. The parser also accepts
//! extra chunks between `fmt ` and `data`, and a longer `fmt ` chunk.

use std::io::{self, Read, Write};

use super::PcmFormat;
use crate::{AudioError, AudioResult};

/// Length of the canonical header.
pub const RIFF_WAVE_HEADER_LEN: u64 = 44;

const WAVE_FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// What a parsed header says about its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    pub format: PcmFormat,
    /// Declared length of the `data` chunk.
    pub data_len: u64,
    /// Offset of the first PCM byte from the start of the stream.
    pub data_offset: u64,
}

/// Reads a RIFF/WAVE header up to the first PCM byte.
///
/// On success the reader is positioned at `data_offset`.
pub fn parse_riff_wave_header<R: Read + ?Sized>(r: &mut R) -> AudioResult<WaveHeader> {
    let mut id = [0u8; 4];
    read_exact(r, &mut id)?;
    if &id != b"RIFF" {
        return Err(invalid(format!("expected RIFF, got {:?}", id)));
    }
    let riff_len = read_u32(r)? as u64;
    read_exact(r, &mut id)?;
    if &id != b"WAVE" {
        return Err(invalid(format!("expected WAVE, got {:?}", id)));
    }

    let mut offset: u64 = 12;
    let mut format: Option<PcmFormat> = None;
    loop {
        read_exact(r, &mut id)?;
        let chunk_len = read_u32(r)?;
        offset += 8;
        match &id {
            b"fmt " => {
                if chunk_len < FMT_CHUNK_LEN {
                    return Err(invalid(format!("fmt chunk too short: {chunk_len}")));
                }
                format = Some(read_fmt(r)?);
                skip(r, padded(chunk_len) - FMT_CHUNK_LEN as u64)?;
                offset += padded(chunk_len);
            }
            b"data" => {
                let Some(format) = format else {
                    return Err(invalid("data chunk before fmt chunk".into()));
                };
                let data_len = chunk_len as u64;
                if offset + data_len > riff_len + 8 {
                    return Err(invalid(format!(
                        "data chunk of {data_len} bytes exceeds RIFF length {riff_len}"
                    )));
                }
                return Ok(WaveHeader {
                    format,
                    data_len,
                    data_offset: offset,
                });
            }
            _ => {
                skip(r, padded(chunk_len))?;
                offset += padded(chunk_len);
            }
        }
        if offset > riff_len + 8 {
            return Err(invalid(format!(
                "chunks extend past RIFF length {riff_len}"
            )));
        }
    }
}

/// Writes the canonical 44-byte header for `data_len` payload bytes.
pub fn write_riff_wave_header<W: Write + ?Sized>(
    w: &mut W,
    format: &PcmFormat,
    data_len: u64,
) -> AudioResult<()> {
    let data_len = u32::try_from(data_len)
        .ok()
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(|| invalid(format!("{data_len} bytes do not fit a RIFF/WAVE file")))?;
    w.write_all(&riff_wave_header(format, data_len))?;
    Ok(())
}

/// Builds the canonical header bytes.
pub fn riff_wave_header(format: &PcmFormat, data_len: u32) -> [u8; 44] {
    let mut h = [0u8; 44];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36u32.wrapping_add(data_len)).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    h[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    h[22..24].copy_from_slice(&format.channels().to_le_bytes());
    h[24..28].copy_from_slice(&format.sample_rate().to_le_bytes());
    h[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    h[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    h[34..36].copy_from_slice(&format.bits_per_sample().to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

fn read_fmt<R: Read + ?Sized>(r: &mut R) -> AudioResult<PcmFormat> {
    let tag = read_u16(r)?;
    if tag != WAVE_FORMAT_PCM {
        return Err(invalid(format!("format tag {tag:#06x} is not PCM")));
    }
    let channels = read_u16(r)?;
    let sample_rate = read_u32(r)?;
    let byte_rate = read_u32(r)?;
    let block_align = read_u16(r)?;
    let bits = read_u16(r)?;

    let format = PcmFormat::new(sample_rate, bits, channels)?;
    if format.block_align() != block_align || format.byte_rate() != byte_rate {
        return Err(invalid(format!(
            "inconsistent fmt chunk: block align {block_align}, byte rate {byte_rate} for {format}"
        )));
    }
    Ok(format)
}

fn padded(len: u32) -> u64 {
    len as u64 + (len as u64 & 1)
}

fn invalid(msg: String) -> AudioError {
    AudioError::InvalidDataFormat(msg)
}

fn read_exact<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> AudioResult<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => invalid("truncated RIFF/WAVE header".into()),
        _ => AudioError::Io(e),
    })
}

fn read_u16<R: Read + ?Sized>(r: &mut R) -> AudioResult<u16> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read + ?Sized>(r: &mut R) -> AudioResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn skip<R: Read + ?Sized>(r: &mut R, n: u64) -> AudioResult<()> {
    let skipped = io::copy(&mut r.take(n), &mut io::sink())?;
    if skipped < n {
        return Err(invalid("truncated RIFF/WAVE chunk".into()));
    }
    Ok(())
}
