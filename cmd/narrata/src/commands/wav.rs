//! WAV file inspection.

use std::path::PathBuf;

use clap::Args;
use narrata_audio::pcm::parse_riff_wave_header;
use serde::Serialize;

use super::{format_bytes, millis, open_input, output_result};
use crate::Cli;

/// Show the header of a RIFF/WAVE file.
#[derive(Args)]
pub struct WavInfoCommand {
    /// WAV file to inspect
    file: PathBuf,
}

#[derive(Serialize)]
struct WavInfo {
    file: String,
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
    block_align: u16,
    byte_rate: u32,
    data_offset: u64,
    data_bytes: u64,
    data_size: String,
    duration_ms: f64,
}

impl WavInfoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut reader = open_input(&self.file)?;
        let header = parse_riff_wave_header(&mut reader)?;
        let format = header.format;
        let info = WavInfo {
            file: self.file.display().to_string(),
            sample_rate: format.sample_rate(),
            bits_per_sample: format.bits_per_sample(),
            channels: format.channels(),
            block_align: format.block_align(),
            byte_rate: format.byte_rate(),
            data_offset: header.data_offset,
            data_bytes: header.data_len,
            data_size: format_bytes(header.data_len),
            duration_ms: millis(format.byte_offset_to_time(format.align_down(header.data_len))),
        };
        output_result(&info, cli.json)
    }
}
