//! Media editing commands.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use narrata_audio::pcm::{
    Chunk, PcmFormat, SilenceChunk, parse_riff_wave_header, write_riff_wave_header,
};
use narrata_audio::{AudioMediaData, MediaDataId, Presentation};

use super::{millis, open_input, open_project, print_info, print_success, save_project};
use crate::Cli;

/// Append or insert audio into a media.
#[derive(Args)]
pub struct ImportCommand {
    /// WAV file to import
    #[arg(required_unless_present = "silence_ms", conflicts_with = "silence_ms")]
    file: Option<PathBuf>,

    /// Import this many milliseconds of silence instead of a file
    #[arg(long)]
    silence_ms: Option<u64>,

    /// Target media, e.g. MD0001 (default: a new media)
    #[arg(short, long)]
    media: Option<MediaDataId>,

    /// Insert at this offset in milliseconds instead of appending
    #[arg(long)]
    at_ms: Option<u64>,
}

impl ImportCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut presentation = open_project(cli)?;

        let (id, added, total) = match (&self.file, self.silence_ms) {
            (Some(path), _) => {
                let mut reader = open_input(path)?;
                let header = parse_riff_wave_header(&mut reader)?;
                let id = self.target(&mut presentation, header.format)?;
                let media = presentation.get_mut(id)?;
                if !media.format().is_compatible_with(&header.format) {
                    anyhow::bail!(
                        "{} holds {}, media {} is {}",
                        path.display(),
                        header.format,
                        id,
                        media.format()
                    );
                }
                let duration = header
                    .format
                    .byte_offset_to_time(header.format.align_down(header.data_len));
                let added = self.put(media, &mut reader, Some(duration))?;
                (id, added, media.duration())
            }
            (None, Some(ms)) => {
                let format = presentation.config().default_format;
                let id = self.target(&mut presentation, format)?;
                let media = presentation.get_mut(id)?;
                let silence = SilenceChunk::new(media.format(), Duration::from_millis(ms));
                let added = self.put(media, &mut silence.reader(), None)?;
                (id, added, media.duration())
            }
            (None, None) => anyhow::bail!("nothing to import, give a file or --silence-ms"),
        };

        save_project(cli, &presentation)?;
        print_success(&format!(
            "added {:.3} ms to {}, now {:.3} ms",
            millis(added),
            id,
            millis(total)
        ));
        Ok(())
    }

    fn target(
        &self,
        presentation: &mut Presentation,
        format: PcmFormat,
    ) -> anyhow::Result<MediaDataId> {
        match self.media {
            Some(id) => {
                presentation.get(id)?;
                Ok(id)
            }
            None => Ok(presentation.create_audio_media_data_with_format(format)?),
        }
    }

    fn put(
        &self,
        media: &mut AudioMediaData,
        reader: &mut dyn Read,
        duration: Option<Duration>,
    ) -> anyhow::Result<Duration> {
        let added = match self.at_ms {
            Some(at) => media.insert(reader, Duration::from_millis(at), duration)?,
            None => media.append(reader, duration)?,
        };
        Ok(added)
    }
}

/// Write a media (or a range of it) as a WAV file.
#[derive(Args)]
pub struct ExportCommand {
    /// Media to export, e.g. MD0001
    media: MediaDataId,

    /// Output WAV file
    #[arg(short, long)]
    output: PathBuf,

    /// Start of the range in milliseconds
    #[arg(long, default_value_t = 0)]
    begin_ms: u64,

    /// End of the range in milliseconds (default: end of media)
    #[arg(long)]
    end_ms: Option<u64>,
}

impl ExportCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let presentation = open_project(cli)?;
        let media = presentation.get(self.media)?;
        let mut stream = media.read(
            Duration::from_millis(self.begin_ms),
            self.end_ms.map(Duration::from_millis),
        )?;

        let mut writer = BufWriter::new(File::create(&self.output)?);
        write_riff_wave_header(&mut writer, &media.format(), stream.len())?;
        let copied = io::copy(&mut stream, &mut writer)?;
        writer.flush()?;

        print_success(&format!(
            "wrote {} PCM bytes of {} to {}",
            copied,
            self.media,
            self.output.display()
        ));
        Ok(())
    }
}

/// Rewrite media into one provider each.
#[derive(Args)]
pub struct DefragCommand {
    /// Media to defragment (default: all)
    media: Option<MediaDataId>,
}

impl DefragCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut presentation = open_project(cli)?;
        let ids = match self.media {
            Some(id) => vec![id],
            None => presentation.media().ids(),
        };
        for id in &ids {
            presentation.get_mut(*id)?.defragment()?;
        }
        save_project(cli, &presentation)?;
        print_success(&format!("defragmented {} media", ids.len()));
        print_info("old providers are kept until 'narrata gc'");
        Ok(())
    }
}
