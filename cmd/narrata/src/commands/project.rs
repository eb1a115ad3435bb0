//! Project-level commands.

use std::path::PathBuf;

use clap::Args;
use narrata_audio::Presentation;
use narrata_data::{ProviderUsage, Storage};
use serde::Serialize;

use super::{
    config_path, format_bytes, get_config, millis, open_project, output_result, print_success,
    project_dir, save_project,
};
use crate::Cli;

/// Create an empty project.
#[derive(Args)]
pub struct NewCommand {
    /// Overwrite an existing project document
    #[arg(long)]
    force: bool,
}

impl NewCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        if cli.project.exists() && !self.force {
            anyhow::bail!(
                "project {} already exists, use --force to overwrite",
                cli.project.display()
            );
        }
        let presentation = Presentation::new(get_config(cli)?, Some(&project_dir(cli)));
        save_project(cli, &presentation)?;
        print_success(&format!("created {}", cli.project.display()));
        Ok(())
    }
}

/// List providers and media of a project.
#[derive(Args)]
pub struct InfoCommand {}

#[derive(Serialize)]
struct ProjectInfo {
    project: String,
    storage: String,
    providers: usize,
    unused_providers: usize,
    media: Vec<MediaInfo>,
}

#[derive(Serialize)]
struct MediaInfo {
    id: String,
    format: String,
    duration_ms: f64,
    clips: usize,
    providers: usize,
    bytes: u64,
    size: String,
}

impl InfoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let presentation = open_project(cli)?;
        let data = presentation.data_provider_manager();
        let used = presentation.used_provider_ids();

        let info = ProjectInfo {
            project: cli.project.display().to_string(),
            storage: match data.storage() {
                Storage::Memory => "inline".to_string(),
                Storage::File { content_dir } => content_dir.display().to_string(),
            },
            providers: data.len(),
            unused_providers: data.provider_ids().iter().filter(|id| !used.contains(*id)).count(),
            media: presentation
                .media()
                .iter()
                .map(|(id, media)| MediaInfo {
                    id: id.to_string(),
                    format: media.format().to_string(),
                    duration_ms: millis(media.duration()),
                    clips: media.clips().len(),
                    providers: media.used_provider_ids().len(),
                    bytes: media.pcm_length_in_bytes(),
                    size: format_bytes(media.pcm_length_in_bytes()),
                })
                .collect(),
        };
        output_result(&info, cli.json)
    }
}

/// Remove providers no media references.
#[derive(Args)]
pub struct GcCommand {
    /// Only detach unused providers, keep their files
    #[arg(long)]
    keep_files: bool,
}

impl GcCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let presentation = open_project(cli)?;
        let removed = presentation.remove_unused_providers(!self.keep_files)?;
        save_project(cli, &presentation)?;
        print_success(&format!("removed {} unused providers", removed.len()));
        Ok(())
    }
}

/// Move the content directory.
#[derive(Args)]
pub struct RelocateCommand {
    /// New content directory
    dir: PathBuf,

    /// Keep the files in the old directory
    #[arg(long)]
    keep_source: bool,
}

impl RelocateCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut presentation = open_project(cli)?;
        presentation.relocate(&self.dir, !self.keep_source)?;

        let path = config_path(cli)?;
        presentation.config().save(&path)?;
        save_project(cli, &presentation)?;
        print_success(&format!(
            "content moved to {}, settings saved to {}",
            self.dir.display(),
            path.display()
        ));
        Ok(())
    }
}
