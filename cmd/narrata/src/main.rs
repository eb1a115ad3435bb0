//! Narrata CLI - maintenance tool for audio asset projects.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    DefragCommand, ExportCommand, GcCommand, ImportCommand, InfoCommand, NewCommand,
    RelocateCommand, WavInfoCommand,
};

/// Narrata CLI - inspect and edit the audio of a project document.
///
/// A project is a JSON document listing data providers and audio media.
/// With file storage, payloads live in a content directory next to the
/// document. Settings are read from ~/.narrata/config.yaml unless --config
/// is given.
#[derive(Parser)]
#[command(name = "narrata")]
#[command(about = "Audio asset store maintenance tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.narrata/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project document
    #[arg(short = 'p', long, global = true, default_value = "narrata.json")]
    pub project: PathBuf,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the header of a RIFF/WAVE file
    WavInfo(WavInfoCommand),
    /// Create an empty project
    New(NewCommand),
    /// Append or insert audio into a media
    Import(ImportCommand),
    /// Write a media (or a range of it) as a WAV file
    Export(ExportCommand),
    /// List providers and media of a project
    Info(InfoCommand),
    /// Remove providers no media references
    Gc(GcCommand),
    /// Rewrite media into one provider each
    Defrag(DefragCommand),
    /// Move the content directory
    Relocate(RelocateCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::WavInfo(cmd) => cmd.run(&cli),
        Commands::New(cmd) => cmd.run(&cli),
        Commands::Import(cmd) => cmd.run(&cli),
        Commands::Export(cmd) => cmd.run(&cli),
        Commands::Info(cmd) => cmd.run(&cli),
        Commands::Gc(cmd) => cmd.run(&cli),
        Commands::Defrag(cmd) => cmd.run(&cli),
        Commands::Relocate(cmd) => cmd.run(&cli),
    }
}
