//! Utility functions for CLI commands.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use narrata_audio::{NoProgress, Presentation, PresentationConfig, load_config};

use crate::Cli;

/// Gets the presentation configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<PresentationConfig> {
    Ok(load_config(cli.config.as_deref())?)
}

/// Directory that relative content directories are resolved against.
pub fn project_dir(cli: &Cli) -> PathBuf {
    match cli.project.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Opens the project document.
pub fn open_project(cli: &Cli) -> anyhow::Result<Presentation> {
    if !cli.project.exists() {
        anyhow::bail!(
            "project {} not found, create it with 'narrata new'",
            cli.project.display()
        );
    }
    let config = get_config(cli)?;
    let mut presentation = Presentation::new(config, Some(&project_dir(cli)));
    let reader = BufReader::new(File::open(&cli.project)?);
    let ids = presentation.load_into(reader, &mut NoProgress)?;
    tracing::debug!("loaded {} media from {}", ids.len(), cli.project.display());
    Ok(presentation)
}

/// Writes the project document.
pub fn save_project(cli: &Cli, presentation: &Presentation) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(&cli.project)?);
    presentation.save(&mut writer, &mut NoProgress)?;
    writer.flush()?;
    Ok(())
}

/// Path the configuration is saved to.
pub fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(p.clone()),
        None => PresentationConfig::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };
    print!("{}", output);
    Ok(())
}

/// Opens a file for reading with a helpful error.
pub fn open_input(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("cannot open {}: {}", path.display(), e))?;
    Ok(BufReader::new(file))
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Formats bytes to human readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Milliseconds with microsecond precision.
pub fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}
