//! File-backed provider storage: file naming and content directory moves.

use std::fs;
use std::path::{Component, Path};

use tracing::{debug, warn};

use crate::manager::ManagerState;
use crate::{DataError, DataProviderManager, DataResult, Storage};

/// Returns the file extension used for payloads of a mime type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/x-wav" | "audio/wav" | "audio/wave" => "wav",
        "audio/mpeg" => "mp3",
        "text/plain" => "txt",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        _ => "bin",
    }
}

/// Picks a file name that no provider uses and no file occupies.
pub(crate) fn generate_file_name(state: &mut ManagerState, dir: &Path, mime_type: &str) -> String {
    let ext = extension_for_mime(mime_type);
    loop {
        let name = format!("{:08}.{}", state.next_file_index, ext);
        state.next_file_index += 1;
        let taken = state
            .providers
            .values()
            .any(|p| p.file_name().as_deref() == Some(name.as_str()));
        if !taken && !dir.join(&name).exists() {
            return name;
        }
    }
}

/// Rejects names that would leave the content directory.
pub(crate) fn check_relative_name(name: &str) -> DataResult<()> {
    let path = Path::new(name);
    let plain = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(DataError::Unsupported(format!(
            "file name {name:?} is not relative to the content directory"
        )))
    }
}

impl DataProviderManager {
    /// Moves the content directory to `new_dir`.
    ///
    /// Every payload file is copied first; if one is missing the copies are
    /// removed again and the manager keeps its old directory. With
    /// `delete_source` the old files are removed after the switch.
    pub fn relocate(&self, new_dir: impl AsRef<Path>, delete_source: bool) -> DataResult<()> {
        let new_dir = new_dir.as_ref().to_path_buf();
        let mut state = self.lock();
        let old_dir = match &state.storage {
            Storage::File { content_dir } => content_dir.clone(),
            Storage::Memory => {
                return Err(DataError::Unsupported(
                    "relocating a memory-backed manager".into(),
                ));
            }
        };
        if old_dir == new_dir {
            return Ok(());
        }
        for provider in state.providers.values() {
            if let Some(open) = provider.open_stream() {
                return Err(DataError::StreamAlreadyOpen {
                    id: provider.id(),
                    open,
                });
            }
        }

        fs::create_dir_all(&new_dir)?;
        let mut copied: Vec<String> = Vec::new();
        let rollback = |copied: &[String]| {
            for name in copied {
                let _ = fs::remove_file(new_dir.join(name));
            }
        };
        for provider in state.providers.values() {
            if !provider.is_sealed() {
                continue;
            }
            let Some(name) = provider.file_name() else {
                continue;
            };
            let src = old_dir.join(&name);
            if !src.is_file() {
                rollback(&copied);
                return Err(DataError::DataIsMissing(src.display().to_string()));
            }
            if let Err(e) = fs::copy(&src, new_dir.join(&name)) {
                rollback(&copied);
                return Err(e.into());
            }
            copied.push(name);
        }

        for provider in state.providers.values() {
            provider.set_root(&new_dir);
        }
        state.storage = Storage::File {
            content_dir: new_dir.clone(),
        };
        debug!(
            "data: relocated {} files from {} to {}",
            copied.len(),
            old_dir.display(),
            new_dir.display()
        );

        if delete_source {
            for name in &copied {
                if let Err(e) = fs::remove_file(old_dir.join(name)) {
                    warn!("data: removing {} failed: {}", old_dir.join(name).display(), e);
                }
            }
            let _ = fs::remove_dir(&old_dir);
        }
        Ok(())
    }
}
