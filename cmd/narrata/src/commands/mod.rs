//! CLI commands module.

mod media;
mod project;
mod util;
mod wav;

pub use media::{DefragCommand, ExportCommand, ImportCommand};
pub use project::{GcCommand, InfoCommand, NewCommand, RelocateCommand};
pub use wav::WavInfoCommand;

pub(crate) use util::*;
