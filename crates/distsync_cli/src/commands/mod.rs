//! CLI command implementations.

pub mod init;
pub mod inspect;
pub mod prompt;
pub mod sync;

use clap::ValueEnum;
use std::path::PathBuf;
use thiserror::Error;

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON on stdout.
    Json,
}

/// Errors raised by the CLI itself, before the engine runs.
#[derive(Debug, Error)]
pub enum CliError {
    /// A store file is missing.
    #[error("no store at {}; create it with `distsync init --path {}`", .path.display(), .path.display())]
    MissingStore {
        /// The missing file.
        path: PathBuf,
    },
}
