use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("this program must be run as root")]
    NotRoot,

    #[error("unsupported host operating system: {0}, a Debian-family system is required")]
    UnsupportedOs(String),

    #[error("insufficient free disk space: {available} bytes available, {required} required")]
    InsufficientDiskSpace { available: u64, required: u64 },

    #[error("exec {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("backup archive not found: {}", .0.display())]
    BackupNotFound(PathBuf),

    #[error("failed to render the deployment descriptor")]
    Render(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
