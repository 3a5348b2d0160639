//! Application error type

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the `spiraw` binary
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad, missing or contradictory command line input
    #[error("{0}")]
    Usage(String),

    /// Bus session or adapter failure
    #[error(transparent)]
    Core(#[from] spiraw_core::Error),

    /// File access failure
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Adapter selection or option parsing failure
    #[error("{0}")]
    Adapter(String),

    /// The SIGINT handler could not be installed
    #[error("Failed to install interrupt handler: {0}")]
    Interrupt(String),
}

impl AppError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for the binary
pub type Result<T> = std::result::Result<T, AppError>;
