//! Error taxonomy for the ingestion pipeline.
//!
//! Per-page problems never reach this type: the archive walker absorbs them
//! and counts them. Everything here is either a whole-archive failure (the
//! orchestrator logs and skips the archive) or a build-level failure that
//! aborts before or after processing.

use std::path::PathBuf;

use table_rag_core::table::ExtractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid build configuration, reported before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The archive could not be opened or one of its members could not be read.
    #[error("failed to read archive {}: {message}", .archive.display())]
    ArchiveRead { archive: PathBuf, message: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Synthetic document rendering or read-back failed.
    #[error("render error: {0}")]
    Render(String),

    /// The index backend rejected the node handoff.
    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub fn archive(archive: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::ArchiveRead {
            archive: archive.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
