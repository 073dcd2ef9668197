//! Error types for bundle ingestion.
//!
//! Only [`IngestError`] ever fails an ingestion. [`EntryError`] describes a
//! single member that was dropped; the pipeline logs it and keeps going.

use thiserror::Error;

/// Fatal failure of one ingestion attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The upload is not a readable zip container
    #[error("archive is corrupt: {0}")]
    ArchiveCorrupt(String),
}

/// A member that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("{path}: unreadable: {reason}")]
    Unreadable { path: String, reason: String },
}

impl EntryError {
    pub fn path(&self) -> &str {
        match self {
            EntryError::Unreadable { path, .. } => path,
        }
    }
}
