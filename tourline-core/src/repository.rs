use serde::{Deserialize, Serialize};

/// A stored document together with the revision it was read at.
///
/// Writers hand the revision back on update; the store rejects the write with
/// [`StoreError::RevisionConflict`] if anyone else wrote in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub revision: u64,
    pub value: T,
}

impl<T> Versioned<T> {
    pub fn new(revision: u64, value: T) -> Self {
        Self { revision, value }
    }
}

/// Persistence failures, shared by every document store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Revision conflict on {id}: expected revision {expected}")]
    RevisionConflict {
        id: String,
        expected: u64,
    },

    #[error("Document could not be decoded: {0}")]
    Decode(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::RevisionConflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
