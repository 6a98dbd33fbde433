use canopy_store::{RecordKind, StoreError};
use canopy_types::{CommentId, PostId};
use thiserror::Error;

/// Errors surfaced by the forest engine.
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("post not found: {0}")]
    PostNotFound(PostId),

    /// The parent named by a reply does not exist.
    #[error("parent comment not found: {0}")]
    ParentNotFound(CommentId),

    #[error("comment not found: {0}")]
    CommentNotFound(CommentId),

    /// Too many concurrent writers raced on one parent list.
    #[error("gave up appending to {kind} {id} after {attempts} attempts")]
    Contention {
        kind: RecordKind,
        id: String,
        attempts: u32,
    },

    /// Transient storage failure; the caller may retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Non-retryable storage failure.
    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ForestError {
    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::Contention { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PostNotFound(_) | Self::ParentNotFound(_) | Self::CommentNotFound(_)
        )
    }
}

impl From<StoreError> for ForestError {
    fn from(err: StoreError) -> Self {
        if err.is_retryable() {
            Self::StorageUnavailable(err.to_string())
        } else {
            Self::StorageCorrupt(err.to_string())
        }
    }
}

pub type ForestResult<T> = Result<T, ForestError>;
