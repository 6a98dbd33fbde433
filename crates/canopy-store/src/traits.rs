use async_trait::async_trait;
use canopy_types::{Comment, CommentId, Post, PostId};

use crate::error::StoreResult;
use crate::record::Versioned;

/// Durable keyed storage for posts and comments.
///
/// All implementations must satisfy these invariants:
/// - Every call is independent. No lock is held between calls, so a caller
///   that reads a record and later replaces it must expect to lose the race.
/// - `replace_*` is a compare-and-swap on the record version. It either
///   stores the new record at `expected_version + 1` or changes nothing.
/// - Reads never observe a partially written record.
/// - Errors are propagated, never silently ignored.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a post by id. Returns `Ok(None)` if it does not exist.
    async fn get_post(&self, id: &PostId) -> StoreResult<Option<Versioned<Post>>>;

    /// Read a comment by id. Returns `Ok(None)` if it does not exist.
    async fn get_comment(&self, id: &CommentId) -> StoreResult<Option<Versioned<Comment>>>;

    /// Store a new post at version 1.
    ///
    /// Fails with `AlreadyExists` if the id is taken.
    async fn insert_post(&self, post: Post) -> StoreResult<()>;

    /// Store a new comment at version 1.
    ///
    /// Fails with `AlreadyExists` if the id is taken.
    async fn insert_comment(&self, comment: Comment) -> StoreResult<()>;

    /// Replace a post if its stored version is still `expected_version`.
    ///
    /// Returns `Ok(false)` when another writer got there first, and
    /// `NotFound` when the post does not exist.
    async fn replace_post(&self, expected_version: u64, post: Post) -> StoreResult<bool>;

    /// Replace a comment if its stored version is still `expected_version`.
    ///
    /// Returns `Ok(false)` when another writer got there first, and
    /// `NotFound` when the comment does not exist.
    async fn replace_comment(&self, expected_version: u64, comment: Comment) -> StoreResult<bool>;

    /// Delete a post. Returns `true` if it existed.
    ///
    /// Comments referenced by the post are left in place.
    async fn delete_post(&self, id: &PostId) -> StoreResult<bool>;

    /// Delete a comment. Returns `true` if it existed.
    ///
    /// References to it in other records are left in place and will
    /// dangle.
    async fn delete_comment(&self, id: &CommentId) -> StoreResult<bool>;
}
