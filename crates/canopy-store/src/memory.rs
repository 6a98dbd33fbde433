use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use canopy_types::{Comment, CommentId, Post, PostId};

use crate::error::{StoreError, StoreResult};
use crate::record::Versioned;
use crate::state::StoreState;
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Records are held behind a `RwLock` and
/// cloned on read. A compare-and-swap is checked and applied under a single
/// write guard, which makes it atomic with respect to every other call.
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Number of posts currently stored.
    pub fn post_count(&self) -> usize {
        self.read().map(|s| s.post_count()).unwrap_or(0)
    }

    /// Number of comments currently stored, referenced or not.
    pub fn comment_count(&self) -> usize {
        self.read().map(|s| s.comment_count()).unwrap_or(0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_post(&self, id: &PostId) -> StoreResult<Option<Versioned<Post>>> {
        Ok(self.read()?.post(id).cloned())
    }

    async fn get_comment(&self, id: &CommentId) -> StoreResult<Option<Versioned<Comment>>> {
        Ok(self.read()?.comment(id).cloned())
    }

    async fn insert_post(&self, post: Post) -> StoreResult<()> {
        let mut state = self.write()?;
        let mutation = state.plan_insert_post(post)?;
        state.apply(mutation);
        Ok(())
    }

    async fn insert_comment(&self, comment: Comment) -> StoreResult<()> {
        let mut state = self.write()?;
        let mutation = state.plan_insert_comment(comment)?;
        state.apply(mutation);
        Ok(())
    }

    async fn replace_post(&self, expected_version: u64, post: Post) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.plan_replace_post(expected_version, post)? {
            Some(mutation) => {
                state.apply(mutation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_comment(&self, expected_version: u64, comment: Comment) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.plan_replace_comment(expected_version, comment)? {
            Some(mutation) => {
                state.apply(mutation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&self, id: &PostId) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.plan_delete_post(id) {
            Some(mutation) => {
                state.apply(mutation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_comment(&self, id: &CommentId) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.plan_delete_comment(id) {
            Some(mutation) => {
                state.apply(mutation);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("post_count", &self.post_count())
            .field("comment_count", &self.comment_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::RecordKind;
    use canopy_types::NewPost;

    fn make_post() -> Post {
        NewPost::new("hello").with_message("world").into_post()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_and_get_post() {
        let store = InMemoryRecordStore::new();
        let post = make_post();
        store.insert_post(post.clone()).await.unwrap();

        let stored = store.get_post(&post.id).await.unwrap().expect("should exist");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.record, post);
    }

    #[tokio::test]
    async fn insert_and_get_comment() {
        let store = InMemoryRecordStore::new();
        let comment = Comment::new("first", None);
        store.insert_comment(comment.clone()).await.unwrap();

        let stored = store
            .get_comment(&comment.id)
            .await
            .unwrap()
            .expect("should exist");
        assert_eq!(stored.record, comment);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.get_post(&PostId::new()).await.unwrap().is_none());
        assert!(store.get_comment(&CommentId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryRecordStore::new();
        let comment = Comment::new("once", None);
        store.insert_comment(comment.clone()).await.unwrap();
        let err = store.insert_comment(comment).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyExists {
                kind: RecordKind::Comment,
                ..
            }
        ));
        assert_eq!(store.comment_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Compare-and-swap
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn replace_with_current_version_succeeds() {
        let store = InMemoryRecordStore::new();
        let post = make_post();
        store.insert_post(post.clone()).await.unwrap();

        let child = CommentId::new();
        assert!(store.replace_post(1, post.with_comment(child)).await.unwrap());

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.comments, vec![child]);
    }

    #[tokio::test]
    async fn replace_with_stale_version_changes_nothing() {
        let store = InMemoryRecordStore::new();
        let comment = Comment::new("parent", None);
        store.insert_comment(comment.clone()).await.unwrap();

        let first = CommentId::new();
        assert!(store
            .replace_comment(1, comment.with_child(first))
            .await
            .unwrap());
        // A second writer still holding version 1 loses.
        assert!(!store
            .replace_comment(1, comment.with_child(CommentId::new()))
            .await
            .unwrap());

        let stored = store.get_comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(stored.record.children, vec![first]);
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store
            .replace_comment(1, Comment::new("ghost", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_comment_reports_presence() {
        let store = InMemoryRecordStore::new();
        let comment = Comment::new("bye", None);
        store.insert_comment(comment.clone()).await.unwrap();
        assert!(store.delete_comment(&comment.id).await.unwrap());
        assert!(!store.delete_comment(&comment.id).await.unwrap());
        assert!(store.get_comment(&comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_post_keeps_comments() {
        let store = InMemoryRecordStore::new();
        let comment = Comment::new("survivor", None);
        store.insert_comment(comment.clone()).await.unwrap();
        let post = make_post().with_comment(comment.id);
        store.insert_post(post.clone()).await.unwrap();

        assert!(store.delete_post(&post.id).await.unwrap());
        assert_eq!(store.post_count(), 0);
        assert_eq!(store.comment_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn only_one_racing_replace_wins() {
        let store = Arc::new(InMemoryRecordStore::new());
        let comment = Comment::new("contended", None);
        store.insert_comment(comment.clone()).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let next = comment.with_child(CommentId::new());
                tokio::spawn(async move { store.replace_comment(1, next).await.unwrap() })
            })
            .collect();

        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let stored = store.get_comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.children.len(), 1);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryRecordStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRecordStore"));
        assert!(debug.contains("comment_count"));
    }
}
