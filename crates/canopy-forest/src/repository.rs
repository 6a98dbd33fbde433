//! Typed access to comment and post records.
//!
//! The repositories own the only two edge mutations in the forest: appending
//! a reply to a comment's `children` and appending a top-level comment to a
//! post's `comments`. Both are read-modify-write cycles made atomic by a
//! compare-and-swap on the record version, retried when another writer
//! replaced the record in between. A lost race therefore costs a retry and
//! never a lost or duplicated append.

use std::sync::Arc;

use canopy_store::{RecordKind, RecordStore, StoreError};
use canopy_types::{Comment, CommentId, NewPost, Post, PostId, UserId};
use tracing::debug;

use crate::error::{ForestError, ForestResult};

/// Accessor for comment nodes.
pub struct CommentRepository<S: RecordStore + ?Sized> {
    store: Arc<S>,
    max_append_retries: u32,
}

impl<S: RecordStore + ?Sized> Clone for CommentRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_append_retries: self.max_append_retries,
        }
    }
}

impl<S: RecordStore + ?Sized> CommentRepository<S> {
    pub fn new(store: Arc<S>, max_append_retries: u32) -> Self {
        Self {
            store,
            max_append_retries: max_append_retries.max(1),
        }
    }

    /// Allocate and store a new comment with no children.
    pub async fn create(
        &self,
        text: impl Into<String> + Send,
        author: Option<UserId>,
    ) -> ForestResult<Comment> {
        let comment = Comment::new(text, author);
        self.store.insert_comment(comment.clone()).await?;
        debug!(comment = %comment.id, "comment allocated");
        Ok(comment)
    }

    pub async fn get(&self, id: &CommentId) -> ForestResult<Comment> {
        self.find(id)
            .await?
            .ok_or(ForestError::CommentNotFound(*id))
    }

    pub async fn find(&self, id: &CommentId) -> ForestResult<Option<Comment>> {
        Ok(self
            .store
            .get_comment(id)
            .await?
            .map(|entry| entry.into_record()))
    }

    /// Append `child` to the children of `parent` and return the updated
    /// parent.
    ///
    /// Appending an id that is already present is a no-op.
    pub async fn append_child(&self, parent: &CommentId, child: CommentId) -> ForestResult<Comment> {
        for attempt in 1..=self.max_append_retries {
            let current = self
                .store
                .get_comment(parent)
                .await?
                .ok_or(ForestError::CommentNotFound(*parent))?;
            if current.record.children.contains(&child) {
                return Ok(current.record);
            }

            let next = current.record.with_child(child);
            match self.store.replace_comment(current.version, next.clone()).await {
                Ok(true) => {
                    debug!(%parent, %child, attempt, "child linked");
                    return Ok(next);
                }
                Ok(false) => {
                    debug!(%parent, attempt, version = current.version, "child list moved; retrying");
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(ForestError::CommentNotFound(*parent));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ForestError::Contention {
            kind: RecordKind::Comment,
            id: parent.to_string(),
            attempts: self.max_append_retries,
        })
    }
}

/// Accessor for post records, limited to what the forest needs.
pub struct PostRepository<S: RecordStore + ?Sized> {
    store: Arc<S>,
    max_append_retries: u32,
}

impl<S: RecordStore + ?Sized> Clone for PostRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_append_retries: self.max_append_retries,
        }
    }
}

impl<S: RecordStore + ?Sized> PostRepository<S> {
    pub fn new(store: Arc<S>, max_append_retries: u32) -> Self {
        Self {
            store,
            max_append_retries: max_append_retries.max(1),
        }
    }

    pub async fn create(&self, input: NewPost) -> ForestResult<Post> {
        if input.title.trim().is_empty() {
            return Err(ForestError::InvalidInput("post title must not be empty".into()));
        }
        let post = input.into_post();
        self.store.insert_post(post.clone()).await?;
        debug!(post = %post.id, "post created");
        Ok(post)
    }

    pub async fn get(&self, id: &PostId) -> ForestResult<Post> {
        self.find(id).await?.ok_or(ForestError::PostNotFound(*id))
    }

    pub async fn find(&self, id: &PostId) -> ForestResult<Option<Post>> {
        Ok(self
            .store
            .get_post(id)
            .await?
            .map(|entry| entry.into_record()))
    }

    /// Append `comment` to the top-level comments of `post` and return the
    /// updated post.
    ///
    /// Appending an id that is already present is a no-op.
    pub async fn append_comment(&self, post: &PostId, comment: CommentId) -> ForestResult<Post> {
        for attempt in 1..=self.max_append_retries {
            let current = self
                .store
                .get_post(post)
                .await?
                .ok_or(ForestError::PostNotFound(*post))?;
            if current.record.comments.contains(&comment) {
                return Ok(current.record);
            }

            let next = current.record.with_comment(comment);
            match self.store.replace_post(current.version, next.clone()).await {
                Ok(true) => {
                    debug!(%post, %comment, attempt, "top-level comment linked");
                    return Ok(next);
                }
                Ok(false) => {
                    debug!(%post, attempt, version = current.version, "comment list moved; retrying");
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(ForestError::PostNotFound(*post));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ForestError::Contention {
            kind: RecordKind::Post,
            id: post.to_string(),
            attempts: self.max_append_retries,
        })
    }
}
