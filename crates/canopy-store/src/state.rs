//! Record state shared by the store backends.
//!
//! Every write is split in two steps: *plan* checks the request against the
//! current state and yields the [`Mutation`] it would cause, *apply* installs
//! a mutation unconditionally. Backends run both under one write guard. The
//! write-ahead-logged backend persists the planned mutation in between, and
//! replays mutations through `apply` on startup.

use std::collections::HashMap;

use canopy_types::{Comment, CommentId, Post, PostId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::record::{RecordKind, Versioned};

/// A single effective change to the record state.
///
/// Mutations carry whole records rather than deltas, so replaying one twice
/// has the same effect as replaying it once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    PutPost(Versioned<Post>),
    PutComment(Versioned<Comment>),
    DeletePost(PostId),
    DeleteComment(CommentId),
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    posts: HashMap<PostId, Versioned<Post>>,
    comments: HashMap<CommentId, Versioned<Comment>>,
}

impl StoreState {
    pub(crate) fn post(&self, id: &PostId) -> Option<&Versioned<Post>> {
        self.posts.get(id)
    }

    pub(crate) fn comment(&self, id: &CommentId) -> Option<&Versioned<Comment>> {
        self.comments.get(id)
    }

    pub(crate) fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub(crate) fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub(crate) fn plan_insert_post(&self, post: Post) -> StoreResult<Mutation> {
        if self.posts.contains_key(&post.id) {
            return Err(StoreError::already_exists(RecordKind::Post, post.id));
        }
        Ok(Mutation::PutPost(Versioned::initial(post)))
    }

    pub(crate) fn plan_insert_comment(&self, comment: Comment) -> StoreResult<Mutation> {
        if self.comments.contains_key(&comment.id) {
            return Err(StoreError::already_exists(RecordKind::Comment, comment.id));
        }
        Ok(Mutation::PutComment(Versioned::initial(comment)))
    }

    /// `Ok(None)` means the stored version moved on.
    pub(crate) fn plan_replace_post(
        &self,
        expected_version: u64,
        post: Post,
    ) -> StoreResult<Option<Mutation>> {
        let current = self
            .posts
            .get(&post.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Post, post.id))?;
        if current.version != expected_version {
            return Ok(None);
        }
        Ok(Some(Mutation::PutPost(current.next(post))))
    }

    /// `Ok(None)` means the stored version moved on.
    pub(crate) fn plan_replace_comment(
        &self,
        expected_version: u64,
        comment: Comment,
    ) -> StoreResult<Option<Mutation>> {
        let current = self
            .comments
            .get(&comment.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Comment, comment.id))?;
        if current.version != expected_version {
            return Ok(None);
        }
        Ok(Some(Mutation::PutComment(current.next(comment))))
    }

    pub(crate) fn plan_delete_post(&self, id: &PostId) -> Option<Mutation> {
        self.posts
            .contains_key(id)
            .then(|| Mutation::DeletePost(*id))
    }

    pub(crate) fn plan_delete_comment(&self, id: &CommentId) -> Option<Mutation> {
        self.comments
            .contains_key(id)
            .then(|| Mutation::DeleteComment(*id))
    }

    pub(crate) fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::PutPost(entry) => {
                self.posts.insert(entry.record.id, entry);
            }
            Mutation::PutComment(entry) => {
                self.comments.insert(entry.record.id, entry);
            }
            Mutation::DeletePost(id) => {
                self.posts.remove(&id);
            }
            Mutation::DeleteComment(id) => {
                self.comments.remove(&id);
            }
        }
    }

    /// One `Put*` mutation per live record, posts first.
    pub(crate) fn snapshot(&self) -> Vec<Mutation> {
        let posts = self.posts.values().cloned().map(Mutation::PutPost);
        let comments = self.comments.values().cloned().map(Mutation::PutComment);
        posts.chain(comments).collect()
    }
}
