use std::sync::Arc;

use canopy_store::RecordStore;
use canopy_types::{Comment, NewComment, PostId};
use tracing::{info, warn};

use crate::error::{ForestError, ForestResult};
use crate::repository::{CommentRepository, PostRepository};

/// Places new comments into a post's forest.
///
/// Insertion is two-phase: the comment is allocated first so that its id
/// exists, then that id is appended to exactly one parent list. If the
/// parent turns out to be missing the allocated comment is left behind
/// unreferenced; there is no compensating delete.
pub struct ForestInserter<S: RecordStore + ?Sized> {
    comments: CommentRepository<S>,
    posts: PostRepository<S>,
}

impl<S: RecordStore + ?Sized> ForestInserter<S> {
    pub fn new(store: Arc<S>, max_append_retries: u32) -> Self {
        Self {
            comments: CommentRepository::new(Arc::clone(&store), max_append_retries),
            posts: PostRepository::new(store, max_append_retries),
        }
    }

    pub fn from_repositories(comments: CommentRepository<S>, posts: PostRepository<S>) -> Self {
        Self { comments, posts }
    }

    /// Insert a comment under `post_id`, or under `input.parent` when set.
    ///
    /// Replies are linked to their parent comment only; the post is not
    /// consulted on that path.
    pub async fn insert_comment(&self, post_id: &PostId, input: NewComment) -> ForestResult<Comment> {
        let NewComment {
            text,
            author,
            parent,
        } = input;

        let comment = self.comments.create(text, author).await?;

        match parent {
            Some(parent_id) => {
                if self.comments.find(&parent_id).await?.is_none() {
                    warn!(post = %post_id, parent = %parent_id, orphan = %comment.id, "parent comment missing; comment left unreferenced");
                    return Err(ForestError::ParentNotFound(parent_id));
                }
                match self.comments.append_child(&parent_id, comment.id).await {
                    Ok(_) => {}
                    // Deleted between the lookup and the append.
                    Err(ForestError::CommentNotFound(id)) => {
                        warn!(post = %post_id, parent = %id, orphan = %comment.id, "parent comment vanished; comment left unreferenced");
                        return Err(ForestError::ParentNotFound(id));
                    }
                    Err(e) => return Err(e),
                }
                info!(post = %post_id, parent = %parent_id, comment = %comment.id, "reply inserted");
            }
            None => {
                if let Err(e) = self.posts.append_comment(post_id, comment.id).await {
                    if matches!(e, ForestError::PostNotFound(_)) {
                        warn!(post = %post_id, orphan = %comment.id, "post missing; comment left unreferenced");
                    }
                    return Err(e);
                }
                info!(post = %post_id, comment = %comment.id, "top-level comment inserted");
            }
        }

        Ok(comment)
    }
}
