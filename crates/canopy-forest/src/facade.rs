use std::sync::Arc;

use canopy_store::RecordStore;
use canopy_types::{NewComment, NewPost, Post, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ForestConfig;
use crate::error::ForestResult;
use crate::inserter::ForestInserter;
use crate::materializer::TreeMaterializer;
use crate::repository::{CommentRepository, PostRepository};
use crate::tree::{Discussion, DiscussionNode, TreeStats};

/// A post together with its fully materialized discussion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub title: String,
    pub message: String,
    pub creator: Option<UserId>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<DiscussionNode>,
    pub stats: TreeStats,
}

impl PostView {
    fn assemble(post: Post, discussion: Discussion) -> Self {
        Self {
            id: post.id,
            title: post.title,
            message: post.message,
            creator: post.creator,
            tags: post.tags,
            created_at: post.created_at,
            comments: discussion.comments,
            stats: discussion.stats,
        }
    }
}

/// Entry point for the post operations built on the comment forest.
pub struct PostFacade<S: RecordStore + ?Sized> {
    posts: PostRepository<S>,
    inserter: ForestInserter<S>,
    materializer: TreeMaterializer<S>,
}

impl<S: RecordStore + ?Sized> PostFacade<S> {
    /// Fails with [`ForestError::Config`](crate::ForestError::Config) if
    /// `config` does not validate.
    pub fn new(store: Arc<S>, config: ForestConfig) -> ForestResult<Self> {
        let retries = config.max_append_retries;
        let posts = PostRepository::new(Arc::clone(&store), retries);
        let comments = CommentRepository::new(Arc::clone(&store), retries);
        Ok(Self {
            inserter: ForestInserter::from_repositories(comments, posts.clone()),
            materializer: TreeMaterializer::new(store, config)?,
            posts,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        self.materializer.config()
    }

    pub async fn create_post(&self, input: NewPost) -> ForestResult<Post> {
        let post = self.posts.create(input).await?;
        info!(post = %post.id, title = %post.title, "post created");
        Ok(post)
    }

    /// The post and its discussion as of this call.
    pub async fn get_post_with_discussion(&self, post_id: &PostId) -> ForestResult<PostView> {
        let post = self.posts.get(post_id).await?;
        // Expand the list from this read so the view matches the post it
        // is assembled with.
        let discussion = self.materializer.materialize(&post.comments).await;
        Ok(PostView::assemble(post, discussion))
    }

    pub async fn materialize_post(&self, post_id: &PostId) -> ForestResult<Discussion> {
        self.materializer.materialize_post(post_id).await
    }

    /// Insert a comment and return the post as it reads afterwards.
    ///
    /// The post is looked up first, so a call naming a missing post leaves
    /// every stored list untouched.
    pub async fn add_comment(&self, post_id: &PostId, input: NewComment) -> ForestResult<PostView> {
        self.posts.get(post_id).await?;
        self.inserter.insert_comment(post_id, input).await?;
        self.get_post_with_discussion(post_id).await
    }
}
