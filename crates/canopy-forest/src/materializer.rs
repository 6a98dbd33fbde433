//! Read path: identifier lists in, nested comment trees out.
//!
//! Expansion is depth-first and keeps stored order at every level. Each
//! reference is resolved by its own short store lookup; no lock is held
//! across the walk, so concurrent inserts may or may not be visible.
//!
//! # Bounds
//!
//! - references below `max_depth` become [`TruncationReason::Depth`]
//! - after `max_nodes` lookups the rest become [`TruncationReason::Budget`]
//! - an id already on the current path becomes [`TruncationReason::Cycle`]
//! - an id already expanded elsewhere becomes [`TruncationReason::Duplicate`]
//!
//! A failed lookup only affects its own position, which becomes a
//! [`DiscussionNode::Missing`] marker.

use std::collections::HashSet;
use std::sync::Arc;

use canopy_store::RecordStore;
use canopy_types::{Comment, CommentId, PostId};
use tracing::{debug, warn};

use crate::config::ForestConfig;
use crate::error::{ForestError, ForestResult};
use crate::repository::{CommentRepository, PostRepository};
use crate::tree::{
    Discussion, DiscussionNode, MaterializedComment, MissingReason, TreeStats, TruncationReason,
};

/// Per-call traversal state.
#[derive(Default)]
struct Walk {
    on_path: HashSet<CommentId>,
    seen: HashSet<CommentId>,
    stats: TreeStats,
}

/// One children list being filled in on the explicit walk stack.
struct Frame {
    /// The comment owning `ids`; `None` for the top-level list.
    owner: Option<Comment>,
    ids: Vec<CommentId>,
    next: usize,
    depth: usize,
    nodes: Vec<DiscussionNode>,
}

impl Frame {
    fn new(owner: Option<Comment>, ids: Vec<CommentId>, depth: usize) -> Self {
        let nodes = Vec::with_capacity(ids.len());
        Self {
            owner,
            ids,
            next: 0,
            depth,
            nodes,
        }
    }
}

/// Outcome of looking at a single reference.
enum Step {
    /// The position is final, always a marker.
    Done(DiscussionNode),
    Descend(Comment),
}

/// Expands comment id lists into [`Discussion`] trees.
pub struct TreeMaterializer<S: RecordStore + ?Sized> {
    comments: CommentRepository<S>,
    posts: PostRepository<S>,
    config: ForestConfig,
}

impl<S: RecordStore + ?Sized> TreeMaterializer<S> {
    /// Fails with [`ForestError::Config`] if `config` does not validate.
    pub fn new(store: Arc<S>, config: ForestConfig) -> ForestResult<Self> {
        config.validate()?;
        Ok(Self {
            comments: CommentRepository::new(Arc::clone(&store), config.max_append_retries),
            posts: PostRepository::new(store, config.max_append_retries),
            config,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Materialize the given top-level ids, in order.
    pub async fn materialize(&self, ids: &[CommentId]) -> Discussion {
        let mut walk = Walk::default();
        let comments = self.walk_forest(ids.to_vec(), &mut walk).await;
        if walk.stats.missing > 0 || walk.stats.truncated > 0 {
            debug!(
                expanded = walk.stats.expanded,
                missing = walk.stats.missing,
                truncated = walk.stats.truncated,
                "discussion materialized partially"
            );
        }
        Discussion {
            comments,
            stats: walk.stats,
        }
    }

    /// Materialize the full discussion of a post.
    pub async fn materialize_post(&self, post_id: &PostId) -> ForestResult<Discussion> {
        let post = self.posts.get(post_id).await?;
        Ok(self.materialize(&post.comments).await)
    }

    /// Pre-order walk driven by an explicit stack, so tree depth never
    /// turns into call depth.
    async fn walk_forest(&self, ids: Vec<CommentId>, walk: &mut Walk) -> Vec<DiscussionNode> {
        let mut stack = vec![Frame::new(None, ids, 1)];
        loop {
            let Some(frame) = stack.last_mut() else {
                return Vec::new();
            };

            if let Some(&id) = frame.ids.get(frame.next) {
                frame.next += 1;
                let depth = frame.depth;
                match self.expand_node(id, depth, walk).await {
                    Step::Done(node) => frame.nodes.push(node),
                    Step::Descend(comment) => {
                        walk.on_path.insert(id);
                        let children = comment.children.clone();
                        stack.push(Frame::new(Some(comment), children, depth + 1));
                    }
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                return Vec::new();
            };
            let Some(owner) = done.owner else {
                return done.nodes;
            };
            walk.on_path.remove(&owner.id);
            let node = DiscussionNode::Comment(MaterializedComment::from_record(owner, done.nodes));
            if let Some(parent) = stack.last_mut() {
                parent.nodes.push(node);
            }
        }
    }

    async fn expand_node(&self, id: CommentId, depth: usize, walk: &mut Walk) -> Step {
        let truncation = if depth > self.config.max_depth {
            Some(TruncationReason::Depth)
        } else if walk.on_path.contains(&id) {
            warn!(comment = %id, depth, "comment cycle detected; branch truncated");
            Some(TruncationReason::Cycle)
        } else if walk.seen.contains(&id) {
            warn!(comment = %id, depth, "comment referenced twice; repeat truncated");
            Some(TruncationReason::Duplicate)
        } else if walk.stats.expanded >= self.config.max_nodes {
            Some(TruncationReason::Budget)
        } else {
            None
        };
        if let Some(reason) = truncation {
            walk.stats.truncated += 1;
            return Step::Done(DiscussionNode::Truncated { id, reason });
        }

        walk.stats.expanded += 1;
        walk.seen.insert(id);

        match self.comments.find(&id).await {
            Ok(Some(comment)) => Step::Descend(comment),
            Ok(None) => {
                warn!(comment = %id, "dangling comment reference");
                walk.stats.missing += 1;
                Step::Done(DiscussionNode::Missing {
                    id,
                    reason: MissingReason::NotFound,
                })
            }
            Err(e) => {
                warn!(comment = %id, error = %e, "comment lookup failed; branch skipped");
                walk.stats.missing += 1;
                let reason = match e {
                    ForestError::StorageUnavailable(msg) => MissingReason::Unavailable(msg),
                    other => MissingReason::Corrupt(other.to_string()),
                };
                Step::Done(DiscussionNode::Missing { id, reason })
            }
        }
    }
}
