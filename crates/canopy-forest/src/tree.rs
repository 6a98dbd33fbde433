//! Materialized discussion trees.
//!
//! These are owned values built fresh on every read. They never alias
//! stored records, so callers may hold or serialize them freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use canopy_types::{Comment, CommentId, UserId};

/// One position in a materialized children list.
///
/// Positions are never dropped: a reference that could not be expanded is
/// kept as a `Missing` or `Truncated` marker so sibling order and count
/// match the stored list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscussionNode {
    Comment(MaterializedComment),
    Missing { id: CommentId, reason: MissingReason },
    Truncated { id: CommentId, reason: TruncationReason },
}

impl DiscussionNode {
    pub fn id(&self) -> &CommentId {
        match self {
            Self::Comment(c) => &c.id,
            Self::Missing { id, .. } => id,
            Self::Truncated { id, .. } => id,
        }
    }

    pub fn as_comment(&self) -> Option<&MaterializedComment> {
        match self {
            Self::Comment(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// A comment whose children have been resolved into nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedComment {
    pub id: CommentId,
    pub text: String,
    pub author: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub children: Vec<DiscussionNode>,
}

impl MaterializedComment {
    pub(crate) fn from_record(comment: Comment, children: Vec<DiscussionNode>) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            author: comment.author,
            created_at: comment.created_at,
            children,
        }
    }

    /// Number of materialized comments in this subtree, itself included.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .filter_map(DiscussionNode::as_comment)
            .map(MaterializedComment::subtree_len)
            .sum::<usize>()
    }
}

/// Why a referenced comment could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// No record under that id.
    NotFound,
    /// The store failed transiently while resolving it.
    Unavailable(String),
    /// The store reported damaged data for it.
    Corrupt(String),
}

/// Why expansion stopped at a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// The reference sits below the configured depth bound.
    Depth,
    /// The per-call node budget was exhausted.
    Budget,
    /// The id is already an ancestor on the current path.
    Cycle,
    /// The id was already expanded elsewhere in this tree.
    Duplicate,
}

/// Counters collected while materializing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Store lookups performed.
    pub expanded: usize,
    pub missing: usize,
    pub truncated: usize,
}

/// The materialized comment forest of one post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub comments: Vec<DiscussionNode>,
    pub stats: TreeStats,
}

impl Discussion {
    /// `true` when every reference was expanded.
    pub fn is_complete(&self) -> bool {
        self.stats.missing == 0 && self.stats.truncated == 0
    }

    /// Number of materialized comments across the whole forest.
    pub fn comment_count(&self) -> usize {
        self.comments
            .iter()
            .filter_map(DiscussionNode::as_comment)
            .map(MaterializedComment::subtree_len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str) -> DiscussionNode {
        DiscussionNode::Comment(MaterializedComment::from_record(
            Comment::new(text, None),
            Vec::new(),
        ))
    }

    #[test]
    fn subtree_len_skips_markers() {
        let parent = MaterializedComment::from_record(
            Comment::new("parent", None),
            vec![
                leaf("a"),
                DiscussionNode::Missing {
                    id: CommentId::new(),
                    reason: MissingReason::NotFound,
                },
                leaf("b"),
            ],
        );
        assert_eq!(parent.subtree_len(), 3);
    }

    #[test]
    fn marker_predicates() {
        let id = CommentId::new();
        let missing = DiscussionNode::Missing {
            id,
            reason: MissingReason::Corrupt("bad".into()),
        };
        let truncated = DiscussionNode::Truncated {
            id,
            reason: TruncationReason::Budget,
        };
        assert!(missing.is_missing() && !missing.is_truncated());
        assert!(truncated.is_truncated() && !truncated.is_missing());
        assert!(!leaf("x").is_missing() && !leaf("x").is_truncated());
    }

    #[test]
    fn empty_discussion_is_complete() {
        let d = Discussion::default();
        assert!(d.is_complete());
        assert_eq!(d.comment_count(), 0);
    }

    #[test]
    fn nodes_serialize_with_kind_tag() {
        let id = CommentId::new();
        let node = DiscussionNode::Truncated {
            id,
            reason: TruncationReason::Depth,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "truncated");
        assert_eq!(json["reason"], "depth");
        assert_eq!(json["id"], id.to_string());

        let back: DiscussionNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn comment_node_serializes_flat() {
        let node = leaf("hello");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "comment");
        assert_eq!(json["text"], "hello");
        assert!(json["children"].as_array().unwrap().is_empty());
    }
}
