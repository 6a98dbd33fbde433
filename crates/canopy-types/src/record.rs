//! Post and comment records as they are stored.
//!
//! Records never embed each other. A [`Post`] lists the identifiers of its
//! top-level comments and a [`Comment`] lists the identifiers of its replies;
//! both lists are append-only and keep insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{CommentId, PostId, UserId};

/// A node in a discussion forest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    /// `None` for anonymous comments.
    pub author: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// Replies, oldest first.
    pub children: Vec<CommentId>,
}

impl Comment {
    /// A fresh comment with a newly allocated id and no children.
    pub fn new(text: impl Into<String>, author: Option<UserId>) -> Self {
        Self {
            id: CommentId::new(),
            text: text.into(),
            author,
            created_at: Utc::now(),
            children: Vec::new(),
        }
    }

    /// Copy of this comment with `child` appended to its children.
    pub fn with_child(&self, child: CommentId) -> Self {
        let mut next = self.clone();
        next.children.push(child);
        next
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The root of zero or more comment trees.
///
/// Only `comments` is interpreted by the forest engine; the remaining
/// attributes are carried through to views unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub message: String,
    pub creator: Option<UserId>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Top-level comments, oldest first.
    pub comments: Vec<CommentId>,
}

impl Post {
    /// Copy of this post with `comment` appended to its top-level comments.
    pub fn with_comment(&self, comment: CommentId) -> Self {
        let mut next = self.clone();
        next.comments.push(comment);
        next
    }
}

/// Caller input for creating a post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub creator: Option<UserId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewPost {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_creator(mut self, creator: UserId) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Materialize into a post record with a fresh id and no comments.
    pub fn into_post(self) -> Post {
        Post {
            id: PostId::new(),
            title: self.title,
            message: self.message,
            creator: self.creator,
            tags: self.tags,
            created_at: Utc::now(),
            comments: Vec::new(),
        }
    }
}

/// Caller input for adding a comment to a post.
///
/// With `parent` unset the comment becomes a top-level reply to the post,
/// otherwise it is appended to the parent comment's children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub text: String,
    #[serde(default)]
    pub author: Option<UserId>,
    #[serde(default)]
    pub parent: Option<CommentId>,
}

impl NewComment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: None,
            parent: None,
        }
    }

    pub fn by(mut self, author: UserId) -> Self {
        self.author = Some(author);
        self
    }

    pub fn reply_to(mut self, parent: CommentId) -> Self {
        self.parent = Some(parent);
        self
    }
}
