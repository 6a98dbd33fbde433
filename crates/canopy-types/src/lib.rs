//! Foundation types for Canopy.
//!
//! Canopy stores a post's discussion as a forest of flat comment records
//! linked only by identifier. This crate defines those identifiers and the
//! two record kinds every other Canopy crate passes around.
//!
//! # Key Types
//!
//! - [`PostId`], [`CommentId`]: UUID v7 identifiers, time-ordered
//! - [`UserId`]: opaque reference to an externally managed user
//! - [`Comment`]: a forest node holding its children as identifiers
//! - [`Post`]: the root of a discussion, holding top-level comment identifiers
//! - [`NewPost`], [`NewComment`]: caller-supplied inputs

pub mod error;
pub mod id;
pub mod record;

pub use error::TypeError;
pub use id::{CommentId, PostId, UserId};
pub use record::{Comment, NewComment, NewPost, Post};
