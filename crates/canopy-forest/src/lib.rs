//! Comment forest engine for Canopy.
//!
//! A post's discussion is stored as flat comment records that reference
//! their replies by id. This crate owns the two operations that give those
//! records their shape:
//!
//! - **insert**: allocate a comment, then append its id to exactly one
//!   parent list (a post's top-level comments or a comment's children)
//! - **materialize**: resolve a list of ids into an owned, nested tree,
//!   bounded in depth and size and tolerant of dangling references
//!
//! # Modules
//!
//! - [`repository`]: typed record access and atomic list appends
//! - [`inserter`]: [`ForestInserter`], root vs. reply placement
//! - [`materializer`]: [`TreeMaterializer`], the bounded read path
//! - [`tree`]: materialized node types
//! - [`facade`]: [`PostFacade`], the operations exposed to transports
//! - [`config`]: [`ForestConfig`] bounds

pub mod config;
pub mod error;
pub mod facade;
pub mod inserter;
pub mod materializer;
pub mod repository;
pub mod tree;

pub use config::{ForestConfig, MAX_DEPTH_LIMIT};
pub use error::{ForestError, ForestResult};
pub use facade::{PostFacade, PostView};
pub use inserter::ForestInserter;
pub use materializer::TreeMaterializer;
pub use repository::{CommentRepository, PostRepository};
pub use tree::{
    Discussion, DiscussionNode, MaterializedComment, MissingReason, TreeStats, TruncationReason,
};
