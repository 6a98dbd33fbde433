//! HTTP server for Canopy.
//!
//! Exposes posts and their threaded discussions as a small JSON API over
//! the comment forest engine. Records live in memory or in a
//! write-ahead-logged store under the configured data directory.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AddCommentRequest, HealthResponse};
pub use server::CanopyServer;
pub use state::AppState;
