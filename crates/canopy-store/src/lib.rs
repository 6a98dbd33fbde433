//! Record storage for Canopy.
//!
//! Posts and comments are stored as flat, independently addressable records.
//! Nesting exists only as identifier lists inside the records, so every
//! structural change is a replacement of exactly one record.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`WalRecordStore`] -- in-memory working set persisted through a
//!   CRC-framed write-ahead log
//!
//! # Design Rules
//!
//! 1. Every stored record carries a version; replacements are
//!    compare-and-swap on that version.
//! 2. A failed compare-and-swap changes nothing and is reported as `false`,
//!    not as an error.
//! 3. Concurrent reads are always safe and never see a half-written record.
//! 4. The store never interprets identifier lists. Dangling references are
//!    the reader's problem.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod durable;
pub mod error;
pub mod memory;
pub mod record;
pub mod state;
pub mod traits;
pub mod wal;

pub use durable::WalRecordStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use record::{RecordKind, Versioned};
pub use state::Mutation;
pub use traits::RecordStore;
pub use wal::{Recovery, SyncMode, WriteAheadLog};
