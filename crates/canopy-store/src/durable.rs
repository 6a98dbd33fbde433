//! Write-ahead-logged record store.
//!
//! [`WalRecordStore`] keeps the working set in memory and appends every
//! accepted mutation to a [`WriteAheadLog`] before applying it. Opening a
//! store replays its log.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use canopy_types::{Comment, CommentId, Post, PostId};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::Versioned;
use crate::state::{Mutation, StoreState};
use crate::traits::RecordStore;
use crate::wal::{SyncMode, WriteAheadLog};

/// Durable [`RecordStore`] backed by a single log segment.
///
/// Writes hold the state lock while the log is appended, so the log order is
/// exactly the order in which mutations became visible. Writes run on
/// tokio's blocking pool, so a slow disk or an `fsync` never stalls the
/// async workers; they must be issued from within a tokio runtime.
pub struct WalRecordStore {
    shared: Arc<Shared>,
    skipped_on_open: usize,
}

struct Shared {
    state: RwLock<StoreState>,
    wal: WriteAheadLog,
}

impl Shared {
    /// Plan a mutation against the current state and, if there is one, log
    /// and apply it. Returns whether anything was written.
    fn commit_with<F>(&self, plan: F) -> StoreResult<bool>
    where
        F: FnOnce(&StoreState) -> StoreResult<Option<Mutation>>,
    {
        let mut state = self.write()?;
        match plan(&state)? {
            Some(mutation) => {
                self.wal.append(&mutation)?;
                state.apply(mutation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl WalRecordStore {
    /// Open the store at `path`, replaying any existing log.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        let wal = WriteAheadLog::open(path, sync_mode)?;
        let recovery = wal.recover()?;

        let mut state = StoreState::default();
        let replayed = recovery.mutations.len();
        for mutation in recovery.mutations {
            state.apply(mutation);
        }

        if recovery.skipped > 0 {
            warn!(
                path = %path.display(),
                skipped = recovery.skipped,
                "record log contained damaged entries"
            );
        }
        if recovery.torn_tail {
            // Drop the partial frame so later appends start on a boundary.
            wal.rewrite(&state.snapshot())?;
        }

        info!(
            path = %path.display(),
            replayed,
            posts = state.post_count(),
            comments = state.comment_count(),
            "record store opened"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                wal,
            }),
            skipped_on_open: recovery.skipped,
        })
    }

    /// Number of damaged log entries ignored while opening.
    pub fn skipped_on_open(&self) -> usize {
        self.skipped_on_open
    }

    pub fn post_count(&self) -> usize {
        self.shared.read().map(|s| s.post_count()).unwrap_or(0)
    }

    pub fn comment_count(&self) -> usize {
        self.shared.read().map(|s| s.comment_count()).unwrap_or(0)
    }

    /// Rewrite the log as one entry per live record.
    pub fn compact(&self) -> StoreResult<()> {
        let state = self.shared.write()?;
        let snapshot = state.snapshot();
        self.shared.wal.rewrite(&snapshot)?;
        info!(entries = snapshot.len(), "record log compacted");
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        self.shared.wal.path()
    }

    async fn commit_with<F>(&self, plan: F) -> StoreResult<bool>
    where
        F: FnOnce(&StoreState) -> StoreResult<Option<Mutation>> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.commit_with(plan))
            .await
            .map_err(|e| StoreError::Unavailable(format!("log writer task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for WalRecordStore {
    async fn get_post(&self, id: &PostId) -> StoreResult<Option<Versioned<Post>>> {
        Ok(self.shared.read()?.post(id).cloned())
    }

    async fn get_comment(&self, id: &CommentId) -> StoreResult<Option<Versioned<Comment>>> {
        Ok(self.shared.read()?.comment(id).cloned())
    }

    async fn insert_post(&self, post: Post) -> StoreResult<()> {
        self.commit_with(move |state| state.plan_insert_post(post).map(Some))
            .await
            .map(|_| ())
    }

    async fn insert_comment(&self, comment: Comment) -> StoreResult<()> {
        self.commit_with(move |state| state.plan_insert_comment(comment).map(Some))
            .await
            .map(|_| ())
    }

    async fn replace_post(&self, expected_version: u64, post: Post) -> StoreResult<bool> {
        self.commit_with(move |state| state.plan_replace_post(expected_version, post))
            .await
    }

    async fn replace_comment(&self, expected_version: u64, comment: Comment) -> StoreResult<bool> {
        self.commit_with(move |state| state.plan_replace_comment(expected_version, comment))
            .await
    }

    async fn delete_post(&self, id: &PostId) -> StoreResult<bool> {
        let id = *id;
        self.commit_with(move |state| Ok(state.plan_delete_post(&id)))
            .await
    }

    async fn delete_comment(&self, id: &CommentId) -> StoreResult<bool> {
        let id = *id;
        self.commit_with(move |state| Ok(state.plan_delete_comment(&id)))
            .await
    }
}

impl std::fmt::Debug for WalRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalRecordStore")
            .field("log", &self.shared.wal.path())
            .field("post_count", &self.post_count())
            .field("comment_count", &self.comment_count())
            .finish()
    }
}
