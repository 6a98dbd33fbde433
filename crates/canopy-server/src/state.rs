use std::sync::Arc;

use canopy_forest::{ForestConfig, ForestResult, PostFacade};
use canopy_store::RecordStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    facade: Arc<PostFacade<dyn RecordStore>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: ForestConfig) -> ForestResult<Self> {
        Ok(Self {
            facade: Arc::new(PostFacade::new(store, config)?),
        })
    }

    pub fn facade(&self) -> &PostFacade<dyn RecordStore> {
        &self.facade
    }
}
