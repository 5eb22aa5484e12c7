//! Application state and sub-state extractors.
//!
//! Handlers extract only the sub-state they need via Axum's `FromRef`.

use std::sync::Arc;

use trefa_sync::SyncRunner;

use crate::services::InventoryService;

/// Image sync availability.
///
/// The read API starts without Airtable credentials; the sync endpoint then reports the
/// reason instead of running.
#[derive(Clone)]
pub enum SyncHandle {
    Ready(Arc<SyncRunner>),
    Unavailable(String),
}

#[derive(Clone)]
pub struct AppState {
    pub inventory: InventoryService,
    pub sync: SyncHandle,
}

impl AppState {
    pub fn new(inventory: InventoryService, sync: SyncHandle) -> Self {
        Self { inventory, sync }
    }
}

impl axum::extract::FromRef<Arc<AppState>> for InventoryService {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.inventory.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for SyncHandle {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.sync.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
