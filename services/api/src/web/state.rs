//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::config::Config;
use learnpath_core::ports::DatabaseService;
use learnpath_core::ProgressionService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Learner actions. Every balance, streak or progress change goes through here.
    pub progression: Arc<ProgressionService>,
    /// Direct storage access for auth sessions and read-only listings.
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}
