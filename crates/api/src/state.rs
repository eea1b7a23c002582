use std::sync::Arc;

use farmview_deadline::FarmSource;

use crate::commentary::CommentaryEngine;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Render-farm data source, shared by all sessions.
    pub farm: Arc<dyn FarmSource>,
    /// Commentary generation engine with its shared cache.
    pub commentary: Arc<CommentaryEngine>,
}
