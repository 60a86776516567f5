use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

use crate::state::AppState;
use crate::{handlers, middleware, ws};

/// Ten megabytes, enough for a base64-encoded canvas export.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub body_limit: usize,
    /// Browser client assets, served for any path the API does not claim
    pub static_dir: Option<PathBuf>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            static_dir: None,
        }
    }
}

/// Builds the full application router.
///
/// Polling clients use `/fishes`; the tank uses `/ws`. Both read the same
/// registry through `FishService`.
pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let api = Router::new()
        .route("/fish", post(handlers::submit_fish))
        .route("/fishes", get(handlers::list_fishes))
        .route("/fish/{id}/report", post(handlers::report_fish))
        .route("/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/ws", get(ws::fish_feed))
        .with_state(state);

    let app = match &options.static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(DefaultBodyLimit::max(options.body_limit)).layer(
        ServiceBuilder::new()
            .layer(middleware::set_request_id())
            .layer(middleware::trace_layer())
            .layer(middleware::propagate_request_id())
            .layer(middleware::cors_policy()),
    )
}
