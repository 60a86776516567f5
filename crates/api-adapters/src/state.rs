use std::sync::Arc;

use services::FishService;

use crate::metrics::Metrics;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FishService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(service: Arc<FishService>) -> Self {
        Self {
            service,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
