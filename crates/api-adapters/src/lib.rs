//! # api-adapters
//!
//! The web routing and orchestration layer for the fish tank.
//! Routes live behind the `web-axum` feature; metrics are transport-agnostic.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;
#[cfg(feature = "web-axum")]
pub mod ws;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use router::{router, RouterOptions};
#[cfg(feature = "web-axum")]
pub use state::AppState;
