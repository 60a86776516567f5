//! # fishtank
//!
//! The entry point that assembles the registry, the expiry sweeper and the
//! HTTP/WebSocket API from configuration.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{router, AppState, RouterOptions};
use configs::{LogFormat, Settings};
use services::{
    Broadcaster, FishService, KeywordFilter, ModerationPolicy, PolicyConfig, RateLimitConfig,
    RateLimiter, RetentionConfig, Sweeper, SweeperHandle,
};
use storage_adapters::InMemoryFishStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings);

    let service = Arc::new(build_service(&settings)?);
    let sweeper = Sweeper::start(
        Arc::clone(&service),
        Duration::from_secs(settings.retention.sweep_interval_secs),
    );

    let options = RouterOptions {
        body_limit: settings.server.body_limit_bytes,
        static_dir: settings.server.static_dir.as_ref().map(PathBuf::from),
    };
    let app = router(AppState::new(service), &options);

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "fishtank listening");

    serve(listener, app, sweeper, shutdown_signal()).await?;
    tracing::info!("fishtank stopped");
    Ok(())
}

/// Serves until `signal` resolves, then stops the sweeper. The sweeper stops
/// on every exit path, including a failed server.
async fn serve(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    sweeper: SweeperHandle,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await;

    sweeper.shutdown().await;
    served.context("server terminated unexpectedly")
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match settings.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn build_service(settings: &Settings) -> anyhow::Result<FishService> {
    let moderation = &settings.moderation;
    let store = InMemoryFishStore::new(moderation.hide_threshold);

    let policy = ModerationPolicy::new(
        PolicyConfig {
            min_confidence: moderation.min_confidence,
            max_label_chars: moderation.max_label_chars,
        },
        Arc::new(KeywordFilter::new(&moderation.deny_list)),
    );
    let retention = RetentionConfig {
        hide_threshold: moderation.hide_threshold,
        ttl: chrono::Duration::from_std(Duration::from_secs(settings.retention.ttl_secs))
            .context("retention.ttl_secs is out of range")?,
        max_evictions_per_sweep: settings.retention.max_evictions_per_sweep,
    };

    let mut service = FishService::new(Arc::new(store))
        .with_policy(policy)
        .with_broadcaster(Broadcaster::new(settings.broadcast.subscriber_buffer))
        .with_retention(retention);

    if settings.rate_limit.enabled {
        service = service.with_rate_limiter(RateLimiter::new(RateLimitConfig {
            max_requests: settings.rate_limit.max_requests,
            window: Duration::from_secs(settings.rate_limit.window_secs),
            ..Default::default()
        }));
    }
    Ok(service)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, shutting down gracefully"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down gracefully"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serve_releases_the_service_once_stopped() {
        let settings = Settings::default();
        let service = Arc::new(build_service(&settings).unwrap());
        let sweeper = Sweeper::start(Arc::clone(&service), Duration::from_secs(3600));
        let app = router(AppState::new(Arc::clone(&service)), &RouterOptions::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), serve(listener, app, sweeper, async {}))
            .await
            .expect("serve did not return")
            .unwrap();

        // Router state and sweeper task both held a clone.
        assert_eq!(Arc::strong_count(&service), 1);
    }
}
