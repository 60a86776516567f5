//! Periodic eviction of hidden and expired fish.
//!
//! The sweeper is an explicit task owned by the process: `start` spawns it,
//! `SweeperHandle::shutdown` stops it and waits for the loop to exit. Each
//! pass runs in its own task, so a panicking pass is logged like any other
//! failure and the next tick still fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::fish_service::FishService;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct Sweeper;

impl Sweeper {
    /// Spawns the sweep loop. The first pass runs one `interval` from now.
    pub fn start(service: Arc<FishService>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = interval.as_secs(), "fish sweeper started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => run_pass(&service).await,
                }
            }
            tracing::info!("fish sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

async fn run_pass(service: &Arc<FishService>) {
    let service = Arc::clone(service);
    match tokio::spawn(async move { service.sweep().await }).await {
        Ok(Ok(report)) => tracing::debug!(evicted = report.evicted(), "sweep finished"),
        Ok(Err(err)) => tracing::error!(error = %err, "fish sweep failed, retrying next tick"),
        Err(err) => tracing::error!(error = %err, "fish sweep aborted, retrying next tick"),
    }
}

pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            tracing::warn!(error = %err, "fish sweeper task ended abnormally");
        }
    }
}
