//! Orchestrates admission, reporting, listing and sweeping.
//!
//! Store mutations happen inside the repository; events are published only
//! after the repository call has returned, so observer fan-out never runs
//! under the store lock. A separate ordering lock spans each mutation and its
//! publish, so observers receive events in sequence order.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use domains::{
    Clock, DomainError, Fish, FishEvent, FishId, FishRepo, FishStats, ListFilter, NewFish,
    RemovalReason, Sequenced, SweepReport, SweepRule, DEFAULT_HIDE_THRESHOLD,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::broadcast::{Broadcaster, Subscription};
use crate::clock::SystemClock;
use crate::moderation::ModerationPolicy;
use crate::rate_limit::RateLimiter;

pub const DEFAULT_TTL_SECS: i64 = 60 * 60;
pub const DEFAULT_MAX_EVICTIONS_PER_SWEEP: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub hide_threshold: u32,
    pub ttl: Duration,
    pub max_evictions_per_sweep: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hide_threshold: DEFAULT_HIDE_THRESHOLD,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            max_evictions_per_sweep: DEFAULT_MAX_EVICTIONS_PER_SWEEP,
        }
    }
}

/// Registry counters plus process-level figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceStats {
    pub total: usize,
    pub active: usize,
    pub hidden: usize,
    pub observers: usize,
    /// Seconds since the service was created
    pub uptime: f64,
}

pub struct FishService {
    repo: Arc<dyn FishRepo>,
    policy: ModerationPolicy,
    broadcaster: Broadcaster,
    limiter: Option<RateLimiter>,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    /// Held from a mutating repository call until its event is enqueued
    publish_order: Mutex<()>,
    started: Instant,
}

impl FishService {
    pub fn new(repo: Arc<dyn FishRepo>) -> Self {
        Self {
            repo,
            policy: ModerationPolicy::default(),
            broadcaster: Broadcaster::default(),
            limiter: None,
            clock: Arc::new(SystemClock),
            retention: RetentionConfig::default(),
            publish_order: Mutex::new(()),
            started: Instant::now(),
        }
    }

    pub fn with_policy(mut self, policy: ModerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Validates and stores a new fish, then announces it to observers.
    ///
    /// `origin` is the submitting client's address, used for rate limiting
    /// when a limiter is configured.
    pub async fn submit(&self, candidate: NewFish, origin: Option<IpAddr>) -> Result<Fish, DomainError> {
        if let (Some(limiter), Some(ip)) = (&self.limiter, origin) {
            limiter.check(ip)?;
        }

        let draft = self.policy.admit(candidate).inspect_err(|err| {
            tracing::debug!(kind = err.kind(), error = %err, "fish rejected");
        })?;

        let _order = self.publish_order.lock().await;
        let Sequenced { seq, value: fish } = self.repo.admit(draft, self.clock.now()).await?;
        tracing::info!(fish_id = %fish.id, label = %fish.label, confidence = fish.confidence, "new fish added");

        self.broadcaster.publish(Sequenced {
            seq,
            value: FishEvent::ItemAdded { item: fish.clone() },
        });
        Ok(fish)
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Fish>, DomainError> {
        self.repo.list(filter).await
    }

    pub async fn get(&self, id: &FishId) -> Result<Option<Fish>, DomainError> {
        self.repo.get(id).await
    }

    /// Records one report and returns the new count. The report that hides
    /// a fish also tells observers to remove it.
    pub async fn report(&self, id: &FishId) -> Result<u32, DomainError> {
        let _order = self.publish_order.lock().await;
        let outcome = self.repo.report(id).await?;
        tracing::debug!(fish_id = %id, reports = outcome.report_count, "fish reported");

        if outcome.became_hidden {
            self.broadcaster.publish(Sequenced {
                seq: outcome.seq,
                value: FishEvent::ItemRemoved {
                    id: id.clone(),
                    reason: RemovalReason::Reported,
                },
            });
        }
        Ok(outcome.report_count)
    }

    pub async fn fish_stats(&self) -> Result<FishStats, DomainError> {
        self.repo.stats().await
    }

    pub async fn stats(&self) -> Result<ServiceStats, DomainError> {
        let FishStats { total, active, hidden } = self.repo.stats().await?;
        Ok(ServiceStats {
            total,
            active,
            hidden,
            observers: self.broadcaster.observer_count(),
            uptime: self.uptime_secs(),
        })
    }

    /// Opens a live feed: snapshot of visible fish, then every later event.
    pub async fn subscribe(&self) -> Result<Subscription, DomainError> {
        let mut subscription = self.broadcaster.subscribe();
        let snapshot = self.repo.snapshot().await?;
        subscription.attach_snapshot(snapshot);
        Ok(subscription)
    }

    /// One eviction pass at the current clock time.
    pub async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let rule = SweepRule {
            now: self.clock.now(),
            ttl: self.retention.ttl,
            hide_threshold: self.retention.hide_threshold,
            max_evictions: self.retention.max_evictions_per_sweep,
        };
        let _order = self.publish_order.lock().await;
        let report = self.repo.evict(&rule).await?;

        // Hidden fish were announced when they crossed the threshold.
        for id in &report.expired {
            self.broadcaster.publish(Sequenced {
                seq: report.seq,
                value: FishEvent::ItemRemoved {
                    id: id.clone(),
                    reason: RemovalReason::Expired,
                },
            });
        }

        if report.evicted() > 0 {
            tracing::info!(
                hidden = report.hidden_evicted.len(),
                expired = report.expired.len(),
                "cleaned up old fish"
            );
        }
        Ok(report)
    }

    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimitConfig;
    use chrono::Utc;
    use domains::MockFishRepo;
    use storage_adapters::InMemoryFishStore;
    use tokio_test::{assert_err, assert_ok};

    fn candidate(label: &str, confidence: f64) -> NewFish {
        NewFish {
            label: Some(label.into()),
            content: Some("data:image/png;base64,iVBORw0KGgo".into()),
            confidence: Some(confidence),
        }
    }

    fn service_with_clock() -> (FishService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = FishService::new(Arc::new(InMemoryFishStore::default()))
            .with_clock(clock.clone());
        (service, clock)
    }

    #[tokio::test]
    async fn report_hide_and_expire_scenario() {
        let (service, clock) = service_with_clock();
        let a = assert_ok!(service.submit(candidate("A", 0.5), None).await);
        assert_eq!(service.list(&ListFilter::default()).await.unwrap(), vec![a.clone()]);

        for expected in 1..=3 {
            assert_eq!(service.report(&a.id).await.unwrap(), expected);
        }
        assert!(service.list(&ListFilter::default()).await.unwrap().is_empty());
        let stats = service.fish_stats().await.unwrap();
        assert_eq!((stats.active, stats.hidden), (0, 1));

        clock.advance(Duration::minutes(61));
        service.sweep().await.unwrap();
        assert_eq!(service.fish_stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn low_confidence_leaves_store_unchanged() {
        let (service, _) = service_with_clock();
        service.submit(candidate("keep", 0.5), None).await.unwrap();
        let before = service.fish_stats().await.unwrap();

        let err = assert_err!(service.submit(candidate("B", 0.005), None).await);
        assert_eq!(err.kind(), "low_confidence");
        assert!(err.to_string().contains("0.50%"));
        assert_eq!(service.fish_stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn unknown_report_changes_nothing() {
        let (service, _) = service_with_clock();
        service.submit(candidate("keep", 0.5), None).await.unwrap();
        let before = service.list(&ListFilter::default()).await.unwrap();

        let err = service.report(&FishId::from("nope")).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(service.list(&ListFilter::default()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn subscriber_sees_additions_and_removals() {
        let (service, clock) = service_with_clock();
        let early = service.submit(candidate("early", 0.5), None).await.unwrap();

        let mut sub = service.subscribe().await.unwrap();
        assert_eq!(sub.take_snapshot(), vec![early.clone()]);
        assert_eq!(service.stats().await.unwrap().observers, 1);

        let late = service.submit(candidate("late", 0.5), None).await.unwrap();
        assert_eq!(sub.next_event().await, Some(FishEvent::ItemAdded { item: late.clone() }));

        for _ in 0..3 {
            service.report(&late.id).await.unwrap();
        }
        assert_eq!(
            sub.next_event().await,
            Some(FishEvent::ItemRemoved { id: late.id.clone(), reason: RemovalReason::Reported })
        );

        clock.advance(Duration::hours(2));
        service.sweep().await.unwrap();
        assert_eq!(
            sub.next_event().await,
            Some(FishEvent::ItemRemoved { id: early.id, reason: RemovalReason::Expired })
        );
    }

    #[tokio::test]
    async fn rate_limiter_applies_per_origin() {
        let service = FishService::new(Arc::new(InMemoryFishStore::default())).with_rate_limiter(
            RateLimiter::new(RateLimitConfig {
                max_requests: 1,
                ..Default::default()
            }),
        );
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(service.submit(candidate("a", 0.5), Some(ip)).await.is_ok());
        let err = service.submit(candidate("b", 0.5), Some(ip)).await.unwrap_err();
        assert_eq!(err, DomainError::RateLimited);
        // unknown origin is not limited
        assert!(service.submit(candidate("c", 0.5), None).await.is_ok());
    }

    #[tokio::test]
    async fn repository_faults_surface_as_internal() {
        let mut repo = MockFishRepo::new();
        repo.expect_admit()
            .returning(|_, _| Err(DomainError::Internal("disk on fire".into())));
        let service = FishService::new(Arc::new(repo));

        let err = service.submit(candidate("a", 0.5), None).await.unwrap_err();
        assert_eq!(err.kind(), "internal");
    }
}
