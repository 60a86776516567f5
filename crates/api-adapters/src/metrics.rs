//! Prometheus metrics exposed at `/metrics`.
//!
//! Counters are bumped by the handlers; the fish and observer gauges are
//! refreshed from the service right before each scrape.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use services::ServiceStats;

pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StateLabels {
    pub state: String,
}

pub struct Metrics {
    registry: Registry,
    submissions: Family<OutcomeLabels, Counter>,
    reports: Counter,
    fish: Family<StateLabels, Gauge>,
    observers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("fishtank");
        let submissions = Family::<OutcomeLabels, Counter>::default();
        let reports = Counter::default();
        let fish = Family::<StateLabels, Gauge>::default();
        let observers = Gauge::default();

        registry.register(
            "submissions",
            "Fish submissions by outcome (admitted or error kind)",
            submissions.clone(),
        );
        registry.register("reports", "Reports accepted against stored fish", reports.clone());
        registry.register("fish", "Fish currently held by the registry", fish.clone());
        registry.register("observers", "Connected live-feed observers", observers.clone());

        Self {
            registry,
            submissions,
            reports,
            fish,
            observers,
        }
    }

    pub fn record_submission(&self, outcome: &str) {
        self.submissions
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_report(&self) {
        self.reports.inc();
    }

    pub fn observe(&self, stats: &ServiceStats) {
        for (state, value) in [("active", stats.active), ("hidden", stats.hidden)] {
            self.fish
                .get_or_create(&StateLabels {
                    state: state.to_string(),
                })
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
        self.observers
            .set(i64::try_from(stats.observers).unwrap_or(i64::MAX));
    }

    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
