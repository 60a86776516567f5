//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Fish, FishDraft, FishId, FishStats, ListFilter, ReportOutcome, Sequenced, Snapshot,
    SweepReport, SweepRule,
};

/// The Item Store contract.
///
/// Every mutating call advances a store-wide sequence number and returns it,
/// so observers can line up snapshots with live events. Admit, report and
/// evict are mutually exclusive; reads see one consistent instant.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FishRepo: Send + Sync {
    /// Assigns an id and `created_at`, then appends the fish.
    async fn admit(&self, draft: FishDraft, now: DateTime<Utc>) -> Result<Sequenced<Fish>>;

    async fn get(&self, id: &FishId) -> Result<Option<Fish>>;

    /// Non-hidden fish, newest first.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Fish>>;

    /// Increments the report count by one. Unknown ids yield `NotFound`.
    async fn report(&self, id: &FishId) -> Result<ReportOutcome>;

    async fn stats(&self) -> Result<FishStats>;

    /// All non-hidden fish plus the sequence they were captured at.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Removes everything the rule selects in a single atomic pass.
    async fn evict(&self, rule: &SweepRule) -> Result<SweepReport>;
}

/// Pluggable content check run during admission.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ContentFilter: Send + Sync {
    /// Returns `false` when the payload must be rejected.
    fn is_appropriate(&self, content: &str) -> bool;
}

/// Time source, injectable so sweeps can be driven deterministically.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
