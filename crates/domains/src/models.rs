//! # Domain Models
//!
//! These structs represent the core entities of the fish tank.
//! Fish ids are UUID v7 so their text form sorts by admission time.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of reports after which a fish is hidden.
pub const DEFAULT_HIDE_THRESHOLD: u32 = 3;

/// Default number of fish returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard ceiling on a single listing page.
pub const MAX_LIST_LIMIT: usize = 500;

/// Opaque, string-sortable fish identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FishId(String);

impl FishId {
    /// Allocates a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FishId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FishId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted fish sketch as tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fish {
    pub id: FishId,
    /// Display nickname, already truncated by the moderation policy
    pub label: String,
    /// The sketch itself, usually a `data:image/png;base64,...` URL
    pub content: String,
    /// Fish-likelihood reported by the drawing client
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub report_count: u32,
}

impl Fish {
    pub fn is_hidden(&self, threshold: u32) -> bool {
        self.report_count >= threshold
    }
}

/// Raw submission as received from a client. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFish {
    #[serde(default, alias = "nickname")]
    pub label: Option<String>,
    #[serde(default, alias = "imageBase64")]
    pub content: Option<String>,
    #[serde(default, alias = "prob")]
    pub confidence: Option<f64>,
}

/// A submission that passed moderation and is ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FishDraft {
    pub label: String,
    pub content: String,
    pub confidence: f64,
}

/// A value stamped with the store mutation sequence it was produced at.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub value: T,
}

/// Parameters of a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Only fish admitted after this one
    pub since: Option<FishId>,
    pub limit: usize,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            since: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ListFilter {
    /// Builds a filter from loosely-typed query input. A missing or zero limit
    /// falls back to the default; oversized limits are clamped.
    pub fn new(since: Option<FishId>, limit: Option<usize>) -> Self {
        let limit = match limit {
            None | Some(0) => DEFAULT_LIST_LIMIT,
            Some(n) => n.min(MAX_LIST_LIMIT),
        };
        Self { since, limit }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FishStats {
    pub total: usize,
    pub active: usize,
    pub hidden: usize,
}

/// The non-hidden fish at one instant, plus the sequence it was captured at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub items: Vec<Fish>,
    pub watermark: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report_count: u32,
    /// True only for the report that pushed the count over the threshold
    pub became_hidden: bool,
    pub seq: u64,
}

/// Eviction predicate for one sweep pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRule {
    pub now: DateTime<Utc>,
    pub ttl: Duration,
    pub hide_threshold: u32,
    /// Upper bound on evictions in this pass; the remainder waits a tick
    pub max_evictions: usize,
}

impl SweepRule {
    pub fn is_expired(&self, fish: &Fish) -> bool {
        self.now - fish.created_at > self.ttl
    }

    pub fn should_evict(&self, fish: &Fish) -> bool {
        fish.is_hidden(self.hide_threshold) || self.is_expired(fish)
    }
}

/// What a sweep pass removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub hidden_evicted: Vec<FishId>,
    pub expired: Vec<FishId>,
    /// Report records dropped because their fish no longer exists
    pub reports_reconciled: usize,
    /// Sequence of the pass; zero when nothing changed
    pub seq: u64,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.hidden_evicted.len() + self.expired.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Reported,
    Expired,
}

/// Live update pushed to tank observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FishEvent {
    ItemAdded { item: Fish },
    ItemRemoved { id: FishId, reason: RemovalReason },
}
