//! In-memory implementation of `FishRepo`.
//!
//! The whole registry sits behind one `RwLock`: admissions, reports and
//! sweeps take the write side, listings and snapshots share the read side.
//! Nothing survives a restart.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    DomainError, Fish, FishDraft, FishId, FishRepo, FishStats, ListFilter, ReportOutcome,
    Result, Sequenced, Snapshot, SweepReport, SweepRule, DEFAULT_HIDE_THRESHOLD,
};

/// Mutable registry state. Never handed out; callers only get clones.
#[derive(Debug, Default)]
struct Registry {
    /// Admission ordinal -> fish. Iterating in reverse yields newest first.
    fish: BTreeMap<u64, Fish>,
    /// Fish id -> admission ordinal
    index: HashMap<FishId, u64>,
    /// Report records: ids that crossed the hide threshold
    reported: HashSet<FishId>,
    /// Store-wide mutation sequence
    seq: u64,
}

impl Registry {
    fn bump(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn is_visible(&self, fish: &Fish, hide_threshold: u32) -> bool {
        !fish.is_hidden(hide_threshold) && !self.reported.contains(&fish.id)
    }
}

/// Where a `since` listing starts.
#[derive(Clone, Copy)]
enum Anchor<'a> {
    /// The reference fish is still stored; compare admission order
    Ordinal(u64),
    /// The reference fish is gone; fall back to id ordering
    Id(&'a FishId),
}

pub struct InMemoryFishStore {
    hide_threshold: u32,
    state: RwLock<Registry>,
}

impl InMemoryFishStore {
    pub fn new(hide_threshold: u32) -> Self {
        Self {
            hide_threshold,
            state: RwLock::new(Registry::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryFishStore {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_THRESHOLD)
    }
}

#[async_trait]
impl FishRepo for InMemoryFishStore {
    async fn admit(&self, draft: FishDraft, now: DateTime<Utc>) -> Result<Sequenced<Fish>> {
        let mut state = self.write();

        let mut id = FishId::generate();
        while state.index.contains_key(&id) {
            id = FishId::generate();
        }

        let seq = state.bump();
        let fish = Fish {
            id: id.clone(),
            label: draft.label,
            content: draft.content,
            confidence: draft.confidence,
            created_at: now,
            report_count: 0,
        };
        state.fish.insert(seq, fish.clone());
        state.index.insert(id, seq);

        Ok(Sequenced { seq, value: fish })
    }

    async fn get(&self, id: &FishId) -> Result<Option<Fish>> {
        let state = self.read();
        Ok(state
            .index
            .get(id)
            .and_then(|ordinal| state.fish.get(ordinal))
            .cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Fish>> {
        let state = self.read();

        let anchor = filter.since.as_ref().map(|since| match state.index.get(since) {
            Some(&ordinal) => Anchor::Ordinal(ordinal),
            None => Anchor::Id(since),
        });
        let lower = match anchor {
            Some(Anchor::Ordinal(ordinal)) => Bound::Excluded(ordinal),
            _ => Bound::Unbounded,
        };

        Ok(state
            .fish
            .range((lower, Bound::Unbounded))
            .rev()
            .map(|(_, fish)| fish)
            .filter(|fish| match anchor {
                Some(Anchor::Id(since)) => &fish.id > since,
                _ => true,
            })
            .filter(|fish| state.is_visible(fish, self.hide_threshold))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn report(&self, id: &FishId) -> Result<ReportOutcome> {
        let mut guard = self.write();
        let state = &mut *guard;

        let ordinal = *state
            .index
            .get(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;
        let fish = state.fish.get_mut(&ordinal).ok_or_else(|| {
            DomainError::Internal(format!("fish index out of sync for {id}"))
        })?;

        let was_hidden = fish.is_hidden(self.hide_threshold);
        fish.report_count = fish.report_count.saturating_add(1);
        let report_count = fish.report_count;
        let became_hidden = !was_hidden && fish.is_hidden(self.hide_threshold);

        if became_hidden {
            state.reported.insert(id.clone());
            tracing::info!(fish_id = %id, report_count, "fish hidden due to excessive reports");
        }
        let seq = state.bump();

        Ok(ReportOutcome {
            report_count,
            became_hidden,
            seq,
        })
    }

    async fn stats(&self) -> Result<FishStats> {
        let state = self.read();
        let hidden = state
            .fish
            .values()
            .filter(|fish| fish.is_hidden(self.hide_threshold))
            .count();
        let total = state.fish.len();

        Ok(FishStats {
            total,
            active: total - hidden,
            hidden,
        })
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let state = self.read();
        let items = state
            .fish
            .values()
            .rev()
            .filter(|fish| state.is_visible(fish, self.hide_threshold))
            .cloned()
            .collect();

        Ok(Snapshot {
            items,
            watermark: state.seq,
        })
    }

    async fn evict(&self, rule: &SweepRule) -> Result<SweepReport> {
        let mut guard = self.write();
        let state = &mut *guard;

        // Hidden fish go first so a capped pass still clears reported content.
        let mut hidden = Vec::new();
        let mut expired = Vec::new();
        for (&ordinal, fish) in &state.fish {
            if fish.is_hidden(rule.hide_threshold) {
                hidden.push(ordinal);
            } else if rule.is_expired(fish) {
                expired.push(ordinal);
            }
        }
        hidden.truncate(rule.max_evictions);
        expired.truncate(rule.max_evictions - hidden.len());

        let mut report = SweepReport::default();
        for ordinal in hidden {
            if let Some(fish) = state.fish.remove(&ordinal) {
                state.index.remove(&fish.id);
                report.hidden_evicted.push(fish.id);
            }
        }
        for ordinal in expired {
            if let Some(fish) = state.fish.remove(&ordinal) {
                state.index.remove(&fish.id);
                report.expired.push(fish.id);
            }
        }

        let before = state.reported.len();
        let index = &state.index;
        state.reported.retain(|id| index.contains_key(id));
        report.reports_reconciled = before - state.reported.len();

        if report.evicted() > 0 || report.reports_reconciled > 0 {
            report.seq = state.bump();
        }

        tracing::debug!(
            hidden = report.hidden_evicted.len(),
            expired = report.expired.len(),
            reconciled = report.reports_reconciled,
            remaining = state.fish.len(),
            "sweep pass complete"
        );

        Ok(report)
    }
}
