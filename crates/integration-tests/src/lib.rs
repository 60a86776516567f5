//! Shared fixtures for the cross-crate tests.

use std::sync::Arc;

use chrono::Utc;
use domains::NewFish;
use services::{FishService, ManualClock};
use storage_adapters::InMemoryFishStore;

pub fn sketch(label: &str, confidence: f64) -> NewFish {
    NewFish {
        label: Some(label.to_string()),
        content: Some("data:image/png;base64,iVBORw0KGgoAAAANSUhEUg".to_string()),
        confidence: Some(confidence),
    }
}

/// A service over an empty in-memory store, driven by a manual clock.
pub fn service_with_clock() -> (Arc<FishService>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = FishService::new(Arc::new(InMemoryFishStore::default())).with_clock(clock.clone());
    (Arc::new(service), clock)
}
