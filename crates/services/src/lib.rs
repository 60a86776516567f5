//! # services
//!
//! The registry's business logic: admission, moderation, live fan-out and
//! expiry. Storage and transport live in the adapter crates.

pub mod broadcast;
pub mod clock;
pub mod fish_service;
pub mod moderation;
pub mod rate_limit;
pub mod sweeper;

pub use broadcast::{Broadcaster, Subscription, SubscriptionId, SubscriptionState};
pub use clock::{ManualClock, SystemClock};
pub use fish_service::{FishService, RetentionConfig, ServiceStats};
pub use moderation::{KeywordFilter, ModerationPolicy, PolicyConfig};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use sweeper::{Sweeper, SweeperHandle};
