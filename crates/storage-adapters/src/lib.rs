//! # storage-adapters
//!
//! Implementations of the `FishRepo` port.

pub mod memory;

pub use memory::InMemoryFishStore;
