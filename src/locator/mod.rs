//! Element location with fallback selectors, wait strategies, and
//! search statistics.

pub mod engine;
pub mod stats;
pub mod strategy;

pub use engine::{ElementLocator, MultiSearchOutcome, SearchOutcome, DEFAULT_TIMEOUT, POLL_INTERVAL};
pub use stats::{measure, Operation, RetryCounters, SearchStats, StatsSnapshot, TimingStats, UsageCounter};
pub use strategy::WaitStrategy;
