//! Search statistics tracking
//!
//! Process-lifetime aggregate of locator and interaction bookkeeping:
//! search totals, per-selector and per-strategy success counters, retry
//! totals by operation kind, and timing extremes. Counters accumulate
//! monotonically until [`SearchStats::reset`] and are never persisted
//! implicitly; [`SearchStats::snapshot`] / [`SearchStats::restore`] move
//! the full counter state as a flat record.
//!
//! A single mutex guards the whole aggregate so that every update is
//! atomic relative to the search outcome it describes.

use crate::error::Result;
use crate::locator::strategy::WaitStrategy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Interaction operation kinds with independent retry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `safe_click`
    Click,
    /// `safe_send_keys`
    SendKeys,
    /// `safe_get_text`
    GetText,
}

impl Operation {
    /// Stable key for reporting
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Click => "click",
            Operation::SendKeys => "send_keys",
            Operation::GetText => "get_text",
        }
    }
}

/// Attempt/success pair for one selector or strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Times this key was tried
    pub attempts: u64,
    /// Times it produced the winning match
    pub successes: u64,
}

impl UsageCounter {
    /// Success rate in percent; 0 when never attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.successes as f64 / self.attempts as f64) * 100.0
        }
    }
}

/// Retry totals per interaction operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryCounters {
    /// Retries consumed by click operations
    pub click: u64,
    /// Retries consumed by text-entry operations
    pub send_keys: u64,
    /// Retries consumed by text-extraction operations
    pub get_text: u64,
}

impl RetryCounters {
    /// Total retries across every operation kind
    pub fn total(&self) -> u64 {
        self.click + self.send_keys + self.get_text
    }
}

/// Timing extremes and running average over successful searches.
///
/// `fastest_secs` is `None` until the first success; that is the "no data
/// yet" sentinel `reset()` returns to (the JSON snapshot cannot carry an
/// IEEE infinity, so absence stands in for it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Fastest successful search, seconds
    pub fastest_secs: Option<f64>,
    /// Slowest successful search, seconds
    pub slowest_secs: f64,
    /// Running average over successful searches, seconds
    pub average_secs: f64,
}

/// Flat, serializable snapshot of every counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total `find_one` calls
    pub total_searches: u64,
    /// Searches that returned an element
    pub successful_searches: u64,
    /// Searches that exhausted every selector
    pub failed_searches: u64,
    /// Per-selector attempt/success counters
    pub selector_usage: HashMap<String, UsageCounter>,
    /// Per-strategy attempt/success counters
    pub strategy_success: HashMap<String, UsageCounter>,
    /// Retry totals by interaction operation
    pub retry_counts: RetryCounters,
    /// Timing extremes and average
    pub timing: TimingStats,
}

impl StatsSnapshot {
    fn seeded() -> Self {
        let mut snapshot = Self::default();
        for name in WaitStrategy::all_names() {
            snapshot
                .strategy_success
                .insert(name.to_string(), UsageCounter::default());
        }
        snapshot
    }
}

/// Thread-safe statistics tracker, created with the locator engine
#[derive(Debug)]
pub struct SearchStats {
    inner: Mutex<StatsSnapshot>,
}

impl Default for SearchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStats {
    /// Create a tracker with per-strategy counters pre-seeded
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsSnapshot::seeded()),
        }
    }

    /// Record the start of a search call: bumps the global counter and the
    /// strategy's attempt counter.
    pub fn begin_search(&self, strategy: &WaitStrategy) {
        let mut inner = self.inner.lock();
        inner.total_searches += 1;
        inner
            .strategy_success
            .entry(strategy.name().to_string())
            .or_default()
            .attempts += 1;
    }

    /// Record one attempt against a selector.
    pub fn record_selector_attempt(&self, selector: &str) {
        let mut inner = self.inner.lock();
        inner
            .selector_usage
            .entry(selector.to_string())
            .or_default()
            .attempts += 1;
    }

    /// Record a successful search: winning selector, strategy, and timing.
    pub fn record_success(&self, selector: &str, strategy: &WaitStrategy, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let mut inner = self.inner.lock();
        inner.successful_searches += 1;
        inner
            .selector_usage
            .entry(selector.to_string())
            .or_default()
            .successes += 1;
        inner
            .strategy_success
            .entry(strategy.name().to_string())
            .or_default()
            .successes += 1;

        let timing = &mut inner.timing;
        timing.fastest_secs = Some(match timing.fastest_secs {
            Some(fastest) => fastest.min(secs),
            None => secs,
        });
        timing.slowest_secs = timing.slowest_secs.max(secs);

        // Running average over successful searches only.
        let n = inner.successful_searches as f64;
        inner.timing.average_secs = ((inner.timing.average_secs * (n - 1.0)) + secs) / n;
    }

    /// Record an exhausted search (every selector failed).
    pub fn record_failure(&self) {
        self.inner.lock().failed_searches += 1;
    }

    /// Record retries consumed by an interaction operation. These are
    /// independent of the search counters.
    pub fn record_retries(&self, op: Operation, count: u64) {
        let mut inner = self.inner.lock();
        match op {
            Operation::Click => inner.retry_counts.click += count,
            Operation::SendKeys => inner.retry_counts.send_keys += count,
            Operation::GetText => inner.retry_counts.get_text += count,
        }
    }

    /// Copy out the full counter state.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }

    /// Replace the full counter state with a previously taken snapshot.
    pub fn restore(&self, snapshot: StatsSnapshot) {
        *self.inner.lock() = snapshot;
    }

    /// Zero every counter, returning timing extremes to their "no data
    /// yet" sentinel. Engine configuration is untouched.
    pub fn reset(&self) {
        *self.inner.lock() = StatsSnapshot::seeded();
        info!("Search statistics reset");
    }

    /// Persist the snapshot as a JSON blob.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Statistics saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Restore the snapshot from a JSON blob written by [`save_to`].
    ///
    /// [`save_to`]: SearchStats::save_to
    pub fn load_from<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let snapshot: StatsSnapshot = serde_json::from_str(&raw)?;
        self.restore(snapshot);
        info!("Statistics loaded from {}", path.as_ref().display());
        Ok(())
    }

    /// Render a human-readable summary of the counters.
    pub fn report(&self) -> String {
        let stats = self.snapshot();
        let mut out = String::new();

        out.push_str("=== Search Statistics ===\n");
        out.push_str(&format!("Total searches: {}\n", stats.total_searches));
        out.push_str(&format!("Successful: {}\n", stats.successful_searches));
        out.push_str(&format!("Failed: {}\n", stats.failed_searches));

        if stats.total_searches > 0 {
            let rate =
                (stats.successful_searches as f64 / stats.total_searches as f64) * 100.0;
            out.push_str(&format!("Success rate: {rate:.1}%\n"));
        }

        if let Some(fastest) = stats.timing.fastest_secs {
            out.push_str(&format!("Fastest search: {fastest:.3}s\n"));
            out.push_str(&format!("Slowest search: {:.3}s\n", stats.timing.slowest_secs));
            out.push_str(&format!("Average search: {:.3}s\n", stats.timing.average_secs));
        }

        let mut selectors: Vec<_> = stats.selector_usage.iter().collect();
        selectors.sort_by(|a, b| b.1.attempts.cmp(&a.1.attempts).then(a.0.cmp(b.0)));
        if !selectors.is_empty() {
            out.push_str("Top selectors by usage:\n");
            for (selector, usage) in selectors.iter().take(5) {
                out.push_str(&format!(
                    "  {selector}: {} attempts, {:.1}% success\n",
                    usage.attempts,
                    usage.success_rate()
                ));
            }
        }

        out.push_str("Strategy success rates:\n");
        let mut strategies: Vec<_> = stats.strategy_success.iter().collect();
        strategies.sort_by(|a, b| a.0.cmp(b.0));
        for (name, usage) in strategies {
            if usage.attempts > 0 {
                out.push_str(&format!("  {name}: {:.1}%\n", usage.success_rate()));
            }
        }

        let retries = stats.retry_counts;
        if retries.total() > 0 {
            out.push_str(&format!("Total retries: {}\n", retries.total()));
            out.push_str(&format!("  click: {}\n", retries.click));
            out.push_str(&format!("  send_keys: {}\n", retries.send_keys));
            out.push_str(&format!("  get_text: {}\n", retries.get_text));
        }

        out
    }
}

/// Time an arbitrary unit of async work, returning the result alongside
/// the elapsed duration.
pub async fn measure<F, T>(fut: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let value = fut.await;
    (value, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elapsed(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_counters_balance_after_n_searches() {
        let stats = SearchStats::new();
        for i in 0..10u64 {
            stats.begin_search(&WaitStrategy::Presence);
            stats.record_selector_attempt("div");
            if i % 3 == 0 {
                stats.record_failure();
            } else {
                stats.record_success("div", &WaitStrategy::Presence, elapsed(50));
            }
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total_searches, 10);
        assert_eq!(snap.successful_searches + snap.failed_searches, 10);
    }

    #[test]
    fn test_timing_extremes_track_min_and_max() {
        let stats = SearchStats::new();
        for ms in [300, 100, 200] {
            stats.begin_search(&WaitStrategy::Visible);
            stats.record_success("div", &WaitStrategy::Visible, elapsed(ms));
        }

        let timing = stats.snapshot().timing;
        assert_eq!(timing.fastest_secs, Some(0.1));
        assert_eq!(timing.slowest_secs, 0.3);
        assert!((timing.average_secs - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_reset_returns_timing_to_sentinel() {
        let stats = SearchStats::new();
        stats.begin_search(&WaitStrategy::Presence);
        stats.record_success("div", &WaitStrategy::Presence, elapsed(120));
        stats.record_retries(Operation::Click, 3);

        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.total_searches, 0);
        assert_eq!(snap.successful_searches, 0);
        assert_eq!(snap.failed_searches, 0);
        assert!(snap.selector_usage.is_empty());
        assert_eq!(snap.retry_counts.total(), 0);
        assert_eq!(snap.timing.fastest_secs, None);
        assert_eq!(snap.timing.slowest_secs, 0.0);
        // Strategy counters stay seeded at zero.
        assert_eq!(snap.strategy_success.len(), 5);
        assert!(snap.strategy_success.values().all(|c| c.attempts == 0));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let stats = SearchStats::new();
        stats.begin_search(&WaitStrategy::Clickable);
        stats.record_selector_attempt("button#send");
        stats.record_success("button#send", &WaitStrategy::Clickable, elapsed(75));
        stats.record_retries(Operation::SendKeys, 2);

        let snapshot = stats.snapshot();

        let fresh = SearchStats::new();
        fresh.restore(snapshot.clone());
        assert_eq!(fresh.snapshot(), snapshot);
    }

    #[test]
    fn test_retry_counters_independent_per_operation() {
        let stats = SearchStats::new();
        stats.record_retries(Operation::Click, 3);
        stats.record_retries(Operation::GetText, 1);

        let retries = stats.snapshot().retry_counts;
        assert_eq!(retries.click, 3);
        assert_eq!(retries.send_keys, 0);
        assert_eq!(retries.get_text, 1);
        assert_eq!(retries.total(), 4);
    }

    #[test]
    fn test_report_contains_totals_and_rates() {
        let stats = SearchStats::new();
        stats.begin_search(&WaitStrategy::Presence);
        stats.record_selector_attempt("h1");
        stats.record_success("h1", &WaitStrategy::Presence, elapsed(42));
        stats.begin_search(&WaitStrategy::Presence);
        stats.record_selector_attempt("h2.missing");
        stats.record_failure();

        let report = stats.report();
        assert!(report.contains("Total searches: 2"));
        assert!(report.contains("Success rate: 50.0%"));
        assert!(report.contains("h1: 1 attempts, 100.0% success"));
        assert!(report.contains("presence"));
    }

    #[test]
    fn test_usage_counter_rate_without_attempts() {
        assert_eq!(UsageCounter::default().success_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_measure_reports_duration() {
        let (value, elapsed) = measure(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(15));
    }
}
