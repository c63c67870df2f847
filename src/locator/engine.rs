//! Fallback-based element location
//!
//! The engine takes an ordered list of candidate selectors and one
//! [`WaitStrategy`], and polls each selector in turn until the strategy's
//! predicate holds. The first match wins: later selectors are never
//! consulted once an earlier one succeeds. Every selector gets its own
//! full timeout window, so worst-case wall time is `selectors.len() *
//! timeout`. Only complete exhaustion of the list is an error.

use crate::error::{Error, Result};
use crate::locator::stats::SearchStats;
use crate::locator::strategy::WaitStrategy;
use chromiumoxide::{Element, Page};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Default per-selector search timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between predicate evaluations while waiting on one selector
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A successful search: the matched element plus provenance
pub struct SearchOutcome {
    /// The first element matching the winning selector
    pub element: Element,
    /// The selector that produced the match
    pub selector: String,
    /// Wall time from search start to match
    pub elapsed: Duration,
}

impl std::fmt::Debug for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOutcome")
            .field("selector", &self.selector)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

/// A multi-element search: every node matching the winning selector
pub struct MultiSearchOutcome {
    /// All elements matching the winning selector; empty when no selector
    /// matched within its window
    pub elements: Vec<Element>,
    /// The selector that produced the matches, when any did
    pub selector: Option<String>,
}

impl std::fmt::Debug for MultiSearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSearchOutcome")
            .field("count", &self.elements.len())
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// Check candidates strictly in order and stop at the first hit.
///
/// `check(idx)` inspects candidate `idx` and yields its result when the
/// candidate matched; later candidates are never consulted once one
/// matches. Returns the winning index alongside the check's result, or
/// `None` when every candidate came up empty.
pub(crate) async fn first_match<T, F, Fut>(count: usize, mut check: F) -> Option<(usize, T)>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for idx in 0..count {
        if let Some(value) = check(idx).await {
            return Some((idx, value));
        }
    }
    None
}

/// Element locator with fallback selector chains and search statistics
#[derive(Debug, Clone)]
pub struct ElementLocator {
    default_timeout: Duration,
    poll_interval: Duration,
    stats: Arc<SearchStats>,
}

impl Default for ElementLocator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ElementLocator {
    /// Create a locator with the given default per-selector timeout.
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            poll_interval: POLL_INTERVAL,
            stats: Arc::new(SearchStats::new()),
        }
    }

    /// Override the predicate polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// The statistics tracker shared by every search through this locator.
    pub fn stats(&self) -> Arc<SearchStats> {
        Arc::clone(&self.stats)
    }

    /// The default per-selector timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Find the first element matching any of the candidate selectors.
    ///
    /// Selectors are tried strictly in order; each gets a full `timeout`
    /// window (the locator default when `None`). A selector whose
    /// predicate evaluation errors is logged and skipped, same as a
    /// timeout. Returns [`Error::SelectorNotFound`] carrying the complete
    /// candidate list only after every selector is exhausted.
    #[instrument(skip(self, page, selectors), fields(strategy = strategy.name()))]
    pub async fn find_one(
        &self,
        page: &Page,
        selectors: &[String],
        strategy: &WaitStrategy,
        timeout: Option<Duration>,
    ) -> Result<SearchOutcome> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        self.stats.begin_search(strategy);

        let winner = first_match(selectors.len(), |idx| {
            let selector = &selectors[idx];
            self.stats.record_selector_attempt(selector);
            debug!(%selector, "Trying selector");
            self.try_selector(page, selector, strategy, timeout)
        })
        .await;

        match winner {
            Some((idx, element)) => {
                let selector = &selectors[idx];
                let elapsed = start.elapsed();
                self.stats.record_success(selector, strategy, elapsed);
                debug!(%selector, elapsed_ms = elapsed.as_millis() as u64, "Selector matched");
                Ok(SearchOutcome {
                    element,
                    selector: selector.clone(),
                    elapsed,
                })
            }
            None => {
                self.stats.record_failure();
                Err(Error::SelectorNotFound {
                    selectors: selectors.to_vec(),
                })
            }
        }
    }

    /// Try one candidate: wait for the predicate, then resolve the node.
    async fn try_selector(
        &self,
        page: &Page,
        selector: &str,
        strategy: &WaitStrategy,
        timeout: Duration,
    ) -> Option<Element> {
        match self.wait_for_predicate(page, selector, strategy, timeout).await {
            Ok(true) => match page.find_element(selector).await {
                Ok(element) => Some(element),
                // Predicate held but the node vanished before resolution;
                // treat like a timeout and move on.
                Err(e) => {
                    warn!(%selector, error = %e, "Matched selector could not be resolved");
                    None
                }
            },
            Ok(false) => {
                debug!(%selector, timeout_ms = timeout.as_millis() as u64, "Selector timed out");
                None
            }
            Err(e) => {
                warn!(%selector, error = %e, "Predicate evaluation failed, skipping selector");
                None
            }
        }
    }

    /// Find every element matching the first selector that matches at all.
    ///
    /// When no selector produces a non-empty node list within its window
    /// the result is empty rather than an error.
    #[instrument(skip(self, page, selectors), fields(strategy = strategy.name()))]
    pub async fn find_all(
        &self,
        page: &Page,
        selectors: &[String],
        strategy: &WaitStrategy,
        timeout: Option<Duration>,
    ) -> Result<MultiSearchOutcome> {
        let timeout = timeout.unwrap_or(self.default_timeout);

        let winner = first_match(selectors.len(), |idx| {
            let selector = &selectors[idx];
            self.try_selector_all(page, selector, strategy, timeout)
        })
        .await;

        Ok(match winner {
            Some((idx, elements)) => MultiSearchOutcome {
                elements,
                selector: Some(selectors[idx].clone()),
            },
            None => MultiSearchOutcome {
                elements: Vec::new(),
                selector: None,
            },
        })
    }

    /// Try one candidate for a non-empty node list.
    async fn try_selector_all(
        &self,
        page: &Page,
        selector: &str,
        strategy: &WaitStrategy,
        timeout: Duration,
    ) -> Option<Vec<Element>> {
        match self.wait_for_predicate(page, selector, strategy, timeout).await {
            Ok(true) => match page.find_elements(selector).await {
                Ok(elements) if !elements.is_empty() => {
                    debug!(%selector, count = elements.len(), "Selector matched multiple nodes");
                    Some(elements)
                }
                Ok(_) => None,
                Err(e) => {
                    warn!(%selector, error = %e, "Node list resolution failed");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!(%selector, error = %e, "Predicate evaluation failed, skipping selector");
                None
            }
        }
    }

    /// Poll the strategy predicate for one selector until it holds or the
    /// window closes. `Ok(false)` is a timeout; `Err` is an evaluation
    /// failure on the very first poll.
    async fn wait_for_predicate(
        &self,
        page: &Page,
        selector: &str,
        strategy: &WaitStrategy,
        timeout: Duration,
    ) -> Result<bool> {
        let script = strategy.predicate_script(selector);
        let deadline = Instant::now() + timeout;
        let mut first_poll = true;

        loop {
            match page.evaluate(script.as_str()).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        return Ok(true);
                    }
                }
                Err(e) if first_poll => return Err(e.into()),
                Err(e) => {
                    // Mid-wait evaluation errors (navigation in flight)
                    // count against the window rather than aborting it.
                    debug!(%selector, error = %e, "Predicate poll failed");
                }
            }
            first_poll = false;

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locator_settings() {
        let locator = ElementLocator::default();
        assert_eq!(locator.default_timeout(), Duration::from_secs(10));
        assert_eq!(locator.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_poll_interval_floor() {
        let locator = ElementLocator::new(Duration::from_secs(5))
            .with_poll_interval(Duration::ZERO);
        assert_eq!(locator.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_stats_shared_across_clones() {
        let locator = ElementLocator::default();
        let clone = locator.clone();
        locator.stats().begin_search(&WaitStrategy::Presence);
        assert_eq!(clone.stats().snapshot().total_searches, 1);
    }

    #[tokio::test]
    async fn test_first_match_stops_at_the_earliest_hit() {
        let calls = std::cell::Cell::new(0u32);
        let candidates = ["h1.title", "h1#x", "h1"];
        let hit = first_match(candidates.len(), |idx| {
            calls.set(calls.get() + 1);
            // Only the last candidate matches anything.
            async move { (candidates[idx] == "h1").then(|| candidates[idx]) }
        })
        .await;
        assert_eq!(hit, Some((2, "h1")));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_first_match_never_looks_past_a_winner() {
        let calls = std::cell::Cell::new(0u32);
        let hit = first_match(3, |idx| {
            calls.set(calls.get() + 1);
            async move { (idx == 0).then_some("first") }
        })
        .await;
        assert_eq!(hit, Some((0, "first")));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_first_match_exhausts_every_candidate() {
        let calls = std::cell::Cell::new(0u32);
        let hit: Option<(usize, ())> = first_match(4, |_| {
            calls.set(calls.get() + 1);
            async move { None }
        })
        .await;
        assert_eq!(hit, None);
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_first_match_empty_candidate_list() {
        let hit: Option<(usize, ())> = first_match(0, |_| async move { Some(()) }).await;
        assert_eq!(hit, None);
    }
}
