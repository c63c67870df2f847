//! Property-based testing for statistics and headless resolution.
//!
//! Uses proptest to drive the tracker with arbitrary event sequences and
//! verify counter invariants, the snapshot/restore law, and the JSON
//! persistence round trip.

use driftlock::config::{resolve_headless, HeadlessEnv};
use driftlock::locator::stats::Operation;
use driftlock::locator::{SearchStats, StatsSnapshot, WaitStrategy};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// EVENT MODEL
// ============================================================================

/// One externally observable statistics event
#[derive(Debug, Clone)]
enum StatsEvent {
    Success {
        selector: String,
        strategy: WaitStrategy,
        elapsed_ms: u64,
    },
    Failure {
        selector: String,
        strategy: WaitStrategy,
    },
    Retries {
        op: Operation,
        count: u64,
    },
}

fn arb_selector() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("div.response".to_string()),
        Just("button[data-testid='send']".to_string()),
        Just("#prompt-textarea".to_string()),
        "[a-z]{1,8}(\\.[a-z]{1,8})?",
    ]
}

fn arb_strategy() -> impl Strategy<Value = WaitStrategy> {
    prop_oneof![
        Just(WaitStrategy::Presence),
        Just(WaitStrategy::Visible),
        Just(WaitStrategy::Clickable),
        "[a-z]{1,10}".prop_map(WaitStrategy::TextPresent),
        "[a-z-]{1,10}".prop_map(WaitStrategy::AttributePresent),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Click),
        Just(Operation::SendKeys),
        Just(Operation::GetText),
    ]
}

fn arb_event() -> impl Strategy<Value = StatsEvent> {
    prop_oneof![
        (arb_selector(), arb_strategy(), 1u64..30_000).prop_map(
            |(selector, strategy, elapsed_ms)| StatsEvent::Success {
                selector,
                strategy,
                elapsed_ms,
            }
        ),
        (arb_selector(), arb_strategy()).prop_map(|(selector, strategy)| StatsEvent::Failure {
            selector,
            strategy,
        }),
        (arb_operation(), 0u64..10).prop_map(|(op, count)| StatsEvent::Retries { op, count }),
    ]
}

fn apply_events(stats: &SearchStats, events: &[StatsEvent]) {
    for event in events {
        match event {
            StatsEvent::Success {
                selector,
                strategy,
                elapsed_ms,
            } => {
                stats.begin_search(strategy);
                stats.record_selector_attempt(selector);
                stats.record_success(selector, strategy, Duration::from_millis(*elapsed_ms));
            }
            StatsEvent::Failure { selector, strategy } => {
                stats.begin_search(strategy);
                stats.record_selector_attempt(selector);
                stats.record_failure();
            }
            StatsEvent::Retries { op, count } => {
                stats.record_retries(*op, *count);
            }
        }
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    /// Every search is either a success or a failure, never both.
    #[test]
    fn prop_counters_balance(events in prop::collection::vec(arb_event(), 0..50)) {
        let stats = SearchStats::new();
        apply_events(&stats, &events);

        let snap = stats.snapshot();
        prop_assert_eq!(
            snap.total_searches,
            snap.successful_searches + snap.failed_searches
        );
    }

    /// Timing extremes bracket the running average whenever there is data.
    #[test]
    fn prop_timing_extremes_bracket_average(events in prop::collection::vec(arb_event(), 1..50)) {
        let stats = SearchStats::new();
        apply_events(&stats, &events);

        let timing = stats.snapshot().timing;
        if let Some(fastest) = timing.fastest_secs {
            prop_assert!(fastest <= timing.slowest_secs);
            prop_assert!(fastest <= timing.average_secs + 1e-9);
            prop_assert!(timing.average_secs <= timing.slowest_secs + 1e-9);
        } else {
            prop_assert_eq!(timing.slowest_secs, 0.0);
            prop_assert_eq!(timing.average_secs, 0.0);
        }
    }

    /// Restoring a snapshot reproduces it exactly, regardless of the
    /// replica's own prior state.
    #[test]
    fn prop_snapshot_restore_law(
        events in prop::collection::vec(arb_event(), 0..50),
        noise in prop::collection::vec(arb_event(), 0..20),
    ) {
        let source = SearchStats::new();
        apply_events(&source, &events);
        let snapshot = source.snapshot();

        let replica = SearchStats::new();
        apply_events(&replica, &noise);
        replica.restore(snapshot.clone());

        prop_assert_eq!(replica.snapshot(), snapshot);
    }

    /// A snapshot survives the JSON wire format byte-exactly as a value,
    /// including the no-data timing sentinel.
    #[test]
    fn prop_snapshot_json_round_trip(events in prop::collection::vec(arb_event(), 0..50)) {
        let stats = SearchStats::new();
        apply_events(&stats, &events);
        let snapshot = stats.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: StatsSnapshot = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, snapshot);
    }

    /// Selector attempts never undercount successes.
    #[test]
    fn prop_selector_successes_bounded_by_attempts(
        events in prop::collection::vec(arb_event(), 0..50),
    ) {
        let stats = SearchStats::new();
        apply_events(&stats, &events);

        for (selector, usage) in stats.snapshot().selector_usage {
            prop_assert!(
                usage.successes <= usage.attempts,
                "selector {} has {} successes over {} attempts",
                selector, usage.successes, usage.attempts
            );
        }
    }

    /// An explicit headless override always wins over environment and
    /// configuration.
    #[test]
    fn prop_explicit_headless_override_wins(
        explicit in any::<bool>(),
        ci in any::<bool>(),
        forced in any::<bool>(),
        configured in any::<bool>(),
    ) {
        let env = HeadlessEnv { ci, forced };
        prop_assert_eq!(resolve_headless(Some(explicit), env, configured), explicit);
    }

    /// Without an override, any environment signal forces headless.
    #[test]
    fn prop_env_signal_forces_headless(
        ci in any::<bool>(),
        forced in any::<bool>(),
        configured in any::<bool>(),
    ) {
        let env = HeadlessEnv { ci, forced };
        let effective = resolve_headless(None, env, configured);
        if ci || forced {
            prop_assert!(effective);
        } else {
            prop_assert_eq!(effective, configured);
        }
    }
}
