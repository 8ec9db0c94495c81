//! Integration tests for the bounded scheduler.
//!
//! Uses lightweight jobs in place of scenarios to observe ordering,
//! concurrency bounds and port allocation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use iwpotest_cli::scheduler::{Scheduler, drive};
use iwpotest_core::config::HarnessConfig;
use iwpotest_core::ports::PortAllocator;
use iwpotest_scenario::{Scenario, ScenarioState};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_peak_in_flight_never_exceeds_bound() {
    // Given: 12 jobs and a bound of 3
    let scheduler = Scheduler::new(3, Arc::new(PortAllocator::new(20000)));
    let items: Vec<usize> = (0..12).collect();

    // When: Every job sleeps so lanes overlap
    let schedule = scheduler
        .run_with(items, |item, _ports| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            item
        })
        .await
        .expect("schedule should complete");

    // Then: At most 3 were in flight and results keep input order
    assert_eq!(schedule.workers, 3);
    assert!(schedule.peak_in_flight <= 3, "peak was {}", schedule.peak_in_flight);
    assert!(schedule.peak_in_flight >= 1);
    assert_eq!(schedule.results, (0..12).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_results_keep_input_order_when_completion_differs() {
    let scheduler = Scheduler::new(0, Arc::new(PortAllocator::new(20100)));
    let items: Vec<u64> = vec![50, 10, 30, 0];

    let schedule = scheduler
        .run_with(items, |delay, _ports| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        })
        .await
        .expect("schedule should complete");

    assert_eq!(schedule.workers, 4, "0 means one lane per item");
    assert_eq!(schedule.results, vec![50, 10, 30, 0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_allocated_ports_never_repeat() {
    let scheduler = Scheduler::new(4, Arc::new(PortAllocator::new(20200)));
    let items: Vec<Option<(u16, u16, u16)>> = vec![None; 16];

    let schedule = scheduler
        .run_with(items, |_, ports| async move {
            let set = ports.next_set().expect("ports available");
            Some((set.http, set.tcp, set.udp))
        })
        .await
        .expect("schedule should complete");

    let mut seen = HashSet::new();
    for (http, tcp, udp) in schedule.results.into_iter().flatten() {
        assert!(seen.insert(http));
        assert!(seen.insert(tcp));
        assert!(seen.insert(udp));
    }
    assert_eq!(seen.len(), 48);
}

#[tokio::test]
async fn test_single_lane_runs_sequentially() {
    let scheduler = Scheduler::new(1, Arc::new(PortAllocator::new(20400)));

    let schedule = scheduler
        .run_with(vec!["a", "b", "c"], |item, _ports| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            item
        })
        .await
        .expect("schedule should complete");

    assert_eq!(schedule.workers, 1);
    assert_eq!(schedule.peak_in_flight, 1);
    assert_eq!(schedule.results, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_unread_scenario_fails_with_message() {
    let root = tempfile::TempDir::new().expect("should create temp dir");
    let mut harness = HarnessConfig::default();
    harness.paths.temp_dir = root.path().join("temp");
    harness.paths.companion = vec!["/nonexistent/companion".to_owned()];
    let path = root.path().join("never_parsed.iwpotest");

    // Given: A scenario that was never parsed
    let scenario = Scenario::new(Arc::new(harness), path);
    assert_eq!(scenario.state(), ScenarioState::Unread);

    // When: The lane job drives it
    let scenario = drive(scenario, Arc::new(PortAllocator::new(20500))).await;

    // Then: It ends failed with a reason instead of staying unread
    assert_eq!(scenario.state(), ScenarioState::Failed);
    let message = scenario.message().expect("failure should carry a message");
    assert!(message.contains("unread"), "{message}");
}
