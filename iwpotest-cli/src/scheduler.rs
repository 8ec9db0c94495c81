//! Bounded scenario scheduler
//!
//! Splits the scenario list into round-robin lanes, one tokio task per lane.
//! Each lane drives its scenarios one after another, so at most
//! `max_parallel` scenarios are in flight. The [`PortAllocator`] is the only
//! state shared between lanes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use iwpotest_core::metrics as m;
use iwpotest_core::ports::PortAllocator;
use iwpotest_scenario::Scenario;

use crate::error::CliError;

/// Round-robin partition of `n` indices over `workers` lanes.
///
/// Lane `i` gets `i, i + workers, i + 2 * workers, ...`. Returns no lanes
/// when `n` or `workers` is 0.
pub fn partition(n: usize, workers: usize) -> Vec<Vec<usize>> {
    if n == 0 || workers == 0 {
        return Vec::new();
    }
    (0..workers.min(n))
        .map(|lane| (lane..n).step_by(workers).collect())
        .collect()
}

/// Results of one scheduled run.
#[derive(Debug)]
pub struct Schedule<T> {
    /// Items in input order.
    pub results: Vec<T>,
    /// Number of lanes used.
    pub workers: usize,
    /// Highest number of items observed in flight at once.
    pub peak_in_flight: usize,
}

/// Bounded-concurrency scenario runner.
pub struct Scheduler {
    max_parallel: usize,
    ports: Arc<PortAllocator>,
}

impl Scheduler {
    /// `max_parallel` of 0 means one lane per scenario.
    pub fn new(max_parallel: usize, ports: Arc<PortAllocator>) -> Self {
        Self {
            max_parallel,
            ports,
        }
    }

    /// Number of lanes used for `n` scenarios.
    pub fn worker_count(&self, n: usize) -> usize {
        match self.max_parallel {
            0 => n,
            k => k.min(n),
        }
    }

    /// Drive every scenario through initialize, run and clean.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> Result<Schedule<Scenario>, CliError> {
        self.run_with(scenarios, drive).await
    }

    /// Run `items` through `job` with bounded concurrency.
    ///
    /// Results come back in input order regardless of completion order.
    pub async fn run_with<T, F, Fut>(&self, items: Vec<T>, job: F) -> Result<Schedule<T>, CliError>
    where
        T: Send + 'static,
        F: Fn(T, Arc<PortAllocator>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let n = items.len();
        let workers = self.worker_count(n);
        let lanes = partition(n, workers);

        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let job = Arc::new(job);
        let tracker = Arc::new(InFlight::default());

        info!(scenarios = n, workers, "scheduling scenarios");

        let mut handles = Vec::with_capacity(lanes.len());
        for (lane, indices) in lanes.into_iter().enumerate() {
            let batch: Vec<(usize, T)> = indices
                .into_iter()
                .filter_map(|i| slots[i].take().map(|item| (i, item)))
                .collect();
            let job = Arc::clone(&job);
            let ports = Arc::clone(&self.ports);
            let tracker = Arc::clone(&tracker);

            handles.push(tokio::spawn(async move {
                let mut done = Vec::with_capacity(batch.len());
                for (index, item) in batch {
                    let _slot = tracker.enter();
                    debug!(lane, index, "lane picked up scenario");
                    done.push((index, (*job)(item, Arc::clone(&ports)).await));
                }
                done
            }));
        }

        for handle in handles {
            let done = handle
                .await
                .map_err(|e| CliError::Command(format!("scenario worker failed: {e}")))?;
            for (index, item) in done {
                slots[index] = Some(item);
            }
        }

        let results = slots
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| CliError::Command("scenario result missing after run".to_owned()))?;

        Ok(Schedule {
            results,
            workers,
            peak_in_flight: tracker.peak(),
        })
    }
}

/// Per-scenario lane job: initialize, run, always clean.
///
/// Each step runs only while the scenario is not terminal; a scenario that
/// was never parsed fails in `initialize` with an invalid-state message.
pub async fn drive(mut scenario: Scenario, ports: Arc<PortAllocator>) -> Scenario {
    if scenario.can_execute() {
        scenario.initialize().await;
    }
    if scenario.can_execute() {
        scenario.run(&ports).await;
    }
    scenario.clean().await;
    scenario
}

/// In-flight counter with a high-water mark.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightSlot<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        metrics::gauge!(m::SCENARIOS_IN_FLIGHT).increment(1.0);
        InFlightSlot { owner: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightSlot<'a> {
    owner: &'a InFlight,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.owner.current.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(m::SCENARIOS_IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_round_robin() {
        assert_eq!(
            partition(7, 3),
            vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]
        );
        assert_eq!(partition(2, 5), vec![vec![0], vec![1]]);
        assert_eq!(partition(3, 1), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn partition_empty() {
        assert!(partition(0, 4).is_empty());
        assert!(partition(4, 0).is_empty());
    }

    #[test]
    fn partition_covers_every_index_once() {
        let mut all: Vec<usize> = partition(23, 4).into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn worker_count_bounds() {
        let ports = Arc::new(PortAllocator::default());
        assert_eq!(Scheduler::new(0, Arc::clone(&ports)).worker_count(5), 5);
        assert_eq!(Scheduler::new(2, Arc::clone(&ports)).worker_count(5), 2);
        assert_eq!(Scheduler::new(8, Arc::clone(&ports)).worker_count(5), 5);
        assert_eq!(Scheduler::new(3, ports).worker_count(0), 0);
    }

    #[tokio::test]
    async fn empty_input_runs_nothing() {
        let scheduler = Scheduler::new(4, Arc::new(PortAllocator::default()));
        let schedule = scheduler
            .run_with(Vec::<u32>::new(), |item, _ports| async move { item })
            .await
            .unwrap();
        assert!(schedule.results.is_empty());
        assert_eq!(schedule.workers, 0);
        assert_eq!(schedule.peak_in_flight, 0);
    }
}
