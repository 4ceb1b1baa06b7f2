use std::sync::Arc;
use tracing::{debug, trace};

use crate::{
    barrier::{PhaseBarrier, Round},
    error::BarrierError,
    report::{Reporter, RoundReport},
    slot::SharedDataSlot,
    timer::Timer,
    workload::{Dimensioned, Workload},
};

/// What a worker did before its loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub id: usize,
    /// Rounds computed, including failed ones.
    pub rounds: u64,
    /// Rounds whose workload returned an error.
    pub failures: u64,
}

/// One worker's compute-signal-wait cycle.
pub struct WorkerLoop<T, W: Workload<T>> {
    id: usize,
    barrier: Arc<PhaseBarrier>,
    slot: Arc<SharedDataSlot<T>>,
    workload: W,
    reporter: Arc<dyn Reporter<W::Output>>,
    timer: Timer,
}

impl<T, W> WorkerLoop<T, W>
where
    T: Dimensioned,
    W: Workload<T>,
{
    pub fn new(
        id: usize,
        barrier: Arc<PhaseBarrier>,
        slot: Arc<SharedDataSlot<T>>,
        workload: W,
        reporter: Arc<dyn Reporter<W::Output>>,
        timer: Timer,
    ) -> Self {
        WorkerLoop {
            id,
            barrier,
            slot,
            workload,
            reporter,
            timer,
        }
    }

    /// Runs rounds until the barrier is closed.
    ///
    /// Returns the summary on a clean shutdown and the barrier error if the
    /// run was aborted.
    pub fn run(mut self) -> Result<WorkerSummary, BarrierError> {
        let barrier = Arc::clone(&self.barrier);
        let _guard = barrier.abort_on_panic(format!("worker {}", self.id));

        let mut summary = WorkerSummary {
            id: self.id,
            rounds: 0,
            failures: 0,
        };
        let mut round = barrier.round();

        loop {
            self.compute(round, &mut summary);

            trace!(worker = self.id, round, "signalling completion");
            match barrier.signal_completion() {
                Ok(next) => round = next,
                Err(BarrierError::Shutdown) => {
                    debug!(worker = self.id, rounds = summary.rounds, "worker stopped");
                    return Ok(summary);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn compute(&mut self, round: Round, summary: &mut WorkerSummary) {
        let snapshot = self.slot.read();
        assert_eq!(
            snapshot.round(),
            round,
            "Worker {} released into round {} but found round {} data",
            self.id,
            round,
            snapshot.round()
        );

        let size = snapshot.size();
        self.timer.start_computation(self.id, size);
        let outcome = self.workload.run(&snapshot);
        let elapsed = self.timer.end_computation(self.id).unwrap_or_default();

        summary.rounds += 1;
        if outcome.is_err() {
            summary.failures += 1;
        }

        self.reporter.report(&RoundReport {
            worker: self.id,
            round,
            size,
            elapsed,
            outcome: &outcome,
        });
    }
}
