use std::{sync::Arc, time::Duration};
use tracing::{error, info};

use crate::{
    barrier::{AwaitOutcome, PhaseBarrier, Round},
    error::{BarrierError, Error, Result},
    matrix::{FillPolicy, MatrixPair, checked_area},
    slot::SharedDataSlot,
    workload::Dimensioned,
};

/// How the problem size changes between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    /// Multiplier applied each round. `1` keeps the size constant.
    pub factor: usize,
    /// Largest size the producer may generate. `None` grows without bound.
    pub ceiling: Option<usize>,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy {
            factor: 2,
            ceiling: None,
        }
    }
}

impl GrowthPolicy {
    /// Size following `current`, or an error if it passes the ceiling or a
    /// matrix of that size could not be indexed. The size is never clamped to
    /// the ceiling.
    pub fn next_size(&self, current: usize) -> Result<usize> {
        let requested = current
            .checked_mul(self.factor)
            .filter(|&size| checked_area(size).is_some())
            .ok_or(Error::SizeOverflow {
                current,
                factor: self.factor,
            })?;

        match self.ceiling {
            Some(ceiling) if requested > ceiling => Err(Error::CeilingReached { requested, ceiling }),
            _ => Ok(requested),
        }
    }
}

/// Builds the next round's input.
pub trait Generator<T>: Send {
    /// Size of the input for `round`, given the previous round's size.
    fn next_size(&mut self, round: Round, previous: usize) -> Result<usize>;

    /// Fresh input of the given size for `round`.
    fn fill(&mut self, round: Round, size: usize) -> anyhow::Result<T>;
}

/// Grows the matrices by a [`GrowthPolicy`] and fills them by a [`FillPolicy`].
#[derive(Debug, Clone, Default)]
pub struct MatrixGenerator {
    pub growth: GrowthPolicy,
    pub fill: FillPolicy,
}

impl Generator<MatrixPair> for MatrixGenerator {
    fn next_size(&mut self, _round: Round, previous: usize) -> Result<usize> {
        self.growth.next_size(previous)
    }

    fn fill(&mut self, round: Round, size: usize) -> anyhow::Result<MatrixPair> {
        Ok(MatrixPair::generate(size, &self.fill, round))
    }
}

/// What the producer did before its loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Rounds every worker completed.
    pub rounds: u64,
    /// Size of the last installed input.
    pub final_size: usize,
}

/// Waits for the workers, installs the next round and releases them.
pub struct ProducerLoop<T, G> {
    barrier: Arc<PhaseBarrier>,
    slot: Arc<SharedDataSlot<T>>,
    generator: G,
    max_rounds: Option<u64>,
    round_timeout: Option<Duration>,
}

impl<T, G> ProducerLoop<T, G>
where
    T: Dimensioned,
    G: Generator<T>,
{
    pub fn new(barrier: Arc<PhaseBarrier>, slot: Arc<SharedDataSlot<T>>, generator: G) -> Self {
        ProducerLoop {
            barrier,
            slot,
            generator,
            max_rounds: None,
            round_timeout: None,
        }
    }

    /// Shut the barrier down once this many rounds have completed.
    pub fn with_max_rounds(mut self, max_rounds: Option<u64>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Treat a round whose workers have not all signalled within `timeout`
    /// as stalled.
    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_timeout = timeout;
        self
    }

    /// Runs until the round limit, a shutdown or a failure.
    ///
    /// Any failure of its own aborts the barrier before returning, so workers
    /// never wait on a producer that is gone.
    pub fn run(mut self) -> Result<ProducerSummary> {
        let barrier = Arc::clone(&self.barrier);
        let _guard = barrier.abort_on_panic("producer");

        let mut summary = ProducerSummary {
            rounds: 0,
            final_size: self.slot.read().size(),
        };

        match self.drive(&mut summary) {
            Ok(()) | Err(Error::Barrier(BarrierError::Shutdown)) => {
                info!(rounds = summary.rounds, final_size = summary.final_size, "producer stopped");
                Ok(summary)
            }
            Err(err) => {
                error!(round = summary.rounds + 1, error = %err, "producer failed");
                barrier.abort(err.to_string());
                Err(err)
            }
        }
    }

    fn drive(&mut self, summary: &mut ProducerSummary) -> Result<()> {
        loop {
            let round = self.await_workers()?;
            summary.rounds = round;

            if self.max_rounds.is_some_and(|max| round >= max) {
                info!(round, "round limit reached");
                self.barrier.shutdown();
                return Ok(());
            }

            let next = round + 1;
            let previous = self.slot.read().size();
            let size = self.generator.next_size(next, previous)?;

            info!(round = next, size, "Generator: creating new matrices of size {size}x{size}");
            let data = self
                .generator
                .fill(next, size)
                .map_err(|source| Error::Generate { round: next, source })?;

            self.slot.write(next, data);
            summary.final_size = size;
            self.barrier.release_next_round()?;
        }
    }

    fn await_workers(&self) -> Result<Round> {
        let Some(timeout) = self.round_timeout else {
            return Ok(self.barrier.await_all_complete()?);
        };

        match self.barrier.await_all_complete_for(timeout)? {
            AwaitOutcome::Complete(round) => Ok(round),
            AwaitOutcome::TimedOut { round, completed } => Err(Error::Stalled {
                round,
                completed,
                participants: self.barrier.participants(),
            }),
        }
    }
}
