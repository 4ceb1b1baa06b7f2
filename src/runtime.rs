use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use tracing::{info, warn};

use crate::{
    barrier::PhaseBarrier,
    config::Config,
    error::{BarrierError, Error, Result},
    matrix::MatrixPair,
    producer::{Generator, MatrixGenerator, ProducerLoop, ProducerSummary},
    report::Reporter,
    slot::SharedDataSlot,
    timer::{Timer, TimingStats},
    worker::{WorkerLoop, WorkerSummary},
    workload::{Dimensioned, MatrixMultiply, Product, Workload},
};

/// Outcome of a run that stopped cleanly.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Rounds every worker completed.
    pub rounds: u64,
    /// Size of the last installed input.
    pub final_size: usize,
    pub workers: Vec<WorkerSummary>,
    pub timing: TimingStats,
}

/// A running set of worker threads plus their producer thread.
pub struct Runtime {
    barrier: Arc<PhaseBarrier>,
    timer: Timer,
    workers: Vec<JoinHandle<Result<WorkerSummary, BarrierError>>>,
    producer: JoinHandle<Result<ProducerSummary>>,
}

impl Runtime {
    /// Spawns one thread per workload and one producer thread.
    ///
    /// The barrier is sized from `config.workers`; supplying a different
    /// number of workloads is a configuration error and nothing is spawned.
    pub fn start<T, W, G>(
        config: &Config,
        initial: T,
        workloads: Vec<W>,
        generator: G,
        reporter: Arc<dyn Reporter<W::Output>>,
    ) -> Result<Self>
    where
        T: Dimensioned + Send + Sync + 'static,
        W: Workload<T> + 'static,
        G: Generator<T> + 'static,
    {
        config.validate()?;
        if workloads.len() != config.workers {
            return Err(Error::Config(format!(
                "{} workloads supplied for {} workers",
                workloads.len(),
                config.workers
            )));
        }

        let barrier = Arc::new(PhaseBarrier::new(config.workers));
        let slot = Arc::new(SharedDataSlot::new(initial));
        let timer = Timer::new(config.workers);

        info!(
            workers = config.workers,
            initial_size = slot.read().size(),
            max_rounds = ?config.max_rounds,
            "starting rounds"
        );

        let mut workers = Vec::with_capacity(config.workers);
        for (id, workload) in workloads.into_iter().enumerate() {
            let worker = WorkerLoop::new(
                id,
                Arc::clone(&barrier),
                Arc::clone(&slot),
                workload,
                Arc::clone(&reporter),
                timer.clone(),
            );
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    barrier.abort(format!("failed to spawn worker {id}"));
                    return Err(err.into());
                }
            }
        }

        let producer = ProducerLoop::new(Arc::clone(&barrier), slot, generator)
            .with_max_rounds(config.max_rounds)
            .with_round_timeout(config.round_timeout());
        let producer = match thread::Builder::new()
            .name("producer".into())
            .spawn(move || producer.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                barrier.abort("failed to spawn producer");
                return Err(err.into());
            }
        };

        Ok(Runtime {
            barrier,
            timer,
            workers,
            producer,
        })
    }

    /// Starts the matrix multiplication run described by `config`.
    pub fn start_matrix(config: &Config, reporter: Arc<dyn Reporter<Product>>) -> Result<Self> {
        config.validate()?;

        let initial = MatrixPair::generate(config.initial_size, &config.fill, 1);
        let workloads: Vec<MatrixMultiply> = (0..config.workers)
            .map(|_| MatrixMultiply::new(config.workload))
            .collect();
        let generator = MatrixGenerator {
            growth: config.growth(),
            fill: config.fill.clone(),
        };

        Self::start(config, initial, workloads, generator, reporter)
    }

    #[inline]
    pub fn barrier(&self) -> &Arc<PhaseBarrier> {
        &self.barrier
    }

    /// Asks every thread to stop. Workers finish the round they are computing;
    /// `join` then returns normally.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.barrier.shutdown();
    }

    /// Waits for the run to end.
    ///
    /// A stalled round returns at once without joining the workers, since at
    /// least one of them may never come back.
    pub fn join(self) -> Result<RunSummary> {
        let producer = self
            .producer
            .join()
            .map_err(|_| Error::ProducerPanicked)
            .and_then(|result| result);

        if let Err(err @ Error::Stalled { .. }) = producer {
            warn!(error = %err, "abandoning stalled workers");
            return Err(err);
        }

        let mut workers = Vec::with_capacity(self.workers.len());
        let mut worker_error = None;
        for (id, handle) in self.workers.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(summary)) => workers.push(summary),
                Ok(Err(err)) => {
                    worker_error.get_or_insert(Error::Barrier(err));
                }
                // a panic explains the abort better than the abort itself
                Err(_) => worker_error = Some(Error::WorkerPanicked(id)),
            }
        }
        self.timer.finalize();

        let producer = match (producer, worker_error) {
            (_, Some(err @ Error::WorkerPanicked(_))) => return Err(err),
            (Err(err), _) => return Err(err),
            (Ok(_), Some(err)) => return Err(err),
            (Ok(producer), None) => producer,
        };

        info!(rounds = producer.rounds, final_size = producer.final_size, "run finished");
        Ok(RunSummary {
            rounds: producer.rounds,
            final_size: producer.final_size,
            workers,
            timing: self.timer.get_timing_stats(),
        })
    }
}
