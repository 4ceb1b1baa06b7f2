use parking_lot::Mutex;
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

/// Per-worker timing slot. Only its own worker writes to it during a run.
#[derive(Default)]
struct WorkerTimes {
    started: Option<(Instant, usize)>,
    rounds: Vec<Duration>,
    sizes: Vec<usize>,
}

/// Records how long each worker spends computing in each round.
#[derive(Clone)]
pub struct Timer {
    /// Number of workers using this timer.
    pub(crate) num_workers: usize,

    /// Runtime start timestamp.
    pub(crate) init_timestamp: Instant,

    /// Set once by `finalize`.
    pub(crate) completion_timestamp: Arc<Mutex<Option<Instant>>>,

    /// Computation time and input size for each worker and each round.
    slots: Arc<Vec<Mutex<WorkerTimes>>>,
}

impl Timer {
    /// Create a new Timer with the current time as the initialization timestamp.
    #[inline]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            init_timestamp: Instant::now(),
            completion_timestamp: Arc::new(Mutex::new(None)),
            slots: Arc::new((0..num_workers).map(|_| Mutex::default()).collect()),
        }
    }

    /// Record the start of a worker's computation over an input of `size`.
    ///
    /// # Panics
    ///
    /// Panics if `worker` is not below the worker count given to [`Timer::new`].
    #[inline]
    pub fn start_computation(&self, worker: usize, size: usize) {
        assert!(worker < self.num_workers, "Worker ID out of bounds");
        self.slots[worker].lock().started = Some((Instant::now(), size));
    }

    /// Record the end of a worker's computation and return its duration.
    /// Returns `None` if there was no matching `start_computation`.
    ///
    /// # Panics
    ///
    /// Panics if `worker` is out of bounds.
    #[inline]
    pub fn end_computation(&self, worker: usize) -> Option<Duration> {
        assert!(worker < self.num_workers, "Worker ID out of bounds");

        let mut slot = self.slots[worker].lock();
        let (started, size) = slot.started.take()?;
        let elapsed = started.elapsed();
        slot.rounds.push(elapsed);
        slot.sizes.push(size);
        Some(elapsed)
    }

    /// Record the completion timestamp. Later calls keep the first one.
    #[inline]
    pub fn finalize(&self) {
        self.completion_timestamp
            .lock()
            .get_or_insert_with(Instant::now);
    }

    /// Get timing statistics for analysis and plotting.
    pub fn get_timing_stats(&self) -> TimingStats {
        let completion_timestamp = *self.completion_timestamp.lock();
        let completion_timestamp = completion_timestamp.unwrap_or_else(Instant::now);

        let mut computation_times_per_worker = Vec::with_capacity(self.num_workers);
        let mut round_sizes = Vec::new();
        for slot in self.slots.iter() {
            let slot = slot.lock();
            // every worker sees the same size in a round; keep the longest record
            if slot.sizes.len() > round_sizes.len() {
                round_sizes = slot.sizes.clone();
            }
            computation_times_per_worker.push(slot.rounds.clone());
        }

        TimingStats {
            init_timestamp: self.init_timestamp,
            completion_timestamp,
            computation_times_per_worker,
            round_sizes,
        }
    }
}

/// Timing statistics for one run.
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub init_timestamp: Instant,
    pub completion_timestamp: Instant,
    /// Computation times organized by \[worker\]\[round - 1\]
    pub computation_times_per_worker: Vec<Vec<Duration>>,
    /// Input size of each round, indexed by `round - 1`.
    pub round_sizes: Vec<usize>,
}

impl TimingStats {
    /// Total runtime from init to completion.
    #[inline]
    pub fn total_runtime(&self) -> Duration {
        self.completion_timestamp.duration_since(self.init_timestamp)
    }

    /// Total computation time for a specific worker across all rounds.
    #[inline]
    pub fn worker_total_computation_time(&self, worker: usize) -> Option<Duration> {
        let times = self.computation_times_per_worker.get(worker)?;
        Some(times.iter().sum())
    }

    /// Number of rounds a worker finished computing.
    #[inline]
    pub fn worker_round_count(&self, worker: usize) -> usize {
        self.computation_times_per_worker
            .get(worker)
            .map(|times| times.len())
            .unwrap_or(0)
    }

    #[inline]
    pub fn worker_average_computation_time(&self, worker: usize) -> Option<Duration> {
        let times = self.computation_times_per_worker.get(worker)?;
        if times.is_empty() {
            return None;
        }
        let total: Duration = times.iter().sum();
        Some(total / times.len() as u32)
    }

    /// Input size used in `round` (1-based).
    #[inline]
    pub fn round_size(&self, round: usize) -> Option<usize> {
        self.round_sizes.get(round.checked_sub(1)?).copied()
    }

    /// Slowest worker's time in `round` (1-based). The round could not end
    /// before this worker signalled.
    pub fn round_critical_path(&self, round: usize) -> Option<Duration> {
        let index = round.checked_sub(1)?;
        self.computation_times_per_worker
            .iter()
            .filter_map(|times| times.get(index).copied())
            .max()
    }

    /// Gap between the slowest and fastest worker in `round` (1-based).
    pub fn round_spread(&self, round: usize) -> Option<Duration> {
        let index = round.checked_sub(1)?;
        let times = self
            .computation_times_per_worker
            .iter()
            .filter_map(|times| times.get(index).copied());
        let (min, max) = times.fold(None, |acc: Option<(Duration, Duration)>, t| match acc {
            None => Some((t, t)),
            Some((min, max)) => Some((min.min(t), max.max(t))),
        })?;
        Some(max - min)
    }

    /// Prints the per-round table rendered by the `Display` impl.
    pub fn plot(&self) {
        print!("{self}");
    }
}

/// One row per round with the round's matrix size, each worker's
/// computation time in milliseconds, and the slowest-to-fastest spread. A
/// footer gives each worker's total and its share of wall time.
impl fmt::Display for TimingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CELL: usize = 10;

        let rounds = self.round_sizes.len();
        let workers = self.computation_times_per_worker.len();
        if rounds == 0 || workers == 0 {
            return writeln!(f, "No rounds were timed.");
        }

        let wall = self.total_runtime();
        let width = 8 + 12 + (workers + 1) * (CELL + 1);
        let rule = "=".repeat(width);

        writeln!(f, "\nROUND TIMINGS (ms), wall time {:.3} ms", duration_to_ms(wall))?;
        writeln!(f, "{rule}")?;
        write!(f, "{:<8}{:>12}", "Round", "Size")?;
        for worker in 0..workers {
            write!(f, " {:>CELL$}", format!("w{worker}"))?;
        }
        writeln!(f, " {:>CELL$}", "Spread")?;
        writeln!(f, "{}", "-".repeat(width))?;

        for (index, size) in self.round_sizes.iter().enumerate() {
            let round = index + 1;
            write!(f, "{:<8}{:>12}", round, format!("{size}x{size}"))?;
            for times in &self.computation_times_per_worker {
                match times.get(index) {
                    Some(&time) => write!(f, " {:>CELL$.3}", duration_to_ms(time))?,
                    None => write!(f, " {:>CELL$}", "-")?,
                }
            }
            match self.round_spread(round) {
                Some(spread) => writeln!(f, " {:>CELL$.3}", duration_to_ms(spread))?,
                None => writeln!(f, " {:>CELL$}", "-")?,
            }
        }

        writeln!(f, "{rule}")?;
        write!(f, "{:<20}", "Total")?;
        for worker in 0..workers {
            let total = self.worker_total_computation_time(worker).unwrap_or_default();
            write!(f, " {:>CELL$.3}", duration_to_ms(total))?;
        }
        writeln!(f)?;

        write!(f, "{:<20}", "Busy %")?;
        for worker in 0..workers {
            let total = self.worker_total_computation_time(worker).unwrap_or_default();
            let share = if wall.is_zero() {
                0.0
            } else {
                total.as_secs_f64() / wall.as_secs_f64() * 100.0
            };
            write!(f, " {:>CELL$.1}", share)?;
        }
        writeln!(f)
    }
}

/// Convert Duration to milliseconds as f64
#[inline]
pub(crate) fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
