use super::*;
use parking_lot::Mutex;
use rand::{Rng, thread_rng};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Start { worker: usize, size: usize },
    Report { worker: usize, round: Round, size: usize, ok: bool },
}

type Log = Arc<Mutex<Vec<Event>>>;

/// Multiplies like the real workload but logs when it starts and can be
/// slowed down, made to fail or made to panic.
struct RecordingWorkload {
    id: usize,
    log: Log,
    delay: Duration,
    fail_at_size: Option<usize>,
    panic_at_size: Option<usize>,
    inner: MatrixMultiply,
}

impl RecordingWorkload {
    fn new(id: usize, log: &Log) -> Self {
        RecordingWorkload {
            id,
            log: Arc::clone(log),
            delay: Duration::ZERO,
            fail_at_size: None,
            panic_at_size: None,
            inner: MatrixMultiply::default(),
        }
    }
}

impl Workload<MatrixPair> for RecordingWorkload {
    type Output = Product;

    fn run(&mut self, input: &MatrixPair) -> anyhow::Result<Product> {
        self.log.lock().push(Event::Start {
            worker: self.id,
            size: input.size(),
        });
        std::thread::sleep(self.delay);

        if self.panic_at_size == Some(input.size()) {
            panic!("worker {} hit a poisoned input", self.id);
        }
        if self.fail_at_size == Some(input.size()) {
            anyhow::bail!("refusing size {}", input.size());
        }
        self.inner.run(input)
    }
}

struct RecordingReporter {
    log: Log,
}

impl Reporter<Product> for RecordingReporter {
    fn report(&self, report: &RoundReport<'_, Product>) {
        if let Ok(product) = report.outcome {
            // constant fill of 1s and 2s: every entry is 2n
            let n = report.size as i64;
            assert_eq!(product.checksum, 2 * n * n * n);
        }
        self.log.lock().push(Event::Report {
            worker: report.worker,
            round: report.round,
            size: report.size,
            ok: report.outcome.is_ok(),
        });
    }
}

fn start(config: &Config, workloads: Vec<RecordingWorkload>, log: &Log) -> Result<Runtime> {
    let initial = MatrixPair::generate(config.initial_size, &config.fill, 1);
    let generator = MatrixGenerator {
        growth: config.growth(),
        fill: config.fill.clone(),
    };
    let reporter: Arc<dyn Reporter<Product>> = Arc::new(RecordingReporter {
        log: Arc::clone(log),
    });
    Runtime::start(config, initial, workloads, generator, reporter)
}

fn recording_workloads(count: usize, log: &Log) -> Vec<RecordingWorkload> {
    (0..count).map(|id| RecordingWorkload::new(id, log)).collect()
}

fn last_index(log: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    log.iter().rposition(pred).expect("no matching event")
}

fn first_index(log: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    log.iter().position(pred).expect("no matching event")
}

#[test]
fn test_four_workers_one_growth_round() {
    const WORKERS: usize = 4;

    let config = Config {
        workers: WORKERS,
        initial_size: 2,
        max_rounds: Some(2),
        ..Config::default()
    };
    let log: Log = Arc::default();

    let runtime = start(&config, recording_workloads(WORKERS, &log), &log).unwrap();
    let summary = runtime.join().unwrap();

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.final_size, 4);

    let log = log.lock().clone();
    for (round, size) in [(1, 2), (2, 4)] {
        let mut workers: Vec<_> = log
            .iter()
            .filter_map(|event| match *event {
                Event::Report { worker, round: r, size: s, ok } if r == round => {
                    assert_eq!(s, size, "worker {} saw size {} in round {}", worker, s, round);
                    assert!(ok);
                    Some(worker)
                }
                _ => None,
            })
            .collect();
        workers.sort_unstable();
        assert_eq!(workers, (0..WORKERS).collect::<Vec<_>>());
    }

    // every round 1 report, and so every round 1 signal, precedes any round 2 start
    let last_round_one = last_index(&log, |e| matches!(e, Event::Report { round: 1, .. }));
    let first_round_two = first_index(&log, |e| matches!(e, Event::Start { size: 4, .. }));
    assert!(last_round_one < first_round_two);

    for worker in &summary.workers {
        assert_eq!(worker.rounds, 2);
        assert_eq!(worker.failures, 0);
        assert_eq!(summary.timing.worker_round_count(worker.id), 2);
    }
    assert_eq!(summary.timing.round_sizes, vec![2, 4]);
}

/// Keeps every reported elapsed time, keyed by worker and round.
#[derive(Default)]
struct ElapsedReporter {
    seen: Mutex<Vec<(usize, Round, Duration)>>,
}

impl Reporter<Product> for ElapsedReporter {
    fn report(&self, report: &RoundReport<'_, Product>) {
        self.seen
            .lock()
            .push((report.worker, report.round, report.elapsed));
    }
}

#[test]
fn test_reported_elapsed_matches_timing_table() {
    let config = Config {
        workers: 3,
        initial_size: 6,
        max_rounds: Some(3),
        ..Config::default()
    };
    let reporter = Arc::new(ElapsedReporter::default());
    let shared: Arc<dyn Reporter<Product>> = Arc::clone(&reporter) as _;

    let summary = Runtime::start_matrix(&config, shared).unwrap().join().unwrap();

    let seen = reporter.seen.lock();
    assert_eq!(seen.len(), 9);
    for &(worker, round, elapsed) in seen.iter() {
        let recorded = summary.timing.computation_times_per_worker[worker][round as usize - 1];
        assert_eq!(elapsed, recorded, "worker {} round {}", worker, round);
    }
    assert_eq!(summary.timing.round_sizes, vec![6, 12, 24]);
}

#[test]
fn test_oversized_initial_size_rejected_before_spawn() {
    let config = Config {
        workers: 2,
        initial_size: 1 << (usize::BITS / 2),
        ..Config::default()
    };
    let log: Log = Arc::default();
    let reporter: Arc<dyn Reporter<Product>> = Arc::new(TracingReporter);

    let result = Runtime::start(
        &config,
        MatrixPair::generate(1, &config.fill, 1),
        recording_workloads(2, &log),
        MatrixGenerator::default(),
        reporter,
    );
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(log.lock().is_empty());
}

#[test]
fn test_slow_worker_holds_back_next_round() {
    const WORKERS: usize = 4;
    const SLOW: usize = 2;

    let config = Config {
        workers: WORKERS,
        initial_size: 3,
        max_rounds: Some(3),
        ..Config::default()
    };
    let log: Log = Arc::default();
    let mut workloads = recording_workloads(WORKERS, &log);
    workloads[SLOW].delay = Duration::from_millis(80);

    let started = Instant::now();
    let summary = start(&config, workloads, &log).unwrap().join().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(240));
    assert_eq!(summary.rounds, 3);

    let log = log.lock().clone();
    for (round, next_size) in [(1, 6), (2, 12)] {
        let slow_done = last_index(&log, |e| {
            matches!(*e, Event::Report { worker, round: r, .. } if worker == SLOW && r == round)
        });
        let next_start = first_index(&log, |e| {
            matches!(*e, Event::Start { size, .. } if size == next_size)
        });
        assert!(
            slow_done < next_start,
            "round {} started before the slow worker finished",
            round + 1
        );
    }
}

#[test]
fn test_failed_workload_still_signals() {
    let config = Config {
        workers: 3,
        initial_size: 2,
        max_rounds: Some(3),
        ..Config::default()
    };
    let log: Log = Arc::default();
    let mut workloads = recording_workloads(3, &log);
    workloads[1].fail_at_size = Some(4);

    let summary = start(&config, workloads, &log).unwrap().join().unwrap();

    assert_eq!(summary.rounds, 3);
    assert_eq!(summary.final_size, 8);
    assert_eq!(summary.workers[1].failures, 1);
    assert_eq!(summary.workers[0].failures, 0);
    assert!(log.lock().contains(&Event::Report {
        worker: 1,
        round: 2,
        size: 4,
        ok: false
    }));
}

#[test]
fn test_worker_panic_aborts_run() {
    let config = Config {
        workers: 4,
        initial_size: 2,
        ..Config::default()
    };
    let log: Log = Arc::default();
    let mut workloads = recording_workloads(4, &log);
    workloads[2].panic_at_size = Some(4);

    let runtime = start(&config, workloads, &log).unwrap();
    assert!(matches!(runtime.join(), Err(Error::WorkerPanicked(2))));
}

#[test]
fn test_stalled_worker_detected() {
    let config = Config {
        workers: 4,
        initial_size: 2,
        round_timeout_ms: Some(50),
        ..Config::default()
    };
    let log: Log = Arc::default();
    let mut workloads = recording_workloads(4, &log);
    workloads[3].delay = Duration::from_millis(500);

    let runtime = start(&config, workloads, &log).unwrap();
    let barrier = Arc::clone(runtime.barrier());

    assert!(matches!(
        runtime.join(),
        Err(Error::Stalled {
            round: 1,
            participants: 4,
            ..
        })
    ));
    assert!(barrier.is_closed());
}

#[test]
fn test_size_ceiling_stops_run() {
    let config = Config {
        workers: 2,
        initial_size: 2,
        size_ceiling: Some(8),
        ..Config::default()
    };
    let log: Log = Arc::default();

    let result = start(&config, recording_workloads(2, &log), &log)
        .unwrap()
        .join();

    assert!(matches!(
        result,
        Err(Error::CeilingReached {
            requested: 16,
            ceiling: 8
        })
    ));
    // sizes 2, 4 and 8 were all computed, nothing larger
    let log = log.lock();
    assert!(log.iter().any(|e| matches!(e, Event::Start { size: 8, .. })));
    assert!(!log.iter().any(|e| matches!(*e, Event::Start { size, .. } if size > 8)));
}

#[test]
fn test_participant_mismatch_rejected_before_spawn() {
    let config = Config {
        workers: 4,
        ..Config::default()
    };
    let log: Log = Arc::default();

    let result = start(&config, recording_workloads(3, &log), &log);
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(log.lock().is_empty());
}

#[test]
fn test_external_shutdown() {
    let config = Config {
        workers: 4,
        initial_size: 8,
        growth_factor: 1,
        ..Config::default()
    };
    let log: Log = Arc::default();
    let mut workloads = recording_workloads(4, &log);
    let mut rng = thread_rng();
    for workload in &mut workloads {
        workload.delay = Duration::from_millis(rng.gen_range(0..5));
    }

    let runtime = start(&config, workloads, &log).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    runtime.shutdown();
    let summary = runtime.join().unwrap();

    assert!(summary.rounds >= 1);
    assert_eq!(summary.final_size, 8);
    assert_eq!(summary.workers.len(), 4);
    for worker in &summary.workers {
        // a worker may have computed the round that was cut short
        assert!(worker.rounds >= summary.rounds);
        assert!(worker.rounds <= summary.rounds + 1);
    }
}

#[test]
fn test_matrix_runtime_parallel_mode() {
    let config = Config {
        workers: 2,
        initial_size: 5,
        max_rounds: Some(2),
        workload: MultiplyMode::Parallel,
        fill: FillPolicy::Random { seed: 3, max: 4 },
        ..Config::default()
    };

    let summary = Runtime::start_matrix(&config, Arc::new(TracingReporter))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.final_size, 10);
}
