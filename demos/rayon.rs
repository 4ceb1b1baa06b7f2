use parking_lot::Mutex;
use std::sync::Arc;
use synched_rounds::{
    Dimensioned, Generator, PhaseBarrier, ProducerLoop, Reporter, Round, RoundReport,
    SharedDataSlot, Timer, WorkerLoop, Workload,
};

/// Round input: which Fibonacci number every worker computes.
#[derive(Clone, Copy, Debug)]
pub struct FibonacciInput {
    pub n: u64,
}

impl Dimensioned for FibonacciInput {
    fn size(&self) -> usize {
        self.n as usize
    }
}

// Simple iterative Fibonacci calculation, wrapping on overflow
fn fibonacci(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }

    let mut a: u64 = 0;
    let mut b: u64 = 1;

    for _ in 2..=n {
        let temp = a.wrapping_add(b);
        a = b;
        b = temp;
    }

    b
}

struct Fibonacci;

impl Workload<FibonacciInput> for Fibonacci {
    type Output = u64;

    fn run(&mut self, input: &FibonacciInput) -> anyhow::Result<u64> {
        Ok(fibonacci(input.n))
    }
}

/// Multiplies n by ten each round.
struct TenfoldInput;

impl Generator<FibonacciInput> for TenfoldInput {
    fn next_size(&mut self, _round: Round, previous: usize) -> synched_rounds::Result<usize> {
        Ok(previous * 10)
    }

    fn fill(&mut self, _round: Round, size: usize) -> anyhow::Result<FibonacciInput> {
        Ok(FibonacciInput { n: size as u64 })
    }
}

#[derive(Default)]
struct Collect {
    results: Mutex<Vec<(Round, usize, u64)>>,
}

impl Reporter<u64> for Collect {
    fn report(&self, report: &RoundReport<'_, u64>) {
        if let Ok(value) = report.outcome {
            println!(
                "  Worker {}, Round {}: fib({}) = {} (computed in {:?})",
                report.worker, report.round, report.size, value, report.elapsed
            );
            self.results.lock().push((report.round, report.worker, *value));
        }
    }
}

fn main() {
    println!("Fibonacci rounds on a Rayon pool");
    println!("================================\n");

    const NUM_WORKERS: usize = 4;
    const NUM_ROUNDS: u64 = 6;

    let barrier = Arc::new(PhaseBarrier::new(NUM_WORKERS));
    let slot = Arc::new(SharedDataSlot::new(FibonacciInput { n: 3 }));
    let collect = Arc::new(Collect::default());
    let timer = Timer::new(NUM_WORKERS);

    // workers block inside the barrier, so the pool needs a thread for each of
    // them plus one for the producer
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(NUM_WORKERS + 1)
        .build()
        .expect("failed to build rayon pool");

    let start_time = std::time::Instant::now();

    pool.scope(|scope| {
        for id in 0..NUM_WORKERS {
            let worker = WorkerLoop::new(
                id,
                Arc::clone(&barrier),
                Arc::clone(&slot),
                Fibonacci,
                Arc::clone(&collect) as Arc<dyn Reporter<u64>>,
                timer.clone(),
            );
            scope.spawn(move |_| {
                let summary = worker.run().expect("worker aborted");
                println!("Worker {} completed {} rounds", summary.id, summary.rounds);
            });
        }

        let producer = ProducerLoop::new(Arc::clone(&barrier), Arc::clone(&slot), TenfoldInput)
            .with_max_rounds(Some(NUM_ROUNDS));
        scope.spawn(move |_| {
            let summary = producer.run().expect("producer failed");
            println!("Producer stopped after {} rounds", summary.rounds);
        });
    });

    timer.finalize();
    println!("\nTotal execution time: {:?}", start_time.elapsed());

    // every worker saw the same input in every round
    let mut results = collect.results.lock().clone();
    results.sort_unstable();
    for round in 1..=NUM_ROUNDS {
        let values: Vec<_> = results
            .iter()
            .filter(|(r, _, _)| *r == round)
            .map(|(_, _, value)| *value)
            .collect();
        assert_eq!(values.len(), NUM_WORKERS);
        assert!(values.windows(2).all(|pair| pair[0] == pair[1]));
        println!("Round {}: fib = {}", round, values[0]);
    }

    #[cfg(feature = "profiler")]
    timer.get_timing_stats().plot();

    #[cfg(not(feature = "profiler"))]
    {
        println!("\nTip: Enable the 'profiler' feature for the timing table!");
    }
}
