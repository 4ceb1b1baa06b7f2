//! Drives `PhaseBarrier` and `SharedDataSlot` by hand, the way a custom
//! runtime would, with random delays on both sides.

use rand::{Rng, thread_rng};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use synched_rounds::{
    BarrierError, Config, PhaseBarrier, Round, Runtime, SharedDataSlot, TracingReporter,
};

const WORKERS: usize = 5;
const ROUNDS: Round = 40;

#[derive(Debug, PartialEq, Eq)]
struct RoundData {
    tag: Round,
    values: Vec<u64>,
}

#[test]
fn snapshots_stay_stable_and_rounds_stay_in_lockstep() {
    let barrier = Arc::new(PhaseBarrier::new(WORKERS));
    let slot = Arc::new(SharedDataSlot::new(RoundData {
        tag: 1,
        values: vec![1; 4],
    }));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                let mut rng = thread_rng();
                let mut seen = Vec::new();
                let mut round = barrier.round();
                loop {
                    let snapshot = slot.read();
                    assert_eq!(snapshot.tag, round);
                    assert_eq!(snapshot.round(), round);

                    let before: u64 = snapshot.values.iter().sum();
                    thread::sleep(Duration::from_micros(rng.gen_range(0..500)));
                    let after: u64 = snapshot.values.iter().sum();
                    assert_eq!(before, after);
                    assert!(slot.read().same_data(&snapshot), "data replaced mid-round");
                    seen.push((round, before));

                    match barrier.signal_completion() {
                        Ok(next) => {
                            assert_eq!(next, round + 1);
                            round = next;
                        }
                        Err(BarrierError::Shutdown) => return seen,
                        Err(err) => panic!("unexpected barrier error: {err}"),
                    }
                }
            })
        })
        .collect();

    let mut rng = thread_rng();
    for round in 1..=ROUNDS {
        assert_eq!(barrier.await_all_complete(), Ok(round));
        let completed = barrier.completed();
        assert!(completed <= WORKERS);
        if round == ROUNDS {
            barrier.shutdown();
            break;
        }

        thread::sleep(Duration::from_micros(rng.gen_range(0..300)));
        let next = round + 1;
        slot.write(
            next,
            RoundData {
                tag: next,
                values: vec![next; 4],
            },
        );
        assert_eq!(barrier.release_next_round(), Ok(next));
    }

    let expected: Vec<(Round, u64)> = (1..=ROUNDS).map(|round| (round, round * 4)).collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), expected);
    }
}

#[test]
fn config_file_drives_a_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        workers = 3
        initial_size = 3
        growth_factor = 3
        max_rounds = 3

        [fill]
        kind = "constant"
        a = 2
        b = 5
        "#
    )
    .unwrap();

    let config = Config::from_toml_file(file.path()).unwrap();
    let summary = Runtime::start_matrix(&config, Arc::new(TracingReporter))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(summary.rounds, 3);
    assert_eq!(summary.final_size, 27);
    assert_eq!(summary.workers.len(), 3);
    assert!(summary.workers.iter().all(|w| w.rounds == 3 && w.failures == 0));
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::from_toml_file(dir.path().join("absent.toml")),
        Err(synched_rounds::Error::Io(_))
    ));
}
