//! # SynchedRounds - Phase-Synchronized Producer/Workers Rounds
//!
//! A fixed pool of worker threads repeatedly computes over shared data, and a
//! single producer thread regenerates that data once every worker has finished
//! the round. The problem size grows each round.
//!
//! ## Key Pieces
//!
//! - **[`PhaseBarrier`]**: cyclic barrier with a producer. Workers signal and wait,
//!   the producer waits for all of them and releases the next round
//! - **[`SharedDataSlot`]**: the current round's input, replaced wholesale between rounds
//! - **[`WorkerLoop`]** / **[`ProducerLoop`]**: the two perpetual thread bodies
//! - **[`Runtime`]**: spawns and joins the threads for a [`Config`]
//!
//! ## Round Protocol
//!
//! 1. Producer installs round R data into the slot
//! 2. Producer releases the barrier
//! 3. Each worker reads round R data, computes, reports and signals completion
//! 4. Once the last worker signals, the producer wakes and builds round R+1
//!
//! The producer never writes while a worker is computing, and no worker starts
//! round R+1 before its data is installed.
//!
//! ## Usage Pattern
//!
//! ```rust
//! use std::sync::Arc;
//! use synched_rounds::{Config, Runtime, TracingReporter};
//!
//! let config = Config {
//!     workers: 2,
//!     initial_size: 4,
//!     max_rounds: Some(3),
//!     ..Config::default()
//! };
//!
//! let runtime = Runtime::start_matrix(&config, Arc::new(TracingReporter)).unwrap();
//! let summary = runtime.join().unwrap();
//!
//! assert_eq!(summary.rounds, 3);
//! assert_eq!(summary.final_size, 16);
//! ```
//!
//! ## Failure Handling
//!
//! - A workload error is reported for that worker, which still signals completion
//! - A panicking worker or producer aborts the barrier, waking everyone
//! - An optional per-round deadline turns a stalled worker into [`Error::Stalled`]
//! - An optional size ceiling fails fast with [`Error::CeilingReached`]

#[cfg(test)]
mod tests;

pub mod barrier;
pub mod config;
pub mod error;
pub mod matrix;
pub mod producer;
pub mod report;
pub mod runtime;
pub mod slot;
pub mod timer;
pub mod worker;
pub mod workload;

pub use barrier::{AwaitOutcome, PanicGuard, PhaseBarrier, Round};
pub use config::Config;
pub use error::{BarrierError, Error, Result};
pub use matrix::{FillPolicy, Matrix, MatrixPair};
pub use producer::{Generator, GrowthPolicy, MatrixGenerator, ProducerLoop, ProducerSummary};
pub use report::{ConsoleReporter, Reporter, RoundReport, TracingReporter};
pub use runtime::{RunSummary, Runtime};
pub use slot::{SharedDataSlot, Snapshot};
pub use timer::{Timer, TimingStats};
pub use worker::{WorkerLoop, WorkerSummary};
pub use workload::{Dimensioned, MatrixMultiply, MultiplyMode, Product, Workload};
