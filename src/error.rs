use thiserror::Error;

use crate::barrier::Round;

/// Reasons a [`PhaseBarrier`](crate::PhaseBarrier) wait returns without a new round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// The barrier was closed on purpose; waiters should exit cleanly.
    #[error("barrier shut down")]
    Shutdown,

    /// The barrier was torn down because a participant failed.
    #[error("barrier aborted: {0}")]
    Aborted(String),

    /// `release_next_round` was called before every worker signalled.
    #[error("cannot release round {round}: only {completed} of {participants} workers completed")]
    NotAllComplete {
        round: Round,
        completed: usize,
        participants: usize,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Barrier(#[from] BarrierError),

    #[error("next size {requested} exceeds the configured ceiling {ceiling}")]
    CeilingReached { requested: usize, ceiling: usize },

    #[error("round {round} stalled: {completed} of {participants} workers signalled before the deadline")]
    Stalled {
        round: Round,
        completed: usize,
        participants: usize,
    },

    #[error("growing size {current} by factor {factor} gives a matrix too large to index")]
    SizeOverflow { current: usize, factor: usize },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("producer panicked")]
    ProducerPanicked,

    #[error("failed to generate data for round {round}")]
    Generate {
        round: Round,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
