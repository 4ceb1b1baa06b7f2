//! # PhaseBarrier
//!
//! A cyclic barrier with a dedicated producer. A fixed number of workers
//! signal completion of the current round and block; a single producer waits
//! until every worker has signalled, installs the next round's data and
//! releases them all at once.
//!
//! ## Protocol
//!
//! ```text
//! worker:    compute ── signal_completion() ─────────────── (blocked) ──► compute
//! producer:  await_all_complete() ──► write slot ──► release_next_round() ─┘
//! ```
//!
//! Both waits are predicate waits on distinct conditions:
//!
//! - the producer sleeps while `completed < participants`
//! - a worker sleeps while the round it signalled for is still current
//!
//! Workers key their wait on the round number rather than on the counter
//! being zero. A fast worker that finishes the next round before a slow
//! worker has woken up would otherwise push the counter back above zero and
//! strand the slow one.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

use crate::error::BarrierError;

/// Logical round identifier. The first round is `1`.
pub type Round = u64;

/// Result of a bounded [`PhaseBarrier::await_all_complete_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// Every worker signalled for this round.
    Complete(Round),
    /// The deadline passed with only `completed` signals in.
    TimedOut { round: Round, completed: usize },
}

struct BarrierState {
    participants: usize,
    completed: usize,
    round: Round,
    closed: Option<BarrierError>,
}

/// Rendezvous point between `participants` workers and one producer.
pub struct PhaseBarrier {
    state: Mutex<BarrierState>,
    /// Producer waits here for the last worker of a round.
    all_complete: Condvar,
    /// Workers wait here for the producer to open the next round.
    next_round: Condvar,
}

impl std::fmt::Debug for PhaseBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PhaseBarrier")
            .field("participants", &state.participants)
            .field("completed", &state.completed)
            .field("round", &state.round)
            .field("closed", &state.closed)
            .finish()
    }
}

impl PhaseBarrier {
    /// Creates a barrier for a fixed set of `participants` workers.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is 0; such a barrier would release the
    /// producer without any work having been done.
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "Number of participants must be greater than 0");

        PhaseBarrier {
            state: Mutex::new(BarrierState {
                participants,
                completed: 0,
                round: 1,
                closed: None,
            }),
            all_complete: Condvar::new(),
            next_round: Condvar::new(),
        }
    }

    /// Number of workers that must signal before a round completes. Fixed for
    /// the barrier's lifetime.
    ///
    /// # Examples
    ///
    /// ```
    /// use synched_rounds::PhaseBarrier;
    ///
    /// let barrier = PhaseBarrier::new(3);
    /// assert_eq!(barrier.participants(), 3);
    /// assert_eq!(barrier.round(), 1);
    /// assert_eq!(barrier.completed(), 0);
    /// ```
    #[inline]
    pub fn participants(&self) -> usize {
        self.state.lock().participants
    }

    /// The round currently being computed.
    #[inline]
    pub fn round(&self) -> Round {
        self.state.lock().round
    }

    /// Number of workers that have signalled for the current round.
    #[inline]
    pub fn completed(&self) -> usize {
        self.state.lock().completed
    }

    /// Whether [`shutdown`](Self::shutdown) or [`abort`](Self::abort) has
    /// been called. A closed barrier never reopens.
    ///
    /// # Examples
    ///
    /// ```
    /// use synched_rounds::{BarrierError, PhaseBarrier};
    ///
    /// let barrier = PhaseBarrier::new(1);
    /// assert!(!barrier.is_closed());
    ///
    /// barrier.abort("disk full");
    /// assert!(barrier.is_closed());
    /// assert_eq!(
    ///     barrier.signal_completion(),
    ///     Err(BarrierError::Aborted("disk full".into()))
    /// );
    /// ```
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    /// Called by a worker once its computation for the current round is done.
    ///
    /// Counts the worker in, wakes the producer if it was the last one, and
    /// blocks until the producer releases the next round. Returns the new
    /// round number.
    ///
    /// Returns an error without counting the worker in if the barrier is
    /// already closed, or once the barrier is closed while waiting.
    ///
    /// # Panics
    ///
    /// Panics if more workers signal for a round than the barrier was built
    /// for. This means the participant count does not match the number of
    /// workers actually running.
    pub fn signal_completion(&self) -> Result<Round, BarrierError> {
        let mut state = self.state.lock();
        if let Some(err) = &state.closed {
            return Err(err.clone());
        }

        assert!(
            state.completed < state.participants,
            "Round {} received more than {} completion signals",
            state.round,
            state.participants
        );

        let signalled_round = state.round;
        state.completed += 1;
        if state.completed == state.participants {
            // only the producer waits on this condition
            self.all_complete.notify_one();
        }

        self.next_round.wait_while(&mut state, |s| {
            s.round == signalled_round && s.closed.is_none()
        });

        if state.round != signalled_round {
            return Ok(state.round);
        }
        match &state.closed {
            Some(err) => Err(err.clone()),
            None => unreachable!("woke without a new round or a closed barrier"),
        }
    }

    /// Called by the producer. Blocks until every worker has signalled for the
    /// current round and returns that round.
    ///
    /// Returns immediately if the last signal landed before this call.
    pub fn await_all_complete(&self) -> Result<Round, BarrierError> {
        let mut state = self.state.lock();
        self.all_complete.wait_while(&mut state, |s| {
            s.completed < s.participants && s.closed.is_none()
        });

        match &state.closed {
            Some(err) => Err(err.clone()),
            None => Ok(state.round),
        }
    }

    /// Like [`await_all_complete`](Self::await_all_complete), but gives up
    /// after `timeout` and reports how many workers made it.
    pub fn await_all_complete_for(&self, timeout: Duration) -> Result<AwaitOutcome, BarrierError> {
        let mut state = self.state.lock();
        let _ = self.all_complete.wait_while_for(
            &mut state,
            |s| s.completed < s.participants && s.closed.is_none(),
            timeout,
        );

        if let Some(err) = &state.closed {
            return Err(err.clone());
        }
        if state.completed == state.participants {
            Ok(AwaitOutcome::Complete(state.round))
        } else {
            Ok(AwaitOutcome::TimedOut {
                round: state.round,
                completed: state.completed,
            })
        }
    }

    /// Called by the producer after `await_all_complete` and after the next
    /// round's data is installed. Resets the counter, advances the round and
    /// wakes every blocked worker.
    pub fn release_next_round(&self) -> Result<Round, BarrierError> {
        let mut state = self.state.lock();
        if let Some(err) = &state.closed {
            return Err(err.clone());
        }
        if state.completed != state.participants {
            return Err(BarrierError::NotAllComplete {
                round: state.round,
                completed: state.completed,
                participants: state.participants,
            });
        }

        state.completed = 0;
        state.round += 1;
        self.next_round.notify_all();
        Ok(state.round)
    }

    /// Closes the barrier for a clean stop. Every current and future wait
    /// returns [`BarrierError::Shutdown`].
    pub fn shutdown(&self) {
        self.close(BarrierError::Shutdown);
    }

    /// Closes the barrier because a participant failed.
    pub fn abort(&self, reason: impl Into<String>) {
        self.close(BarrierError::Aborted(reason.into()));
    }

    fn close(&self, err: BarrierError) {
        let mut state = self.state.lock();
        // first reason wins
        if state.closed.is_none() {
            state.closed = Some(err);
        }
        self.all_complete.notify_all();
        self.next_round.notify_all();
    }

    /// Returns a guard that aborts the barrier if it is dropped while the
    /// owning thread is panicking. Without it a crashed worker would leave
    /// the producer waiting forever.
    pub fn abort_on_panic(&self, participant: impl Into<String>) -> PanicGuard<'_> {
        PanicGuard {
            barrier: self,
            participant: participant.into(),
        }
    }
}

/// Aborts its barrier if dropped while the owning thread is panicking.
/// Returned by [`PhaseBarrier::abort_on_panic`].
pub struct PanicGuard<'a> {
    barrier: &'a PhaseBarrier,
    participant: String,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.barrier.abort(format!("{} panicked", self.participant));
        }
    }
}
