use parking_lot::RwLock;
use std::{ops::Deref, sync::Arc};

use crate::barrier::Round;

/// An immutable view of one round's input.
///
/// Cloning is cheap; every clone shares the same allocation. The producer
/// never mutates installed data in place, so a snapshot stays valid and
/// unchanged for as long as a worker holds it.
#[derive(Debug)]
pub struct Snapshot<T> {
    round: Round,
    data: Arc<T>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Snapshot {
            round: self.round,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> Snapshot<T> {
    /// The round this data was installed for.
    #[inline]
    pub fn round(&self) -> Round {
        self.round
    }

    /// True if both snapshots point at the same installed data.
    #[inline]
    pub fn same_data(&self, other: &Snapshot<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Holds the input for the current round.
///
/// Written only by the producer between `await_all_complete` and
/// `release_next_round`, read by workers after they have been released.
/// The internal lock is held only long enough to swap or clone an `Arc` and
/// is never held across a barrier call, so it cannot deadlock against the
/// barrier's own lock.
pub struct SharedDataSlot<T> {
    current: RwLock<Snapshot<T>>,
}

impl<T> SharedDataSlot<T> {
    /// Creates a slot holding the data for round 1.
    pub fn new(initial: T) -> Self {
        SharedDataSlot {
            current: RwLock::new(Snapshot {
                round: 1,
                data: Arc::new(initial),
            }),
        }
    }

    /// Returns the current round's snapshot.
    #[inline]
    pub fn read(&self) -> Snapshot<T> {
        self.current.read().clone()
    }

    /// Round of the currently installed data.
    #[inline]
    pub fn round(&self) -> Round {
        self.current.read().round
    }

    /// Replaces the installed data wholesale with the input for `round`.
    ///
    /// # Panics
    ///
    /// Panics if `round` is not newer than the installed round.
    pub fn write(&self, round: Round, data: T) {
        let mut current = self.current.write();
        assert!(
            round > current.round,
            "Round {} data cannot replace round {} data",
            round,
            current.round
        );

        *current = Snapshot {
            round,
            data: Arc::new(data),
        };
    }
}
