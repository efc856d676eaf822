// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::trace;
use typed_store::rocks::DBMap;
use typed_store::traits::Map;

use escrow_types::base_types::{EscrowAddress, LockIndex};
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::storage::IndexSequence;

/// Counters of the persistent sequence, keyed by (sender, receiver).
pub type PairCounters = DBMap<(EscrowAddress, EscrowAddress), LockIndex>;

/// Index sequence backed by its own column family. The stored value is the next
/// index to hand out; a missing entry means the pair has never locked anything.
pub struct PersistentIndexSequence {
    counters: PairCounters,
    /// Serializes read-modify-write of the counters.
    guard: Mutex<()>,
}

impl PersistentIndexSequence {
    pub fn new(counters: PairCounters) -> Self {
        Self {
            counters,
            guard: Mutex::new(()),
        }
    }

    fn read(&self, pair: &(EscrowAddress, EscrowAddress)) -> EscrowResult<LockIndex> {
        Ok(self.counters.get(pair)?.unwrap_or(0))
    }
}

impl IndexSequence for PersistentIndexSequence {
    fn next_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        let pair = (*sender, *receiver);
        let _guard = self.guard.lock();
        let index = self.read(&pair)?;
        let next = index.checked_add(1).ok_or(EscrowError::IndexOverflow {
            sender: *sender,
            receiver: *receiver,
        })?;
        self.counters.insert(&pair, &next)?;
        trace!(%sender, %receiver, index, "Allocated lock index");
        Ok(index)
    }

    fn peek_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.read(&(*sender, *receiver))
    }

    fn release_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult<bool> {
        let pair = (*sender, *receiver);
        let _guard = self.guard.lock();
        if index.checked_add(1) != Some(self.read(&pair)?) {
            return Ok(false);
        }
        self.counters.insert(&pair, &index)?;
        Ok(true)
    }
}

/// Deterministic in-memory sequence. Every pair starts at `start`.
#[derive(Default)]
pub struct InMemoryIndexSequence {
    start: LockIndex,
    counters: Mutex<BTreeMap<(EscrowAddress, EscrowAddress), LockIndex>>,
}

impl InMemoryIndexSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: LockIndex) -> Self {
        Self {
            start,
            counters: Mutex::new(BTreeMap::new()),
        }
    }
}

impl IndexSequence for InMemoryIndexSequence {
    fn next_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        let mut counters = self.counters.lock();
        let counter = counters.entry((*sender, *receiver)).or_insert(self.start);
        let index = *counter;
        *counter = index.checked_add(1).ok_or(EscrowError::IndexOverflow {
            sender: *sender,
            receiver: *receiver,
        })?;
        Ok(index)
    }

    fn peek_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        Ok(*self
            .counters
            .lock()
            .get(&(*sender, *receiver))
            .unwrap_or(&self.start))
    }

    fn release_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult<bool> {
        let mut counters = self.counters.lock();
        match counters.get_mut(&(*sender, *receiver)) {
            Some(counter) if index.checked_add(1) == Some(*counter) => {
                *counter = index;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_types::base_types::dbg_addr;

    #[test]
    fn test_in_memory_sequence_is_per_pair() {
        let seq = InMemoryIndexSequence::new();
        let (a, b, c) = (dbg_addr(1), dbg_addr(2), dbg_addr(3));

        assert_eq!(seq.next_index(&a, &c).unwrap(), 0);
        assert_eq!(seq.next_index(&a, &c).unwrap(), 1);
        assert_eq!(seq.next_index(&b, &c).unwrap(), 0);
        assert_eq!(seq.peek_index(&a, &c).unwrap(), 2);
        assert_eq!(seq.peek_index(&c, &a).unwrap(), 0);
    }

    #[test]
    fn test_in_memory_sequence_start_and_release() {
        let seq = InMemoryIndexSequence::starting_at(41);
        let (a, b) = (dbg_addr(1), dbg_addr(2));

        assert_eq!(seq.next_index(&a, &b).unwrap(), 41);
        assert_eq!(seq.next_index(&a, &b).unwrap(), 42);
        // Only the latest allocation can be given back.
        assert!(!seq.release_index(&a, &b, 41).unwrap());
        assert!(seq.release_index(&a, &b, 42).unwrap());
        assert_eq!(seq.next_index(&a, &b).unwrap(), 42);
        // Releasing for a pair that never allocated is a no-op.
        assert!(!seq.release_index(&b, &a, 0).unwrap());
    }

    #[test]
    fn test_in_memory_sequence_overflow() {
        let seq = InMemoryIndexSequence::starting_at(LockIndex::MAX);
        let (a, b) = (dbg_addr(1), dbg_addr(2));
        assert_eq!(
            seq.next_index(&a, &b),
            Err(EscrowError::IndexOverflow {
                sender: a,
                receiver: b
            })
        );
    }
}
