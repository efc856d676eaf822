// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::base_types::{EscrowAddress, EventSequence, LockIndex};
use crate::error::EscrowResult;
use crate::event::EscrowEvent;

/// Source of lock indices, one monotonic counter per (sender, receiver) pair.
///
/// Implementations must hand out each index at most once, including when called
/// again from inside a token transfer that is itself part of an allocation's
/// operation.
pub trait IndexSequence: Send + Sync {
    /// Return the next unused index of the pair and advance its counter.
    fn next_index(&self, sender: &EscrowAddress, receiver: &EscrowAddress)
        -> EscrowResult<LockIndex>;

    /// The index the next call to `next_index` would return.
    fn peek_index(&self, sender: &EscrowAddress, receiver: &EscrowAddress)
        -> EscrowResult<LockIndex>;

    /// Give back `index` if it is still the most recent allocation of the pair.
    /// Returns whether the counter was rewound; an index that is not the most
    /// recent one stays consumed.
    fn release_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult<bool>;
}

/// Append-only log of lifecycle events, numbered densely from 0.
pub trait EventLog: Send + Sync {
    /// Append `event` and return the sequence number it was stored under.
    fn append(&self, event: &EscrowEvent) -> EscrowResult<EventSequence>;

    /// Events with a sequence number of at least `from`, in order.
    fn since(&self, from: EventSequence) -> EscrowResult<Vec<(EventSequence, EscrowEvent)>>;

    /// Sequence number the next appended event will receive.
    fn next_sequence(&self) -> EventSequence;
}
