// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use escrow_storage::LockStore;
use escrow_types::base_types::{
    BlockHeight, EscrowAddress, EventSequence, LockIndex, LockKey, TokenId,
};
use escrow_types::clock::HeightClock;
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::event::EscrowEvent;
use escrow_types::lock::{Lock, LockStatus};
use escrow_types::{escrow_bail, escrow_ensure};

use crate::token_registry::TokenRegistry;

#[cfg(test)]
#[path = "unit_tests/engine_tests.rs"]
mod engine_tests;

#[cfg(test)]
#[path = "unit_tests/reentrancy_tests.rs"]
mod reentrancy_tests;

#[cfg(test)]
#[path = "unit_tests/lifecycle_proptest.rs"]
mod lifecycle_proptest;

const BROADCAST_CAPACITY: usize = 10_000;

pub type EventSender = tokio::sync::broadcast::Sender<(EventSequence, EscrowEvent)>;
pub type EventReceiver = tokio::sync::broadcast::Receiver<(EventSequence, EscrowEvent)>;

/// The escrow state machine.
///
/// All operations take `&self`; the engine is meant to be shared as an
/// `Arc<EscrowEngine>`. Every operation writes its state change before calling out
/// to a token, so a token that calls back into the engine sees the new state. No
/// store lock is held while a token runs.
pub struct EscrowEngine {
    /// Address that holds escrowed funds between create and withdraw.
    custody: EscrowAddress,

    store: Arc<LockStore>,
    tokens: Arc<TokenRegistry>,
    clock: Arc<dyn HeightClock>,

    /// Live feed of appended events.
    event_channel: EventSender,
    /// Held across append and broadcast so subscribers see sequence order.
    emit_guard: Mutex<()>,
}

impl EscrowEngine {
    pub fn new(
        custody: EscrowAddress,
        store: Arc<LockStore>,
        tokens: Arc<TokenRegistry>,
        clock: Arc<dyn HeightClock>,
    ) -> Self {
        let (event_channel, _rx) = tokio::sync::broadcast::channel(BROADCAST_CAPACITY);
        Self {
            custody,
            store,
            tokens,
            clock,
            event_channel,
            emit_guard: Mutex::new(()),
        }
    }

    pub fn custody(&self) -> EscrowAddress {
        self.custody
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    pub fn current_height(&self) -> BlockHeight {
        self.clock.current_height()
    }

    /// Get a broadcast receiver for events appended from now on.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.event_channel.subscribe()
    }

    /// Deposit `amount` of `token` from `caller`, locked for `lock_period` blocks
    /// in favour of `receiver`. Returns the index of the new lock within the
    /// (caller, receiver) pair.
    #[instrument(level = "debug", skip(self))]
    pub fn create_lock(
        &self,
        caller: EscrowAddress,
        lock_period: BlockHeight,
        receiver: EscrowAddress,
        token: TokenId,
        amount: u64,
    ) -> EscrowResult<LockIndex> {
        escrow_ensure!(
            lock_period > 0,
            EscrowError::InvalidParameter {
                error: "lock period must be positive".to_string(),
            }
        );
        let height = self.clock.current_height();
        let unlock_height =
            height
                .checked_add(lock_period)
                .ok_or_else(|| EscrowError::InvalidParameter {
                    error: format!(
                        "lock period {} overflows the height {}",
                        lock_period, height
                    ),
                })?;
        let transfer = self.tokens.get(&token)?;

        let index = self.store.allocate_index(&caller, &receiver)?;
        let key = LockKey::new(caller, receiver, index);
        let lock = Lock::new(key, token, amount, unlock_height);
        if let Err(err) = self.store.insert_new(&key, &lock) {
            self.release_index(&key);
            return Err(err);
        }
        debug!(%key, unlock_height, "Recorded lock");

        let pulled = check_transfer(token, transfer.transfer_from(self.custody, caller, amount));
        if let Err(err) = pulled {
            if let Err(remove_err) = self.store.remove(&key) {
                error!(%key, %remove_err, "Could not remove the record of a failed lock");
            }
            let released = self.release_index(&key);
            warn!(%key, %err, released, "Token pull failed, lock creation rolled back");
            return Err(err);
        }

        self.emit(&key, EscrowEvent::locked(&lock));
        info!(%key, amount, height, unlock_height, "Locked tokens");
        Ok(index)
    }

    /// Move the lock (caller, receiver, index) from Locked to Unlocked. Only the
    /// sender of the lock can unlock it, once its unlock height is reached.
    #[instrument(level = "debug", skip(self))]
    pub fn unlock(
        &self,
        caller: EscrowAddress,
        receiver: EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult {
        let key = LockKey::new(caller, receiver, index);
        let current_height = self.clock.current_height();
        let (_, lock) = self.store.update(&key, |lock| {
            match lock.status() {
                LockStatus::Locked => (),
                LockStatus::Unlocked => escrow_bail!(EscrowError::AlreadyUnlocked { key }),
                LockStatus::Withdrawn => escrow_bail!(EscrowError::AlreadyWithdrawn { key }),
            }
            escrow_ensure!(
                lock.key() == key,
                EscrowError::RecordMismatch {
                    expected: key,
                    found: lock.key(),
                }
            );
            escrow_ensure!(
                lock.is_unlockable_at(current_height),
                EscrowError::LockPeriodNotElapsed {
                    key,
                    unlock_height: lock.unlock_height(),
                    current_height,
                }
            );
            lock.advance_to(LockStatus::Unlocked)
        })?;

        self.emit(&key, EscrowEvent::unlocked(&lock));
        info!(%key, current_height, "Unlocked");
        Ok(())
    }

    /// Release the unlocked lock (sender, receiver, index) to its receiver.
    /// Anyone may call this; `caller` is only logged.
    #[instrument(level = "debug", skip(self))]
    pub fn withdraw(
        &self,
        caller: EscrowAddress,
        sender: EscrowAddress,
        receiver: EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult {
        let key = LockKey::new(sender, receiver, index);
        let (previous, lock) = self
            .store
            .update(&key, |lock| lock.advance_to(LockStatus::Withdrawn))?;
        debug!(%key, "Marked withdrawn");

        let pushed = self.tokens.get(&lock.token()).and_then(|transfer| {
            check_transfer(
                lock.token(),
                transfer.transfer(self.custody, lock.receiver(), lock.amount()),
            )
        });
        if let Err(err) = pushed {
            if let Err(restore_err) = self.store.put(&key, &previous) {
                error!(%key, %restore_err, "Could not restore the record of a failed withdraw");
            }
            warn!(%key, %err, "Token push failed, withdraw rolled back");
            return Err(err);
        }

        self.emit(&key, EscrowEvent::withdrawn(&lock));
        info!(%key, amount = lock.amount(), "Withdrawn");
        Ok(())
    }

    // Read surface

    pub fn get_lock(
        &self,
        sender: EscrowAddress,
        receiver: EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult<Lock> {
        let key = LockKey::new(sender, receiver, index);
        self.store
            .get(&key)?
            .ok_or(EscrowError::LockNotFound { key })
    }

    /// The index the next lock of the pair will receive.
    pub fn current_index(
        &self,
        sender: EscrowAddress,
        receiver: EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.store.current_index(&sender, &receiver)
    }

    pub fn locks_for_pair(
        &self,
        sender: EscrowAddress,
        receiver: EscrowAddress,
    ) -> EscrowResult<Vec<Lock>> {
        self.store.locks_for_pair(&sender, &receiver)
    }

    pub fn events_since(
        &self,
        from: EventSequence,
    ) -> EscrowResult<Vec<(EventSequence, EscrowEvent)>> {
        self.store.events_since(from)
    }

    /// Give back the index of a lock that was never committed. Returns whether
    /// the pair counter was rewound.
    fn release_index(&self, key: &LockKey) -> bool {
        self.store.release_index(key).unwrap_or_else(|err| {
            error!(%key, %err, "Could not release lock index");
            false
        })
    }

    /// Record `event` for an operation that has already committed. The lock
    /// record is authoritative, so a failed append is logged and the operation
    /// still succeeds.
    fn emit(&self, key: &LockKey, event: EscrowEvent) {
        let _guard = self.emit_guard.lock();
        match self.store.append_event(&event) {
            Ok(seq) => {
                // No subscriber is not an error.
                let _ = self.event_channel.send((seq, event));
            }
            Err(err) => {
                error!(%key, %err, event = event.name(), "Could not append event for a committed operation");
            }
        }
    }
}

/// A refused transfer and a failed one are the same to the escrow.
fn check_transfer(token: TokenId, outcome: EscrowResult<bool>) -> EscrowResult {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => Err(EscrowError::ExternalTransferFailed {
            token,
            error: "transfer refused".to_string(),
        }),
        Err(err) => Err(EscrowError::ExternalTransferFailed {
            token,
            error: err.to_string(),
        }),
    }
}
