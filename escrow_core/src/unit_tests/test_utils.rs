// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use escrow_storage::{InMemoryIndexSequence, LedgerToken, LockStore, TokenLedger};
use escrow_types::base_types::{
    dbg_addr, BlockHeight, EscrowAddress, EventSequence, LockIndex, TokenId,
};
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::event::EscrowEvent;
use escrow_types::storage::{EventLog, IndexSequence};
use escrow_types::token::TokenTransfer;

use crate::clock::ManualClock;
use crate::engine::EscrowEngine;
use crate::token_registry::TokenRegistry;

/// An engine over temporary databases, with one ledger token registered.
pub struct TestEscrow {
    pub engine: Arc<EscrowEngine>,
    pub ledger: Arc<TokenLedger>,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<TokenRegistry>,
    pub token: TokenId,
    _dirs: (TempDir, TempDir),
}

impl TestEscrow {
    pub fn at_height(height: BlockHeight) -> Self {
        Self::with_store_parts(height, None, None)
    }

    /// Like `at_height`, with the store's index sequence and event log replaced
    /// where given.
    pub fn with_store_parts(
        height: BlockHeight,
        sequence: Option<Box<dyn IndexSequence>>,
        events: Option<Box<dyn EventLog>>,
    ) -> Self {
        let store_dir = tempfile::tempdir().unwrap();
        let ledger_dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(LockStore::open_with(store_dir.path(), None, sequence, events).unwrap());
        let ledger = Arc::new(TokenLedger::open(ledger_dir.path(), None).unwrap());
        let clock = Arc::new(ManualClock::new(height));
        let registry = Arc::new(TokenRegistry::new());

        let token = dbg_addr(100);
        registry.register(token, Arc::new(ledger.token(token)));

        let engine = Arc::new(EscrowEngine::new(
            dbg_addr(200),
            store,
            registry.clone(),
            clock.clone(),
        ));
        Self {
            engine,
            ledger,
            clock,
            registry,
            token,
            _dirs: (store_dir, ledger_dir),
        }
    }

    pub fn custody(&self) -> EscrowAddress {
        self.engine.custody()
    }

    /// Mint `amount` of `token` to `owner` and let the escrow pull all of it.
    pub fn fund(&self, token: TokenId, owner: EscrowAddress, amount: u64) {
        let balance = self.ledger.mint(token, owner, amount).unwrap();
        self.ledger
            .approve(token, owner, self.custody(), balance)
            .unwrap();
    }

    pub fn balance(&self, token: TokenId, owner: EscrowAddress) -> u64 {
        self.ledger.balance_of(&token, &owner).unwrap()
    }
}

/// Ledger token whose pulls and pushes can be made to fail on demand. A failed
/// pull is refused (`Ok(false)`), a failed push errors.
pub struct FlakyToken {
    inner: LedgerToken,
    pub fail_pull: AtomicBool,
    pub fail_push: AtomicBool,
}

impl FlakyToken {
    pub fn new(inner: LedgerToken) -> Self {
        Self {
            inner,
            fail_pull: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
        }
    }
}

impl TokenTransfer for FlakyToken {
    fn transfer_from(
        &self,
        spender: EscrowAddress,
        owner: EscrowAddress,
        amount: u64,
    ) -> EscrowResult<bool> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.transfer_from(spender, owner, amount)
    }

    fn transfer(&self, from: EscrowAddress, to: EscrowAddress, amount: u64) -> EscrowResult<bool> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(EscrowError::InvalidParameter {
                error: "token paused".to_string(),
            });
        }
        self.inner.transfer(from, to, amount)
    }
}

fn injected_failure(what: &str) -> EscrowError {
    EscrowError::StorageError {
        error: format!("injected {} failure", what),
    }
}

/// In-memory sequence whose releases can be made to fail.
#[derive(Default)]
pub struct FlakySequence {
    inner: InMemoryIndexSequence,
    pub fail_release: Arc<AtomicBool>,
}

impl IndexSequence for FlakySequence {
    fn next_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.inner.next_index(sender, receiver)
    }

    fn peek_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.inner.peek_index(sender, receiver)
    }

    fn release_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
        index: LockIndex,
    ) -> EscrowResult<bool> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(injected_failure("release"));
        }
        self.inner.release_index(sender, receiver, index)
    }
}

/// In-memory event log whose appends can be made to fail.
#[derive(Default)]
pub struct FlakyEventLog {
    events: Mutex<Vec<EscrowEvent>>,
    pub fail_append: Arc<AtomicBool>,
}

impl EventLog for FlakyEventLog {
    fn append(&self, event: &EscrowEvent) -> EscrowResult<EventSequence> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(injected_failure("append"));
        }
        let mut events = self.events.lock();
        events.push(event.clone());
        Ok(events.len() as EventSequence - 1)
    }

    fn since(&self, from: EventSequence) -> EscrowResult<Vec<(EventSequence, EscrowEvent)>> {
        Ok(self
            .events
            .lock()
            .iter()
            .enumerate()
            .map(|(seq, event)| (seq as EventSequence, event.clone()))
            .filter(|(seq, _)| *seq >= from)
            .collect())
    }

    fn next_sequence(&self) -> EventSequence {
        self.events.lock().len() as EventSequence
    }
}
