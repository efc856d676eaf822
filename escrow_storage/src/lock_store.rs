// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use rocksdb::Options;
use tracing::{debug, trace};
use typed_store::rocks::{open_cf, DBMap};
use typed_store::traits::Map;

use escrow_types::base_types::{EscrowAddress, EventSequence, LockIndex, LockKey};
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::event::EscrowEvent;
use escrow_types::lock::Lock;
use escrow_types::storage::{EventLog, IndexSequence};
use escrow_types::{escrow_bail, escrow_ensure};

use crate::event_log::PersistentEventLog;
use crate::index_sequence::PersistentIndexSequence;

const LOCKS_CF: &str = "locks";
const LOCK_SEQUENCE_CF: &str = "lock_sequence";
const EVENTS_CF: &str = "events";

const LOCK_TABLE_SIZE: usize = 1024;

/// Durable store of lock records, the per-pair index sequence and the event log.
pub struct LockStore {
    /// Lock records, keyed by (sender, receiver, index).
    locks: DBMap<LockKey, Lock>,

    /// Append-only log of lifecycle events.
    events: Box<dyn EventLog>,

    sequence: Box<dyn IndexSequence>,

    /// Internal vector of locks to serialize read-modify-write on a single record.
    lock_table: Vec<parking_lot::Mutex<()>>,
}

impl LockStore {
    /// Open a lock store by directory path, with a persistent index sequence
    /// and event log.
    pub fn open<P: AsRef<Path>>(path: P, db_options: Option<Options>) -> EscrowResult<LockStore> {
        Self::open_with(path, db_options, None, None)
    }

    /// Open a lock store that draws indices from `sequence` instead of the
    /// persistent one.
    pub fn open_with_sequence<P: AsRef<Path>>(
        path: P,
        db_options: Option<Options>,
        sequence: Box<dyn IndexSequence>,
    ) -> EscrowResult<LockStore> {
        Self::open_with(path, db_options, Some(sequence), None)
    }

    /// Open a lock store, replacing the persistent index sequence and event log
    /// with the given ones where present.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        db_options: Option<Options>,
        sequence: Option<Box<dyn IndexSequence>>,
        events: Option<Box<dyn EventLog>>,
    ) -> EscrowResult<LockStore> {
        let db = open_cf(&path, db_options, &[LOCKS_CF, LOCK_SEQUENCE_CF, EVENTS_CF])?;
        let sequence: Box<dyn IndexSequence> = match sequence {
            Some(sequence) => sequence,
            None => Box::new(PersistentIndexSequence::new(DBMap::reopen(
                &db,
                Some(LOCK_SEQUENCE_CF),
            )?)),
        };
        let events: Box<dyn EventLog> = match events {
            Some(events) => events,
            None => Box::new(PersistentEventLog::new(DBMap::reopen(
                &db,
                Some(EVENTS_CF),
            )?)?),
        };
        debug!(next_event = events.next_sequence(), "Opened lock store");

        Ok(LockStore {
            locks: DBMap::reopen(&db, Some(LOCKS_CF))?,
            events,
            sequence,
            lock_table: (0..LOCK_TABLE_SIZE)
                .into_iter()
                .map(|_| parking_lot::Mutex::new(()))
                .collect(),
        })
    }

    fn acquire_lock(&self, key: &LockKey) -> parking_lot::MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let slot = (hasher.finish() % self.lock_table.len() as u64) as usize;
        self.lock_table[slot].lock()
    }

    fn ensure_record_matches(key: &LockKey, lock: &Lock) -> EscrowResult {
        escrow_ensure!(
            lock.key() == *key,
            EscrowError::RecordMismatch {
                expected: *key,
                found: lock.key(),
            }
        );
        Ok(())
    }

    // Index sequence

    /// Hand out the next index of the pair. Indices never repeat unless
    /// explicitly released with [`LockStore::release_index`].
    pub fn allocate_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.sequence.next_index(sender, receiver)
    }

    /// The index the next lock of the pair would receive.
    pub fn current_index(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<LockIndex> {
        self.sequence.peek_index(sender, receiver)
    }

    /// Give back an index allocated for a lock that was never committed. Returns
    /// false if later indices were handed out in the meantime, in which case the
    /// index stays consumed.
    pub fn release_index(&self, key: &LockKey) -> EscrowResult<bool> {
        let released = self
            .sequence
            .release_index(&key.sender, &key.receiver, key.index)?;
        trace!(%key, released, "Released lock index");
        Ok(released)
    }

    // Lock records

    pub fn get(&self, key: &LockKey) -> EscrowResult<Option<Lock>> {
        Ok(self.locks.get(key)?)
    }

    /// Insert or overwrite the record at `key`.
    pub fn put(&self, key: &LockKey, lock: &Lock) -> EscrowResult {
        Self::ensure_record_matches(key, lock)?;
        let _guard = self.acquire_lock(key);
        self.locks.insert(key, lock)?;
        Ok(())
    }

    /// Insert the record at `key`, failing if one is already there.
    pub fn insert_new(&self, key: &LockKey, lock: &Lock) -> EscrowResult {
        Self::ensure_record_matches(key, lock)?;
        let _guard = self.acquire_lock(key);
        if self.locks.contains_key(key)? {
            escrow_bail!(EscrowError::LockAlreadyExists { key: *key });
        }
        self.locks.insert(key, lock)?;
        Ok(())
    }

    /// Read-modify-write of the record at `key` as one critical region.
    ///
    /// `f` receives a copy of the stored record and may mutate it or fail. Nothing
    /// is written if `f` fails. On success the previous and the new record are
    /// returned.
    pub fn update<F>(&self, key: &LockKey, f: F) -> EscrowResult<(Lock, Lock)>
    where
        F: FnOnce(&mut Lock) -> EscrowResult,
    {
        let _guard = self.acquire_lock(key);
        let previous = self
            .locks
            .get(key)?
            .ok_or(EscrowError::LockNotFound { key: *key })?;
        let mut updated = previous.clone();
        f(&mut updated)?;
        Self::ensure_record_matches(key, &updated)?;
        self.locks.insert(key, &updated)?;
        Ok((previous, updated))
    }

    pub fn remove(&self, key: &LockKey) -> EscrowResult {
        let _guard = self.acquire_lock(key);
        self.locks.remove(key)?;
        Ok(())
    }

    /// All locks of a pair, in index order.
    pub fn locks_for_pair(
        &self,
        sender: &EscrowAddress,
        receiver: &EscrowAddress,
    ) -> EscrowResult<Vec<Lock>> {
        Ok(self
            .locks
            .iter()
            .skip_to(&LockKey::first_of_pair(*sender, *receiver))?
            .take_while(|(key, _)| key.is_in_pair(sender, receiver))
            .map(|(_, lock)| lock)
            .collect())
    }

    // Event log

    /// Append an event and return its sequence number.
    pub fn append_event(&self, event: &EscrowEvent) -> EscrowResult<EventSequence> {
        self.events.append(event)
    }

    /// Events with a sequence number of at least `from`, in order.
    pub fn events_since(
        &self,
        from: EventSequence,
    ) -> EscrowResult<Vec<(EventSequence, EscrowEvent)>> {
        self.events.since(from)
    }

    /// Sequence number the next appended event will receive.
    pub fn next_event_sequence(&self) -> EventSequence {
        self.events.next_sequence()
    }
}
