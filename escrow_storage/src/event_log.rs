// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use parking_lot::Mutex;
use tracing::trace;
use typed_store::rocks::DBMap;
use typed_store::traits::Map;

use escrow_types::base_types::EventSequence;
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::event::EscrowEvent;
use escrow_types::storage::EventLog;

/// Event log backed by its own column family.
pub struct PersistentEventLog {
    events: DBMap<EventSequence, EscrowEvent>,

    /// Sequence number the next appended event receives.
    next_event: Mutex<EventSequence>,
}

impl PersistentEventLog {
    /// Wrap `events`, continuing after the last stored entry.
    pub fn new(events: DBMap<EventSequence, EscrowEvent>) -> EscrowResult<Self> {
        let next_event = events
            .iter()
            .skip_prior_to(&EventSequence::MAX)?
            .next()
            .map(|(seq, _)| seq.saturating_add(1))
            .unwrap_or(0);
        Ok(Self {
            events,
            next_event: Mutex::new(next_event),
        })
    }
}

impl EventLog for PersistentEventLog {
    fn append(&self, event: &EscrowEvent) -> EscrowResult<EventSequence> {
        let mut next_event = self.next_event.lock();
        let seq = *next_event;
        let next = seq.checked_add(1).ok_or_else(|| EscrowError::StorageError {
            error: "event log is full".to_string(),
        })?;
        self.events.insert(&seq, event)?;
        *next_event = next;
        trace!(seq, %event, "Appended event");
        Ok(seq)
    }

    fn since(&self, from: EventSequence) -> EscrowResult<Vec<(EventSequence, EscrowEvent)>> {
        Ok(self.events.iter().skip_to(&from)?.collect())
    }

    fn next_sequence(&self) -> EventSequence {
        *self.next_event.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_types::base_types::{dbg_addr, LockKey};
    use escrow_types::lock::Lock;
    use pretty_assertions::assert_eq;
    use typed_store::rocks::open_cf;

    fn open_events(path: &std::path::Path) -> DBMap<EventSequence, EscrowEvent> {
        let db = open_cf(path, None, &["events"]).unwrap();
        DBMap::reopen(&db, Some("events")).unwrap()
    }

    fn test_event() -> EscrowEvent {
        let key = LockKey::new(dbg_addr(1), dbg_addr(2), 0);
        EscrowEvent::locked(&Lock::new(key, dbg_addr(9), 5, 10))
    }

    #[test]
    fn test_append_fails_when_sequence_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let events = open_events(dir.path());
        events.insert(&EventSequence::MAX, &test_event()).unwrap();

        let log = PersistentEventLog::new(events).unwrap();
        assert_eq!(log.next_sequence(), EventSequence::MAX);
        assert!(matches!(
            log.append(&test_event()),
            Err(EscrowError::StorageError { .. })
        ));
        assert_eq!(log.next_sequence(), EventSequence::MAX);
        assert_eq!(log.since(0).unwrap().len(), 1);
    }
}
