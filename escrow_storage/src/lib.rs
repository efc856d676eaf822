// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0
#![warn(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rust_2021_compatibility
)]

pub mod event_log;
pub mod index_sequence;
pub mod lock_store;
pub mod token_ledger;

pub use event_log::PersistentEventLog;
pub use index_sequence::{InMemoryIndexSequence, PersistentIndexSequence};
pub use lock_store::LockStore;
pub use token_ledger::{LedgerToken, TokenLedger};
