// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use thiserror::Error;

use crate::base_types::*;
use crate::lock::LockStatus;
use serde::{Deserialize, Serialize};

#[macro_export]
macro_rules! escrow_bail {
    ($e:expr) => {
        return Err($e)
    };
}

#[macro_export(local_inner_macros)]
macro_rules! escrow_ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            escrow_bail!($e);
        }
    };
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize, Error, Hash)]
/// Custom error type for the escrow ledger.
pub enum EscrowError {
    // Caller input
    #[error("Invalid parameter: {error}")]
    InvalidParameter { error: String },
    #[error("Invalid address")]
    InvalidAddress,

    // Lock lookup
    #[error("No lock recorded at {key}")]
    LockNotFound { key: LockKey },
    #[error("A lock is already recorded at {key}")]
    LockAlreadyExists { key: LockKey },
    #[error("Lock found under {expected} is recorded as {found}")]
    RecordMismatch { expected: LockKey, found: LockKey },

    // State machine
    #[error("Lock {key} is already unlocked")]
    AlreadyUnlocked { key: LockKey },
    #[error("Lock {key} is already withdrawn")]
    AlreadyWithdrawn { key: LockKey },
    #[error("Lock {key} has not been unlocked yet")]
    NotYetUnlocked { key: LockKey },
    #[error(
        "Lock {key} cannot be unlocked before height {unlock_height} (current height {current_height})"
    )]
    LockPeriodNotElapsed {
        key: LockKey,
        unlock_height: BlockHeight,
        current_height: BlockHeight,
    },
    #[error("Illegal status transition for lock {key}: {from} -> {to}")]
    IllegalTransition {
        key: LockKey,
        from: LockStatus,
        to: LockStatus,
    },

    // Index allocation
    #[error("Lock index space exhausted for pair ({sender}, {receiver})")]
    IndexOverflow {
        sender: EscrowAddress,
        receiver: EscrowAddress,
    },

    // Token collaborator
    #[error("Unknown token {token}")]
    UnknownToken { token: TokenId },
    #[error("External transfer of token {token} failed: {error}")]
    ExternalTransferFailed { token: TokenId, error: String },
    #[error("Insufficient balance of {owner}: has {balance}, needs {required}")]
    InsufficientBalance {
        owner: EscrowAddress,
        balance: u64,
        required: u64,
    },
    #[error("Insufficient allowance from {owner} to {spender}: has {allowance}, needs {required}")]
    InsufficientAllowance {
        owner: EscrowAddress,
        spender: EscrowAddress,
        allowance: u64,
        required: u64,
    },
    #[error("Balance overflow for {owner}")]
    BalanceOverflow { owner: EscrowAddress },

    // Internal state errors
    #[error("Storage error: {error}")]
    StorageError { error: String },
}

pub type EscrowResult<T = ()> = Result<T, EscrowError>;

impl std::convert::From<typed_store::rocks::TypedStoreError> for EscrowError {
    fn from(error: typed_store::rocks::TypedStoreError) -> Self {
        EscrowError::StorageError {
            error: error.to_string(),
        }
    }
}
