// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::base_types::{BlockHeight, EscrowAddress, LockIndex, LockKey, TokenId};
use crate::lock::Lock;

/// Notifications appended to the event log after an operation succeeds.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub enum EscrowEvent {
    LockedToken {
        index: LockIndex,
        sender: EscrowAddress,
        receiver: EscrowAddress,
        token: TokenId,
        amount: u64,
        unlock_height: BlockHeight,
    },
    UnlockedToken {
        index: LockIndex,
        sender: EscrowAddress,
        receiver: EscrowAddress,
        token: TokenId,
    },
    WithdrawToken {
        index: LockIndex,
        sender: EscrowAddress,
        receiver: EscrowAddress,
        token: TokenId,
        amount: u64,
    },
}

impl EscrowEvent {
    pub fn locked(lock: &Lock) -> Self {
        EscrowEvent::LockedToken {
            index: lock.index(),
            sender: lock.sender(),
            receiver: lock.receiver(),
            token: lock.token(),
            amount: lock.amount(),
            unlock_height: lock.unlock_height(),
        }
    }

    pub fn unlocked(lock: &Lock) -> Self {
        EscrowEvent::UnlockedToken {
            index: lock.index(),
            sender: lock.sender(),
            receiver: lock.receiver(),
            token: lock.token(),
        }
    }

    pub fn withdrawn(lock: &Lock) -> Self {
        EscrowEvent::WithdrawToken {
            index: lock.index(),
            sender: lock.sender(),
            receiver: lock.receiver(),
            token: lock.token(),
            amount: lock.amount(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EscrowEvent::LockedToken { .. } => "LockedToken",
            EscrowEvent::UnlockedToken { .. } => "UnlockedToken",
            EscrowEvent::WithdrawToken { .. } => "WithdrawToken",
        }
    }

    /// Key of the lock this event is about.
    pub fn lock_key(&self) -> LockKey {
        match self {
            EscrowEvent::LockedToken {
                index,
                sender,
                receiver,
                ..
            }
            | EscrowEvent::UnlockedToken {
                index,
                sender,
                receiver,
                ..
            }
            | EscrowEvent::WithdrawToken {
                index,
                sender,
                receiver,
                ..
            } => LockKey::new(*sender, *receiver, *index),
        }
    }
}

impl Display for EscrowEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowEvent::LockedToken {
                token,
                amount,
                unlock_height,
                ..
            } => write!(
                f,
                "{} {} amount={} token={} unlock_height={}",
                self.name(),
                self.lock_key(),
                amount,
                token,
                unlock_height
            ),
            EscrowEvent::UnlockedToken { token, .. } => {
                write!(f, "{} {} token={}", self.name(), self.lock_key(), token)
            }
            EscrowEvent::WithdrawToken { token, amount, .. } => write!(
                f,
                "{} {} amount={} token={}",
                self.name(),
                self.lock_key(),
                amount,
                token
            ),
        }
    }
}
