// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::base_types::{BlockHeight, EscrowAddress, LockIndex, LockKey, TokenId};
use crate::error::{EscrowError, EscrowResult};

#[cfg(test)]
#[path = "unit_tests/lock_tests.rs"]
mod lock_tests;

/// Lock status, ordered by lifecycle. The only legal transitions are
/// Locked -> Unlocked -> Withdrawn.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub enum LockStatus {
    Locked,
    Unlocked,
    Withdrawn,
}

impl LockStatus {
    /// The only status this one may advance to, if any.
    pub fn next(self) -> Option<LockStatus> {
        match self {
            LockStatus::Locked => Some(LockStatus::Unlocked),
            LockStatus::Unlocked => Some(LockStatus::Withdrawn),
            LockStatus::Withdrawn => None,
        }
    }
}

impl Display for LockStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockStatus::Locked => "Locked",
            LockStatus::Unlocked => "Unlocked",
            LockStatus::Withdrawn => "Withdrawn",
        };
        write!(f, "{}", name)
    }
}

/// One escrowed deposit.
///
/// Everything except `status` is fixed at creation; the status can only be moved
/// forward through [`Lock::advance_to`].
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct Lock {
    index: LockIndex,
    amount: u64,
    unlock_height: BlockHeight,
    sender: EscrowAddress,
    receiver: EscrowAddress,
    token: TokenId,
    status: LockStatus,
}

impl Lock {
    pub fn new(key: LockKey, token: TokenId, amount: u64, unlock_height: BlockHeight) -> Self {
        Self {
            index: key.index,
            amount,
            unlock_height,
            sender: key.sender,
            receiver: key.receiver,
            token,
            status: LockStatus::Locked,
        }
    }

    pub fn key(&self) -> LockKey {
        LockKey::new(self.sender, self.receiver, self.index)
    }

    pub fn index(&self) -> LockIndex {
        self.index
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unlock_height(&self) -> BlockHeight {
        self.unlock_height
    }

    pub fn sender(&self) -> EscrowAddress {
        self.sender
    }

    pub fn receiver(&self) -> EscrowAddress {
        self.receiver
    }

    pub fn token(&self) -> TokenId {
        self.token
    }

    pub fn status(&self) -> LockStatus {
        self.status
    }

    pub fn is_unlockable_at(&self, height: BlockHeight) -> bool {
        height >= self.unlock_height
    }

    /// Check that `to` is the immediate successor of the current status.
    ///
    /// Each rejected transition maps to the error a caller of the matching
    /// operation expects: unlocking twice is `AlreadyUnlocked`, withdrawing
    /// a lock that was never unlocked is `NotYetUnlocked`, and anything on a
    /// withdrawn lock is `AlreadyWithdrawn`.
    pub fn ensure_can_advance_to(&self, to: LockStatus) -> EscrowResult {
        if self.status.next() == Some(to) {
            return Ok(());
        }
        let key = self.key();
        match (self.status, to) {
            (LockStatus::Withdrawn, _) => Err(EscrowError::AlreadyWithdrawn { key }),
            (LockStatus::Unlocked, LockStatus::Unlocked) => {
                Err(EscrowError::AlreadyUnlocked { key })
            }
            (LockStatus::Locked, LockStatus::Withdrawn) => Err(EscrowError::NotYetUnlocked { key }),
            (from, to) => Err(EscrowError::IllegalTransition { key, from, to }),
        }
    }

    pub fn advance_to(&mut self, to: LockStatus) -> EscrowResult {
        self.ensure_can_advance_to(to)?;
        self.status = to;
        Ok(())
    }
}

impl Display for Lock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lock #{} [{}]\n  sender        : {}\n  receiver      : {}\n  token         : {}\n  amount        : {}\n  unlock height : {}",
            self.index,
            self.status,
            self.sender,
            self.receiver,
            self.token,
            self.amount,
            self.unlock_height,
        )
    }
}
