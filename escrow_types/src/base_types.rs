// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::convert::{TryFrom, TryInto};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;

#[cfg(test)]
#[path = "unit_tests/base_types_tests.rs"]
mod base_types_tests;

/// Position of a lock within its (sender, receiver) pair.
pub type LockIndex = u64;
/// Reading of the monotonic height clock that gates unlocking.
pub type BlockHeight = u64;
/// Position of an event in the append-only event log.
pub type EventSequence = u64;
/// A token collaborator is named by its address.
pub type TokenId = EscrowAddress;

const HEX_PREFIX: &str = "0x";

#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Default)]
pub struct EscrowAddress([u8; EscrowAddress::LENGTH]);

impl EscrowAddress {
    pub const LENGTH: usize = 20;
    pub const ZERO: Self = Self([0u8; Self::LENGTH]);

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(rand::thread_rng().gen())
    }
}

impl AsRef<[u8]> for EscrowAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl TryFrom<&[u8]> for EscrowAddress {
    type Error = EscrowError;

    fn try_from(bytes: &[u8]) -> Result<Self, EscrowError> {
        let arr: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| EscrowError::InvalidAddress)?;
        Ok(Self(arr))
    }
}

impl FromStr for EscrowAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address_hex(s)
    }
}

impl fmt::Display for EscrowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", HEX_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for EscrowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// Hex strings in config files and JSON output, raw bytes in the storage encoding
// so that composite keys keep their byte ordering.
impl Serialize for EscrowAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for EscrowAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            decode_address_hex(&s).map_err(|err| serde::de::Error::custom(err.to_string()))
        } else {
            let bytes = <[u8; EscrowAddress::LENGTH]>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

pub fn decode_address_hex(s: &str) -> Result<EscrowAddress, anyhow::Error> {
    let s = s.strip_prefix(HEX_PREFIX).unwrap_or(s);
    let bytes = hex::decode(s)?;
    EscrowAddress::try_from(&bytes[..])
        .map_err(|_| anyhow!("expected {} bytes, got {}", EscrowAddress::LENGTH, bytes.len()))
}

/// Deterministic address for tests and examples.
pub fn dbg_addr(name: u8) -> EscrowAddress {
    let mut rng = StdRng::from_seed([name; 32]);
    EscrowAddress(rng.gen())
}

/// Composite key of a lock. Field order is the storage order: all locks of a
/// (sender, receiver) pair are contiguous and sorted by index.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash, Debug, Serialize, Deserialize)]
pub struct LockKey {
    pub sender: EscrowAddress,
    pub receiver: EscrowAddress,
    pub index: LockIndex,
}

impl LockKey {
    pub fn new(sender: EscrowAddress, receiver: EscrowAddress, index: LockIndex) -> Self {
        Self {
            sender,
            receiver,
            index,
        }
    }

    /// The first key of a pair, used as the start of a range scan.
    pub fn first_of_pair(sender: EscrowAddress, receiver: EscrowAddress) -> Self {
        Self::new(sender, receiver, 0)
    }

    pub fn is_in_pair(&self, sender: &EscrowAddress, receiver: &EscrowAddress) -> bool {
        &self.sender == sender && &self.receiver == receiver
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, #{})", self.sender, self.receiver, self.index)
    }
}
