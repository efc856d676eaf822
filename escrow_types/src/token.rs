// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::base_types::EscrowAddress;
use crate::error::EscrowResult;

/// The external token contract the escrow moves funds through.
///
/// A call returning `Ok(false)` is a refused transfer and is treated by the
/// escrow exactly like an error.
pub trait TokenTransfer: Send + Sync {
    /// Move `amount` from `owner` to `spender`, drawing on the allowance `owner`
    /// granted to `spender`.
    fn transfer_from(
        &self,
        spender: EscrowAddress,
        owner: EscrowAddress,
        amount: u64,
    ) -> EscrowResult<bool>;

    /// Move `amount` held by `from` to `to`.
    fn transfer(&self, from: EscrowAddress, to: EscrowAddress, amount: u64) -> EscrowResult<bool>;
}
