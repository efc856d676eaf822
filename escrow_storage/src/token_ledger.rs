// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::Arc;

use rocksdb::Options;
use tracing::{debug, instrument};
use typed_store::rocks::{open_cf, DBMap};
use typed_store::traits::Map;

use escrow_types::base_types::{EscrowAddress, TokenId};
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::token::TokenTransfer;

const BALANCES_CF: &str = "balances";
const ALLOWANCES_CF: &str = "allowances";

/// Fungible token balances with owner-to-spender allowances, for any number of
/// tokens. Stands in for the external token contracts a lock deposits into.
pub struct TokenLedger {
    balances: DBMap<(TokenId, EscrowAddress), u64>,

    /// Keyed by (token, owner, spender).
    allowances: DBMap<(TokenId, EscrowAddress, EscrowAddress), u64>,

    /// Serializes read-modify-write across both tables.
    guard: parking_lot::Mutex<()>,
}

impl TokenLedger {
    pub fn open<P: AsRef<Path>>(path: P, db_options: Option<Options>) -> EscrowResult<TokenLedger> {
        let db = open_cf(&path, db_options, &[BALANCES_CF, ALLOWANCES_CF])?;
        Ok(TokenLedger {
            balances: DBMap::reopen(&db, Some(BALANCES_CF))?,
            allowances: DBMap::reopen(&db, Some(ALLOWANCES_CF))?,
            guard: parking_lot::Mutex::new(()),
        })
    }

    /// A [`TokenTransfer`] handle bound to one token of this ledger.
    pub fn token(self: &Arc<Self>, token: TokenId) -> LedgerToken {
        LedgerToken {
            ledger: self.clone(),
            token,
        }
    }

    pub fn balance_of(&self, token: &TokenId, owner: &EscrowAddress) -> EscrowResult<u64> {
        Ok(self.balances.get(&(*token, *owner))?.unwrap_or(0))
    }

    pub fn allowance(
        &self,
        token: &TokenId,
        owner: &EscrowAddress,
        spender: &EscrowAddress,
    ) -> EscrowResult<u64> {
        Ok(self
            .allowances
            .get(&(*token, *owner, *spender))?
            .unwrap_or(0))
    }

    /// Credit `amount` to `owner` out of thin air. Returns the new balance.
    #[instrument(level = "debug", skip(self))]
    pub fn mint(&self, token: TokenId, owner: EscrowAddress, amount: u64) -> EscrowResult<u64> {
        let _guard = self.guard.lock();
        let balance = self
            .balance_of(&token, &owner)?
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow { owner })?;
        self.balances.insert(&(token, owner), &balance)?;
        Ok(balance)
    }

    /// Set the allowance of `spender` over the funds of `owner`.
    #[instrument(level = "debug", skip(self))]
    pub fn approve(
        &self,
        token: TokenId,
        owner: EscrowAddress,
        spender: EscrowAddress,
        amount: u64,
    ) -> EscrowResult {
        let _guard = self.guard.lock();
        self.allowances.insert(&(token, owner, spender), &amount)?;
        Ok(())
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(
        &self,
        token: TokenId,
        from: EscrowAddress,
        to: EscrowAddress,
        amount: u64,
    ) -> EscrowResult {
        let _guard = self.guard.lock();
        let balances = self.moved_balances(&token, from, to, amount)?;
        self.balances
            .batch()
            .insert_batch(&self.balances, balances.into_iter())?
            .write()?;
        debug!(%token, %from, %to, amount, "Transferred");
        Ok(())
    }

    /// Move `amount` from `owner` to `to`, spending allowance granted to `spender`.
    pub fn transfer_from(
        &self,
        token: TokenId,
        spender: EscrowAddress,
        owner: EscrowAddress,
        to: EscrowAddress,
        amount: u64,
    ) -> EscrowResult {
        let _guard = self.guard.lock();
        let allowance = self.allowance(&token, &owner, &spender)?;
        if allowance < amount {
            return Err(EscrowError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                required: amount,
            });
        }
        let balances = self.moved_balances(&token, owner, to, amount)?;

        // Multi table atomic write using batches
        self.balances
            .batch()
            .insert_batch(
                &self.allowances,
                std::iter::once(((token, owner, spender), allowance - amount)),
            )?
            .insert_batch(&self.balances, balances.into_iter())?
            .write()?;
        debug!(%token, %spender, %owner, %to, amount, "Transferred from allowance");
        Ok(())
    }

    /// New balances of `from` and `to` after moving `amount`. Must be called with
    /// the guard held.
    fn moved_balances(
        &self,
        token: &TokenId,
        from: EscrowAddress,
        to: EscrowAddress,
        amount: u64,
    ) -> EscrowResult<Vec<((TokenId, EscrowAddress), u64)>> {
        let from_balance = self.balance_of(token, &from)?;
        if from_balance < amount {
            return Err(EscrowError::InsufficientBalance {
                owner: from,
                balance: from_balance,
                required: amount,
            });
        }
        if from == to {
            return Ok(vec![((*token, from), from_balance)]);
        }
        let to_balance = self
            .balance_of(token, &to)?
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow { owner: to })?;
        Ok(vec![
            ((*token, from), from_balance - amount),
            ((*token, to), to_balance),
        ])
    }
}

/// One token of a [`TokenLedger`].
#[derive(Clone)]
pub struct LedgerToken {
    ledger: Arc<TokenLedger>,
    token: TokenId,
}

impl LedgerToken {
    pub fn id(&self) -> TokenId {
        self.token
    }
}

impl TokenTransfer for LedgerToken {
    fn transfer_from(
        &self,
        spender: EscrowAddress,
        owner: EscrowAddress,
        amount: u64,
    ) -> EscrowResult<bool> {
        self.ledger
            .transfer_from(self.token, spender, owner, spender, amount)?;
        Ok(true)
    }

    fn transfer(&self, from: EscrowAddress, to: EscrowAddress, amount: u64) -> EscrowResult<bool> {
        self.ledger.transfer(self.token, from, to, amount)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_types::base_types::dbg_addr;
    use pretty_assertions::assert_eq;

    fn open_ledger() -> (tempfile::TempDir, Arc<TokenLedger>) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(TokenLedger::open(dir.path(), None).unwrap());
        (dir, ledger)
    }

    #[test]
    fn test_mint_and_transfer() {
        let (_dir, ledger) = open_ledger();
        let (token, alice, bob) = (dbg_addr(10), dbg_addr(1), dbg_addr(2));

        assert_eq!(ledger.mint(token, alice, 100).unwrap(), 100);
        ledger.transfer(token, alice, bob, 30).unwrap();
        assert_eq!(ledger.balance_of(&token, &alice).unwrap(), 70);
        assert_eq!(ledger.balance_of(&token, &bob).unwrap(), 30);

        // Balances of other tokens are separate.
        assert_eq!(ledger.balance_of(&dbg_addr(11), &alice).unwrap(), 0);

        assert_eq!(
            ledger.transfer(token, bob, alice, 31),
            Err(EscrowError::InsufficientBalance {
                owner: bob,
                balance: 30,
                required: 31
            })
        );
        ledger.transfer(token, bob, bob, 30).unwrap();
        assert_eq!(ledger.balance_of(&token, &bob).unwrap(), 30);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let (_dir, ledger) = open_ledger();
        let (token, owner, spender) = (dbg_addr(10), dbg_addr(1), dbg_addr(2));
        ledger.mint(token, owner, 100).unwrap();

        assert_eq!(
            ledger.transfer_from(token, spender, owner, spender, 10),
            Err(EscrowError::InsufficientAllowance {
                owner,
                spender,
                allowance: 0,
                required: 10
            })
        );

        ledger.approve(token, owner, spender, 50).unwrap();
        ledger
            .transfer_from(token, spender, owner, spender, 40)
            .unwrap();
        assert_eq!(ledger.allowance(&token, &owner, &spender).unwrap(), 10);
        assert_eq!(ledger.balance_of(&token, &owner).unwrap(), 60);
        assert_eq!(ledger.balance_of(&token, &spender).unwrap(), 40);
    }

    #[test]
    fn test_failed_transfer_from_changes_nothing() {
        let (_dir, ledger) = open_ledger();
        let (token, owner, spender) = (dbg_addr(10), dbg_addr(1), dbg_addr(2));
        ledger.mint(token, owner, 5).unwrap();
        ledger.approve(token, owner, spender, 50).unwrap();

        assert!(ledger
            .transfer_from(token, spender, owner, spender, 6)
            .is_err());
        assert_eq!(ledger.allowance(&token, &owner, &spender).unwrap(), 50);
        assert_eq!(ledger.balance_of(&token, &owner).unwrap(), 5);
    }

    #[test]
    fn test_ledger_token_handle() {
        let (_dir, ledger) = open_ledger();
        let (token, owner, custody) = (dbg_addr(10), dbg_addr(1), dbg_addr(2));
        ledger.mint(token, owner, 100).unwrap();
        ledger.approve(token, owner, custody, 100).unwrap();

        let handle = ledger.token(token);
        assert_eq!(handle.id(), token);
        assert!(handle.transfer_from(custody, owner, 60).unwrap());
        assert!(handle.transfer(custody, owner, 20).unwrap());
        assert_eq!(ledger.balance_of(&token, &owner).unwrap(), 60);
        assert_eq!(ledger.balance_of(&token, &custody).unwrap(), 40);
    }
}
