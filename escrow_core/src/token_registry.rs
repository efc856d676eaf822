// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use escrow_types::base_types::TokenId;
use escrow_types::error::{EscrowError, EscrowResult};
use escrow_types::token::TokenTransfer;

/// Resolves the token named in a lock to the collaborator that moves it.
///
/// Lookups hand out a clone of the `Arc`, so no registry lock is held while the
/// token runs.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: RwLock<BTreeMap<TokenId, Arc<dyn TokenTransfer>>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `transfer` under `token`, returning the collaborator it replaces.
    pub fn register(
        &self,
        token: TokenId,
        transfer: Arc<dyn TokenTransfer>,
    ) -> Option<Arc<dyn TokenTransfer>> {
        debug!(%token, "Registering token");
        self.tokens.write().insert(token, transfer)
    }

    pub fn get(&self, token: &TokenId) -> EscrowResult<Arc<dyn TokenTransfer>> {
        self.tokens
            .read()
            .get(token)
            .cloned()
            .ok_or(EscrowError::UnknownToken { token: *token })
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        self.tokens.read().contains_key(token)
    }
}
