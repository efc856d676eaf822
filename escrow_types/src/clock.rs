// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::base_types::BlockHeight;

/// Monotonic height source. Readings never decrease.
pub trait HeightClock: Send + Sync {
    fn current_height(&self) -> BlockHeight;
}
