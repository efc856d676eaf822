// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

use escrow_types::base_types::BlockHeight;
use escrow_types::clock::HeightClock;

/// A height clock moved forward by hand. It never goes back.
#[derive(Debug, Default)]
pub struct ManualClock {
    height: AtomicU64,
}

impl ManualClock {
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    /// Move forward by `blocks`, saturating at the maximum height. Returns the
    /// new height.
    pub fn advance(&self, blocks: BlockHeight) -> BlockHeight {
        let mut current = self.height.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(blocks);
            match self.height.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Move forward to `height`. A height in the past leaves the clock where it
    /// is. Returns the resulting height.
    pub fn advance_to(&self, height: BlockHeight) -> BlockHeight {
        let previous = self.height.fetch_max(height, Ordering::SeqCst);
        previous.max(height)
    }
}

impl HeightClock for ManualClock {
    fn current_height(&self) -> BlockHeight {
        self.height.load(Ordering::SeqCst)
    }
}
