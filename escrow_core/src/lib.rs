// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0
#![warn(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rust_2021_compatibility
)]

pub mod clock;
pub mod engine;
pub mod token_registry;

#[cfg(test)]
#[path = "unit_tests/test_utils.rs"]
pub(crate) mod test_utils;

pub use clock::ManualClock;
pub use engine::{EscrowEngine, EventReceiver};
pub use token_registry::TokenRegistry;
