// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0
#![warn(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rust_2021_compatibility
)]

#[macro_use]
pub mod error;

pub mod base_types;
pub mod clock;
pub mod event;
pub mod lock;
pub mod storage;
pub mod token;
