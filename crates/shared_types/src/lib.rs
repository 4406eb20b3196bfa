// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! This crate is used for types that are shared within this repo's crates

pub mod requests;
pub mod scep_actions;
