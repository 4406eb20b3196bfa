// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asks a device-management backend whether a SCEP enrollment was approved
//! before a CA issues the certificate, and reports the outcome afterwards.
//!
//! Fail-closed: anything other than an explicit `Success` from the service is
//! an `Err`.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod error_code;
pub mod locator;
pub mod payload;
pub mod retry_if;
pub mod service;
pub mod telemetry;

pub use client::ValidationClient;
pub use config::ValidationConfig;
pub use error::{ServiceError, ServiceOutcomeError, ValidationError};
pub use error_code::ErrorCode;
pub use service::{IntuneServiceClient, ServiceCall};
pub use shared_types::requests::ActivityId;
pub use shared_types::scep_actions;
