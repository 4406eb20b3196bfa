// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::ConfigError;
use shared_types::scep_actions::DEFAULT_SERVICE_VERSION;

/// Fixed for the life of a [`crate::ValidationClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Identifies the calling CA to the service, sent as `callerInfo`.
    provider_name_and_version: String,
    /// Sent as `api-version`.
    service_version: String,
}

impl ValidationConfig {
    pub fn new(provider_name_and_version: impl Into<String>) -> Result<Self, ConfigError> {
        let provider_name_and_version = provider_name_and_version.into();
        if provider_name_and_version.trim().is_empty() {
            return Err(ConfigError::MissingProvider);
        }
        Ok(Self {
            provider_name_and_version,
            service_version: DEFAULT_SERVICE_VERSION.to_owned(),
        })
    }

    /// Override the protocol version. Only needed when the service has moved on
    /// and this crate hasn't.
    pub fn with_service_version(
        mut self,
        service_version: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let service_version = service_version.into();
        if service_version.trim().is_empty() {
            return Err(ConfigError::MissingServiceVersion);
        }
        self.service_version = service_version;
        Ok(self)
    }

    pub fn provider_name_and_version(&self) -> &str {
        &self.provider_name_and_version
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }
}
