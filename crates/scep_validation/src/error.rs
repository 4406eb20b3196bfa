// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error_code::ErrorCode;
use shared_types::requests::ActivityId;

/// Everything a validation or notification call can fail with.
///
/// Only `Ok(())` from [`crate::ValidationClient::validate_request`] means the
/// CA may issue. Every variant here means it may not.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required argument was empty or whitespace. Nothing was sent.
    #[error("invalid argument: {parameter} must not be empty")]
    InvalidArgument { parameter: &'static str },
    /// The service answered, and the answer wasn't `Success`.
    #[error(transparent)]
    ServiceOutcome(#[from] ServiceOutcomeError),
    /// We never got an answer we could interpret; the outcome is unknown.
    #[error("Error calling validation service: {0}")]
    Service(#[from] ServiceError),
}

impl ValidationError {
    /// True if the service explicitly declined, as opposed to us failing to ask.
    pub fn is_service_outcome(&self) -> bool {
        matches!(self, Self::ServiceOutcome(_))
    }

    /// Whether repeating the same call might plausibly get a different answer.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::InvalidArgument { .. } => false,
            Self::ServiceOutcome(e) => matches!(
                e.error_code,
                ErrorCode::InternalServiceError | ErrorCode::ServiceUnavailable
            ),
            Self::Service(e) => e.is_retriable(),
        }
    }

    pub fn activity_id(&self) -> Option<&ActivityId> {
        match self {
            Self::ServiceOutcome(e) => Some(&e.activity_id),
            Self::InvalidArgument { .. } | Self::Service(_) => None,
        }
    }
}

/// A non-`Success` answer from the validation service, with enough context to
/// find the call in the service's own logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ServiceOutcomeError {
    pub error_code: ErrorCode,
    /// The `code` field exactly as sent, if there was one.
    pub raw_code: Option<String>,
    pub error_description: Option<String>,
    pub transaction_id: String,
    pub activity_id: ActivityId,
}

impl fmt::Display for ServiceOutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation service returned {} for transaction {} (activity {})",
            self.raw_code.as_deref().unwrap_or("no code"),
            self.transaction_id,
            self.activity_id
        )?;
        if let Some(description) = &self.error_description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// Failures of the service-call collaborator: transport, auth, endpoint lookup.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Error during HTTP: {0}")]
    Http(#[from] http_client::HttpError),
    #[error("Error acquiring access token: {0}")]
    Auth(#[from] AuthError),
    #[error("Error locating service: {0}")]
    Locator(#[from] LocatorError),
    #[error("Timed out after {:.3}s", after.as_secs_f64())]
    Timeout { after: Duration },
}

impl ServiceError {
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retriable(),
            Self::Auth(e) => e.is_retriable(),
            Self::Locator(e) => e.is_retriable(),
            Self::Timeout { .. } => true,
        }
    }

    /// HTTP status of the failed request, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status(),
            Self::Auth(_) | Self::Locator(_) | Self::Timeout { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request to {authority} failed: {source}")]
    TokenRequest {
        authority: String,
        source: http_client::HttpError,
    },
    #[error("token response from {authority} had no access_token")]
    MissingToken { authority: String },
}

impl AuthError {
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::TokenRequest { source, .. } => source.is_retriable(),
            Self::MissingToken { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("service {service} not found in discovery response")]
    ServiceNotFound { service: String },
    #[error("discovery request failed: {0}")]
    Discovery(#[source] Box<ServiceError>),
}

impl LocatorError {
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ServiceNotFound { .. } => false,
            Self::Discovery(e) => e.is_retriable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("provider name and version must not be empty")]
    MissingProvider,
    #[error("service version must not be empty")]
    MissingServiceVersion,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(code: &str, description: Option<&str>) -> ServiceOutcomeError {
        ServiceOutcomeError {
            error_code: ErrorCode::parse(code),
            raw_code: Some(code.into()),
            error_description: description.map(Into::into),
            transaction_id: "txn-1".into(),
            activity_id: "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap(),
        }
    }

    #[test]
    fn outcome_display_has_correlation_ids() {
        let err = outcome("UnauthorizedRequest", Some("not enrolled"));
        assert_eq!(
            err.to_string(),
            "validation service returned UnauthorizedRequest for transaction txn-1 \
             (activity 0f8fad5b-d9cb-469f-a165-70867728950e): not enrolled"
        );
    }

    #[test]
    fn only_transient_outcomes_are_retriable() {
        let declined = ValidationError::from(outcome("ChallengeExpired", None));
        assert!(declined.is_service_outcome());
        assert!(!declined.is_retriable());

        let busy = ValidationError::from(outcome("ServiceUnavailable", None));
        assert!(busy.is_retriable());

        let invalid = ValidationError::InvalidArgument {
            parameter: "transaction_id",
        };
        assert!(!invalid.is_retriable());
        assert!(invalid.activity_id().is_none());
    }

    #[test]
    fn timeouts_are_retriable() {
        let err = ValidationError::from(ServiceError::Timeout {
            after: Duration::from_secs(30),
        });
        assert!(err.is_retriable());
        assert!(!err.is_service_outcome());
        assert_eq!(
            err.to_string(),
            "Error calling validation service: Timed out after 30.000s"
        );
    }
}
