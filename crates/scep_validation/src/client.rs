// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ValidationConfig;
use crate::error::{ServiceOutcomeError, ValidationError};
use crate::error_code::ErrorCode;
use crate::payload::{
    FailureNotificationRequest, IssuedCertificate, SuccessNotificationRequest, ValidationRequest,
};
use crate::service::ServiceCall;
use crate::telemetry::{EventKind, NoopTelemetry, TelemetryEvent, TelemetrySink};
use shared_types::requests::ActivityId;
use shared_types::scep_actions::{
    ScepActionResponse, FAILURE_NOTIFICATION_ENDPOINT, SERVICE_NAME, SUCCESS_NOTIFICATION_ENDPOINT,
    VALIDATE_REQUEST_ENDPOINT,
};

/// Client a CA uses to ask the validation service whether it may issue a
/// certificate for a SCEP request, and to report what it did afterwards.
///
/// Cheap to clone; clones share the service collaborator and telemetry sink.
#[derive(Clone)]
pub struct ValidationClient {
    config: ValidationConfig,
    service: Arc<dyn ServiceCall + Send + Sync>,
    telemetry: Arc<dyn TelemetrySink + Send + Sync>,
}

impl ValidationClient {
    pub fn new(config: ValidationConfig, service: Arc<dyn ServiceCall + Send + Sync>) -> Self {
        Self {
            config,
            service,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink + Send + Sync>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Ask whether `certificate_request` (base64 PKCS#10) may be issued.
    ///
    /// `Ok(())` is the only answer that permits issuance.
    pub async fn validate_request(
        &self,
        transaction_id: &str,
        certificate_request: &str,
    ) -> Result<(), ValidationError> {
        let request = self.request(transaction_id, certificate_request)?;
        self.post_and_interpret(
            VALIDATE_REQUEST_ENDPOINT,
            request.transaction_id(),
            &request.to_body(),
        )
        .await
    }

    /// Report that a certificate was issued for a request that validated.
    pub async fn send_success_notification(
        &self,
        transaction_id: &str,
        certificate_request: &str,
        cert_thumbprint: &str,
        cert_serial_number: &str,
        cert_expiration_date_utc: &str,
        cert_issuing_authority: &str,
    ) -> Result<(), ValidationError> {
        let notification = SuccessNotificationRequest::new(
            self.request(transaction_id, certificate_request)?,
            IssuedCertificate {
                thumbprint: cert_thumbprint,
                serial_number: cert_serial_number,
                expiration_date_utc: cert_expiration_date_utc,
                issuing_authority: cert_issuing_authority,
            },
        )?;
        self.post_and_interpret(
            SUCCESS_NOTIFICATION_ENDPOINT,
            notification.transaction_id(),
            &notification.to_body(),
        )
        .await
    }

    /// Report that no certificate was issued. `h_result` is the CA's own error
    /// code and is passed through untouched.
    pub async fn send_failure_notification(
        &self,
        transaction_id: &str,
        certificate_request: &str,
        h_result: i64,
        error_description: &str,
    ) -> Result<(), ValidationError> {
        let notification = FailureNotificationRequest::new(
            self.request(transaction_id, certificate_request)?,
            h_result,
            error_description,
        )?;
        self.post_and_interpret(
            FAILURE_NOTIFICATION_ENDPOINT,
            notification.transaction_id(),
            &notification.to_body(),
        )
        .await
    }

    fn request(
        &self,
        transaction_id: &str,
        certificate_request: &str,
    ) -> Result<ValidationRequest, ValidationError> {
        ValidationRequest::new(
            transaction_id,
            certificate_request,
            self.config.provider_name_and_version(),
        )
    }

    async fn post_and_interpret(
        &self,
        url_suffix: &str,
        transaction_id: &str,
        body: &impl Serialize,
    ) -> Result<(), ValidationError> {
        // our own wire types always serialize
        let body = serde_json::to_value(body).map_err(|e| {
            ValidationError::Service(
                http_client::HttpError::EncodeError {
                    encoding: format!("{url_suffix} payload"),
                    source: Box::new(e),
                }
                .into(),
            )
        })?;

        let activity_id = ActivityId::new_unique();
        let event = |kind, code, error_description| TelemetryEvent {
            kind,
            activity_id: &activity_id,
            transaction_id,
            url_suffix,
            code,
            error_description,
        };
        self.telemetry
            .track_event(&event(EventKind::RequestSent, None, None));

        let response = match self
            .service
            .call(
                SERVICE_NAME,
                url_suffix,
                self.config.service_version(),
                body,
                &activity_id,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("{url_suffix} for transaction {transaction_id} failed, activity {activity_id}: {e}");
                self.telemetry
                    .track_event(&event(EventKind::ServiceError, None, None));
                return Err(e.into());
            }
        };

        info!("activity {activity_id}: {url_suffix} response: {response}");

        let outcome = Outcome::from_response(&response);
        if outcome.error_code.is_success() {
            self.telemetry.track_event(&event(
                EventKind::Succeeded,
                outcome.raw_code.as_deref(),
                outcome.error_description.as_deref(),
            ));
            return Ok(());
        }

        warn!(
            "{url_suffix} for transaction {transaction_id} declined, activity {activity_id}: {outcome}"
        );
        self.telemetry.track_event(&event(
            EventKind::Failed,
            outcome.raw_code.as_deref(),
            outcome.error_description.as_deref(),
        ));

        Err(ServiceOutcomeError {
            error_code: outcome.error_code,
            raw_code: outcome.raw_code,
            error_description: outcome.error_description,
            transaction_id: transaction_id.to_owned(),
            activity_id,
        }
        .into())
    }
}

impl fmt::Debug for ValidationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A service response, reduced to what decides the call.
struct Outcome {
    raw_code: Option<String>,
    error_code: ErrorCode,
    error_description: Option<String>,
}

impl Outcome {
    /// Missing or non-string fields are `None`. No `code` at all is `Unknown`.
    fn from_response(response: &serde_json::Value) -> Self {
        // only objects: serde would fill the fields of a bare array by position
        let ScepActionResponse {
            code,
            error_description,
        } = if response.is_object() {
            ScepActionResponse::deserialize(response).unwrap_or_default()
        } else {
            ScepActionResponse::default()
        };
        Self {
            error_code: code.as_deref().map_or(ErrorCode::Unknown, ErrorCode::parse),
            raw_code: code,
            error_description,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.raw_code.as_deref().unwrap_or("no code"),
            self.error_code
        )?;
        if let Some(description) = &self.error_description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}
