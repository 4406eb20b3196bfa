// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checked inputs for the three actions, and the request bodies built from them.

use crate::error::ValidationError;
use shared_types::scep_actions::{
    FailureNotification, FailureNotificationBody, ScepRequest, SuccessNotification,
    SuccessNotificationBody, ValidateRequestBody,
};

/// Errors with `InvalidArgument` naming `parameter` if `value` is empty or whitespace.
pub fn require_non_blank<'a>(
    parameter: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::InvalidArgument { parameter })
    } else {
        Ok(value)
    }
}

/// One SCEP enrollment attempt, as the CA sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    transaction_id: String,
    certificate_request: String,
    caller_info: String,
}

impl ValidationRequest {
    pub fn new(
        transaction_id: &str,
        certificate_request: &str,
        caller_info: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            transaction_id: require_non_blank("transaction_id", transaction_id)?.to_owned(),
            certificate_request: require_non_blank("certificate_request", certificate_request)?
                .to_owned(),
            caller_info: require_non_blank("caller_info", caller_info)?.to_owned(),
        })
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn to_body(&self) -> ValidateRequestBody {
        ValidateRequestBody {
            request: ScepRequest {
                transaction_id: self.transaction_id.clone(),
                certificate_request: self.certificate_request.clone(),
                caller_info: self.caller_info.clone(),
            },
        }
    }
}

/// Details of a certificate that was issued for a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate<'a> {
    pub thumbprint: &'a str,
    pub serial_number: &'a str,
    /// ISO 8601 UTC (`YYYY-MM-DDThh:mm:ss.sssZ`). Only checked for emptiness here.
    pub expiration_date_utc: &'a str,
    pub issuing_authority: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessNotificationRequest {
    request: ValidationRequest,
    certificate_thumbprint: String,
    certificate_serial_number: String,
    certificate_expiration_date_utc: String,
    issuing_certificate_authority: String,
}

impl SuccessNotificationRequest {
    pub fn new(
        request: ValidationRequest,
        certificate: IssuedCertificate<'_>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            certificate_thumbprint: require_non_blank("cert_thumbprint", certificate.thumbprint)?
                .to_owned(),
            certificate_serial_number: require_non_blank(
                "cert_serial_number",
                certificate.serial_number,
            )?
            .to_owned(),
            certificate_expiration_date_utc: require_non_blank(
                "cert_expiration_date_utc",
                certificate.expiration_date_utc,
            )?
            .to_owned(),
            issuing_certificate_authority: require_non_blank(
                "cert_issuing_authority",
                certificate.issuing_authority,
            )?
            .to_owned(),
            request,
        })
    }

    pub fn transaction_id(&self) -> &str {
        self.request.transaction_id()
    }

    pub fn to_body(&self) -> SuccessNotificationBody {
        SuccessNotificationBody {
            notification: SuccessNotification {
                transaction_id: self.request.transaction_id.clone(),
                certificate_request: self.request.certificate_request.clone(),
                certificate_thumbprint: self.certificate_thumbprint.clone(),
                certificate_serial_number: self.certificate_serial_number.clone(),
                certificate_expiration_date_utc: self.certificate_expiration_date_utc.clone(),
                issuing_certificate_authority: self.issuing_certificate_authority.clone(),
                caller_info: self.request.caller_info.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotificationRequest {
    request: ValidationRequest,
    h_result: i64,
    error_description: String,
}

impl FailureNotificationRequest {
    /// `error_description` should be at most 255 characters; callers truncate,
    /// the service enforces.
    pub fn new(
        request: ValidationRequest,
        h_result: i64,
        error_description: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            error_description: require_non_blank("error_description", error_description)?
                .to_owned(),
            h_result,
            request,
        })
    }

    pub fn transaction_id(&self) -> &str {
        self.request.transaction_id()
    }

    pub fn to_body(&self) -> FailureNotificationBody {
        FailureNotificationBody {
            notification: FailureNotification {
                transaction_id: self.request.transaction_id.clone(),
                certificate_request: self.request.certificate_request.clone(),
                h_result: self.h_result,
                error_description: self.error_description.clone(),
                caller_info: self.request.caller_info.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;

    fn request() -> ValidationRequest {
        ValidationRequest::new("txn-1", "MIIBCSR", "ExampleCA/1.0").unwrap()
    }

    fn certificate() -> IssuedCertificate<'static> {
        IssuedCertificate {
            thumbprint: "A1B2",
            serial_number: "0123",
            expiration_date_utc: "2030-01-01T00:00:00.000Z",
            issuing_authority: "CN=Example Issuing CA",
        }
    }

    fn invalid_parameter<T: std::fmt::Debug>(result: Result<T, ValidationError>) -> &'static str {
        match result {
            Err(ValidationError::InvalidArgument { parameter }) => parameter,
            v => panic!("expected invalid argument, got {v:?}"),
        }
    }

    #[test]
    fn validate_body_shape() {
        assert_json_eq!(
            serde_json::to_value(request().to_body()).unwrap(),
            json!({
                "request": {
                    "transactionId": "txn-1",
                    "certificateRequest": "MIIBCSR",
                    "callerInfo": "ExampleCA/1.0",
                }
            })
        );
    }

    #[test]
    fn success_body_shape() {
        let notification = SuccessNotificationRequest::new(request(), certificate()).unwrap();
        assert_json_eq!(
            serde_json::to_value(notification.to_body()).unwrap(),
            json!({
                "notification": {
                    "transactionId": "txn-1",
                    "certificateRequest": "MIIBCSR",
                    "certificateThumbprint": "A1B2",
                    "certificateSerialNumber": "0123",
                    "certificateExpirationDateUtc": "2030-01-01T00:00:00.000Z",
                    "issuingCertificateAuthority": "CN=Example Issuing CA",
                    "callerInfo": "ExampleCA/1.0",
                }
            })
        );
    }

    #[test]
    fn failure_body_shape() {
        let notification =
            FailureNotificationRequest::new(request(), -2146885628, "CA refused").unwrap();
        assert_json_eq!(
            serde_json::to_value(notification.to_body()).unwrap(),
            json!({
                "notification": {
                    "transactionId": "txn-1",
                    "certificateRequest": "MIIBCSR",
                    "hResult": -2146885628i64,
                    "errorDescription": "CA refused",
                    "callerInfo": "ExampleCA/1.0",
                }
            })
        );
    }

    #[test]
    fn blank_fields_are_named() {
        assert_eq!(
            invalid_parameter(ValidationRequest::new(" \t", "MIIB", "ca")),
            "transaction_id"
        );
        assert_eq!(
            invalid_parameter(ValidationRequest::new("txn", "", "ca")),
            "certificate_request"
        );
        assert_eq!(
            invalid_parameter(SuccessNotificationRequest::new(
                request(),
                IssuedCertificate {
                    serial_number: "\n",
                    ..certificate()
                }
            )),
            "cert_serial_number"
        );
        assert_eq!(
            invalid_parameter(FailureNotificationRequest::new(request(), 0, "   ")),
            "error_description"
        );
    }

    #[test]
    fn long_descriptions_pass_through() {
        let description = "x".repeat(300);
        let notification = FailureNotificationRequest::new(request(), 1, &description).unwrap();
        assert_eq!(notification.to_body().notification.error_description.len(), 300);
    }
}
