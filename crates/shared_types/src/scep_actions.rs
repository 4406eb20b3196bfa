// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The CA<>validation service wire API.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Name the validation service is registered under in service discovery.
pub const SERVICE_NAME: &str = "ScepRequestValidationFEService";
/// Protocol version sent as `api-version` unless configured otherwise.
pub const DEFAULT_SERVICE_VERSION: &str = "2018-02-20";

pub const VALIDATE_REQUEST_ENDPOINT: &str = "ScepActions/validateRequest";
pub const SUCCESS_NOTIFICATION_ENDPOINT: &str = "ScepActions/successNotification";
pub const FAILURE_NOTIFICATION_ENDPOINT: &str = "ScepActions/failureNotification";

/// Body of a `validateRequest` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequestBody {
    pub request: ScepRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScepRequest {
    pub transaction_id: String,
    /// Base64 PKCS#10 request, opaque to us.
    pub certificate_request: String,
    pub caller_info: String,
}

/// Body of a `successNotification` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessNotificationBody {
    pub notification: SuccessNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessNotification {
    pub transaction_id: String,
    pub certificate_request: String,
    pub certificate_thumbprint: String,
    pub certificate_serial_number: String,
    /// ISO 8601 UTC, e.g. `2030-01-01T00:00:00.000Z`
    pub certificate_expiration_date_utc: String,
    pub issuing_certificate_authority: String,
    pub caller_info: String,
}

/// Body of a `failureNotification` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNotificationBody {
    pub notification: FailureNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotification {
    pub transaction_id: String,
    pub certificate_request: String,
    #[serde(rename = "hResult")]
    pub h_result: i64,
    pub error_description: String,
    pub caller_info: String,
}

/// What the service sends back for every action. Fields beyond these are
/// ignored, and either may be missing. A field that isn't a string reads as
/// missing rather than failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScepActionResponse {
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_description: Option<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Other(IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(s) => Some(s),
        Lenient::Other(_) => None,
    })
}
