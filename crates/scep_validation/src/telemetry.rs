// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured events around each call to the validation service.

use std::fmt;

use shared_types::requests::ActivityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    RequestSent,
    Succeeded,
    /// The service answered with something other than `Success`.
    Failed,
    /// No usable answer: transport, auth or discovery failed.
    ServiceError,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RequestSent => "ScepValidationRequestSent",
            EventKind::Succeeded => "ScepValidationSucceeded",
            EventKind::Failed => "ScepValidationFailed",
            EventKind::ServiceError => "ScepValidationServiceError",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent<'a> {
    pub kind: EventKind,
    pub activity_id: &'a ActivityId,
    pub transaction_id: &'a str,
    pub url_suffix: &'a str,
    pub code: Option<&'a str>,
    pub error_description: Option<&'a str>,
}

/// Where telemetry events go. Implementations must not block.
pub trait TelemetrySink {
    fn track_event(&self, event: &TelemetryEvent<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn track_event(&self, _event: &TelemetryEvent<'_>) {}
}

/// Emits each event as a `tracing` event on the `scep_validation::telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track_event(&self, event: &TelemetryEvent<'_>) {
        tracing::info!(
            target: "scep_validation::telemetry",
            event = event.kind.name(),
            activity_id = %event.activity_id,
            transaction_id = event.transaction_id,
            url_suffix = event.url_suffix,
            code = event.code,
            error_description = event.error_description,
        );
    }
}
