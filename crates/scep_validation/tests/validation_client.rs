// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use assert_json_diff::assert_json_eq;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;

use scep_validation::error::ServiceError;
use scep_validation::telemetry::{EventKind, TelemetryEvent, TelemetrySink};
use scep_validation::{
    ActivityId, ErrorCode, ServiceCall, ValidationClient, ValidationConfig, ValidationError,
};

#[derive(Debug, Clone)]
struct RecordedCall {
    service_name: String,
    url_suffix: String,
    api_version: String,
    body: serde_json::Value,
    activity_id: ActivityId,
}

type Responder = dyn Fn(&serde_json::Value) -> Result<serde_json::Value, ServiceError> + Send + Sync;

/// Records every call and answers with whatever `respond` says.
struct SpyService {
    calls: Mutex<Vec<RecordedCall>>,
    respond: Box<Responder>,
}

impl SpyService {
    fn new(
        respond: impl Fn(&serde_json::Value) -> Result<serde_json::Value, ServiceError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(vec![]),
            respond: Box::new(respond),
        })
    }

    fn answering(response: serde_json::Value) -> Arc<Self> {
        Self::new(move |_| Ok(response.clone()))
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ServiceCall for SpyService {
    async fn call(
        &self,
        service_name: &str,
        url_suffix: &str,
        api_version: &str,
        body: serde_json::Value,
        activity_id: &ActivityId,
    ) -> Result<serde_json::Value, ServiceError> {
        tokio::task::yield_now().await;
        let response = (self.respond)(&body);
        self.calls.lock().unwrap().push(RecordedCall {
            service_name: service_name.into(),
            url_suffix: url_suffix.into(),
            api_version: api_version.into(),
            body,
            activity_id: activity_id.clone(),
        });
        response
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    events: Mutex<Vec<(EventKind, ActivityId, String)>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn track_event(&self, event: &TelemetryEvent<'_>) {
        self.events.lock().unwrap().push((
            event.kind,
            event.activity_id.clone(),
            event.transaction_id.to_owned(),
        ));
    }
}

fn client(service: Arc<SpyService>) -> ValidationClient {
    ValidationClient::new(ValidationConfig::new("ExampleCA/1.0").unwrap(), service)
}

fn invalid_parameter(result: Result<(), ValidationError>) -> &'static str {
    match result {
        Err(ValidationError::InvalidArgument { parameter }) => parameter,
        v => panic!("expected invalid argument, got {v:?}"),
    }
}

#[tokio::test]
async fn validate_success() {
    let service = SpyService::answering(json!({"code": "Success"}));
    client(service.clone())
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].service_name, "ScepRequestValidationFEService");
    assert_eq!(calls[0].url_suffix, "ScepActions/validateRequest");
    assert_eq!(calls[0].api_version, "2018-02-20");
    assert_json_eq!(
        calls[0].body,
        json!({
            "request": {
                "transactionId": "txn-1",
                "certificateRequest": "MIIBCSR",
                "callerInfo": "ExampleCA/1.0",
            }
        })
    );
}

#[tokio::test]
async fn validate_declined() {
    let service = SpyService::answering(json!({
        "code": "UnauthorizedRequest",
        "errorDescription": "not enrolled",
    }));
    let err = client(service.clone())
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap_err();

    let ValidationError::ServiceOutcome(outcome) = err else {
        panic!("expected service outcome, got {err:?}");
    };
    assert_eq!(outcome.raw_code.as_deref(), Some("UnauthorizedRequest"));
    assert_eq!(outcome.error_code, ErrorCode::UnauthorizedRequest);
    assert_eq!(outcome.error_description.as_deref(), Some("not enrolled"));
    assert_eq!(outcome.transaction_id, "txn-1");
    assert_eq!(outcome.activity_id, service.calls()[0].activity_id);
}

#[tokio::test]
async fn unrecognized_code_fails_closed() {
    let service = SpyService::answering(json!({"code": "X", "errorDescription": "bad thing"}));
    let err = client(service)
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap_err();

    let ValidationError::ServiceOutcome(outcome) = err else {
        panic!("expected service outcome, got {err:?}");
    };
    assert_eq!(outcome.raw_code.as_deref(), Some("X"));
    assert_eq!(outcome.error_code, ErrorCode::Unknown);
    assert_eq!(outcome.error_description.as_deref(), Some("bad thing"));
}

#[tokio::test]
async fn missing_code_fails_closed() {
    for response in [json!({}), json!({"code": null}), json!({"code": 0}), json!([])] {
        let err = client(SpyService::answering(response.clone()))
            .validate_request("txn-1", "MIIBCSR")
            .await
            .unwrap_err();
        let ValidationError::ServiceOutcome(outcome) = err else {
            panic!("expected service outcome for {response}, got {err:?}");
        };
        assert_eq!(outcome.raw_code, None);
        assert_eq!(outcome.error_code, ErrorCode::Unknown);
    }
}

#[tokio::test]
async fn every_known_failure_code_is_surfaced() {
    for code in ErrorCode::KNOWN.iter().filter(|c| !c.is_success()) {
        let err = client(SpyService::answering(json!({"code": code.as_str()})))
            .send_failure_notification("txn-1", "MIIBCSR", 1, "refused")
            .await
            .unwrap_err();
        let ValidationError::ServiceOutcome(outcome) = err else {
            panic!("expected service outcome for {code}, got {err:?}");
        };
        assert_eq!(outcome.error_code, *code);
    }
}

#[tokio::test]
async fn blank_arguments_never_reach_the_service() {
    let service = SpyService::answering(json!({"code": "Success"}));
    let client = client(service.clone());

    assert_eq!(
        invalid_parameter(client.validate_request("", "MIIBCSR").await),
        "transaction_id"
    );
    assert_eq!(
        invalid_parameter(client.validate_request("txn-1", "  ").await),
        "certificate_request"
    );

    let ok = ["txn-1", "MIIBCSR", "A1B2", "0123", "2030-01-01T00:00:00.000Z", "CN=CA"];
    let names = [
        "transaction_id",
        "certificate_request",
        "cert_thumbprint",
        "cert_serial_number",
        "cert_expiration_date_utc",
        "cert_issuing_authority",
    ];
    for blank in 0..ok.len() {
        let mut args = ok;
        args[blank] = "\t ";
        let result = client
            .send_success_notification(args[0], args[1], args[2], args[3], args[4], args[5])
            .await;
        assert_eq!(invalid_parameter(result), names[blank]);
    }

    assert_eq!(
        invalid_parameter(client.send_failure_notification(" ", "MIIBCSR", 1, "x").await),
        "transaction_id"
    );
    assert_eq!(
        invalid_parameter(client.send_failure_notification("txn-1", "", 1, "x").await),
        "certificate_request"
    );
    assert_eq!(
        invalid_parameter(
            client
                .send_failure_notification("txn-1", "MIIBCSR", 1, "")
                .await
        ),
        "error_description"
    );

    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn success_notification_payload() {
    let service = SpyService::answering(json!({"code": "Success", "extra": [1, 2]}));
    client(service.clone())
        .send_success_notification(
            "txn-2",
            "MIIBCSR",
            "A1B2C3",
            "7E0001",
            "2030-01-01T00:00:00.000Z",
            "CN=Example Issuing CA",
        )
        .await
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls[0].url_suffix, "ScepActions/successNotification");
    assert_json_eq!(
        calls[0].body,
        json!({
            "notification": {
                "transactionId": "txn-2",
                "certificateRequest": "MIIBCSR",
                "certificateThumbprint": "A1B2C3",
                "certificateSerialNumber": "7E0001",
                "certificateExpirationDateUtc": "2030-01-01T00:00:00.000Z",
                "issuingCertificateAuthority": "CN=Example Issuing CA",
                "callerInfo": "ExampleCA/1.0",
            }
        })
    );
}

#[tokio::test]
async fn failure_notification_payload() {
    let service = SpyService::answering(json!({"code": "Success"}));
    client(service.clone())
        .send_failure_notification("txn-3", "MIIBCSR", -2146877437, "policy denied")
        .await
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls[0].url_suffix, "ScepActions/failureNotification");
    assert_json_eq!(
        calls[0].body,
        json!({
            "notification": {
                "transactionId": "txn-3",
                "certificateRequest": "MIIBCSR",
                "hResult": -2146877437i64,
                "errorDescription": "policy denied",
                "callerInfo": "ExampleCA/1.0",
            }
        })
    );
}

#[tokio::test]
async fn notification_declined_is_an_error() {
    let service = SpyService::answering(json!({
        "code": "TransactionIdMissing",
        "errorDescription": "no such transaction",
    }));
    let err = client(service)
        .send_success_notification(
            "txn-4",
            "MIIBCSR",
            "A1",
            "01",
            "2030-01-01T00:00:00.000Z",
            "CN=CA",
        )
        .await
        .unwrap_err();
    assert!(err.is_service_outcome());
    assert!(err.activity_id().is_some());
}

#[tokio::test]
async fn transport_errors_pass_through() {
    let service = SpyService::new(|_| {
        Err(ServiceError::Http(http_client::HttpError::RequestError {
            ctx: "requesting https://example.invalid".into(),
            status: Some(503),
            retriable: true,
            source: "unavailable".into(),
        }))
    });
    let err = client(service)
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap_err();

    match err {
        ValidationError::Service(ServiceError::Http(http_client::HttpError::RequestError {
            status: Some(503),
            ..
        })) => {}
        v => panic!("expected the transport error unchanged, got {v:?}"),
    }
}

#[tokio::test]
async fn configured_version_is_used() {
    let service = SpyService::answering(json!({"code": "Success"}));
    let config = ValidationConfig::new("ExampleCA/2.0")
        .unwrap()
        .with_service_version("2019-06-01")
        .unwrap();
    ValidationClient::new(config, service.clone())
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls[0].api_version, "2019-06-01");
    assert_eq!(calls[0].body["request"]["callerInfo"], "ExampleCA/2.0");
}

#[tokio::test]
async fn concurrent_calls_get_distinct_activity_ids() {
    // echo the transaction id back as the code, so each call can check it got its own answer
    let service = SpyService::new(|body| {
        let transaction_id = body["request"]["transactionId"].as_str().unwrap_or_default();
        Ok(json!({"code": transaction_id}))
    });
    let client = client(service.clone());

    let results: Vec<_> = (0..200)
        .map(|i| {
            let client = client.clone();
            async move {
                let transaction_id = format!("txn-{i}");
                let err = client
                    .validate_request(&transaction_id, "MIIBCSR")
                    .await
                    .unwrap_err();
                (transaction_id, err)
            }
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await;

    for (transaction_id, err) in &results {
        let ValidationError::ServiceOutcome(outcome) = err else {
            panic!("expected service outcome, got {err:?}");
        };
        assert_eq!(outcome.raw_code.as_deref(), Some(transaction_id.as_str()));
        assert_eq!(&outcome.transaction_id, transaction_id);
    }

    let ids: HashSet<_> = service.calls().into_iter().map(|c| c.activity_id).collect();
    assert_eq!(ids.len(), 200);
}

#[tokio::test]
async fn telemetry_brackets_each_call() {
    let telemetry = Arc::new(RecordingTelemetry::default());
    let client = client(SpyService::new(|body| {
        if body["request"]["transactionId"] == "ok" {
            Ok(json!({"code": "Success"}))
        } else {
            Ok(json!({"code": "ChallengeExpired"}))
        }
    }))
    .with_telemetry(telemetry.clone());

    client.validate_request("ok", "MIIBCSR").await.unwrap();
    client
        .validate_request("expired", "MIIBCSR")
        .await
        .unwrap_err();

    let events = telemetry.events.lock().unwrap().clone();
    let kinds: Vec<_> = events.iter().map(|(k, _, t)| (*k, t.as_str())).collect();
    assert_eq!(
        kinds,
        [
            (EventKind::RequestSent, "ok"),
            (EventKind::Succeeded, "ok"),
            (EventKind::RequestSent, "expired"),
            (EventKind::Failed, "expired"),
        ]
    );
    assert_eq!(events[0].1, events[1].1);
    assert_ne!(events[1].1, events[2].1);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn responses_are_logged_with_activity_id() {
    let service = SpyService::answering(json!({"code": "ChallengeExpired"}));
    client(service.clone())
        .validate_request("txn-1", "MIIBCSR")
        .await
        .unwrap_err();

    let activity_id = service.calls()[0].activity_id.to_string();
    assert!(logs_contain(&format!("activity {activity_id}")));
    assert!(logs_contain("ChallengeExpired"));
}
