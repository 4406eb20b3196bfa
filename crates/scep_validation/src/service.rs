// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The one thing the validation client needs from the outside world: post a
//! JSON body to a named service and get JSON back.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::AuthProvider;
use crate::error::ServiceError;
use crate::locator::ServiceLocator;
use crate::retry_if;
use http_client::BaseApiClient;
use shared_types::requests::ActivityId;

/// The resource tokens for the validation service are requested for.
pub const INTUNE_RESOURCE: &str = "https://api.manage.microsoft.com/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: usize = 2;

#[async_trait::async_trait]
pub trait ServiceCall {
    /// Post `body` to `url_suffix` on `service_name`, tagged with `activity_id`.
    ///
    /// Whatever the response body says, if it parsed as JSON it's returned as
    /// `Ok`; interpreting it is the caller's job.
    async fn call(
        &self,
        service_name: &str,
        url_suffix: &str,
        api_version: &str,
        body: serde_json::Value,
        activity_id: &ActivityId,
    ) -> Result<serde_json::Value, ServiceError>;
}

/// `ServiceCall` over HTTPS: endpoint from a [`ServiceLocator`], bearer token
/// from an [`AuthProvider`], with a per-attempt timeout and a few retries.
///
/// One activity id can span several HTTP attempts: every retry of a call
/// resends the `client-request-id` it was given, so the service sees them as
/// one activity. Distinct calls always get distinct ids.
pub struct IntuneServiceClient {
    api_client: BaseApiClient,
    auth: Arc<dyn AuthProvider + Send + Sync>,
    locator: Arc<dyn ServiceLocator + Send + Sync>,
    resource: String,
    timeout: Duration,
    max_retries: usize,
}

impl IntuneServiceClient {
    pub fn new(
        api_client: BaseApiClient,
        auth: Arc<dyn AuthProvider + Send + Sync>,
        locator: Arc<dyn ServiceLocator + Send + Sync>,
    ) -> Self {
        Self {
            api_client,
            auth,
            locator,
            resource: INTUNE_RESOURCE.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Timeout for each attempt, not the whole call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries after the first attempt. Zero disables retrying.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn attempt(
        &self,
        service_name: &str,
        url_suffix: &str,
        api_version: &str,
        body: &serde_json::Value,
        activity_id: &ActivityId,
    ) -> Result<serde_json::Value, ServiceError> {
        let result = retry_if::with_timeout(self.timeout, async {
            let base_url = self.locator.service_url(service_name).await?;
            let token = self.auth.access_token(&self.resource).await?;
            let url = format!("{base_url}/{url_suffix}?api-version={api_version}");
            let headers = [
                ("Authorization".to_owned(), format!("Bearer {token}")),
                (ActivityId::FIELD.to_owned(), activity_id.to_string()),
                ("api-version".to_owned(), api_version.to_owned()),
            ];

            debug!("posting to {url}, activity {activity_id}");
            let response: serde_json::Value = self
                .api_client
                .json_json_post_with_headers(&url, body, &headers)
                .await?;
            Ok::<_, ServiceError>(response)
        })
        .await;

        if let Err(e) = &result {
            match e.status() {
                Some(401) => self.auth.invalidate(&self.resource).await,
                Some(404) => self.locator.invalidate().await,
                _ => {}
            }
        }
        result
    }
}

/// Worth another try: transient failures, plus 401 / 404 once the stale token
/// or endpoint has been dropped.
fn should_retry(e: &ServiceError) -> bool {
    e.is_retriable() || matches!(e.status(), Some(401) | Some(404))
}

#[async_trait::async_trait]
impl ServiceCall for IntuneServiceClient {
    async fn call(
        &self,
        service_name: &str,
        url_suffix: &str,
        api_version: &str,
        body: serde_json::Value,
        activity_id: &ActivityId,
    ) -> Result<serde_json::Value, ServiceError> {
        let policy = retry_if::retry_policy_jittered_fibonacci()
            .with_max_retries(self.max_retries)
            .with_max_delay(Duration::from_secs(10));

        policy
            .retry_if(
                || self.attempt(service_name, url_suffix, api_version, &body, activity_id),
                |e: &ServiceError| {
                    let retry = should_retry(e);
                    if retry {
                        warn!("retrying {url_suffix} for activity {activity_id}: {e}");
                    }
                    retry
                },
            )
            .await
    }
}
