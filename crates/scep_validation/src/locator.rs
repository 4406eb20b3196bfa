// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding the base URL of the validation service for a tenant.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::AuthProvider;
use crate::error::{LocatorError, ServiceError};
use http_client::BaseApiClient;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com/";
/// The service principal that owns the Intune endpoints in each tenant.
pub const INTUNE_APP_ID: &str = "0000000a-0000-0000-c000-000000000000";

#[async_trait::async_trait]
pub trait ServiceLocator {
    /// Base URL of `service_name`, without a trailing slash.
    async fn service_url(&self, service_name: &str) -> Result<String, LocatorError>;

    /// Drop anything cached, so the next lookup asks again.
    async fn invalidate(&self);
}

/// Locator with a fixed set of endpoints, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct FixedServiceLocator {
    urls: HashMap<String, String>,
}

impl FixedServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service_name: impl Into<String>, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.urls
            .insert(service_name.into(), url.trim_end_matches('/').to_owned());
        self
    }
}

#[async_trait::async_trait]
impl ServiceLocator for FixedServiceLocator {
    async fn service_url(&self, service_name: &str) -> Result<String, LocatorError> {
        self.urls
            .get(service_name)
            .cloned()
            .ok_or_else(|| LocatorError::ServiceNotFound {
                service: service_name.to_owned(),
            })
    }

    async fn invalidate(&self) {}
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    #[serde(default)]
    value: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    provider_name: Option<String>,
    uri: Option<String>,
}

/// Asks Microsoft Graph for the Intune service principal's endpoints, and
/// caches the result until invalidated.
pub struct GraphServiceLocator {
    api_client: BaseApiClient,
    auth: Arc<dyn AuthProvider + Send + Sync>,
    graph_url: String,
    endpoints: RwLock<Option<HashMap<String, String>>>,
}

impl GraphServiceLocator {
    pub fn new(
        api_client: BaseApiClient,
        auth: Arc<dyn AuthProvider + Send + Sync>,
        graph_url: impl Into<String>,
    ) -> Self {
        let graph_url: String = graph_url.into();
        Self {
            api_client,
            auth,
            graph_url: graph_url.trim_end_matches('/').to_owned(),
            endpoints: Default::default(),
        }
    }

    fn discovery_url(&self) -> String {
        format!(
            "{}/v1.0/servicePrincipals/appId={INTUNE_APP_ID}/endpoints",
            self.graph_url
        )
    }

    async fn discover(&self) -> Result<HashMap<String, String>, ServiceError> {
        let token = self.auth.access_token(GRAPH_RESOURCE).await?;
        let url = self.discovery_url();
        debug!("discovering service endpoints from {url}");

        let list: EndpointList = match self
            .api_client
            .json_get_with_headers(&url, &[("Authorization".into(), format!("Bearer {token}"))])
            .await
        {
            Ok(list) => list,
            Err(e) => {
                if e.status() == Some(401) {
                    self.auth.invalidate(GRAPH_RESOURCE).await;
                }
                return Err(e.into());
            }
        };

        let endpoints: HashMap<_, _> = list
            .value
            .into_iter()
            .filter_map(|e| Some((e.provider_name?, e.uri?.trim_end_matches('/').to_owned())))
            .collect();
        info!("discovered {} service endpoints", endpoints.len());
        Ok(endpoints)
    }
}

#[async_trait::async_trait]
impl ServiceLocator for GraphServiceLocator {
    async fn service_url(&self, service_name: &str) -> Result<String, LocatorError> {
        let not_found = || LocatorError::ServiceNotFound {
            service: service_name.to_owned(),
        };

        if let Some(endpoints) = self.endpoints.read().await.as_ref() {
            return endpoints.get(service_name).cloned().ok_or_else(not_found);
        }

        let mut cache = self.endpoints.write().await;
        // someone else may have filled it while we waited for the lock
        if cache.is_none() {
            let discovered = self
                .discover()
                .await
                .map_err(|e| LocatorError::Discovery(Box::new(e)))?;
            *cache = Some(discovered);
        }
        cache
            .as_ref()
            .and_then(|endpoints| endpoints.get(service_name).cloned())
            .ok_or_else(not_found)
    }

    async fn invalidate(&self) {
        *self.endpoints.write().await = None;
    }
}
