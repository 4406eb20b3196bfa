// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access tokens for the validation service and for service discovery.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AuthError;
use http_client::BaseApiClient;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before the issuer says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Longest we'll cache a token, whatever `expires_in` claims.
const MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait::async_trait]
pub trait AuthProvider {
    /// A bearer token valid for `resource`, e.g. `https://api.manage.microsoft.com/`.
    async fn access_token(&self, resource: &str) -> Result<String, AuthError>;

    /// Forget any cached token for `resource`, e.g. after the service answered 401.
    async fn invalidate(&self, resource: &str);
}

/// Always hands out the same token. For tokens acquired out of band.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn access_token(&self, _resource: &str) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self, _resource: &str) {}
}

#[derive(Clone)]
pub struct ClientCredentials {
    pub authority: String,
    pub tenant: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("authority", &self.authority)
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// OAuth 2.0 client-credentials grant against `{authority}/{tenant}/oauth2/v2.0/token`,
/// with one cached token per resource.
pub struct ClientCredentialsProvider {
    api_client: BaseApiClient,
    credentials: ClientCredentials,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Seconds. Some issuers send this as a string.
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        let secs = match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        // an hour is what the issuer hands out when it doesn't say
        Duration::from_secs(secs.unwrap_or(3600)).min(MAX_LIFETIME)
    }
}

impl ClientCredentialsProvider {
    pub fn new(api_client: BaseApiClient, credentials: ClientCredentials) -> Self {
        Self {
            api_client,
            credentials,
            tokens: Default::default(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.credentials.authority.trim_end_matches('/'),
            self.credentials.tenant
        )
    }

    async fn request_token(&self, resource: &str) -> Result<CachedToken, AuthError> {
        let url = self.token_url();
        let scope = format!("{}/.default", resource.trim_end_matches('/'));
        debug!("requesting token for {scope} from {url}");

        let response: TokenResponse = self
            .api_client
            .form_json_post(
                &url,
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("scope", scope.as_str()),
                ],
            )
            .await
            .map_err(|source| AuthError::TokenRequest {
                authority: url.clone(),
                source,
            })?;

        let lifetime = response.lifetime();
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken { authority: url })?;

        let now = Instant::now();
        Ok(CachedToken {
            token,
            refresh_at: now
                .checked_add(lifetime.saturating_sub(EXPIRY_MARGIN))
                .unwrap_or(now),
        })
    }
}

#[async_trait::async_trait]
impl AuthProvider for ClientCredentialsProvider {
    async fn access_token(&self, resource: &str) -> Result<String, AuthError> {
        if let Some(cached) = self.tokens.read().await.get(resource) {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.request_token(resource).await?;
        let token = fresh.token.clone();
        self.tokens.write().await.insert(resource.to_owned(), fresh);
        Ok(token)
    }

    async fn invalidate(&self, resource: &str) {
        self.tokens.write().await.remove(resource);
    }
}
