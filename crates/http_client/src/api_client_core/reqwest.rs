// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;
use tracing::debug;

use crate::error::HttpError;

#[derive(Debug, Clone)]
pub struct ApiClientCore {
    client: reqwest::Client, // cheaply cloneable (Arc<...> internally), see docs
}

impl ApiClientCore {
    /// Construct a new ApiClientCore that identifies itself with the given user agent.
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .build()
            .unwrap(); // this only fails if the system config is messed up, isn't recoverable

        Self { client }
    }

    /// Get or post a given body to a given url with a given content type, and optional extra headers.
    /// The response type will be verified against `expected_content_type`.
    pub(crate) async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        header_iter: &[(String, String)],
        expected_content_type: &'static str,
    ) -> Result<bytes::Bytes, HttpError> {
        let mut rb = match body {
            Some(b) => self
                .client
                .post(url)
                .body(b)
                .header(reqwest::header::CONTENT_TYPE, content_type),
            None => self.client.get(url),
        };

        rb = rb.header(reqwest::header::ACCEPT, expected_content_type);
        for (key, value) in header_iter {
            rb = rb.header(key, value)
        }

        debug!("http_client: requesting {url}");

        let response = rb.send().await.map_err(|e| HttpError::RequestError {
            ctx: format!("requesting {url}"),
            status: None,
            retriable: true,
            source: Box::new(e),
        })?;

        let status = response.status();
        debug!("http_client: response from {url:?}: {status}");

        let retriable = super::status_code::is_retriable(status.as_u16());
        let content_type_err = check_content_type(response.headers(), expected_content_type);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HttpError::RequestError {
                ctx: format!("reading response from {url}"),
                status: Some(status.as_u16()),
                retriable,
                source: Box::new(e),
            })?;

        if status.is_client_error() || status.is_server_error() {
            Err(HttpError::RequestError {
                ctx: format!("requesting {url}"),
                status: Some(status.as_u16()),
                retriable,
                source: format!("{status}: {}", String::from_utf8_lossy(&bytes)).into(),
            })
        } else if let Err(e) = content_type_err {
            Err(HttpError::RequestError {
                ctx: format!("requesting {url}"),
                status: Some(status.as_u16()),
                retriable: false,
                source: format!("{status}: {e}: {}", String::from_utf8_lossy(&bytes)).into(),
            })
        } else {
            Ok(bytes)
        }
    }
}

/// The media type must match, parameters like `; charset=utf-8` are ignored.
fn check_content_type(
    headers: &reqwest::header::HeaderMap,
    expected_content_type: &str,
) -> Result<(), String> {
    let actual = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    match actual {
        Some(actual)
            if actual
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(expected_content_type)) =>
        {
            Ok(())
        }
        Some(actual) => Err(format!(
            "expected content-type {expected_content_type}, got {actual}"
        )),
        None => Err(format!(
            "expected content-type {expected_content_type}, got none"
        )),
    }
}
