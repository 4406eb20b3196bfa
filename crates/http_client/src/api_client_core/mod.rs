// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod status_code;

#[path = "reqwest.rs"]
pub mod implementation;

use bytes::Bytes;

pub use self::implementation::ApiClientCore as ApiClientCoreImpl;
use crate::error::HttpError;

#[async_trait::async_trait]
pub trait ApiClientCore {
    async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        headers: &[(String, String)],
        expected_content_type: &'static str,
    ) -> Result<bytes::Bytes, HttpError>;
}

#[async_trait::async_trait]
impl ApiClientCore for ApiClientCoreImpl {
    async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        headers: &[(String, String)],
        expected_content_type: &'static str,
    ) -> Result<bytes::Bytes, HttpError> {
        self.raw_request(url, body, content_type, headers, expected_content_type)
            .await
    }
}

pub mod test_utils {
    use super::*;

    use std::pin::Pin;

    type ResultFuture = dyn futures::Future<Output = Result<bytes::Bytes, HttpError>> + Send;
    type Responder = dyn (Fn(MockRequest) -> Pin<Box<ResultFuture>>) + Send + Sync;

    /// Everything the mock was asked to send, owned so the responder can keep it.
    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub url: String,
        pub body: Option<Bytes>,
        pub content_type: String,
        pub headers: Vec<(String, String)>,
        pub expected_content_type: String,
    }

    impl MockRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn json_body(&self) -> Option<serde_json::Value> {
            self.body
                .as_ref()
                .and_then(|b| serde_json::from_slice(b).ok())
        }
    }

    /// Mock `ApiClientCore` that holds a closure that can respond to requests with fake responses, or errors.
    ///
    /// ```rust
    /// use futures::FutureExt;
    ///
    /// use http_client::{BaseApiClient, HttpError};
    /// use http_client::test_utils::ApiClientCoreMock;
    ///
    /// let mock = ApiClientCoreMock::from(|request: http_client::test_utils::MockRequest| {
    ///     // note the `async { ... }.boxed()`!
    ///     async move {
    ///         if request.url.contains("failureNotification") {
    ///             Err(HttpError::RequestError {
    ///                 ctx: request.url,
    ///                 status: Some(503),
    ///                 retriable: true,
    ///                 source: "service unavailable".into(),
    ///             })
    ///         } else {
    ///             Ok(r#"{"code":"Success"}"#.as_bytes().into())
    ///         }
    ///     }.boxed()
    /// });
    /// let client = BaseApiClient::from(mock);
    ///
    /// // use the mocked client as desired
    /// let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    /// rt.block_on(async {
    ///     client.json_json_post_with_headers::<_, serde_json::Value>("example.com/validateRequest", &"hi", &[]).await.unwrap();
    ///     client.json_json_post_with_headers::<_, serde_json::Value>("example.com/failureNotification", &"hi", &[]).await.unwrap_err();
    /// });
    /// ```
    pub struct ApiClientCoreMock {
        responder: Box<Responder>,
    }

    #[async_trait::async_trait]
    impl ApiClientCore for ApiClientCoreMock {
        async fn raw_request(
            &self,
            url: &str,
            body: Option<Bytes>,
            content_type: &'static str,
            headers: &[(String, String)],
            expected_content_type: &'static str,
        ) -> Result<bytes::Bytes, HttpError> {
            (self.responder)(MockRequest {
                url: url.into(),
                body,
                content_type: content_type.into(),
                headers: headers.into(),
                expected_content_type: expected_content_type.into(),
            })
            .await
        }
    }

    impl<F: Fn(MockRequest) -> Pin<Box<ResultFuture>> + Send + Sync + 'static> From<F>
        for ApiClientCoreMock
    {
        fn from(value: F) -> Self {
            Self {
                responder: Box::new(value),
            }
        }
    }
}
