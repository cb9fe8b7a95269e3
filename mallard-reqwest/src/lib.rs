#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
//! A concrete [`Exchanger`] backed by [`reqwest::Client`], the leaf of a
//! mallard middleware chain.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mallard_core::Exchanger;
//! use mallard_reqwest::ReqwestExchanger;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let exchanger = Arc::new(ReqwestExchanger::new(reqwest::Client::new()));
//! let request = mallard_core::Request::builder(
//!     http::Method::GET,
//!     http::Uri::from_static("https://example.com"),
//! )
//! .build();
//! let response = exchanger.exchange(request, Default::default()).await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use mallard_core::{ExchangeFailure, Exchanger, MultiHeaderMap, Request, Response};
use tokio_util::sync::CancellationToken;

/// Raised when a request is cancelled before `reqwest` produced a response.
#[derive(thiserror::Error, miette::Diagnostic, Debug)]
#[error("request was cancelled")]
#[diagnostic(code(mallard_reqwest::cancelled))]
pub struct Cancelled;

/// Wraps a [`reqwest::Client`] as the network-facing leaf of a chain.
///
/// Grounded on `http-cache-reqwest::ReqwestMiddleware::remote_fetch`: clone
/// the outgoing parts onto a `reqwest::RequestBuilder`, send, and convert
/// the response's status/headers/body back into the core model.
pub struct ReqwestExchanger {
    client: reqwest::Client,
}

impl ReqwestExchanger {
    /// Wraps `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for ReqwestExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestExchanger").finish_non_exhaustive()
    }
}

impl Default for ReqwestExchanger {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Exchanger for ReqwestExchanger {
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        let mut builder = self.client.request(request.method().clone(), request.uri().to_string());
        for (name, values) in request.headers().iter() {
            for value in values {
                builder = builder.header(name.clone(), value.clone());
            }
        }
        builder = builder.body(request.body().clone());

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("request cancelled before reqwest returned a response");
                return Err(ExchangeFailure::upstream(Cancelled));
            }
            result = builder.send() => result.map_err(ExchangeFailure::upstream)?,
        };

        let status = response.status();
        let mut headers = MultiHeaderMap::new();
        for (name, value) in response.headers().iter() {
            headers.append(name.clone(), value.clone());
        }
        let body = response.bytes().await.map_err(ExchangeFailure::upstream)?;
        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod test {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn forwards_method_headers_and_body_and_converts_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("world"))
            .mount(&server)
            .await;

        let exchanger = ReqwestExchanger::new(reqwest::Client::new());
        let request = Request::builder(
            http::Method::GET,
            http::Uri::try_from(format!("{}/hello", server.uri())).unwrap(),
        )
        .build();

        let response = exchanger.exchange(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.body(), &bytes::Bytes::from_static(b"world"));
    }

    #[tokio::test]
    async fn non_success_status_is_forwarded_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let exchanger = ReqwestExchanger::new(reqwest::Client::new());
        let request = Request::builder(
            http::Method::GET,
            http::Uri::try_from(format!("{}/missing", server.uri())).unwrap(),
        )
        .build();

        let response = exchanger.exchange(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    }
}
