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
//! Bearer-token authentication middleware.
//!
//! [`AuthMiddleware`] attaches a token to requests that opt in (by default,
//! any request carrying an Authorization header), detects unauthorized
//! responses, and drives exactly one refresh-and-retry via a
//! [`TokenProvider`]. The bundled [`ConcurrentTokenProvider`] wraps a
//! caller-supplied [`TokenSource`] with single-flight refresh and
//! at-most-once session-expired notification, so a refresh storm across
//! many in-flight requests collapses into a single network call.
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use mallard_auth::{AuthMiddleware, ConcurrentTokenProvider, Token, TokenProviderError, TokenSource};
//! use mallard_core::Request;
//! use mallard_core::testing::ScriptedExchanger;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone)]
//! struct Bearer { access: Option<String> }
//!
//! impl Token for Bearer {
//!     fn access_token(&self) -> Option<&str> { self.access.as_deref() }
//!     fn can_be_refreshed(&self) -> bool { true }
//! }
//!
//! struct StaticSource;
//!
//! #[async_trait]
//! impl TokenSource<Bearer> for StaticSource {
//!     async fn fetch(&self, _cancel: CancellationToken, _request: &Request) -> Result<Option<Bearer>, TokenProviderError> {
//!         Ok(Some(Bearer { access: Some("A1".into()) }))
//!     }
//!     async fn refresh(&self, _cancel: CancellationToken, _request: &Request, _unauthorized: &Bearer) -> Result<Option<Bearer>, TokenProviderError> {
//!         Ok(Some(Bearer { access: Some("A2".into()) }))
//!     }
//! }
//!
//! # async fn demo() {
//! let inner = Arc::new(ScriptedExchanger::new());
//! let provider = Arc::new(ConcurrentTokenProvider::new(StaticSource, |_expired: Bearer| {}));
//! let auth = AuthMiddleware::new(inner, provider);
//! # let _ = auth;
//! # }
//! ```

mod middleware;
mod provider;
mod token;

pub use middleware::{
    AuthMiddleware, HasAuthorizationHeader, IncludeTokenPredicate, StatusUnauthorized,
    UnauthorizedPredicate,
};
pub use provider::{
    ConcurrentTokenProvider, SharedTokenProviderState, TokenProvider, TokenProviderError,
    TokenSource,
};
pub use token::Token;

#[cfg(test)]
mod test;
