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
//! A per-request, header-driven response cache middleware.
//!
//! [`CacheMiddleware`] reads the `X-Mallard-SimpleCache-*` directive
//! headers off a GET request (see [`directives`]), consults a
//! [`CacheBackend`] keyed by a [`KeyProvider`], and decides whether to
//! serve a cached body, force a network refresh, bypass the cache
//! entirely, or populate the store from a successful response.
//!
//! ```
//! use std::sync::Arc;
//! use mallard_cache::{CacheMiddleware, InMemoryCacheBackend, UriKeyProvider};
//! use mallard_core::testing::ScriptedExchanger;
//!
//! # async fn demo() {
//! let inner = Arc::new(ScriptedExchanger::new());
//! let cache = CacheMiddleware::new(inner, InMemoryCacheBackend::new(), UriKeyProvider);
//! # let _ = cache;
//! # }
//! ```

mod backend;
pub mod directives;
mod key_provider;
mod middleware;

pub use backend::{CacheBackend, CacheBackendError, InMemoryCacheBackend};
pub use directives::{DirectiveError, Directives};
pub use key_provider::{AuthHashKeyProvider, KeyProvider, UriKeyProvider};
pub use middleware::CacheMiddleware;
