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
//! Thin supporting middlewares that round out a chain: offline detection,
//! failure reporting, and response-body error interpretation (spec C7).
//!
//! None of these carry the concurrency or state-machine depth of
//! [`mallard_auth`](https://docs.rs/mallard-auth) or
//! [`mallard_cache`](https://docs.rs/mallard-cache) — each just wraps an
//! inner [`Exchanger`](mallard_core::Exchanger) and transforms or observes
//! failures passing through.

mod body_error;
mod failure_sink;
mod network_failure;

pub use body_error::BodyErrorInterpreter;
pub use failure_sink::{FailureSink, FailureSinkMiddleware};
pub use network_failure::NetworkFailureMiddleware;
