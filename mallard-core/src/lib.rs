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
//! Core types shared by every `mallard` HTTP client middleware crate: the
//! [`Exchanger`] contract, the [`Request`]/[`Response`] data model, and the
//! [`ExchangeFailure`] taxonomy middleware raise or propagate.
//!
//! Nothing in this crate speaks HTTP on the wire. A concrete binding (for
//! example `mallard-reqwest`) implements [`Exchanger`] over a real client;
//! everything else composes middleware around that implementation.

mod error;
mod exchanger;
mod model;

pub mod testing;

pub use error::{CoreError, ExchangeFailure, Result};
pub use exchanger::Exchanger;
pub use model::{MultiHeaderMap, Request, RequestBuilder, Response};

#[cfg(test)]
mod test;
