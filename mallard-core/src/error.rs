use miette::Diagnostic;
use thiserror::Error;

/// A `Result` typedef to use with the [`CoreError`] type
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Errors that can arise while building or converting the core request/
/// response types, independent of any particular middleware.
#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    /// The request builder was missing a required field (method or URI).
    #[error("incomplete request: {0}")]
    #[diagnostic(code(mallard_core::incomplete_request))]
    IncompleteRequest(&'static str),
    /// Error from `http` while constructing a `Method`, `Uri`, or header.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::http))]
    Http(#[from] http::Error),
    /// There was an error parsing an HTTP header value.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::invalid_header_value))]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    /// There was an error parsing an HTTP header name.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::invalid_header_name))]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),
    /// There was an error converting a header value to a string.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::header_to_str))]
    HeaderToStr(#[from] http::header::ToStrError),
}

/// The taxonomy of failures an [`Exchanger`](crate::Exchanger) may raise,
/// per the exchanger contract's "response or failure" shape.
#[derive(Error, Diagnostic, Debug)]
pub enum ExchangeFailure {
    /// The inner exchanger failed and the caller-supplied network
    /// availability check reported the device as offline.
    #[error("network unavailable")]
    #[diagnostic(code(mallard_core::network_unavailable))]
    NetworkUnavailable {
        /// The failure that triggered the availability check.
        #[source]
        source: Box<ExchangeFailure>,
    },
    /// A non-success response whose deserialized body matched a caller's
    /// error predicate.
    #[error("response was interpreted as a failure")]
    #[diagnostic(code(mallard_core::interpreted_response))]
    InterpretedResponseFailure {
        /// The status code of the response that triggered interpretation.
        status: http::StatusCode,
        /// The underlying error describing the interpreted failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// An error raised by the underlying exchanger that was not
    /// otherwise transformed by a middleware layer.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::upstream))]
    UpstreamFailure(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// A core type conversion failed while building the outgoing request.
    #[error(transparent)]
    #[diagnostic(code(mallard_core::core))]
    Core(#[from] CoreError),
}

impl ExchangeFailure {
    /// Build an [`ExchangeFailure::UpstreamFailure`] from any boxable error.
    pub fn upstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExchangeFailure::UpstreamFailure(Box::new(err))
    }
}
