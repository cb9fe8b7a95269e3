use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, StatusCode, Uri};

/// A multi-valued header map with last-write-wins `set`/`get_last`
/// semantics and idempotent removal.
///
/// Request-scoped directive headers (see [`crate::Request`]) are read with
/// [`MultiHeaderMap::get_last`] so that a caller-supplied default can be
/// overridden per call simply by appending a second value.
#[derive(Debug, Clone, Default)]
pub struct MultiHeaderMap {
    values: HashMap<HeaderName, Vec<HeaderValue>>,
}

impl MultiHeaderMap {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, preserving any values already present under `name`.
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.values.entry(name).or_default().push(value);
    }

    /// Replaces all values under `name` with the single `value` given.
    pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
        self.values.insert(name, vec![value]);
    }

    /// Removes all values under `name`. A no-op if `name` is absent, so
    /// repeated calls are idempotent.
    pub fn remove(&mut self, name: &HeaderName) {
        self.values.remove(name);
    }

    /// Returns whether any value is present under `name`.
    pub fn contains(&self, name: &HeaderName) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the first value under `name`, if any.
    pub fn get_first(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.values.get(name).and_then(|v| v.first())
    }

    /// Returns the *last* value under `name`, if any — the value that wins
    /// when a header is multi-valued (spec: "last value wins").
    pub fn get_last(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.values.get(name).and_then(|v| v.last())
    }

    /// Returns all values under `name`, in append order.
    pub fn get_all(&self, name: &HeaderName) -> &[HeaderValue] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[HeaderValue])> {
        self.values.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// A mutable carrier for an outbound HTTP request.
///
/// Per the data model, header removal is idempotent and the last value of a
/// multi-valued header wins; middleware that strip directive headers (e.g.
/// the cache middleware) rely on both properties.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: MultiHeaderMap,
    body: Bytes,
}

impl Request {
    /// Starts building a request for `method` and `uri`.
    pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder { method, uri, headers: MultiHeaderMap::new(), body: Bytes::new() }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Mutable access to the request headers.
    pub fn headers(&self) -> &MultiHeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers, used by middleware that
    /// strip or rewrite headers before forwarding.
    pub fn headers_mut(&mut self) -> &mut MultiHeaderMap {
        &mut self.headers
    }

    /// The request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the request body.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Whether this is a GET request — the only method the cache
    /// middleware ever consults the backend for.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: MultiHeaderMap,
    body: Bytes,
}

impl RequestBuilder {
    /// Sets a header, replacing any prior value(s) under the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Appends a header value without disturbing prior values under the
    /// same name (used to construct multi-valued directive headers).
    pub fn append_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Finalizes the request.
    pub fn build(self) -> Request {
        Request { method: self.method, uri: self.uri, headers: self.headers, body: self.body }
    }
}

/// An HTTP response: status, headers, and a materialized byte body.
///
/// A response either has a success status (2xx) or is treated as a failure
/// signal by downstream middleware — see [`Response::is_success`].
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: MultiHeaderMap,
    body: Bytes,
}

impl Response {
    /// Builds a response from its constituent parts.
    pub fn new(status: StatusCode, headers: MultiHeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    /// Builds a bare 200 OK response carrying only a body — the shape the
    /// cache middleware synthesizes on a cache hit.
    pub fn ok_with_body(body: Bytes) -> Self {
        Self { status: StatusCode::OK, headers: MultiHeaderMap::new(), body }
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &MultiHeaderMap {
        &self.headers
    }

    /// Mutable access to the response headers (e.g. to rewrite the
    /// Authorization-adjacent headers is never needed here, but middleware
    /// may annotate a response with cache-status headers).
    pub fn headers_mut(&mut self) -> &mut MultiHeaderMap {
        &mut self.headers
    }

    /// The response body. Already materialized as [`Bytes`], so storing it
    /// into a cache backend never requires a separate "read the body"
    /// suspension point.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the response carries a success (2xx) status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
