use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mallard_core::{ExchangeFailure, Exchanger, Request, Response};
use tokio_util::sync::CancellationToken;

/// An event-style sink for failures observed anywhere in a chain.
///
/// Handlers are registered once and fan out synchronously on every
/// publish; a handler that wants to do anything asynchronous (log
/// shipping, metrics) must hand the failure off to its own task.
pub struct FailureSink {
    handlers: Mutex<Vec<Box<dyn Fn(&ExchangeFailure) + Send + Sync>>>,
}

impl FailureSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self { handlers: Mutex::new(Vec::new()) }
    }

    /// Registers a handler, invoked on every subsequent published failure.
    pub fn register(&self, handler: impl Fn(&ExchangeFailure) + Send + Sync + 'static) {
        self.handlers().push(Box::new(handler));
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn Fn(&ExchangeFailure) + Send + Sync>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, failure: &ExchangeFailure) {
        for handler in self.handlers().iter() {
            handler(failure);
        }
    }
}

impl Default for FailureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FailureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureSink").finish_non_exhaustive()
    }
}

/// Wraps an inner [`Exchanger`]: on any failure, publishes it to a shared
/// [`FailureSink`] and then re-propagates it unchanged.
pub struct FailureSinkMiddleware {
    inner: Arc<dyn Exchanger>,
    sink: Arc<FailureSink>,
}

impl FailureSinkMiddleware {
    /// Wraps `inner`, publishing every failure to `sink`.
    pub fn new(inner: Arc<dyn Exchanger>, sink: Arc<FailureSink>) -> Self {
        Self { inner, sink }
    }
}

impl std::fmt::Debug for FailureSinkMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureSinkMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchanger for FailureSinkMiddleware {
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        match self.inner.exchange(request, cancel).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                self.sink.publish(&failure);
                Err(failure)
            }
        }
    }
}
