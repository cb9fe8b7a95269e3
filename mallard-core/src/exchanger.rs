use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExchangeFailure;
use crate::model::{Request, Response};

/// The one-shot request/response contract every middleware both consumes
/// and implements.
///
/// A chain of middleware composes by nesting: each instance is constructed
/// with an inner `Exchanger` and is itself an `Exchanger`. The request flows
/// outward (toward the network) through each layer's `exchange` call;
/// responses and failures flow inward as the call stack unwinds.
///
/// `cancel` is cooperative — an implementation may observe it at any
/// suspension point (before forwarding, while waiting on a shared resource,
/// after reading a body) but is never required to poll it eagerly.
#[async_trait]
pub trait Exchanger: Send + Sync {
    /// Sends `request` and returns either the response or a failure.
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure>;
}

#[async_trait]
impl<E: Exchanger + ?Sized> Exchanger for std::sync::Arc<E> {
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        (**self).exchange(request, cancel).await
    }
}
