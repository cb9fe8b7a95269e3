use std::sync::Arc;

use async_trait::async_trait;
use mallard_core::{ExchangeFailure, Exchanger, Request, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Wraps an inner [`Exchanger`]: on a non-success response, deserializes
/// the body into `D`, applies a caller-supplied predicate, and — if it
/// holds — raises a caller-supplied failure built from the deserialized
/// shape. A response whose body doesn't parse as `D`, or that fails the
/// predicate, is returned unchanged.
pub struct BodyErrorInterpreter<D> {
    inner: Arc<dyn Exchanger>,
    predicate: Box<dyn Fn(&D) -> bool + Send + Sync>,
    construct_failure: Box<dyn Fn(D) -> Box<dyn std::error::Error + Send + Sync> + Send + Sync>,
}

impl<D> BodyErrorInterpreter<D>
where
    D: DeserializeOwned + Send + Sync + 'static,
{
    /// Wraps `inner`. `predicate` decides whether a deserialized
    /// non-success body counts as an error; `construct_failure` builds the
    /// failure object from that same shape.
    pub fn new(
        inner: Arc<dyn Exchanger>,
        predicate: impl Fn(&D) -> bool + Send + Sync + 'static,
        construct_failure: impl Fn(D) -> Box<dyn std::error::Error + Send + Sync> + Send + Sync + 'static,
    ) -> Self {
        Self { inner, predicate: Box::new(predicate), construct_failure: Box::new(construct_failure) }
    }
}

impl<D> std::fmt::Debug for BodyErrorInterpreter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyErrorInterpreter").finish_non_exhaustive()
    }
}

#[async_trait]
impl<D> Exchanger for BodyErrorInterpreter<D>
where
    D: DeserializeOwned + Send + Sync + 'static,
{
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        let response = self.inner.exchange(request, cancel).await?;
        if response.is_success() {
            return Ok(response);
        }

        let shape: D = match serde_json::from_slice(response.body()) {
            Ok(shape) => shape,
            Err(err) => {
                log::debug!("non-success body did not parse as the interpreted shape: {err}");
                return Ok(response);
            }
        };

        if (self.predicate)(&shape) {
            let status = response.status();
            let source = (self.construct_failure)(shape);
            return Err(ExchangeFailure::InterpretedResponseFailure { status, source });
        }

        Ok(response)
    }
}
