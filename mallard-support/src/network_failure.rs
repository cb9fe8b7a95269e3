use std::sync::Arc;

use async_trait::async_trait;
use mallard_core::{ExchangeFailure, Exchanger, Request, Response};
use tokio_util::sync::CancellationToken;

/// Wraps an inner [`Exchanger`]: when it fails and a caller-supplied
/// availability query reports the device as offline, the original failure
/// is wrapped in [`ExchangeFailure::NetworkUnavailable`]; otherwise the
/// failure propagates unchanged.
pub struct NetworkFailureMiddleware {
    inner: Arc<dyn Exchanger>,
    is_network_available: Box<dyn Fn() -> bool + Send + Sync>,
}

impl NetworkFailureMiddleware {
    /// Wraps `inner`, consulting `is_network_available` on every failure.
    pub fn new(
        inner: Arc<dyn Exchanger>,
        is_network_available: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { inner, is_network_available: Box::new(is_network_available) }
    }
}

impl std::fmt::Debug for NetworkFailureMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkFailureMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchanger for NetworkFailureMiddleware {
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        match self.inner.exchange(request, cancel).await {
            Ok(response) => Ok(response),
            Err(failure) if !(self.is_network_available)() => {
                log::debug!("inner exchange failed and the device appears offline");
                Err(ExchangeFailure::NetworkUnavailable { source: Box::new(failure) })
            }
            Err(failure) => Err(failure),
        }
    }
}

#[cfg(test)]
mod test {
    use mallard_core::testing::ScriptedExchanger;
    use mallard_core::MultiHeaderMap;

    use super::*;

    fn req() -> Request {
        Request::builder(http::Method::GET, http::Uri::from_static("http://x/")).build()
    }

    #[tokio::test]
    async fn online_failure_propagates_unchanged() {
        let inner = Arc::new(ScriptedExchanger::new());
        inner.push(Box::new(|_req| Err(ExchangeFailure::upstream(std::io::Error::other("boom")))));
        let middleware = NetworkFailureMiddleware::new(inner, || true);
        let err = middleware.exchange(req(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExchangeFailure::UpstreamFailure(_)));
    }

    #[tokio::test]
    async fn offline_failure_is_wrapped() {
        let inner = Arc::new(ScriptedExchanger::new());
        inner.push(Box::new(|_req| Err(ExchangeFailure::upstream(std::io::Error::other("boom")))));
        let middleware = NetworkFailureMiddleware::new(inner, || false);
        let err = middleware.exchange(req(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExchangeFailure::NetworkUnavailable { .. }));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let inner = Arc::new(ScriptedExchanger::new());
        inner.push_response(Response::new(
            http::StatusCode::OK,
            MultiHeaderMap::new(),
            bytes::Bytes::new(),
        ));
        let middleware = NetworkFailureMiddleware::new(inner, || false);
        let response = middleware.exchange(req(), CancellationToken::new()).await.unwrap();
        assert!(response.is_success());
    }
}
