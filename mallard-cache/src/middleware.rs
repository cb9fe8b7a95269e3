use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mallard_core::{ExchangeFailure, Exchanger, Request, Response};
use tokio_util::sync::CancellationToken;

use crate::backend::CacheBackend;
use crate::directives::take_directives;
use crate::key_provider::KeyProvider;

/// A per-request, header-driven response cache.
///
/// Wraps an inner [`Exchanger`]; on every GET it parses and strips the
/// `X-Mallard-SimpleCache-*` directive headers (see [`crate::directives`])
/// and applies the decision table from the spec: `Disable` wins over
/// everything, `ForceRefresh` bypasses the read but still writes, and a
/// plain `TTL` serves from the backend on a hit or populates it on a miss.
pub struct CacheMiddleware<B, K> {
    inner: Arc<dyn Exchanger>,
    backend: B,
    key_provider: K,
}

impl<B, K> std::fmt::Debug for CacheMiddleware<B, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMiddleware").finish_non_exhaustive()
    }
}

impl<B, K> CacheMiddleware<B, K>
where
    B: CacheBackend,
    K: KeyProvider,
{
    /// Wraps `inner` with a cache backed by `backend`, keying requests with
    /// `key_provider`.
    pub fn new(inner: Arc<dyn Exchanger>, backend: B, key_provider: K) -> Self {
        Self { inner, backend, key_provider }
    }

    async fn store_if_cacheable(
        &self,
        key: &str,
        response: &Response,
        ttl_seconds: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ExchangeFailure> {
        if !response.is_success() || cancel.is_cancelled() {
            return Ok(());
        }
        self.backend
            .add(key, response.body().clone(), Duration::from_secs(ttl_seconds), cancel.clone())
            .await
            .map_err(ExchangeFailure::upstream)
    }
}

#[async_trait]
impl<B, K> Exchanger for CacheMiddleware<B, K>
where
    B: CacheBackend,
    K: KeyProvider,
{
    async fn exchange(
        &self,
        mut request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        if !request.is_get() {
            return self.inner.exchange(request, cancel).await;
        }

        let directives = take_directives(&mut request).map_err(ExchangeFailure::upstream)?;

        if directives.disable {
            log::debug!("cache disabled for this request; bypassing");
            return self.inner.exchange(request, cancel).await;
        }

        if !directives.cacheable {
            log::debug!("request not cacheable (no TTL); forwarding without storing");
            return self.inner.exchange(request, cancel).await;
        }

        let key = self.key_provider.key(&request);

        if !directives.force_refresh {
            match self.backend.try_get(&key, cancel.clone()).await.map_err(ExchangeFailure::upstream)? {
                Some(payload) => {
                    log::debug!("cache hit for key {key}");
                    return Ok(Response::ok_with_body(payload));
                }
                None => log::debug!("cache miss for key {key}"),
            }
        } else {
            log::debug!("force-refresh requested for key {key}; skipping read");
        }

        let response = self.inner.exchange(request, cancel.clone()).await?;
        self.store_if_cacheable(&key, &response, directives.ttl_seconds, &cancel).await?;
        Ok(response)
    }
}
