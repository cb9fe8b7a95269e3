use std::marker::PhantomData;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderValue, StatusCode};
use mallard_core::{ExchangeFailure, Exchanger, Request, Response};
use tokio_util::sync::CancellationToken;

use crate::provider::TokenProvider;
use crate::token::Token;

/// Decides whether a response counts as "unauthorized" and should trigger
/// the refresh+retry path. The default is a bare HTTP 401.
pub trait UnauthorizedPredicate: Send + Sync {
    /// Returns whether `response` (sent for `request`) should be treated as
    /// unauthorized.
    fn is_unauthorized(&self, request: &Request, response: &Response) -> bool;
}

/// The default [`UnauthorizedPredicate`]: a bare HTTP 401.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusUnauthorized;

impl UnauthorizedPredicate for StatusUnauthorized {
    fn is_unauthorized(&self, _request: &Request, response: &Response) -> bool {
        response.status() == StatusCode::UNAUTHORIZED
    }
}

/// Decides whether a request is opting into token attachment. The default
/// is "the request carries any Authorization header" — callers tag a
/// request by adding one, even with a placeholder value.
pub trait IncludeTokenPredicate: Send + Sync {
    /// Returns whether `request` should have a token attached.
    fn include_token(&self, request: &Request) -> bool;
}

/// The default [`IncludeTokenPredicate`]: presence of an Authorization
/// header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasAuthorizationHeader;

impl IncludeTokenPredicate for HasAuthorizationHeader {
    fn include_token(&self, request: &Request) -> bool {
        request.headers().contains(&AUTHORIZATION)
    }
}

fn scheme_of(request: &Request) -> String {
    request
        .headers()
        .get_last(&AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split_once(' ').map(|(scheme, _)| scheme.to_string()))
        .unwrap_or_else(|| "Bearer".to_string())
}

fn apply_token<T: Token>(
    request: &mut Request,
    scheme: &str,
    token: Option<&T>,
) -> mallard_core::Result<()> {
    match token.and_then(Token::access_token) {
        Some(access) => {
            let value = HeaderValue::from_str(&format!("{scheme} {access}"))?;
            request.headers_mut().set(AUTHORIZATION, value);
        }
        None => request.headers_mut().remove(&AUTHORIZATION),
    }
    Ok(())
}

/// Bearer-token auth middleware implementing the state machine in spec
/// §4.4: attach a token, detect an unauthorized response, refresh it
/// exactly once via the provider, retry with the refreshed token, and
/// surface session expiry at most once.
pub struct AuthMiddleware<T, P, U = StatusUnauthorized, I = HasAuthorizationHeader>
where
    T: Token,
    P: TokenProvider<T>,
{
    inner: Arc<dyn Exchanger>,
    provider: Arc<P>,
    unauthorized: U,
    include_token: I,
    /// Handler-local dedup fallback for when `provider` is not shared
    /// across handlers (spec 4.4: "second line of defense").
    last_expired_access_token: StdMutex<Option<String>>,
    _token: PhantomData<fn() -> T>,
}

impl<T, P, U, I> std::fmt::Debug for AuthMiddleware<T, P, U, I>
where
    T: Token,
    P: TokenProvider<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware").finish_non_exhaustive()
    }
}

impl<T: Token, P: TokenProvider<T>> AuthMiddleware<T, P> {
    /// Builds a middleware with the default 401-detection and
    /// Authorization-header-presence predicates.
    pub fn new(inner: Arc<dyn Exchanger>, provider: Arc<P>) -> Self {
        Self::with_predicates(inner, provider, StatusUnauthorized, HasAuthorizationHeader)
    }
}

impl<T, P, U, I> AuthMiddleware<T, P, U, I>
where
    T: Token,
    P: TokenProvider<T>,
    U: UnauthorizedPredicate,
    I: IncludeTokenPredicate,
{
    /// Builds a middleware with caller-supplied unauthorized/include-token
    /// predicates, e.g. to detect a 403-as-unauthorized API or to opt
    /// requests in some other way than an Authorization header.
    pub fn with_predicates(
        inner: Arc<dyn Exchanger>,
        provider: Arc<P>,
        unauthorized: U,
        include_token: I,
    ) -> Self {
        Self {
            inner,
            provider,
            unauthorized,
            include_token,
            last_expired_access_token: StdMutex::new(None),
            _token: PhantomData,
        }
    }

    async fn notify_expired_once(&self, cancel: CancellationToken, request: &Request, token: &T) {
        self.provider.notify_session_expired(cancel, request, token).await;
        let key = token.access_token().map(str::to_string);
        let mut last = self
            .last_expired_access_token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *last != key {
            *last = key;
        }
    }
}

#[async_trait]
impl<T, P, U, I> Exchanger for AuthMiddleware<T, P, U, I>
where
    T: Token,
    P: TokenProvider<T>,
    U: UnauthorizedPredicate,
    I: IncludeTokenPredicate,
{
    async fn exchange(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, ExchangeFailure> {
        if !self.include_token.include_token(&request) {
            return self.inner.exchange(request, cancel).await;
        }

        let scheme = scheme_of(&request);
        let token = self.provider.get_token(cancel.clone(), &request).await.map_err(ExchangeFailure::upstream)?;

        let mut outgoing = request.clone();
        apply_token(&mut outgoing, &scheme, token.as_ref())?;
        let response = self.inner.exchange(outgoing, cancel.clone()).await?;

        if !self.unauthorized.is_unauthorized(&request, &response) {
            return Ok(response);
        }

        let Some(token) = token else {
            // No token was ever attached (it was already absent); there is
            // no token value to treat as newly expired.
            return Ok(response);
        };

        if !token.can_be_refreshed() {
            self.notify_expired_once(cancel, &request, &token).await;
            return Ok(response);
        }

        let refreshed = self
            .provider
            .refresh_token(cancel.clone(), &request, &token)
            .await
            .unwrap_or_else(|err| {
                log::warn!("refresh_token raised, treating the session as expired: {err}");
                None
            });

        let Some(refreshed) = refreshed else {
            self.notify_expired_once(cancel, &request, &token).await;
            return Ok(response);
        };

        let mut retry = request.clone();
        apply_token(&mut retry, &scheme, Some(&refreshed))?;
        let retry_response = self.inner.exchange(retry, cancel.clone()).await?;

        if self.unauthorized.is_unauthorized(&request, &retry_response) {
            self.notify_expired_once(cancel, &request, &refreshed).await;
        }

        Ok(retry_response)
    }
}
