use std::sync::Arc;

use async_trait::async_trait;
use mallard_core::Request;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::token::Token;

/// An error raised by a [`TokenSource`] or a [`TokenProvider`].
#[derive(thiserror::Error, miette::Diagnostic, Debug)]
#[error("token provider error: {0}")]
#[diagnostic(code(mallard_auth::token_provider))]
pub struct TokenProviderError(#[source] Box<dyn std::error::Error + Send + Sync + 'static>);

impl TokenProviderError {
    /// Wraps any boxable error as a [`TokenProviderError`].
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }
}

/// The contract a token provider exposes to the auth middleware (spec C5).
#[async_trait]
pub trait TokenProvider<T: Token>: Send + Sync {
    /// Returns the currently-known token, if any.
    async fn get_token(
        &self,
        cancel: CancellationToken,
        request: &Request,
    ) -> Result<Option<T>, TokenProviderError>;

    /// Attempts to obtain a fresh token, given the one observed to fail.
    async fn refresh_token(
        &self,
        cancel: CancellationToken,
        request: &Request,
        unauthorized: &T,
    ) -> Result<Option<T>, TokenProviderError>;

    /// Informs higher layers that the user session is gone.
    async fn notify_session_expired(
        &self,
        cancel: CancellationToken,
        request: &Request,
        expired: &T,
    );
}

/// The actual network-facing half of token acquisition: fetching an initial
/// token and performing a refresh. [`ConcurrentTokenProvider`] wraps a
/// `TokenSource` with single-flight refresh, piggybacking, and
/// session-expired dedup.
#[async_trait]
pub trait TokenSource<T: Token>: Send + Sync {
    /// Fetches a token from scratch (e.g. on first use).
    async fn fetch(
        &self,
        cancel: CancellationToken,
        request: &Request,
    ) -> Result<Option<T>, TokenProviderError>;

    /// Performs the actual refresh network call.
    async fn refresh(
        &self,
        cancel: CancellationToken,
        request: &Request,
        unauthorized: &T,
    ) -> Result<Option<T>, TokenProviderError>;
}

/// State shared by every [`ConcurrentTokenProvider`] handle built from the
/// same identity realm: the current token, the refresh single-flight gate,
/// and the last-notified expired access-token string.
///
/// Per the design notes, one instance of this state is owned by a provider
/// and shared by reference across any number of [`crate::AuthMiddleware`]
/// handlers built from `Arc`-cloning that provider — it is never
/// duplicated per handler.
pub struct SharedTokenProviderState<T: Token> {
    current: Mutex<Option<T>>,
    refresh_gate: Semaphore,
    last_expired_access_token: Mutex<ExpiredSentinel>,
}

/// Tracks the most recently notified expired access-token value, with a
/// sentinel for "nothing notified yet" that is distinct from "notified for a
/// token whose access-token value is itself absent" — a plain
/// `Option<String>` cannot tell these apart.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExpiredSentinel {
    NotYetNotified,
    Notified(Option<String>),
}

impl<T: Token> SharedTokenProviderState<T> {
    /// Starts with no known token.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            refresh_gate: Semaphore::new(1),
            last_expired_access_token: Mutex::new(ExpiredSentinel::NotYetNotified),
        }
    }

    /// Starts already seeded with a known token, skipping the first `fetch`.
    pub fn seeded(token: T) -> Self {
        Self {
            current: Mutex::new(Some(token)),
            refresh_gate: Semaphore::new(1),
            last_expired_access_token: Mutex::new(ExpiredSentinel::NotYetNotified),
        }
    }
}

impl<T: Token> Default for SharedTokenProviderState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Token> std::fmt::Debug for SharedTokenProviderState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTokenProviderState").finish_non_exhaustive()
    }
}

/// The reference concurrent [`TokenProvider`] (spec 4.3).
///
/// Wraps a [`TokenSource`] with the five behaviors the spec requires of the
/// reference implementation: single-flight refresh via a binary semaphore,
/// piggybacking on a concurrent refresh that already completed, swallowing
/// source failures into an absent token, cancellation-insensitivity once the
/// refresh has started, and at-most-once session-expired notification.
pub struct ConcurrentTokenProvider<T: Token, S: TokenSource<T>> {
    state: Arc<SharedTokenProviderState<T>>,
    source: S,
    on_session_expired: Box<dyn Fn(T) + Send + Sync>,
}

impl<T: Token, S: TokenSource<T>> ConcurrentTokenProvider<T, S> {
    /// Builds a provider around `source`, calling `on_session_expired` the
    /// first time a given token value is reported expired.
    pub fn new(source: S, on_session_expired: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(SharedTokenProviderState::new()),
            source,
            on_session_expired: Box::new(on_session_expired),
        }
    }

    /// Builds a provider sharing an existing [`SharedTokenProviderState`],
    /// e.g. when migrating an already-seeded state to a new source.
    pub fn with_state(
        state: Arc<SharedTokenProviderState<T>>,
        source: S,
        on_session_expired: impl Fn(T) + Send + Sync + 'static,
    ) -> Self {
        Self { state, source, on_session_expired: Box::new(on_session_expired) }
    }

    /// Returns the current token, fetching and populating `state.current`
    /// on a miss. Shared by [`TokenProvider::get_token`] and
    /// [`TokenProvider::refresh_token`]'s re-read (spec §4.3 step 2), so
    /// a `refresh_token` call with no prior `get_token` call on this
    /// provider still sees a populated token rather than a permanent
    /// `None`.
    async fn current_or_fetch(
        &self,
        cancel: CancellationToken,
        request: &Request,
    ) -> Result<Option<T>, TokenProviderError> {
        if let Some(token) = self.state.current.lock().await.clone() {
            return Ok(Some(token));
        }
        let fetched = self.source.fetch(cancel, request).await?;
        if let Some(token) = &fetched {
            *self.state.current.lock().await = Some(token.clone());
        }
        Ok(fetched)
    }
}

impl<T: Token, S: TokenSource<T>> std::fmt::Debug for ConcurrentTokenProvider<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Token, S: TokenSource<T>> TokenProvider<T> for ConcurrentTokenProvider<T, S> {
    async fn get_token(
        &self,
        cancel: CancellationToken,
        request: &Request,
    ) -> Result<Option<T>, TokenProviderError> {
        self.current_or_fetch(cancel, request).await
    }

    async fn refresh_token(
        &self,
        cancel: CancellationToken,
        request: &Request,
        unauthorized: &T,
    ) -> Result<Option<T>, TokenProviderError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("refresh wait cancelled before the semaphore was acquired");
                return Ok(None);
            }
            permit = self.state.refresh_gate.acquire() => {
                permit.expect("refresh_gate semaphore is never closed")
            }
        };

        let current = self.current_or_fetch(cancel.clone(), request).await?;
        if let Some(current) = &current {
            if current.access_token() != unauthorized.access_token() {
                log::debug!("piggybacking on a concurrent refresh that already completed");
                return Ok(Some(current.clone()));
            }
        }
        if !current.as_ref().is_some_and(Token::can_be_refreshed) {
            return Ok(None);
        }

        // Detach from the caller's cancellation scope now that the
        // critical section has begun: a cancelled caller must not leave
        // the next waiter with a half-refreshed token.
        let detached = CancellationToken::new();
        let outcome = self.source.refresh(detached, request, unauthorized).await;
        drop(permit);

        match outcome {
            Ok(Some(fresh)) => {
                *self.state.current.lock().await = Some(fresh.clone());
                Ok(Some(fresh))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log::warn!("token refresh failed, treating the session as expired: {err}");
                Ok(None)
            }
        }
    }

    async fn notify_session_expired(
        &self,
        _cancel: CancellationToken,
        _request: &Request,
        expired: &T,
    ) {
        let expired_key = expired.access_token().map(str::to_string);
        let mut last = self.state.last_expired_access_token.lock().await;
        if let ExpiredSentinel::Notified(previous) = &*last {
            if *previous == expired_key {
                return;
            }
        }
        *last = ExpiredSentinel::Notified(expired_key);
        drop(last);
        (self.on_session_expired)(expired.clone());
    }
}
