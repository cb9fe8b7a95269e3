use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Method, StatusCode, Uri};
use mallard_core::testing::ScriptedExchanger;
use mallard_core::{Exchanger, MultiHeaderMap, Request, Response};
use tokio_util::sync::CancellationToken;

use crate::{
    AuthMiddleware, ConcurrentTokenProvider, Token, TokenProvider, TokenProviderError, TokenSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bearer {
    access: Option<String>,
    refreshable: bool,
}

impl Bearer {
    fn new(access: &str, refreshable: bool) -> Self {
        Self { access: Some(access.to_string()), refreshable }
    }
}

impl Token for Bearer {
    fn access_token(&self) -> Option<&str> {
        self.access.as_deref()
    }

    fn can_be_refreshed(&self) -> bool {
        self.refreshable
    }
}

enum RefreshScript {
    Success(Bearer),
    Absent,
    Error,
}

struct TestSource {
    initial: Bearer,
    refresh_count: Arc<AtomicUsize>,
    refresh_result: RefreshScript,
    refresh_delay: Option<std::time::Duration>,
}

impl TestSource {
    fn new(initial: Bearer, refresh_result: RefreshScript) -> Self {
        Self {
            initial,
            refresh_count: Arc::new(AtomicUsize::new(0)),
            refresh_result,
            refresh_delay: None,
        }
    }

    fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    fn refresh_count_handle(&self) -> Arc<AtomicUsize> {
        self.refresh_count.clone()
    }
}

#[async_trait]
impl TokenSource<Bearer> for TestSource {
    async fn fetch(
        &self,
        _cancel: CancellationToken,
        _request: &Request,
    ) -> Result<Option<Bearer>, TokenProviderError> {
        Ok(Some(self.initial.clone()))
    }

    async fn refresh(
        &self,
        _cancel: CancellationToken,
        _request: &Request,
        _unauthorized: &Bearer,
    ) -> Result<Option<Bearer>, TokenProviderError> {
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        match &self.refresh_result {
            RefreshScript::Success(t) => Ok(Some(t.clone())),
            RefreshScript::Absent => Ok(None),
            RefreshScript::Error => Err(TokenProviderError::new(std::io::Error::other("refresh boom"))),
        }
    }
}

fn tagged_request() -> Request {
    Request::builder(Method::GET, Uri::from_static("http://x/"))
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer placeholder"))
        .build()
}

fn auth_param(request: &Request) -> Option<String> {
    request
        .headers()
        .get_last(&AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split_once(' ').map(|(_, parameter)| parameter.to_string()))
}

fn ok_response(body: &'static str) -> Response {
    Response::ok_with_body(bytes::Bytes::from_static(body.as_bytes()))
}

fn status_response(status: StatusCode) -> Response {
    Response::new(status, MultiHeaderMap::new(), bytes::Bytes::new())
}

fn expired_log() -> (Arc<Mutex<Vec<Option<String>>>>, impl Fn(Bearer) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log2 = log.clone();
    let hook = move |expired: Bearer| log2.lock().unwrap().push(expired.access_token().map(str::to_string));
    (log, hook)
}

// S5 — authorized: token attached, no refresh, one exchange.
#[tokio::test]
async fn s5_authorized_attaches_token_and_does_not_refresh() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push(Box::new(|req| {
        assert_eq!(auth_param(req).as_deref(), Some("A1"));
        Ok(ok_response("hi"))
    }));
    let source = TestSource::new(Bearer::new("A1", false), RefreshScript::Absent);
    let (_log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner.clone(), provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(inner.call_count(), 1);
}

// S6 — refresh + retry succeeds: two exchanges, final 200, no session-expired.
#[tokio::test]
async fn s6_refresh_and_retry_succeeds() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push(Box::new(|req| {
        assert_eq!(auth_param(req).as_deref(), Some("A1"));
        Ok(status_response(StatusCode::UNAUTHORIZED))
    }));
    inner.push(Box::new(|req| {
        assert_eq!(auth_param(req).as_deref(), Some("A2"));
        Ok(ok_response("hi"))
    }));
    let source = TestSource::new(
        Bearer::new("A1", true),
        RefreshScript::Success(Bearer::new("A2", true)),
    );
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner.clone(), provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(inner.call_count(), 2);
    assert!(log.lock().unwrap().is_empty());
}

// S7 — unrefreshable unauthorized: one exchange, final 401, notified once.
#[tokio::test]
async fn s7_unrefreshable_unauthorized_notifies_once() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push_response(status_response(StatusCode::UNAUTHORIZED));
    let source = TestSource::new(Bearer::new("A1", false), RefreshScript::Absent);
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner.clone(), provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(inner.call_count(), 1);
    assert_eq!(log.lock().unwrap().as_slice(), [Some("A1".to_string())]);
}

// S8 — refresh returns absent: one exchange, final 401, notified once.
#[tokio::test]
async fn s8_refresh_returns_absent_notifies_once() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push_response(status_response(StatusCode::UNAUTHORIZED));
    let source = TestSource::new(Bearer::new("A1", true), RefreshScript::Absent);
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner.clone(), provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(inner.call_count(), 1);
    assert_eq!(log.lock().unwrap().as_slice(), [Some("A1".to_string())]);
}

// S9 — refresh throws: swallowed, final 401, notified once.
#[tokio::test]
async fn s9_refresh_throws_is_swallowed_and_notifies_once() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push_response(status_response(StatusCode::UNAUTHORIZED));
    let source = TestSource::new(Bearer::new("A1", true), RefreshScript::Error);
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner.clone(), provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(log.lock().unwrap().as_slice(), [Some("A1".to_string())]);
}

// Invariant 9 — token absent means the forwarded request has no
// Authorization header at all.
#[tokio::test]
async fn invariant9_absent_token_removes_header() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push(Box::new(|req| {
        assert!(!req.headers().contains(&AUTHORIZATION));
        Ok(ok_response("hi"))
    }));
    let source = TestSource::new(Bearer { access: None, refreshable: false }, RefreshScript::Absent);
    let (_log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner, provider);

    let res = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// Invariant 10 — a successful first exchange triggers no refresh and no
// session-expired notification.
#[tokio::test]
async fn invariant10_authorized_pass_through() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push_response(ok_response("hi"));
    let source = TestSource::new(Bearer::new("A1", true), RefreshScript::Success(Bearer::new("A2", true)));
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner, provider);

    let _ = auth.exchange(tagged_request(), CancellationToken::new()).await.unwrap();
    assert!(log.lock().unwrap().is_empty());
}

// A request with no Authorization header at all bypasses token attachment
// entirely, forwarded unchanged.
#[tokio::test]
async fn requests_without_authorization_header_bypass_auth() {
    let inner = Arc::new(ScriptedExchanger::new());
    inner.push_response(ok_response("hi"));
    let source = TestSource::new(Bearer::new("A1", true), RefreshScript::Absent);
    let (_log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let auth = AuthMiddleware::new(inner, provider);

    let plain = Request::builder(Method::GET, Uri::from_static("http://x/")).build();
    let _ = auth.exchange(plain, CancellationToken::new()).await.unwrap();
}

// Invariant 7 — single-flight refresh: N concurrent refresh_token calls for
// the same unauthorized token collapse into exactly one underlying refresh,
// and every caller ends up with the new token.
#[tokio::test]
async fn invariant7_single_flight_refresh() {
    let unauthorized = Bearer::new("A1", true);
    let source = TestSource::new(unauthorized.clone(), RefreshScript::Success(Bearer::new("A2", true)))
        .with_delay(std::time::Duration::from_millis(20));
    let refresh_count = source.refresh_count_handle();
    let (_log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));

    let request = tagged_request();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let provider = provider.clone();
        let request = request.clone();
        let unauthorized = unauthorized.clone();
        tasks.push(tokio::spawn(async move {
            provider.refresh_token(CancellationToken::new(), &request, &unauthorized).await
        }));
    }

    let mut seen_new_token = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if outcome.as_ref().and_then(Token::access_token) == Some("A2") {
            seen_new_token += 1;
        }
    }
    assert_eq!(seen_new_token, 8);
    assert_eq!(refresh_count.load(Ordering::SeqCst), 1);
}

// Invariant 8 — session-expired dedup across many notifications for the
// same failing token value fires the hook at most once.
#[tokio::test]
async fn invariant8_session_expired_dedup_across_many_calls() {
    let source = TestSource::new(Bearer::new("A1", false), RefreshScript::Absent);
    let (log, hook) = expired_log();
    let provider = Arc::new(ConcurrentTokenProvider::new(source, hook));
    let expired = Bearer::new("A1", false);

    for _ in 0..5 {
        provider
            .notify_session_expired(CancellationToken::new(), &tagged_request(), &expired)
            .await;
    }

    assert_eq!(log.lock().unwrap().len(), 1);
}
