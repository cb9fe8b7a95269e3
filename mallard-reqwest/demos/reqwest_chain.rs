//! Composes the auth and cache middlewares in front of a real
//! `ReqwestExchanger`, the way a production chain would be assembled:
//! `[Auth, Cache, ReqwestExchanger]`.

use std::sync::Arc;

use async_trait::async_trait;
use mallard_auth::{AuthMiddleware, ConcurrentTokenProvider, Token, TokenProviderError, TokenSource};
use mallard_cache::{CacheMiddleware, InMemoryCacheBackend, UriKeyProvider};
use mallard_core::{Exchanger, Request};
use mallard_reqwest::ReqwestExchanger;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct StaticBearer {
    access: String,
}

impl Token for StaticBearer {
    fn access_token(&self) -> Option<&str> {
        Some(&self.access)
    }

    fn can_be_refreshed(&self) -> bool {
        false
    }
}

struct EnvTokenSource;

#[async_trait]
impl TokenSource<StaticBearer> for EnvTokenSource {
    async fn fetch(
        &self,
        _cancel: CancellationToken,
        _request: &Request,
    ) -> Result<Option<StaticBearer>, TokenProviderError> {
        let access = std::env::var("MALLARD_DEMO_TOKEN").unwrap_or_else(|_| "demo-token".to_string());
        Ok(Some(StaticBearer { access }))
    }

    async fn refresh(
        &self,
        _cancel: CancellationToken,
        _request: &Request,
        _unauthorized: &StaticBearer,
    ) -> Result<Option<StaticBearer>, TokenProviderError> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let exchanger: Arc<dyn Exchanger> = Arc::new(ReqwestExchanger::new(reqwest::Client::new()));
    let cached = Arc::new(CacheMiddleware::new(exchanger, InMemoryCacheBackend::new(), UriKeyProvider));
    let provider = Arc::new(ConcurrentTokenProvider::new(EnvTokenSource, |_expired| {
        eprintln!("session expired");
    }));
    let chain = AuthMiddleware::new(cached as Arc<dyn Exchanger>, provider);

    let request = Request::builder(
        http::Method::GET,
        http::Uri::from_static("https://httpbin.org/bearer"),
    )
    .header(http::header::AUTHORIZATION, http::HeaderValue::from_static("Bearer placeholder"))
    .append_header(
        "x-mallard-simplecache-ttl".parse().unwrap(),
        http::HeaderValue::from_static("60"),
    )
    .build();

    let response = chain.exchange(request, CancellationToken::new()).await?;
    println!("status: {}", response.status());
    Ok(())
}
