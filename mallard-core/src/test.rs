use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::model::{MultiHeaderMap, Request};
use crate::testing::ScriptedExchanger;
use crate::{ExchangeFailure, Exchanger, Response};

fn header(name: &str) -> HeaderName {
    HeaderName::from_static(name)
}

fn hv(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

#[test]
fn last_value_wins_for_multi_valued_header() {
    let mut headers = MultiHeaderMap::new();
    let ttl = header("x-mallard-simplecache-ttl");
    headers.append(ttl.clone(), hv("300"));
    headers.append(ttl.clone(), hv("600"));
    assert_eq!(headers.get_last(&ttl).unwrap(), &hv("600"));
    assert_eq!(headers.get_first(&ttl).unwrap(), &hv("300"));
    assert_eq!(headers.get_all(&ttl).len(), 2);
}

#[test]
fn remove_is_idempotent() {
    let mut headers = MultiHeaderMap::new();
    let name = header("authorization");
    headers.set(name.clone(), hv("Bearer A1"));
    headers.remove(&name);
    headers.remove(&name);
    assert!(!headers.contains(&name));
}

#[test]
fn set_overwrites_prior_values() {
    let mut headers = MultiHeaderMap::new();
    let name = header("x-mallard-simplecache-disable");
    headers.append(name.clone(), hv("false"));
    headers.set(name.clone(), hv("true"));
    assert_eq!(headers.get_all(&name).len(), 1);
    assert_eq!(headers.get_last(&name).unwrap(), &hv("true"));
}

#[test]
fn request_builder_preserves_method_uri_and_body() {
    let req = Request::builder(Method::GET, Uri::from_static("http://x/"))
        .header(header("authorization"), hv("Bearer A1"))
        .body(Bytes::from_static(b"hello"))
        .build();
    assert_eq!(req.method(), &Method::GET);
    assert_eq!(req.uri(), &Uri::from_static("http://x/"));
    assert_eq!(req.body(), &Bytes::from_static(b"hello"));
    assert!(req.is_get());
}

#[test]
fn response_is_success_reflects_status_family() {
    let ok = Response::ok_with_body(Bytes::from_static(b"{}"));
    assert!(ok.is_success());
    let err = Response::new(StatusCode::NOT_FOUND, MultiHeaderMap::new(), Bytes::new());
    assert!(!err.is_success());
}

#[tokio::test]
async fn scripted_exchanger_replays_in_order_and_counts_calls() {
    let exchanger = ScriptedExchanger::new();
    exchanger.push_response(Response::ok_with_body(Bytes::from_static(b"first")));
    exchanger.push_response(Response::ok_with_body(Bytes::from_static(b"second")));

    let req = Request::builder(Method::GET, Uri::from_static("http://x/")).build();
    let cancel = tokio_util::sync::CancellationToken::new();

    let first = exchanger.exchange(req.clone(), cancel.clone()).await.unwrap();
    assert_eq!(first.body(), &Bytes::from_static(b"first"));
    let second = exchanger.exchange(req, cancel).await.unwrap();
    assert_eq!(second.body(), &Bytes::from_static(b"second"));
    assert_eq!(exchanger.call_count(), 2);
    assert_eq!(exchanger.requests().len(), 2);
}

#[tokio::test]
async fn scripted_exchanger_can_return_a_failure() {
    let exchanger = ScriptedExchanger::new();
    exchanger.push(Box::new(|_req| {
        Err(ExchangeFailure::upstream(std::io::Error::other("boom")))
    }));
    let req = Request::builder(Method::GET, Uri::from_static("http://x/")).build();
    let err = exchanger
        .exchange(req, tokio_util::sync::CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeFailure::UpstreamFailure(_)));
}
