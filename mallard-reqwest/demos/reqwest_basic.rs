//! Minimal exchange through `ReqwestExchanger` alone, no middleware.

use mallard_core::{Exchanger, Request};
use mallard_reqwest::ReqwestExchanger;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let exchanger = ReqwestExchanger::new(reqwest::Client::new());
    let request = Request::builder(
        http::Method::GET,
        http::Uri::from_static("https://httpbin.org/get"),
    )
    .build();

    let response = exchanger.exchange(request, CancellationToken::new()).await?;
    println!("status: {}", response.status());
    println!("body bytes: {}", response.body().len());
    Ok(())
}
