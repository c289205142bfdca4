mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;

/// Issues a GET for `url` and fails on any non-success status.
pub async fn fetch<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<reqwest::Response> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse()?,
    );

    let resp = client.execute(req).await?;
    Ok(resp.error_for_status()?)
}
