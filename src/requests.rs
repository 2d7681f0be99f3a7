use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, ClientBuilder, Request, StatusCode, header::COOKIE};

use crate::{
    error::FetchError, ratelimit::RateLimiter, session::SessionToken,
    text_manipulators::get_paginated_listing_url,
};

/// Raw markup and status of one (source, page) fetch.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub status: StatusCode,
    pub body: String,
}

/// Where and how proxied requests are sent.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub endpoint: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub requests_per_second: u32,
    pub min_request_interval_ms: u64,
}

/// Fetches a single listing page of a source.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, source_url: &str, page: u32) -> Result<PageResult, FetchError>;
}

/// Issues every request through the retrieval proxy, carrying the stored
/// session. Never contacts the target site directly, never retries.
pub struct FetchClient {
    client: Client,
    proxy: ProxySettings,
    session: SessionToken,
    rate_limiter: RateLimiter,
}

impl FetchClient {
    pub fn new(proxy: ProxySettings, session: SessionToken) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(proxy.request_timeout)
            .build()?;
        let rate_limiter = RateLimiter::new(proxy.requests_per_second, proxy.min_request_interval_ms);
        Ok(Self {
            client,
            proxy,
            session,
            rate_limiter,
        })
    }

    /// The proxied GET for `page` of `source_url`: the target URL and access
    /// key travel as query parameters of the proxy endpoint.
    pub fn page_request(&self, source_url: &str, page: u32) -> reqwest::Result<Request> {
        let target = get_paginated_listing_url(source_url, page);
        self.client
            .get(&self.proxy.endpoint)
            .query(&[("api_key", self.proxy.api_key.as_str()), ("url", target.as_str())])
            .header(COOKIE, self.session.cookie_header())
            .build()
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch_page(&self, source_url: &str, page: u32) -> Result<PageResult, FetchError> {
        let transport = |error| FetchError::Transport {
            source_url: source_url.to_string(),
            page,
            error,
        };

        let request = self.page_request(source_url, page).map_err(transport)?;

        // Wait (non-blocking) until we're allowed to make a request according
        // to our self-imposed rate-limiting policy.
        self.rate_limiter.wait_until_ready().await;

        let response = self.client.execute(request).await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            debug!("Scraping {source_url} - page {page} - status {status}");
            return Err(FetchError::Status {
                source_url: source_url.to_string(),
                page,
                status,
            });
        }

        let body = response.text().await.map_err(transport)?;
        debug!(
            "Scraping {source_url} - page {page} - status {status}, content length {}",
            body.len()
        );
        Ok(PageResult { status, body })
    }
}
