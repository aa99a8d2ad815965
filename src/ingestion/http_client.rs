use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::SpimexError;

/// Source of listing pages and spreadsheet files.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, SpimexError>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, SpimexError>;
}

struct SpimexRateLimiter {
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl reqwest_ratelimit::RateLimiter for SpimexRateLimiter {
    async fn acquire_permit(&self) {
        self.rate_limiter.until_ready().await;
    }
}

/// Rate-limited HTTP client for spimex.com. Failed requests are not retried.
#[derive(Debug, Clone)]
pub struct SpimexClient {
    http_client: ClientWithMiddleware,
}

impl SpimexClient {
    pub fn new(config: &Config) -> Result<Self, SpimexError> {
        let reqwest_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero_ext::nonzero!(1u32));
        let rate_limiter = SpimexRateLimiter {
            rate_limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(per_second))),
        };

        let http_client = ClientBuilder::new(reqwest_client)
            .with(reqwest_ratelimit::all(rate_limiter))
            .build();

        Ok(Self { http_client })
    }
}

#[async_trait]
impl PageFetcher for SpimexClient {
    #[instrument(skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String, SpimexError> {
        let response = self.http_client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    #[instrument(skip(self))]
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, SpimexError> {
        let response = self.http_client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Fetched file");
        Ok(body.to_vec())
    }
}
