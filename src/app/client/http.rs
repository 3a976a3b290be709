//! Core HTTP operations with rate limiting and retry logic
//!
//! Retry and backoff live here and only here: callers above the transport
//! see either a response or a single [`FetchError`].

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

use super::config::ClientConfig;
use crate::constants::{http, limits};
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
    max_retries: u32,
    stream_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32, max_retries: u32) -> ConfigResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            stream_timeout: http::STREAM_TIMEOUT,
        })
    }

    /// Builds the client and handler from a [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> crate::errors::Result<Self> {
        let client = config.build_http_client()?;
        Ok(Self::new(client, config.rate_limit_rps, config.max_retries)?
            .with_stream_timeout(config.stream_timeout))
    }

    /// Total timeout for [`get_stream`](Self::get_stream) requests
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "client.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Sends a request built by `build`, rebuilding it for each retry
    ///
    /// Any status other than 429/503 is returned to the caller untouched, so
    /// callers decide what a non-success response means at their fetch site.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the request keeps failing after retries
    pub async fn execute<F>(&self, build: F) -> FetchResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let mut retries = 0;
        loop {
            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        if retries < self.max_retries {
                            retries += 1;
                            let delay = backoff_delay(retries);
                            tracing::warn!(
                                "Server answered {} for {}. Backing off for {}ms",
                                status.as_u16(),
                                response.url(),
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                            FetchError::RateLimitExceeded
                        } else {
                            FetchError::ServerOverloaded
                        });
                    }

                    tracing::debug!("{} {}", status.as_u16(), response.url());
                    return Ok(response);
                }
                Err(e) if retries < self.max_retries && !e.is_builder() => {
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_builder() => return Err(FetchError::Http(e)),
                Err(e) => {
                    tracing::error!("Request failed after {} retries: {}", self.max_retries, e);
                    return Err(FetchError::MaxRetriesExceeded {
                        max_retries: self.max_retries,
                        source: e,
                    });
                }
            }
        }
    }

    /// Issues a GET against `url` under the client's request timeout
    pub async fn get_response(&self, url: &Url) -> FetchResult<Response> {
        self.execute(|client| client.get(url.as_str())).await
    }

    /// Issues a GET whose body will be streamed, under the longer stream
    /// timeout instead of the client's request timeout
    pub async fn get_stream(&self, url: &Url) -> FetchResult<Response> {
        self.execute(|client| client.get(url.as_str()).timeout(self.stream_timeout))
            .await
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(limits::RETRY_BASE_DELAY_MS * 2_u64.pow(attempt))
}

/// Parses a URL string into a [`Url`], mapping failures to [`FetchError`]
pub fn parse_url(url: &str) -> FetchResult<Url> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        error: e.to_string(),
    })
}
