//! Connection handling and retry logic.
//!
//! One [`Fetcher`] wraps a single shared HTTP client. A fetch opens a
//! streaming GET and returns the response handle unconsumed, positioned at
//! the start of the body; only connection timeouts are retried, every other
//! transport error propagates immediately.

use reqwest::blocking::{Client, Response};
use tracing::warn;

use crate::config::DownloadConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::pool::WorkerPool;

/// Some servers reject default client identifiers, so requests go out with
/// a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Issues streaming GET requests with bounded timeout retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry_count: u32,
}

impl Fetcher {
    /// Build a fetcher from the engine configuration.
    pub fn new(config: &DownloadConfig) -> DownloadResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            retry_count: config.retry_count,
        })
    }

    /// Open a streaming GET request to `url`.
    ///
    /// A timeout is retried up to `retry_count` additional times, so the
    /// endpoint is attempted at most `retry_count + 1` times in total. Any
    /// other transport error fails immediately.
    pub fn fetch(&self, url: &str) -> DownloadResult<Response> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.client.get(url).send() {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => {
                    warn!(url, attempt = attempts, "connection timed out: {}", e);
                    if attempts > self.retry_count {
                        return Err(DownloadError::Timeout {
                            url: url.to_string(),
                            attempts,
                        });
                    }
                }
                Err(e) => {
                    return Err(DownloadError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    /// Run [`fetch`](Self::fetch) over every URL through the worker pool.
    ///
    /// Results come back paired with their URL, in input order; failures
    /// stay in the list so the caller can report them.
    pub fn fetch_many(
        &self,
        urls: Vec<String>,
        pool: &WorkerPool,
    ) -> Vec<(String, DownloadResult<Response>)> {
        let fetcher = self.clone();
        let results = pool.run(urls.clone(), move |_, url: String| fetcher.fetch(&url));

        urls.into_iter()
            .zip(results)
            .map(|(url, result)| match result {
                Some(result) => (url, result),
                None => {
                    let err = DownloadError::Transport {
                        url: url.clone(),
                        reason: "fetch worker panicked".to_string(),
                    };
                    (url, Err(err))
                }
            })
            .collect()
    }
}
