//! HTTP access for asset tasks: metadata probe and body GET.
//!
//! Uses the curl crate (libcurl). Calls are blocking; asset tasks run them
//! through `tokio::task::spawn_blocking`. The [`HttpClient`] trait is the seam
//! tests use to substitute canned responses.

mod error;
mod parse;

pub use error::FetchError;
pub use parse::{normalize_content_type, ResponseMeta};

use std::str;
use std::time::Duration;

use crate::config::LocalizerConfig;
use crate::retry::{run_with_retry, RetryPolicy};

const DEFAULT_USER_AGENT: &str = concat!("mdloc/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTIONS: u32 = 10;
/// libcurl reads a zero timeout as "no timeout".
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// A fetched response body plus the final response's metadata.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub meta: ResponseMeta,
}

/// Blocking HTTP operations needed by an asset task.
pub trait HttpClient: Send + Sync {
    /// Lightweight metadata request (no body).
    fn probe(&self, url: &str) -> Result<ResponseMeta, FetchError>;

    /// Full GET of the asset body.
    fn get(&self, url: &str) -> Result<FetchedAsset, FetchError>;
}

/// libcurl-backed client with independent connect and transfer timeouts.
#[derive(Debug, Clone)]
pub struct CurlClient {
    connect_timeout: Duration,
    transfer_timeout: Duration,
    user_agent: String,
    retry: RetryPolicy,
}

impl CurlClient {
    pub fn new(connect_timeout: Duration, transfer_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            transfer_timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(cfg: &LocalizerConfig) -> Self {
        let mut client = Self::new(cfg.connect_timeout(), cfg.transfer_timeout())
            .with_retry(cfg.retry_policy());
        if let Some(ua) = cfg.user_agent.as_deref().filter(|s| !s.trim().is_empty()) {
            client.user_agent = ua.trim().to_string();
        }
        client
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn easy(&self, url: &str, overall: Duration) -> Result<curl::easy::Easy, FetchError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTIONS)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Aborts the in-flight transfer once exceeded.
        easy.timeout(overall.max(MIN_TIMEOUT))?;
        Ok(easy)
    }

    fn get_once(&self, url: &str, overall: Duration) -> Result<FetchedAsset, FetchError> {
        let mut headers: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = self.easy(url, overall)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        check_status(easy.response_code()?)?;
        Ok(FetchedAsset {
            bytes: body,
            meta: parse::parse_headers(&headers),
        })
    }
}

fn check_status(code: u32) -> Result<(), FetchError> {
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(FetchError::Http(code))
    }
}

impl HttpClient for CurlClient {
    /// HEAD request, one attempt; the overall budget equals the connect timeout.
    fn probe(&self, url: &str) -> Result<ResponseMeta, FetchError> {
        let mut headers: Vec<String> = Vec::new();

        let mut easy = self.easy(url, self.connect_timeout)?;
        easy.nobody(true)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.perform()?;
        }

        check_status(easy.response_code()?)?;
        Ok(parse::parse_headers(&headers))
    }

    fn get(&self, url: &str) -> Result<FetchedAsset, FetchError> {
        // Every attempt and backoff shares one transfer budget.
        run_with_retry(&self.retry, self.transfer_timeout, |left| self.get_once(url, left))
    }
}
