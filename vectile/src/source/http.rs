//! HTTP fetch abstraction for testability.

use bytes::Bytes;
use thiserror::Error;

use super::BoxFuture;

/// Errors from the fetch primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Trait for the blocking-GET fetch primitive.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock fetchers in tests. Implementations are shared across all
/// concurrent tile load jobs, so connection reuse lives behind this trait.
pub trait HttpFetcher: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// Real fetcher backed by reqwest.
///
/// One shared client serves every job; reqwest's internal connection pool
/// provides the keep-alive handle reuse that amortizes connection setup
/// across tile fetches. Transport gzip is negotiated and decoded
/// transparently.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

/// Total request timeout in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Connection establishment timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

impl ReqwestFetcher {
    /// Creates a fetcher with the default timeouts.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT_SECS)
    }

    /// Creates a fetcher with a custom total timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .user_agent("vectile")
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .bytes()
                .await
                .map_err(|e| FetchError::Body(e.to_string()))
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock fetcher for testing.
    ///
    /// Serves one canned response for every URL, records the URLs it was
    /// asked for, and counts fetches so tests can assert that cached or
    /// promoted tiles issue no new network requests.
    pub struct MockFetcher {
        pub response: Result<Bytes, FetchError>,
        fetch_count: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        pub fn new(response: Result<Bytes, FetchError>) -> Self {
            Self {
                response,
                fetch_count: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn fetch_count(&self) -> usize {
            self.fetch_count.load(Ordering::SeqCst)
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl HttpFetcher for MockFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn test_mock_fetcher_success() {
        let mock = MockFetcher::new(Ok(Bytes::from_static(&[1, 2, 3, 4])));

        let result = mock.fetch("http://example.com/tile").await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(mock.fetch_count(), 1);
        assert_eq!(mock.requested_urls(), vec!["http://example.com/tile"]);
    }

    #[tokio::test]
    async fn test_mock_fetcher_error() {
        let mock = MockFetcher::new(Err(FetchError::Request("test error".to_string())));

        let result = mock.fetch("http://example.com/tile").await;
        assert!(result.is_err());
        assert_eq!(mock.fetch_count(), 1);
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 404,
            url: "http://example.com/t".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("404"));
        assert!(display.contains("example.com"));
    }
}
