// src/screener/client.rs
use crate::config::FetchConfig;
use crate::utils::error::FetchError;
use reqwest::{header, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// HTTP GET with a bounded retry budget on transient failures.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

/// Statuses worth another attempt: rate limiting and flaky upstreams.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Could not connect, or ran out of time. Anything else reqwest reports
/// (a request the peer cut off, a redirect loop, a bad URL) fails at once.
fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, config })
    }

    fn backoff(&self, failed_attempt: u32) -> Duration {
        self.config
            .backoff_base
            .saturating_mul(1u32 << failed_attempt.min(16))
    }

    /// Sends a GET, retrying transient failures. Returns only successful responses.
    async fn send_with_retry(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        // Spacing between requests keeps the site from rate limiting us.
        tokio::time::sleep(self.config.initial_delay).await;

        let attempts = self.config.max_attempts.max(1);
        let mut last_cause = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                tracing::warn!(
                    "Retrying {} in {:?} (attempt {}/{}) after: {}",
                    url,
                    delay,
                    attempt + 1,
                    attempts,
                    last_cause
                );
                tokio::time::sleep(delay).await;
            }

            match self
                .client
                .get(url)
                .header(header::ACCEPT, "text/html,application/pdf,*/*")
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if is_transient_status(status) {
                        last_cause = format!("HTTP {}", status);
                        continue;
                    }
                    tracing::error!("HTTP error status: {} for URL: {}", status, url);
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(e) if is_transient_error(&e) => {
                    last_cause = e.to_string();
                }
                Err(e) => {
                    tracing::error!("Request to {} failed: {}", url, e);
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }

        tracing::error!(
            "Giving up on {} after {} attempts: {}",
            url,
            attempts,
            last_cause
        );
        Err(FetchError::Transient {
            url: url.to_string(),
            attempts,
            cause: last_cause,
        })
    }

    /// Fetches `url` and returns the whole body.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::info!("Fetching: {}", url);
        let response = self.send_with_retry(url).await?;
        let body = response.bytes().await.map_err(|e| {
            tracing::error!("Failed reading body from {}: {}", url, e);
            FetchError::Network {
                url: url.to_string(),
                source: e,
            }
        })?;
        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }

    /// Streams `url` into `dest`. The file appears at `dest` only once the whole
    /// body has been written, so a failed transfer never leaves a partial file behind.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.send_with_retry(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest);

        let written = async {
            let mut file = tokio::fs::File::create(&part).await?;
            let mut written: u64 = 0;
            loop {
                let chunk = response.chunk().await.map_err(|e| FetchError::Network {
                    url: url.to_string(),
                    source: e,
                })?;
                let Some(chunk) = chunk else { break };
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, FetchError>(written)
        }
        .await;

        match written {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest).await?;
                tracing::info!("Downloaded {} bytes to {}", bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                tracing::error!("Download of {} failed: {}", url, e);
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    tracing::debug!("Could not remove {}: {}", part.display(), rm);
                }
                Err(e)
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BROWSER_USER_AGENT;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn fast_fetcher() -> Fetcher {
        Fetcher::new(FetchConfig {
            initial_delay: Duration::ZERO,
            backoff_base: Duration::from_millis(1),
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        assert_eq!(fetcher.backoff(0), Duration::from_secs(1));
        assert_eq!(fetcher.backoff(1), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn only_rate_limit_and_server_errors_are_transient() {
        for code in [429, 500, 502, 503, 504] {
            assert!(is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 403, 404, 501] {
            assert!(!is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[tokio::test]
    async fn fetch_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(|req: &Request| {
                req.headers
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    == Some(BROWSER_USER_AGENT)
            })
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fast_fetcher()
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"<html></html>");
    }

    #[tokio::test]
    async fn three_503s_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = fast_fetcher().fetch(&server.uri()).await;
        match result {
            Err(FetchError::Transient { attempts, cause, .. }) => {
                assert_eq!(attempts, 3);
                assert!(cause.contains("503"), "cause was {cause}");
            }
            other => panic!("expected transient failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recovers_after_one_transient_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = fast_fetcher().fetch(&server.uri()).await.unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = fast_fetcher().fetch(&server.uri()).await;
        assert!(
            matches!(result, Err(FetchError::Http { status, .. }) if status == StatusCode::NOT_FOUND),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_surfaced() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = fast_fetcher()
            .fetch(&format!("http://127.0.0.1:{port}/"))
            .await;
        assert!(
            matches!(result, Err(FetchError::Transient { attempts: 3, .. })),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn dropped_request_fails_without_retry() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::io::AsyncReadExt;

        // Accepts the connection, reads the request, hangs up without answering.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
            }
        });

        let result = fast_fetcher().fetch(&format!("http://{addr}/")).await;
        assert!(
            matches!(result, Err(FetchError::Network { .. })),
            "got {result:?}"
        );
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn download_writes_file_and_leaves_no_part() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 data".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cache").join("X_Sep_2024.pdf");
        let written = fast_fetcher()
            .download_to(&format!("{}/doc.pdf", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 data");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn failed_download_creates_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("X_Sep_2024.pdf");
        let result = fast_fetcher().download_to(&server.uri(), &dest).await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }
}
