use std::time::Duration;

use {thiserror::Error, tracing::warn};

/// Client identifier sent with every request.
const USER_AGENT: &str = concat!("skillery/", env!("CARGO_PKG_VERSION"));

/// What went wrong with a single request attempt. Absorbed by the retry
/// loop; never crosses the fetcher boundary.
#[derive(Debug, Error)]
enum FetchError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {0}")]
    Status(reqwest::StatusCode),
}

/// HTTP fetcher with retry and exponential backoff.
///
/// Failures after exhausting retries are logged and surfaced as `None` so the
/// pipeline can skip the item and keep going. A bearer credential raises the
/// GitHub rate-limit ceiling when present; its absence is never fatal.
pub struct Fetcher {
    client: reqwest::Client,
    retries: u32,
    backoff_base: Duration,
    token: Option<String>,
}

impl Fetcher {
    pub fn new(retries: u32, timeout: Duration) -> Self {
        Self::with_token(retries, timeout, std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn with_token(retries: u32, timeout: Duration, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            retries: retries.max(1),
            backoff_base: Duration::from_secs(1),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Shrink the backoff base (tests).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Fetch a URL as text. Retries with exponential backoff (base delay
    /// doubling each attempt); returns `None` once retries are exhausted.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        for attempt in 0..self.retries {
            match self.attempt(url).await {
                Ok(body) => return Some(body),
                Err(e) if attempt + 1 < self.retries => {
                    let wait = self.backoff_base * 2u32.pow(attempt);
                    tracing::debug!(%url, attempt = attempt + 1, ?wait, error = %e, "retrying fetch");
                    tokio::time::sleep(wait).await;
                },
                Err(e) => {
                    warn!(%url, error = %e, "fetch failed after retries, skipping");
                    return None;
                },
            }
        }
        None
    }

    /// Fetch a URL and parse the body as JSON.
    pub async fn fetch_json(&self, url: &str) -> Option<serde_json::Value> {
        let body = self.fetch_text(url).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%url, error = %e, "response is not valid JSON, skipping");
                None
            },
        }
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let mut req = self.client.get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            req = req
                .header("Authorization", format!("Bearer {token}"))
                .header("Accept", "application/vnd.github+json");
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        Ok(resp.text().await?)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn test_fetcher(retries: u32) -> Fetcher {
        Fetcher::with_token(retries, Duration::from_secs(5), None)
            .with_backoff_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/doc.md")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let fetcher = test_fetcher(3);
        let body = fetcher.fetch_text(&format!("{}/doc.md", server.url())).await;
        assert_eq!(body.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn fetch_text_gives_up_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let fetcher = test_fetcher(2);
        let body = fetcher.fetch_text(&format!("{}/flaky", server.url())).await;
        assert!(body.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_json_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tree.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sha":"abc","tree":[]}"#)
            .create_async()
            .await;

        let fetcher = test_fetcher(1);
        let value = fetcher
            .fetch_json(&format!("{}/tree.json", server.url()))
            .await
            .unwrap();
        assert_eq!(value["sha"], "abc");
    }

    #[tokio::test]
    async fn fetch_json_rejects_invalid_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/bad.json")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let fetcher = test_fetcher(1);
        assert!(fetcher.fetch_json(&format!("{}/bad.json", server.url())).await.is_none());
    }

    #[tokio::test]
    async fn bearer_token_attached_when_present() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth")
            .match_header("Authorization", "Bearer secret-token")
            .match_header("Accept", "application/vnd.github+json")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let fetcher = Fetcher::with_token(1, Duration::from_secs(5), Some("secret-token".into()));
        let body = fetcher.fetch_text(&format!("{}/auth", server.url())).await;
        assert_eq!(body.as_deref(), Some("ok"));
        mock.assert_async().await;
    }
}
