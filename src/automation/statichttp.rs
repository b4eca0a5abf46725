//! Static-fetch fallback engine.
//!
//! Fetches the target page with a plain HTTP GET — no JavaScript execution.
//! Serves as the backup when Chromium cannot start, and as the degraded
//! HTTP-only mode for server-rendered upstreams.

use super::{Engine, PageDocument, Session};
use crate::error::EngineError;
use crate::model::EngineKind;
use async_trait::async_trait;
use std::time::{Duration, Instant};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP fetch engine backed by a shared `reqwest` client.
pub struct StaticEngine {
    client: reqwest::Client,
}

impl StaticEngine {
    pub fn new() -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| EngineError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Engine for StaticEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Static
    }

    async fn acquire(&self) -> Result<Box<dyn Session>, EngineError> {
        Ok(Box::new(StaticSession {
            client: self.client.clone(),
        }))
    }

    async fn shutdown(&self) {}
}

/// A stateless fetch session; the underlying client is shared.
pub struct StaticSession {
    client: reqwest::Client,
}

#[async_trait]
impl Session for StaticSession {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<PageDocument, EngineError> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::NavigationTimeout(timeout)
                } else {
                    EngineError::Navigation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Navigation(format!(
                "upstream returned HTTP {status}"
            )));
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::NavigationTimeout(timeout)
            } else {
                EngineError::Navigation(format!("failed to read body: {e}"))
            }
        })?;

        Ok(PageDocument {
            html,
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_fetch_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body class=\"inplay-item-list\"></body></html>"),
            )
            .mount(&server)
            .await;

        let engine = StaticEngine::new().unwrap();
        let mut session = engine.acquire().await.unwrap();
        let doc = session
            .navigate(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(doc.html.contains("inplay-item-list"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_static_fetch_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let engine = StaticEngine::new().unwrap();
        let mut session = engine.acquire().await.unwrap();
        let err = session
            .navigate(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Navigation(_)));
    }

    #[tokio::test]
    async fn test_static_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let engine = StaticEngine::new().unwrap();
        let mut session = engine.acquire().await.unwrap();
        let err = session
            .navigate(&server.uri(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NavigationTimeout(_)));
    }
}
