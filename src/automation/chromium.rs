//! Chromium-based engine using chromiumoxide.

use super::{Engine, PageDocument, Session};
use crate::error::EngineError;
use crate::model::EngineKind;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How often the ready-selector poll re-checks the DOM after navigation.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ODDSFEED_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("ODDSFEED_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common install locations
    let candidates = if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    };
    candidates.into_iter().find(|c| c.exists())
}

/// Headless Chromium engine.
///
/// The browser process is launched lazily on the first `acquire` and reused
/// across scrape cycles; each cycle gets its own fresh page. If the browser
/// has died in the meantime, one relaunch is attempted before giving up.
pub struct ChromiumEngine {
    browser: Mutex<Option<Browser>>,
    /// Selector whose presence marks the page as rendered; polled after
    /// navigation until the deadline.
    ready_selector: Option<String>,
}

impl ChromiumEngine {
    pub fn new(ready_selector: Option<String>) -> Self {
        Self {
            browser: Mutex::new(None),
            ready_selector,
        }
    }

    async fn launch() -> Result<Browser, EngineError> {
        let chrome_path = find_chromium()
            .ok_or_else(|| EngineError::Unavailable("Chromium binary not found".to_string()))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .window_size(1280, 720)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("bad browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::Unavailable(format!("failed to launch Chromium: {e}")))?;

        // Drain CDP events for the life of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!("Chromium launched");
        Ok(browser)
    }

    async fn new_page(&self) -> Result<Page, EngineError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch().await?);
        }

        let first = match guard.as_ref() {
            Some(browser) => browser.new_page("about:blank").await,
            None => return Err(EngineError::Unavailable("browser gone".to_string())),
        };
        match first {
            Ok(page) => Ok(page),
            Err(e) => {
                // The browser may have crashed since the last cycle;
                // relaunch once before giving up.
                warn!("new page failed ({e}), relaunching Chromium");
                *guard = Some(Self::launch().await?);
                match guard.as_ref() {
                    Some(browser) => browser
                        .new_page("about:blank")
                        .await
                        .map_err(|e| EngineError::Unavailable(format!("new page failed: {e}"))),
                    None => Err(EngineError::Unavailable("browser gone".to_string())),
                }
            }
        }
    }
}

#[async_trait]
impl Engine for ChromiumEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Chromium
    }

    async fn acquire(&self) -> Result<Box<dyn Session>, EngineError> {
        let page = self.new_page().await?;
        Ok(Box::new(ChromiumSession {
            page,
            ready_selector: self.ready_selector.clone(),
        }))
    }

    async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("error closing Chromium: {e}");
            }
        }
    }
}

/// A single Chromium page session.
pub struct ChromiumSession {
    page: Page,
    ready_selector: Option<String>,
}

impl ChromiumSession {
    /// Poll until `selector` appears in the DOM or `deadline` passes.
    /// Absence is not an error here — the extractor classifies it.
    async fn await_ready(&self, selector: &str, deadline: Instant) {
        let script = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector).unwrap_or_default()
        );
        while Instant::now() < deadline {
            match self.page.evaluate(script.as_str()).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        return;
                    }
                }
                Err(e) => {
                    debug!("ready poll failed: {e}");
                    return;
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<PageDocument, EngineError> {
        let start = Instant::now();
        let deadline = start + timeout;

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        match result {
            Ok(Ok(_response)) => {}
            Ok(Err(e)) => return Err(EngineError::Navigation(e.to_string())),
            Err(_) => return Err(EngineError::NavigationTimeout(timeout)),
        }

        // Wait for the load event, then for the content selector if one is
        // configured — live pages fill the list via JavaScript after load.
        let _ = tokio::time::timeout(
            deadline.saturating_duration_since(Instant::now()),
            self.page.wait_for_navigation(),
        )
        .await;
        if let Some(selector) = self.ready_selector.clone() {
            self.await_ready(&selector, deadline).await;
        }

        let html_result = tokio::time::timeout(
            deadline.saturating_duration_since(Instant::now()) + Duration::from_secs(1),
            self.page.evaluate("document.documentElement.outerHTML"),
        )
        .await;

        let html: String = match html_result {
            Ok(Ok(value)) => value
                .into_value()
                .map_err(|e| EngineError::Navigation(format!("failed to read HTML: {e:?}")))?,
            Ok(Err(e)) => return Err(EngineError::Navigation(format!("failed to get HTML: {e}"))),
            Err(_) => return Err(EngineError::NavigationTimeout(timeout)),
        };

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(PageDocument {
            html,
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn close(self: Box<Self>) {
        let _ = self.page.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_data_url() {
        let engine = ChromiumEngine::new(None);
        let mut session = engine.acquire().await.expect("failed to acquire session");

        let doc = session
            .navigate(
                "data:text/html,<h1>Odds</h1><div class=\"inplay-item-list\"></div>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");

        assert!(doc.html.contains("inplay-item-list"));
        assert!(doc.load_time_ms < 10_000);

        session.close().await;
        engine.shutdown().await;
    }
}
