//! Automation adapter — browser engines behind a uniform interface.
//!
//! Defines the `Engine` and `Session` traits that abstract over the page
//! acquisition mechanism (headless Chromium via chromiumoxide, or a plain
//! HTTP fetch), plus the fallback policy that tries the backup engine when
//! the preferred one cannot produce a session.

pub mod chromium;
pub mod statichttp;

use crate::config::Config;
use crate::error::EngineError;
use crate::model::EngineKind;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A fetched page, ready for extraction.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// Full page HTML after rendering (or the raw body for static fetches).
    pub html: String,
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// An automation engine that can hand out page sessions.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Which engine this is; stamped on snapshots it produces.
    fn kind(&self) -> EngineKind;

    /// Acquire a fresh session. `EngineError::Unavailable` means the engine
    /// itself cannot run (binary missing, launch crash) and the fallback
    /// should be tried.
    async fn acquire(&self) -> Result<Box<dyn Session>, EngineError>;

    /// Release engine-level resources (running browser process). Called on
    /// graceful shutdown.
    async fn shutdown(&self);
}

/// A single live page session, owned by one scrape cycle at a time.
#[async_trait]
pub trait Session: Send {
    /// Navigate to `url` and return the rendered document.
    ///
    /// Enforces `timeout`; on `NavigationTimeout` the session is in an
    /// unknown state and must be discarded by the caller, not reused.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<PageDocument, EngineError>;

    /// Close the session, releasing its tab/connection.
    async fn close(self: Box<Self>);
}

/// A session together with the engine that produced it.
pub struct AcquiredSession {
    pub session: Box<dyn Session>,
    pub engine: EngineKind,
    /// True when the preferred engine was unavailable and the fallback
    /// produced this session.
    pub fell_back: bool,
}

impl std::fmt::Debug for AcquiredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredSession")
            .field("engine", &self.engine)
            .field("fell_back", &self.fell_back)
            .finish_non_exhaustive()
    }
}

/// Acquire a session from `primary`, falling back to `fallback` exactly once
/// when the primary reports itself unavailable.
///
/// Only `Unavailable` triggers the fallback — navigation-level failures are
/// the cycle's problem, not an engine-selection problem.
pub async fn acquire_with_fallback(
    primary: &dyn Engine,
    fallback: Option<&dyn Engine>,
) -> Result<AcquiredSession, EngineError> {
    match primary.acquire().await {
        Ok(session) => Ok(AcquiredSession {
            session,
            engine: primary.kind(),
            fell_back: false,
        }),
        Err(EngineError::Unavailable(reason)) => {
            let Some(fb) = fallback else {
                return Err(EngineError::Unavailable(reason));
            };
            warn!(
                "{} engine unavailable ({reason}), trying {} fallback",
                primary.kind().as_str(),
                fb.kind().as_str()
            );
            let session = fb.acquire().await?;
            Ok(AcquiredSession {
                session,
                engine: fb.kind(),
                fell_back: true,
            })
        }
        Err(other) => Err(other),
    }
}

/// Build the engine pair for a config: the preferred engine as primary,
/// with the static fetcher as backup when Chromium is preferred. A forced
/// static engine runs without a fallback — there is nothing simpler to
/// fall back to.
pub fn build_engines(
    config: &Config,
) -> Result<(Arc<dyn Engine>, Option<Arc<dyn Engine>>), EngineError> {
    match config.preferred_engine {
        EngineKind::Chromium => {
            let primary: Arc<dyn Engine> =
                Arc::new(chromium::ChromiumEngine::new(config.ready_selector.clone()));
            let fallback: Option<Arc<dyn Engine>> = match statichttp::StaticEngine::new() {
                Ok(engine) => Some(Arc::new(engine)),
                Err(e) => {
                    warn!("static fallback engine unavailable: {e}");
                    None
                }
            };
            Ok((primary, fallback))
        }
        EngineKind::Static => {
            let primary: Arc<dyn Engine> = Arc::new(statichttp::StaticEngine::new()?);
            Ok((primary, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        kind: EngineKind,
        available: bool,
    }

    struct FixedSession;

    #[async_trait]
    impl Session for FixedSession {
        async fn navigate(
            &mut self,
            _url: &str,
            _timeout: Duration,
        ) -> Result<PageDocument, EngineError> {
            Ok(PageDocument {
                html: "<html></html>".to_string(),
                final_url: "https://example.com/".to_string(),
                load_time_ms: 1,
            })
        }

        async fn close(self: Box<Self>) {}
    }

    #[async_trait]
    impl Engine for FixedEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn acquire(&self) -> Result<Box<dyn Session>, EngineError> {
            if self.available {
                Ok(Box::new(FixedSession))
            } else {
                Err(EngineError::Unavailable("down for test".to_string()))
            }
        }

        async fn shutdown(&self) {}
    }

    #[tokio::test]
    async fn test_primary_preferred_when_healthy() {
        let primary = FixedEngine {
            kind: EngineKind::Chromium,
            available: true,
        };
        let fallback = FixedEngine {
            kind: EngineKind::Static,
            available: true,
        };
        let acquired = acquire_with_fallback(&primary, Some(&fallback))
            .await
            .unwrap();
        assert_eq!(acquired.engine, EngineKind::Chromium);
        assert!(!acquired.fell_back);
    }

    #[tokio::test]
    async fn test_fallback_on_unavailable_primary() {
        let primary = FixedEngine {
            kind: EngineKind::Chromium,
            available: false,
        };
        let fallback = FixedEngine {
            kind: EngineKind::Static,
            available: true,
        };
        let acquired = acquire_with_fallback(&primary, Some(&fallback))
            .await
            .unwrap();
        assert_eq!(acquired.engine, EngineKind::Static);
        assert!(acquired.fell_back);
    }

    #[tokio::test]
    async fn test_both_engines_down() {
        let primary = FixedEngine {
            kind: EngineKind::Chromium,
            available: false,
        };
        let fallback = FixedEngine {
            kind: EngineKind::Static,
            available: false,
        };
        let err = acquire_with_fallback(&primary, Some(&fallback))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_no_fallback_configured() {
        let primary = FixedEngine {
            kind: EngineKind::Chromium,
            available: false,
        };
        let err = acquire_with_fallback(&primary, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
