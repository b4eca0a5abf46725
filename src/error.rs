//! Error taxonomy for the scrape pipeline.
//!
//! Every scheduler-internal error is contained within its cycle; only the
//! API layer's responses are user-visible.

use std::time::Duration;

/// Failures from the browser-automation layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be initialized or could not hand out a session
    /// (binary missing, driver crash). Triggers the fallback engine.
    #[error("automation engine unavailable: {0}")]
    Unavailable(String),

    /// Navigation did not complete within the caller-supplied deadline.
    /// The session must be discarded, not reused.
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    /// Navigation failed outright (DNS, connection refused, bad status).
    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// Failures from the extractor.
///
/// A structurally valid page with zero events is NOT an error — it yields
/// an empty record set.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The expected container structure was absent — the upstream layout
    /// has likely changed. Worth a debug artifact and operator attention.
    #[error("page structure did not match the expected layout")]
    SchemaMismatch,

    /// Containers matched but no row could be parsed into a record.
    #[error("matched {matched} rows but none parsed cleanly")]
    ParseFailure { matched: usize },
}

/// A scrape cycle's terminal error. Always contained: the scheduler logs
/// it, captures an artifact where warranted, and waits for the next tick.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("extraction exceeded its budget of {0:?}")]
    ExtractionTimeout(Duration),

    #[error("extraction task failed: {0}")]
    Internal(String),
}

impl CycleError {
    /// Whether the failing cycle's page document is worth persisting as a
    /// debug artifact (layout drift and unparseable content are; pure
    /// engine/timeout failures have no meaningful document to keep).
    pub fn wants_page_artifact(&self) -> bool {
        matches!(self, CycleError::Extract(_))
    }

    /// Short machine-readable label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            CycleError::Engine(EngineError::Unavailable(_)) => "engine_unavailable",
            CycleError::Engine(EngineError::NavigationTimeout(_)) => "navigation_timeout",
            CycleError::Engine(EngineError::Navigation(_)) => "navigation_failed",
            CycleError::Extract(ExtractError::SchemaMismatch) => "schema_mismatch",
            CycleError::Extract(ExtractError::ParseFailure { .. }) => "parse_failure",
            CycleError::ExtractionTimeout(_) => "extraction_timeout",
            CycleError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_policy() {
        assert!(CycleError::Extract(ExtractError::SchemaMismatch).wants_page_artifact());
        assert!(
            CycleError::Extract(ExtractError::ParseFailure { matched: 4 }).wants_page_artifact()
        );
        assert!(!CycleError::Engine(EngineError::NavigationTimeout(
            Duration::from_secs(30)
        ))
        .wants_page_artifact());
    }

    #[test]
    fn test_labels() {
        let e = CycleError::Engine(EngineError::Unavailable("no chromium".into()));
        assert_eq!(e.label(), "engine_unavailable");
        let e = CycleError::Extract(ExtractError::SchemaMismatch);
        assert_eq!(e.label(), "schema_mismatch");
    }
}
