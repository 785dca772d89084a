use super::{normalize::CanonicalVideo, types::AttemptOutcome, types::FormatCandidate};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
}

impl BackendError {
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Timeout(_) => AttemptOutcome::Timeout,
            Self::Upstream(_) => AttemptOutcome::UpstreamError,
            Self::MalformedResponse(_) => AttemptOutcome::MalformedResponse,
            Self::NotConfigured(_) => AttemptOutcome::NotConfigured,
            Self::UnsupportedInput(_) => AttemptOutcome::UnsupportedInput,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Provider name reported in responses and diagnostics
    fn name(&self) -> &str;

    /// Upper bound the orchestrator allows a single `resolve` call
    fn timeout(&self) -> Duration;

    /// Fetch raw format candidates for the given video
    async fn resolve(&self, video: &CanonicalVideo) -> Result<Vec<FormatCandidate>, BackendError>;
}
