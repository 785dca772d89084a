mod adapters;
mod backend;
mod cache;
mod lookup;
mod normalize;
mod selector;
mod types;
mod ytdlp;

pub use backend::{Backend, BackendError};
pub use cache::{MemoryCache, ResultCache};
pub use lookup::LookupBackend;
pub use normalize::{normalize, CanonicalVideo};
#[cfg(test)]
pub use types::SizeHint;
pub use types::{
    Attempt, AttemptOutcome, FailureKind, FormatCandidate, FormatRecord, ResolutionResult,
};
pub use ytdlp::YtDlpBackend;

use crate::{config::Config, utils::truncate_detail};
use anyhow::{Context, Result};
use selector::select_progressive_mp4;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};

const ATTEMPT_DETAIL_LIMIT: usize = 300;

/// Drives the backends in priority order and caches what comes out.
pub struct Resolver {
    backends: Vec<Box<dyn Backend>>,
    cache: Arc<dyn ResultCache>,
}

impl Resolver {
    pub fn new(backends: Vec<Box<dyn Backend>>, cache: Arc<dyn ResultCache>) -> Self {
        Self { backends, cache }
    }

    /// Primary yt-dlp backend first, then the configured lookup providers.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let primary = YtDlpBackend::new(config.ytdlp.clone())
            .context("Failed to initialize yt-dlp backend")?;
        if !primary.test_availability().await {
            warn!("yt-dlp is unavailable; requests will rely on lookup providers");
        }

        let mut backends: Vec<Box<dyn Backend>> = vec![Box::new(primary)];

        if !config.lookup.providers.is_empty() {
            let client = reqwest::Client::builder()
                .build()
                .context("Failed to create HTTP client")?;
            if config.lookup.api_key.is_none() {
                warn!("No lookup API key configured; lookup providers will be skipped");
            }
            for spec in &config.lookup.providers {
                let timeout = config.lookup_timeout(spec);
                backends.push(Box::new(LookupBackend::new(
                    spec.clone(),
                    config.lookup.api_key.clone(),
                    timeout,
                    client.clone(),
                )));
            }
        }

        info!(
            "Resolver initialized with backends: {}",
            backends
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let cache = Arc::new(MemoryCache::new(config.cache.ttl()));
        Ok(Self::new(backends, cache))
    }

    /// Serves from the cache when possible, otherwise resolves and caches
    /// the outcome, failures included.
    pub async fn resolve(&self, video: &CanonicalVideo) -> ResolutionResult {
        if let Some(result) = self.cache.lookup(&video.url) {
            debug!("Cache hit for {}", video.url);
            return result;
        }

        let result = self.run_backends(video).await;
        self.cache.store(&video.url, result.clone());
        result
    }

    async fn run_backends(&self, video: &CanonicalVideo) -> ResolutionResult {
        info!("Resolving {}", video.url);
        let mut attempts = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            let started = Instant::now();
            let limit = backend.timeout();
            let outcome = match tokio::time::timeout(limit, backend.resolve(video)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(limit)),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let (outcome, detail) = match outcome {
                Ok(candidates) => {
                    let formats = select_progressive_mp4(&candidates);
                    if !formats.is_empty() {
                        info!(
                            "Resolved {} with {} ({} formats)",
                            video.url,
                            backend.name(),
                            formats.len()
                        );
                        attempts.push(Attempt {
                            provider: backend.name().to_string(),
                            outcome: AttemptOutcome::Selected,
                            detail: None,
                            elapsed_ms,
                        });
                        return ResolutionResult::Success {
                            provider: backend.name().to_string(),
                            formats,
                            attempts,
                        };
                    }
                    warn!(
                        "{} returned {} formats, none progressive mp4",
                        backend.name(),
                        candidates.len()
                    );
                    (
                        AttemptOutcome::NoQualifyingFormat,
                        Some(format!("{} candidates, none qualified", candidates.len())),
                    )
                }
                Err(e) => {
                    warn!("{} failed: {}", backend.name(), e);
                    (e.outcome(), Some(truncate_detail(&e.to_string(), ATTEMPT_DETAIL_LIMIT)))
                }
            };

            attempts.push(Attempt {
                provider: backend.name().to_string(),
                outcome,
                detail,
                elapsed_ms,
            });
        }

        exhausted(attempts)
    }
}

fn exhausted(attempts: Vec<Attempt>) -> ResolutionResult {
    let kind = if !attempts.is_empty()
        && attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NoQualifyingFormat)
    {
        FailureKind::NoProgressiveMp4
    } else {
        FailureKind::AllProvidersFailed
    };

    let detail = if attempts.is_empty() {
        "no backends configured".to_string()
    } else {
        attempts
            .iter()
            .map(|a| match &a.detail {
                Some(detail) => format!("{}: {}", a.provider, detail),
                None => a.provider.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    };

    ResolutionResult::Failure {
        kind,
        detail,
        attempts,
    }
}
