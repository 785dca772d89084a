use super::{
    adapters,
    backend::{Backend, BackendError},
    normalize::CanonicalVideo,
    types::FormatCandidate,
};
use crate::{config::BackendSpec, utils::truncate_detail};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Third-party lookup service described by a [`BackendSpec`].
pub struct LookupBackend {
    spec: BackendSpec,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
    scheme: &'static str,
}

impl LookupBackend {
    pub fn new(
        spec: BackendSpec,
        api_key: Option<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            spec,
            api_key,
            timeout,
            client,
            scheme: "https",
        }
    }

    #[cfg(test)]
    fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    fn request_url(&self, id: &str) -> Result<Url, BackendError> {
        let encoded_id: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let path = self.spec.path.replace("{id}", &encoded_id);
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };

        let mut url = Url::parse(&format!("{}://{}{}", self.scheme, self.spec.host, path))
            .map_err(|e| BackendError::NotConfigured(format!("bad request template: {e}")))?;
        if let Some(param) = &self.spec.id_param {
            url.query_pairs_mut().append_pair(param, id);
        }
        Ok(url)
    }
}

#[async_trait]
impl Backend for LookupBackend {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn resolve(&self, video: &CanonicalVideo) -> Result<Vec<FormatCandidate>, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("no API key configured".to_string()))?;
        let id = video.id.as_deref().ok_or_else(|| {
            BackendError::UnsupportedInput(format!("{} has no bare video id", video.url))
        })?;

        let url = self.request_url(id)?;
        debug!("Querying {} for {}", self.spec.name, id);

        let response = self
            .client
            .get(url)
            .header(self.spec.credential_header.as_str(), api_key)
            .header("X-RapidAPI-Host", self.spec.host.as_str())
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(BackendError::Upstream(format!(
                "HTTP {}: {}",
                status,
                truncate_detail(&String::from_utf8_lossy(&body), 200)
            )));
        }

        debug!("{} returned {} bytes", self.spec.name, body.len());
        adapters::adapt(self.spec.shape, &body)
    }
}
