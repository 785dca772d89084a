//! Turns user-supplied video tokens into one canonical watch URL.

use thiserror::Error;
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const MIN_ID_LEN: usize = 6;

const SHORT_LINK_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];
const CANONICAL_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];
/// Path prefixes on canonical hosts whose next segment is the id.
const ID_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("bad-video-id")]
    BadVideoId,
}

/// The cache key and backend argument for one video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalVideo {
    pub url: String,
    /// Bare id, absent for URLs passed through from unrecognized hosts.
    pub id: Option<String>,
}

impl CanonicalVideo {
    fn from_id(id: &str) -> Self {
        Self {
            url: format!("{WATCH_URL}{id}"),
            id: Some(id.to_string()),
        }
    }
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() >= MIN_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn normalize(raw: Option<&str>) -> Result<CanonicalVideo, NormalizeError> {
    let token = raw.map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(NormalizeError::BadVideoId);
    }

    if has_http_scheme(token) {
        return normalize_url(token);
    }

    if is_valid_id(token) {
        Ok(CanonicalVideo::from_id(token))
    } else {
        Err(NormalizeError::BadVideoId)
    }
}

fn has_http_scheme(token: &str) -> bool {
    let lower = token.get(..8).unwrap_or(token).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn normalize_url(token: &str) -> Result<CanonicalVideo, NormalizeError> {
    let url = Url::parse(token).map_err(|_| NormalizeError::BadVideoId)?;
    let host = url
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or(NormalizeError::BadVideoId)?;

    if SHORT_LINK_HOSTS.contains(&host.as_str()) {
        let id = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .unwrap_or_default();
        return valid_id(id);
    }

    if CANONICAL_HOSTS.contains(&host.as_str()) {
        if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
            return valid_id(&id);
        }
        let mut segments = url.path_segments().into_iter().flatten();
        if let (Some(prefix), Some(id)) = (segments.next(), segments.next()) {
            if ID_PATH_PREFIXES.contains(&prefix) {
                return valid_id(id);
            }
        }
        // Known host without a usable id, e.g. a feed or channel page.
        return Err(NormalizeError::BadVideoId);
    }

    // Unknown host: hand the token to the extraction engine as written.
    Ok(CanonicalVideo {
        url: token.to_string(),
        id: None,
    })
}

fn valid_id(id: &str) -> Result<CanonicalVideo, NormalizeError> {
    if is_valid_id(id) {
        Ok(CanonicalVideo::from_id(id))
    } else {
        Err(NormalizeError::BadVideoId)
    }
}
