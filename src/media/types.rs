use serde::{Deserialize, Serialize};

/// A size value as providers report it: integer bytes, a float estimate
/// (yt-dlp's `filesize_approx`) or a numeric string (`contentLength`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeHint {
    Bytes(u64),
    Approx(f64),
    Text(String),
    Other(serde_json::Value),
}

impl SizeHint {
    /// Coerces the hint to a byte count. Anything that is not a
    /// non-negative finite number yields `None`.
    pub fn to_bytes(&self) -> Option<u64> {
        match self {
            Self::Bytes(n) => Some(*n),
            Self::Approx(f) if f.is_finite() && *f >= 0.0 => Some(f.round() as u64),
            Self::Approx(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f.round() as u64)
                })
            }
            Self::Other(_) => None,
        }
    }
}

/// Provider-neutral description of one stream before selection.
///
/// Adapters fill in whatever their provider reports; the selector decides
/// whether the candidate is a progressive MP4.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatCandidate {
    pub ext: Option<String>,
    pub mime_type: Option<String>,
    /// Codec name, `"none"` when the provider says the track is absent.
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Explicit track-presence flags for providers that report them.
    pub has_video: Option<bool>,
    pub has_audio: Option<bool>,
    pub quality_label: Option<String>,
    pub height: Option<u32>,
    pub content_length: Option<SizeHint>,
    pub filesize: Option<SizeHint>,
    pub filesize_approx: Option<SizeHint>,
    pub url: Option<String>,
}

/// One directly playable progressive MP4 stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatRecord {
    pub label: String,
    #[serde(rename = "ext")]
    pub extension: String,
    #[serde(rename = "filesize")]
    pub size_bytes: Option<u64>,
    pub url: String,
}

/// How a single backend attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Selected,
    NoQualifyingFormat,
    Timeout,
    UpstreamError,
    MalformedResponse,
    NotConfigured,
    UnsupportedInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Every backend answered but none offered a progressive MP4.
    NoProgressiveMp4,
    AllProvidersFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoProgressiveMp4 => "no-progressive-mp4",
            Self::AllProvidersFailed => "all-providers-failed",
        }
    }
}

/// Outcome of resolving one canonical URL. Both variants are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    Success {
        provider: String,
        /// Non-empty, descending by rank, unique by label.
        formats: Vec<FormatRecord>,
        attempts: Vec<Attempt>,
    },
    Failure {
        kind: FailureKind,
        detail: String,
        attempts: Vec<Attempt>,
    },
}

impl ResolutionResult {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_hint_coercion() {
        assert_eq!(SizeHint::Bytes(42).to_bytes(), Some(42));
        assert_eq!(SizeHint::Approx(1234.6).to_bytes(), Some(1235));
        assert_eq!(SizeHint::Approx(-1.0).to_bytes(), None);
        assert_eq!(SizeHint::Approx(f64::NAN).to_bytes(), None);
        assert_eq!(SizeHint::Text("12345678".into()).to_bytes(), Some(12345678));
        assert_eq!(SizeHint::Text(" 99.4 ".into()).to_bytes(), Some(99));
        assert_eq!(SizeHint::Text("big".into()).to_bytes(), None);
        assert_eq!(SizeHint::Other(serde_json::json!({"a": 1})).to_bytes(), None);
    }

    #[test]
    fn test_size_hint_deserialize() {
        let hints: Vec<SizeHint> =
            serde_json::from_str(r#"[10, 10.5, "11", true, null]"#).unwrap();
        assert_eq!(hints[0], SizeHint::Bytes(10));
        assert_eq!(hints[1], SizeHint::Approx(10.5));
        assert_eq!(hints[2], SizeHint::Text("11".into()));
        assert_eq!(hints[3].to_bytes(), None);
        assert_eq!(hints[4].to_bytes(), None);
    }

    #[test]
    fn test_format_record_wire_names() {
        let record = FormatRecord {
            label: "720p".into(),
            extension: "mp4".into(),
            size_bytes: None,
            url: "https://example.com/v.mp4".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ext"], "mp4");
        assert!(json["filesize"].is_null());
        assert_eq!(json["label"], "720p");
    }
}
