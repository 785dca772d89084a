use super::{
    backend::{Backend, BackendError},
    normalize::CanonicalVideo,
    types::{FormatCandidate, SizeHint},
};
use crate::{config::YtDlpConfig, utils::truncate_detail};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::Stdio,
    time::Duration,
};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Subset of `yt-dlp --dump-single-json` output the selector needs.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    formats: Option<Vec<YtDlpFormat>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    format_note: Option<String>,
    height: Option<f64>,
    filesize: Option<SizeHint>,
    filesize_approx: Option<SizeHint>,
    url: Option<String>,
}

impl From<YtDlpFormat> for FormatCandidate {
    fn from(format: YtDlpFormat) -> Self {
        Self {
            ext: format.ext,
            vcodec: format.vcodec,
            acodec: format.acodec,
            quality_label: format.format_note,
            height: format
                .height
                .filter(|h| h.is_finite() && *h > 0.0)
                .map(|h| h as u32),
            filesize: format.filesize,
            filesize_approx: format.filesize_approx,
            url: format.url,
            ..Default::default()
        }
    }
}

fn parse_dump(stdout: &[u8]) -> Result<Vec<FormatCandidate>, BackendError> {
    let info: YtDlpInfo = serde_json::from_slice(stdout)
        .map_err(|e| BackendError::MalformedResponse(format!("yt-dlp output: {e}")))?;
    Ok(info
        .formats
        .unwrap_or_default()
        .into_iter()
        .map(FormatCandidate::from)
        .collect())
}

/// Where yt-dlp reads cookies from, if anywhere.
enum CookieSource {
    None,
    /// Payload materialized at startup; removed when the backend drops.
    Temp(NamedTempFile),
    Path(PathBuf),
}

pub struct YtDlpBackend {
    config: YtDlpConfig,
    cookies: CookieSource,
}

impl YtDlpBackend {
    pub fn new(config: YtDlpConfig) -> Result<Self> {
        let cookies = match (&config.cookies, &config.cookies_file) {
            (Some(payload), _) => {
                let mut file = NamedTempFile::new().context("Failed to create cookie file")?;
                file.write_all(payload.as_bytes())
                    .context("Failed to write cookie file")?;
                file.flush().context("Failed to write cookie file")?;
                info!("Using configured session cookies for yt-dlp");
                CookieSource::Temp(file)
            }
            (None, Some(path)) => CookieSource::Path(path.clone()),
            (None, None) => CookieSource::None,
        };
        Ok(Self { config, cookies })
    }

    fn cookie_path(&self) -> Option<&std::path::Path> {
        match &self.cookies {
            CookieSource::None => None,
            CookieSource::Temp(file) => Some(file.path()),
            CookieSource::Path(path) => Some(path),
        }
    }

    fn args(&self, url: &str) -> Vec<String> {
        let retries = self.config.retries.to_string();
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--no-playlist",
            "--skip-download",
            "--no-warnings",
            "--quiet",
            "--force-ipv4",
            "--geo-bypass",
            "--concurrent-fragments",
            "1",
            "--retries",
            retries.as_str(),
            "--fragment-retries",
            retries.as_str(),
            "--user-agent",
            self.config.user_agent.as_str(),
            "--add-header",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("Accept-Language:{}", self.config.accept_language));

        if !self.config.player_clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!(
                "youtube:player_client={}",
                self.config.player_clients.join(",")
            ));
        }
        if let Some(path) = self.cookie_path() {
            args.push("--cookies".to_string());
            args.push(path.display().to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    pub async fn test_availability(&self) -> bool {
        match Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(output) => {
                warn!("yt-dlp --version exited with {}", output.status);
                false
            }
            Err(e) => {
                warn!("yt-dlp not found at {}: {}", self.config.binary, e);
                false
            }
        }
    }
}

#[async_trait]
impl Backend for YtDlpBackend {
    fn name(&self) -> &str {
        "primary"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn resolve(&self, video: &CanonicalVideo) -> Result<Vec<FormatCandidate>, BackendError> {
        debug!("Extracting formats with yt-dlp for: {}", video.url);

        let output = Command::new(&self.config.binary)
            .args(self.args(&video.url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    BackendError::NotConfigured(format!("{} not found", self.config.binary))
                }
                _ => BackendError::Upstream(format!("failed to run yt-dlp: {e}")),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Upstream(truncate_detail(&stderr, 500)));
        }

        debug!("yt-dlp returned {} bytes of JSON", output.stdout.len());
        parse_dump(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::selector::select_progressive_mp4;

    const DUMP: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "formats": [
            {
                "format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
                "format_note": "1080p", "height": 1080, "filesize": 80000000,
                "url": "https://rr.example/137", "protocol": "https"
            },
            {
                "format_id": "22", "ext": "mp4", "vcodec": "avc1.64001F", "acodec": "mp4a.40.2",
                "format_note": "720p", "height": 720, "filesize": 12345678,
                "url": "https://rr.example/22"
            },
            {
                "format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
                "format_note": null, "height": 360, "filesize": null, "filesize_approx": 5000000.7,
                "url": "https://rr.example/18"
            },
            {
                "format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none",
                "format_note": "storyboard"
            }
        ]
    }"#;

    fn backend(config: YtDlpConfig) -> YtDlpBackend {
        YtDlpBackend::new(config).unwrap()
    }

    #[test]
    fn test_parse_dump() {
        let candidates = parse_dump(DUMP.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 4);

        let selected = select_progressive_mp4(&candidates);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].label, "720p");
        assert_eq!(selected[0].size_bytes, Some(12345678));
        assert_eq!(selected[1].label, "360p");
        assert_eq!(selected[1].size_bytes, Some(5000001));
    }

    #[test]
    fn test_parse_dump_without_formats() {
        assert!(parse_dump(br#"{"id": "x", "formats": null}"#).unwrap().is_empty());
        assert!(parse_dump(br#"{"id": "x"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_dump_garbage() {
        let err = parse_dump(b"ERROR: something").unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn test_args() {
        let args = backend(YtDlpConfig::default()).args("https://www.youtube.com/watch?v=abcdef");
        for flag in [
            "--dump-single-json",
            "--no-playlist",
            "--skip-download",
            "--force-ipv4",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert!(args.contains(&"youtube:player_client=android,web".to_string()));
        assert!(args.contains(&"Accept-Language:en-US,en;q=0.9".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abcdef");
    }

    #[test]
    fn test_cookie_payload_written_to_temp_file() {
        let payload = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n";
        let backend = backend(YtDlpConfig {
            cookies: Some(payload.to_string()),
            ..Default::default()
        });
        let path = backend.cookie_path().unwrap().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), payload);

        let args = backend.args("https://www.youtube.com/watch?v=abcdef");
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], path.display().to_string());

        drop(backend);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_configured() {
        let backend = backend(YtDlpConfig {
            binary: "/nonexistent/yt-dlp".to_string(),
            ..Default::default()
        });
        let video = CanonicalVideo {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            id: Some("dQw4w9WgXcQ".into()),
        };
        let err = backend.resolve(&video).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
        assert!(!backend.test_availability().await);
    }

    #[tokio::test]
    #[ignore] // Requires yt-dlp and network access
    async fn test_resolve_real_video() {
        let backend = backend(YtDlpConfig::default());
        let video = CanonicalVideo {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            id: Some("dQw4w9WgXcQ".into()),
        };
        let candidates = backend.resolve(&video).await.unwrap();
        assert!(!select_progressive_mp4(&candidates).is_empty());
    }
}
