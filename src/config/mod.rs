use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

pub const SERVICE_NAME: &str = "ytmux-api";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub ytdlp: YtDlpConfig,
    pub lookup: LookupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` or a single origin
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 900 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    pub binary: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub user_agent: String,
    pub accept_language: String,
    /// Extractor client profiles, tried by yt-dlp in this order
    pub player_clients: Vec<String>,
    /// Netscape cookie-file contents
    pub cookies: Option<String>,
    pub cookies_file: Option<PathBuf>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            timeout_secs: 25,
            retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            player_clients: vec!["android".to_string(), "web".to_string()],
            cookies: None,
            cookies_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Credential shared by every third-party provider
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub providers: Vec<BackendSpec>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: 12,
            providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseShape {
    StreamingData,
    DirectLink,
}

/// One third-party lookup provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendSpec {
    pub name: String,
    pub host: String,
    /// Request path, `{id}` is replaced with the video id
    pub path: String,
    /// Query parameter carrying the video id
    #[serde(default)]
    pub id_param: Option<String>,
    #[serde(default = "default_credential_header")]
    pub credential_header: String,
    pub shape: ResponseShape,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_credential_header() -> String {
    "X-RapidAPI-Key".to_string()
}

impl BackendSpec {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("provider name must not be empty");
        }
        if self.host.trim().is_empty() || self.host.contains('/') {
            bail!("provider {} has an invalid host {:?}", self.name, self.host);
        }
        if !self.path.contains("{id}") && self.id_param.is_none() {
            bail!(
                "provider {} must reference the video id via {{id}} in path or id_param",
                self.name
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    /// Loads the file (if any), applies process environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| {
            env.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got {port:?}"))?;
        }
        if let Some(host) = get("HOST") {
            self.server.host = host.to_string();
        }
        if let Some(origin) = get("CORS_ORIGIN") {
            self.server.cors_origin = origin.to_string();
        }
        if let Some(key) = get("RAPIDAPI_KEY") {
            self.lookup.api_key = Some(key.to_string());
        }
        if let Some(binary) = get("YTDLP_BIN") {
            self.ytdlp.binary = binary.to_string();
        }
        // Cookie payloads are multi-line; keep them untrimmed.
        if let Some(cookies) = env.get("YTDLP_COOKIES").filter(|v| !v.trim().is_empty()) {
            self.ytdlp.cookies = Some(cookies.clone());
        }
        if let Some(ttl) = get("CACHE_TTL_SECS") {
            self.cache.ttl_secs = ttl
                .parse()
                .with_context(|| format!("CACHE_TTL_SECS must be a number, got {ttl:?}"))?;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => bail!("LOG_FORMAT must be json or text, got {other:?}"),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than zero");
        }
        if self.ytdlp.timeout_secs == 0 || self.lookup.timeout_secs == 0 {
            bail!("backend timeouts must be greater than zero");
        }
        if self.ytdlp.cookies.is_some() && self.ytdlp.cookies_file.is_some() {
            bail!("set either ytdlp.cookies or ytdlp.cookies_file, not both");
        }
        for provider in &self.lookup.providers {
            provider.validate()?;
        }
        Ok(())
    }

    pub fn lookup_timeout(&self, spec: &BackendSpec) -> Duration {
        Duration::from_secs(spec.timeout_secs.unwrap_or(self.lookup.timeout_secs))
    }
}
