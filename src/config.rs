use crate::paths::AppPaths;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://hypnotube.com/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 25;
const DEFAULT_DELAY_MS: u64 = 350;
const MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_MAX_PAGES: usize = 500;
const MAX_MAX_PAGES: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Site root; also sent as the referer for media requests.
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum gap between two requests made by the HTTP fetcher.
    pub delay_ms: u64,
    pub max_pages: usize,
    pub fetch_comments: bool,
    /// Raw Cookie header or a path to a file holding one.
    pub auth_cookie: Option<String>,
    pub username: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            delay_ms: DEFAULT_DELAY_MS,
            max_pages: DEFAULT_MAX_PAGES,
            fetch_comments: true,
            auth_cookie: None,
            username: None,
        }
    }
}

impl ExtractorConfig {
    pub fn normalized(mut self) -> Result<Self> {
        let trimmed = self.base_url.trim();
        let mut base = Url::parse(trimmed)
            .map_err(|_| EngineError::Config(format!("invalid base_url: {trimmed}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(EngineError::Config(format!(
                "base_url must be an http(s) URL with a host: {trimmed}"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        self.base_url = base.to_string();

        if self.user_agent.trim().is_empty() {
            self.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        self.timeout_secs = self.timeout_secs.max(1);
        self.delay_ms = self.delay_ms.min(MAX_DELAY_MS);
        self.max_pages = self.max_pages.clamp(1, MAX_MAX_PAGES);
        self.auth_cookie = self
            .auth_cookie
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        self.username = self
            .username
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(self)
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|_| EngineError::Config(format!("invalid base_url: {}", self.base_url)))
    }
}

pub fn load_extractor_config(paths: &AppPaths) -> Result<ExtractorConfig> {
    let path = paths.extractor_config_path();
    if !path.exists() {
        return ExtractorConfig::default().normalized();
    }
    let bytes = std::fs::read(&path)?;
    let parsed: ExtractorConfig = serde_json::from_slice(&bytes).map_err(|e| {
        EngineError::Config(format!(
            "failed to parse extractor config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    parsed.normalized()
}

pub fn save_extractor_config(paths: &AppPaths, config: &ExtractorConfig) -> Result<()> {
    let path = paths.extractor_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_password(paths: &AppPaths, password: &str) -> Result<()> {
    write_secret(&paths.password_path(), password)
}

pub fn read_password(paths: &AppPaths) -> Result<Option<String>> {
    let path = paths.password_path();
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

pub fn clear_password(paths: &AppPaths) -> Result<()> {
    let path = paths.password_path();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn write_secret(path: &Path, secret: &str) -> Result<()> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(EngineError::Config("password is empty".to_string()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{secret}\n"))?;
    Ok(())
}
