use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default remote documentation API
pub const DEFAULT_API_BASE_URL: &str = "https://context7.com/api";
/// Default knowledge base directory, relative to the working directory
pub const DEFAULT_KNOWLEDGE_BASE_DIR: &str = ".kms/context7/km-base";
/// Ceiling for a single git invocation
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runtime configuration, resolved once at startup and passed down explicitly
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub knowledge_base_dir: PathBuf,
    pub proxy: ProxyConfig,
    pub git_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            knowledge_base_dir: PathBuf::from(DEFAULT_KNOWLEDGE_BASE_DIR),
            proxy: ProxyConfig::default(),
            git_timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            api_base_url = %self.api_base_url,
            knowledge_base_dir = %self.knowledge_base_dir.display(),
            git_timeout_secs = self.git_timeout.as_secs(),
            http_proxy = self.proxy.http.is_some(),
            https_proxy = self.proxy.https.is_some(),
            "Loaded config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Outbound proxy settings shared by the HTTP client and git subprocesses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Environment variables to set on a git subprocess, both-case variants
    pub fn git_env(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(http) = self.http.as_deref().filter(|p| !p.is_empty()) {
            env.push(("http_proxy", http.to_string()));
            env.push(("HTTP_PROXY", http.to_string()));
        }
        if let Some(https) = self.https.as_deref().filter(|p| !p.is_empty()) {
            env.push(("https_proxy", https.to_string()));
            env.push(("HTTPS_PROXY", https.to_string()));
        }
        env
    }

    /// Apply the proxies to an HTTP client builder.
    ///
    /// Environment proxies are disabled so that only this configuration decides
    /// the network path.
    pub fn apply(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        let mut builder = builder.no_proxy();
        if let Some(http) = self.http.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::http(http)
                .with_context(|| format!("Invalid HTTP proxy URL: {http}"))?;
            builder = builder.proxy(proxy);
        }
        if let Some(https) = self.https.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::https(https)
                .with_context(|| format!("Invalid HTTPS proxy URL: {https}"))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}
