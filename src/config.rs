use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout; 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            backend_url: default_backend_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_prefix() -> String {
    "/api".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_automation_secs")]
    pub automation_status_secs: u64,
    #[serde(default = "default_market_secs")]
    pub market_data_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            automation_status_secs: default_automation_secs(),
            market_data_secs: default_market_secs(),
        }
    }
}

fn default_automation_secs() -> u64 {
    30
}
fn default_market_secs() -> u64 {
    60
}

impl Config {
    /// Defaults used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            api: ApiConfig {
                base_url: default_backend_url(),
                timeout_secs: 0,
                user_agent: None,
            },
            proxy: ProxyConfig::default(),
            polling: PollingConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }

    /// Applies `AOS_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("AOS_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = get("AOS_BACKEND_URL") {
            self.proxy.backend_url = v;
        }
        if let Some(v) = get("AOS_PROXY_BIND") {
            self.proxy.bind = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;
        validate_url("proxy.backend_url", &self.proxy.backend_url)?;

        if !self.proxy.prefix.starts_with('/') {
            anyhow::bail!("proxy.prefix must start with '/'");
        }

        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be > 0");
        }

        if self.refresh.automation_status_secs == 0 || self.refresh.market_data_secs == 0 {
            anyhow::bail!("refresh intervals must be > 0");
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value)
        .with_context(|| format!("{} is not a valid URL: {}", field, value))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{} must use http or https, got '{}'", field, other),
    }
}

/// Loads, overrides from the environment, and validates the config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.apply_env();
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[api]
base_url = "https://api.example.com"
"#,
        )
        .unwrap();
        assert_eq!(cfg.polling.interval_ms, 2000);
        assert_eq!(cfg.refresh.automation_status_secs, 30);
        assert_eq!(cfg.refresh.market_data_secs, 60);
        assert_eq!(cfg.proxy.prefix, "/api");
        assert!(cfg.api.timeout().is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_interval() {
        let mut cfg = Config::minimal();
        cfg.polling.interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_http_backend() {
        let mut cfg = Config::minimal();
        cfg.proxy.backend_url = "ftp://backend".into();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"), "{}", err);
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("AOS_API_BASE_URL", "https://api.analyst.test"),
            ("AOS_PROXY_BIND", "0.0.0.0:9999"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::minimal();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api.base_url, "https://api.analyst.test");
        assert_eq!(cfg.proxy.bind, "0.0.0.0:9999");
        assert_eq!(cfg.proxy.backend_url, "http://localhost:8000");
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("aos.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "http://127.0.0.1:8000"
timeout_secs = 10

[polling]
interval_ms = 500
"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.api.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.polling.interval_ms, 500);
    }
}
