use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the Marzban panel, e.g. "https://panel.example.com:8000".
    pub upstream_url: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
}

fn default_verify_tls() -> bool {
    true
}

fn default_listen_port() -> u16 {
    8080
}

fn default_upstream_timeout() -> u64 {
    30
}

impl RelayConfig {
    pub fn load() -> Result<Self> {
        // Try to load from /etc/marzgate/relay.toml first
        let config_paths = vec!["/etc/marzgate/relay.toml", "./relay.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return Ok(toml::from_str(&contents)?);
            }
        }

        // Fallback to environment variables
        tracing::info!("Loading config from environment");
        Ok(Self {
            upstream_url: std::env::var("MARZBAN_URL")?,
            verify_tls: std::env::var("MARZBAN_VERIFY_SSL")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            listen_port: std::env::var("LISTEN_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_listen_port),
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or_else(default_upstream_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_apply_to_omitted_fields() {
        let config: RelayConfig =
            toml::from_str(r#"upstream_url = "https://panel.example.com:8000""#).unwrap();
        assert_eq!(config.upstream_url, "https://panel.example.com:8000");
        assert!(config.verify_tls);
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.upstream_timeout_secs, 30);
    }

    #[test]
    fn toml_overrides_are_respected() {
        let config: RelayConfig = toml::from_str(
            r#"
            upstream_url = "http://127.0.0.1:8000"
            verify_tls = false
            listen_port = 9090
            upstream_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert!(!config.verify_tls);
        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.upstream_timeout_secs, 5);
    }
}
