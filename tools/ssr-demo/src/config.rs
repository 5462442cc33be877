//! Demo server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use ssr_core::RenderConfig;

use crate::app;

/// Demo server configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Render session defaults.
    #[serde(default)]
    pub render: RenderConfig,

    /// Delay before each line of the basic demo.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Lower bound of the async text delay.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound (exclusive) of the async text delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Abort a render session that runs longer than this.
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,

    /// 1-based index of an async text that rejects.
    #[serde(default)]
    pub fail_slot: Option<usize>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_chunk_delay_ms() -> u64 {
    1000
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            render: RenderConfig::default(),
            chunk_delay_ms: default_chunk_delay_ms(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            session_timeout_ms: None,
            fail_slot: None,
        }
    }
}

impl DemoConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(path, &content)
    }

    /// Parse config content, choosing the format by file extension.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(content).with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Reject settings the demo cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            bail!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        if let Some(n) = self.fail_slot {
            if !app::is_text_index(n) {
                bail!("fail_slot must be between 1 and {}, got {}", app::TEXTS.len(), n);
            }
        }
        Ok(())
    }

    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address: {}:{}", self.host, self.port))
    }

    /// Base URL printed in the banner.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Delay before each basic demo line.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    /// Session timeout, if configured.
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use ssr_core::{FailureMarkup, RenderMode};

    use super::*;

    #[test]
    fn test_defaults() {
        let config = DemoConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.chunk_delay(), Duration::from_secs(1));
        assert_eq!((config.min_delay_ms, config.max_delay_ms), (1000, 5000));
        assert_eq!(config.render.mode, RenderMode::Incremental);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = DemoConfig::parse(
            "ssr-demo.toml",
            r#"
port = 8080
session_timeout_ms = 2500
fail_slot = 3

[render]
mode = "buffered"
failure_markup = "show-error"
"#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.session_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.fail_slot, Some(3));
        assert_eq!(config.render.mode, RenderMode::Buffered);
        assert_eq!(config.render.failure_markup, FailureMarkup::ShowError);
        assert!(config.render.doctype);
    }

    #[test]
    fn test_parse_json_by_extension() {
        let config =
            DemoConfig::parse("demo.json", r#"{"min_delay_ms": 10, "max_delay_ms": 20}"#).unwrap();
        assert_eq!((config.min_delay_ms, config.max_delay_ms), (10, 20));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let config = DemoConfig {
            min_delay_ms: 50,
            max_delay_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fail_slot_out_of_range() {
        for fail_slot in [0, 6] {
            let config = DemoConfig {
                fail_slot: Some(fail_slot),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
        let config = DemoConfig {
            fail_slot: Some(5),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_addr() {
        let config = DemoConfig {
            host: "0.0.0.0".to_string(),
            port: 4000,
            ..Default::default()
        };
        assert_eq!(config.addr().unwrap().port(), 4000);
        assert_eq!(config.base_url(), "http://0.0.0.0:4000");
    }
}
