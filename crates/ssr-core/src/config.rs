//! Render session configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RenderError;

/// Default markup for a slot whose computation failed.
pub const DEFAULT_ERROR_MARKUP: &str = r#"<p class="slot-error">Failed to load</p>"#;

/// How a render session turns pending slots into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Wait for every slot, then return the whole document at once.
    Eager,
    /// Open the response, write nothing until every slot settles, then
    /// write the substituted document in one pass.
    Buffered,
    /// Shell first, then one patch per slot in settlement order.
    #[default]
    Incremental,
    /// Shell with fallbacks as final content; no computation is started.
    FallbackOnly,
}

impl RenderMode {
    /// Stable name used in config files and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Buffered => "buffered",
            Self::Incremental => "incremental",
            Self::FallbackOnly => "fallback-only",
        }
    }

    /// Whether the shell is flushed before slots settle.
    pub fn streams_patches(&self) -> bool {
        matches!(self, Self::Incremental)
    }

    /// Whether output is held back until every slot has settled.
    pub fn waits_for_all(&self) -> bool {
        matches!(self, Self::Eager | Self::Buffered)
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" | "renderToString" => Ok(Self::Eager),
            "buffered" | "renderToStaticNodeStream" => Ok(Self::Buffered),
            "incremental" | "renderToPipeableStream" => Ok(Self::Incremental),
            "fallback-only" | "fallbackOnly" => Ok(Self::FallbackOnly),
            other => Err(RenderError::Config(format!("unknown render mode '{}'", other))),
        }
    }
}

/// Markup used as final content for a slot whose computation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMarkup {
    /// Use `RenderConfig::fallback_error_markup`.
    #[default]
    ErrorMarkup,
    /// Show the escaped error message in an error container.
    ShowError,
    /// Keep the node's fallback as its final content.
    KeepFallback,
}

/// Configuration for one render session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Rendering strategy.
    #[serde(default)]
    pub mode: RenderMode,
    /// Markup patched in for a failed slot.
    #[serde(default = "default_error_markup")]
    pub fallback_error_markup: String,
    /// Which markup a failed slot ends up with.
    #[serde(default)]
    pub failure_markup: FailureMarkup,
    /// Prefix the output with `<!DOCTYPE html>`.
    #[serde(default = "default_true")]
    pub doctype: bool,
}

fn default_error_markup() -> String {
    DEFAULT_ERROR_MARKUP.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            fallback_error_markup: default_error_markup(),
            failure_markup: FailureMarkup::default(),
            doctype: true,
        }
    }
}

impl RenderConfig {
    /// Create a configuration for the given mode.
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set the render mode.
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the markup used for failed slots.
    pub fn with_error_markup(mut self, markup: impl Into<String>) -> Self {
        self.fallback_error_markup = markup.into();
        self
    }

    /// Set the failure markup policy.
    pub fn with_failure_markup(mut self, policy: FailureMarkup) -> Self {
        self.failure_markup = policy;
        self
    }

    /// Omit the doctype prefix.
    pub fn without_doctype(mut self) -> Self {
        self.doctype = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str_accepts_endpoint_names() {
        assert_eq!("renderToString".parse::<RenderMode>().unwrap(), RenderMode::Eager);
        assert_eq!(
            "renderToStaticNodeStream".parse::<RenderMode>().unwrap(),
            RenderMode::Buffered
        );
        assert_eq!(
            "renderToPipeableStream".parse::<RenderMode>().unwrap(),
            RenderMode::Incremental
        );
        assert_eq!("fallback-only".parse::<RenderMode>().unwrap(), RenderMode::FallbackOnly);
        assert!("chunked".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_mode_predicates() {
        assert!(RenderMode::Incremental.streams_patches());
        assert!(!RenderMode::Buffered.streams_patches());
        assert!(RenderMode::Eager.waits_for_all());
        assert!(RenderMode::Buffered.waits_for_all());
        assert!(!RenderMode::FallbackOnly.waits_for_all());
    }

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config: RenderConfig = toml::from_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.mode, RenderMode::Incremental);
        assert_eq!(config.fallback_error_markup, DEFAULT_ERROR_MARKUP);
    }

    #[test]
    fn test_config_json_roundtrip_uses_kebab_case() {
        let config = RenderConfig::new(RenderMode::FallbackOnly)
            .with_failure_markup(FailureMarkup::ShowError);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""mode":"fallback-only""#));
        assert!(json.contains(r#""failure_markup":"show-error""#));
    }
}
