//! Markup for slots whose computation failed.

use ssr_core::{FailureMarkup, RenderConfig};
use ssr_streaming::escape_html;

/// Final markup for a failed slot.
pub fn failure_markup(config: &RenderConfig, fallback: &str, error: &anyhow::Error) -> String {
    match config.failure_markup {
        FailureMarkup::ErrorMarkup => config.fallback_error_markup.clone(),
        FailureMarkup::ShowError => format!(
            r#"<div class="slot-error">Failed to load: {}</div>"#,
            escape_html(&format!("{:#}", error))
        ),
        FailureMarkup::KeepFallback => fallback.to_string(),
    }
}
