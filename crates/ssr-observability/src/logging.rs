//! Request-scoped structured log lines.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use ssr_core::{RenderMode, RequestId};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// How lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// `[LEVEL] message (Nus) mode=.. | key=value ..`
    Human,
}

#[derive(Serialize)]
struct Record<'a> {
    level: LogLevel,
    message: &'a str,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    route: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<RenderMode>,
    #[serde(flatten)]
    fields: &'a BTreeMap<String, Value>,
    elapsed_us: u64,
}

impl Record<'_> {
    fn human(&self) -> String {
        let mut line = format!("[{}] {} ({}us)", self.level, self.message, self.elapsed_us);
        if let Some(mode) = self.mode {
            let _ = write!(line, " mode={}", mode);
        }
        if !self.fields.is_empty() {
            line.push_str(" |");
            for (key, value) in self.fields {
                let _ = write!(line, " {}={}", key, value);
            }
        }
        line
    }
}

/// Structured logger bound to one request.
///
/// Every line carries the request id and the time since the request
/// started, so the interleaving of shell, patches and failures can be read
/// back from stderr.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    request_id: String,
    service: Option<String>,
    route: Option<String>,
    mode: Option<RenderMode>,
    started: Instant,
    min_level: LogLevel,
    format: LogFormat,
}

impl StructuredLogger {
    /// Logger for the request `request_id`, JSON at info level and above.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id: request_id.to_string(),
            service: None,
            route: None,
            mode: None,
            started: Instant::now(),
            min_level: LogLevel::Info,
            format: LogFormat::Json,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Drop lines below `level`.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Start a line at `level`.
    pub fn line(&self, level: LogLevel, message: impl Into<String>) -> LogLine<'_> {
        LogLine {
            logger: self,
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn debug(&self, message: impl Into<String>) -> LogLine<'_> {
        self.line(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> LogLine<'_> {
        self.line(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> LogLine<'_> {
        self.line(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> LogLine<'_> {
        self.line(LogLevel::Error, message)
    }

    fn render(
        &self,
        level: LogLevel,
        message: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Option<String> {
        if level < self.min_level {
            return None;
        }

        let record = Record {
            level,
            message,
            request_id: &self.request_id,
            service: self.service.as_deref(),
            route: self.route.as_deref(),
            mode: self.mode,
            fields,
            elapsed_us: self.started.elapsed().as_micros() as u64,
        };

        Some(match self.format {
            LogFormat::Json => {
                serde_json::to_string(&record).unwrap_or_else(|_| message.to_string())
            }
            LogFormat::Human => record.human(),
        })
    }
}

/// A log line being assembled; nothing is written until [`emit`](Self::emit).
#[must_use = "a log line is only written by `emit`"]
pub struct LogLine<'a> {
    logger: &'a StructuredLogger,
    level: LogLevel,
    message: String,
    fields: BTreeMap<String, Value>,
}

impl LogLine<'_> {
    /// Attach `value` under `key`.
    pub fn field(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Attach `duration` in whole milliseconds.
    pub fn millis(self, key: &str, duration: Duration) -> Self {
        self.field(key, duration.as_millis() as u64)
    }

    /// The formatted line, or `None` when filtered out by level.
    pub fn render(&self) -> Option<String> {
        self.logger.render(self.level, &self.message, &self.fields)
    }

    /// Write the line to stderr.
    pub fn emit(self) {
        if let Some(line) = self.render() {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}
