//! Render timing metrics.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use ssr_core::{LifecycleObserver, LifecyclePhase, RenderMode, RequestId, SlotId};

/// Metrics for a single render session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Route path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Render mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RenderMode>,
    /// Time to first write (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_shell_us: Option<u64>,
    /// Time to first patch (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_patch_us: Option<u64>,
    /// Per-slot timings, keyed by slot id.
    pub slots: BTreeMap<u32, SlotMetrics>,
    /// Number of slots whose computation failed.
    pub failed_slots: usize,
    /// Whether the session was aborted.
    pub aborted: bool,
    /// Total duration (microseconds).
    pub total_duration_us: u64,
    /// HTTP status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Metrics for a single slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotMetrics {
    /// Time from session start to computation start (microseconds).
    pub start_us: u64,
    /// Time from session start to patch written (microseconds).
    pub sent_us: u64,
    /// Patch bytes, once the patch has been written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
}

/// Collector for render metrics.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    request_id: RequestId,
    route: Option<String>,
    mode: Option<RenderMode>,
    start: Instant,
    shell_sent: Option<Instant>,
    first_patch_sent: Option<Instant>,
    slots: BTreeMap<SlotId, (Instant, Option<Instant>, Option<usize>)>,
    failed_slots: usize,
    aborted: bool,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            route: None,
            mode: None,
            start: Instant::now(),
            shell_sent: None,
            first_patch_sent: None,
            slots: BTreeMap::new(),
            failed_slots: 0,
            aborted: false,
        }
    }

    /// Set route path.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    /// Set render mode.
    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = Some(mode);
    }

    /// Record shell sent.
    pub fn record_shell_sent(&mut self) {
        self.shell_sent = Some(Instant::now());
    }

    /// Record slot computation start.
    pub fn record_slot_start(&mut self, slot: SlotId) {
        self.slots.insert(slot, (Instant::now(), None, None));
    }

    /// Record a patch of `bytes` bytes written for `slot`.
    pub fn record_slot_sent(&mut self, slot: SlotId, bytes: usize) {
        let now = Instant::now();
        if self.first_patch_sent.is_none() {
            self.first_patch_sent = Some(now);
        }

        let entry = self.slots.entry(slot).or_insert((self.start, None, None));
        entry.1 = Some(now);
        entry.2 = Some(bytes);
    }

    /// Record how many slots failed.
    pub fn record_failures(&mut self, failed: usize) {
        self.failed_slots = failed;
    }

    /// Record that the session was aborted.
    pub fn record_abort(&mut self) {
        self.aborted = true;
    }

    /// Snapshot the metrics.
    pub fn finalize(&self, status_code: Option<u16>) -> RequestMetrics {
        let now = Instant::now();
        let since_start = |t: Instant| t.duration_since(self.start).as_micros() as u64;

        let slots = self
            .slots
            .iter()
            .map(|(id, (start, sent, bytes))| {
                (
                    id.get(),
                    SlotMetrics {
                        start_us: since_start(*start),
                        sent_us: since_start(sent.unwrap_or(now)),
                        bytes: *bytes,
                    },
                )
            })
            .collect();

        RequestMetrics {
            request_id: self.request_id.to_string(),
            route: self.route.clone(),
            mode: self.mode,
            time_to_shell_us: self.shell_sent.map(since_start),
            time_to_first_patch_us: self.first_patch_sent.map(since_start),
            slots,
            failed_slots: self.failed_slots,
            aborted: self.aborted,
            total_duration_us: since_start(now),
            status_code,
        }
    }

    /// Get time-to-shell so far.
    pub fn time_to_shell(&self) -> Option<Duration> {
        self.shell_sent.map(|t| t.duration_since(self.start))
    }
}

/// Lifecycle observer that feeds a `MetricsCollector`.
#[derive(Debug)]
pub struct MetricsObserver {
    collector: Mutex<MetricsCollector>,
}

impl MetricsObserver {
    /// Wrap a collector.
    pub fn new(collector: MetricsCollector) -> Self {
        Self {
            collector: Mutex::new(collector),
        }
    }

    /// Apply `f` to the collector.
    pub fn with<R>(&self, f: impl FnOnce(&mut MetricsCollector) -> R) -> R {
        let mut guard = self
            .collector
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Snapshot the metrics.
    pub fn finalize(&self, status_code: Option<u16>) -> RequestMetrics {
        self.with(|c| c.finalize(status_code))
    }
}

impl LifecycleObserver for MetricsObserver {
    fn on_phase(&self, phase: LifecyclePhase, _elapsed: Duration) {
        self.with(|c| match phase {
            LifecyclePhase::ShellSent => c.record_shell_sent(),
            LifecyclePhase::SlotStarted(slot) => c.record_slot_start(slot),
            LifecyclePhase::SlotPatched { slot, bytes } => c.record_slot_sent(slot, bytes),
            LifecyclePhase::Aborted(_) => c.record_abort(),
            LifecyclePhase::Start | LifecyclePhase::Completion => {}
        });
    }
}

impl RequestMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        let mode = self.mode.map(|m| m.to_string()).unwrap_or_default();
        lines.push(format!("Request: {} {}", self.request_id, mode));

        if let Some(tts) = self.time_to_shell_us {
            lines.push(format!("  Time to shell: {}us ({:.2}ms)", tts, tts as f64 / 1000.0));
        }

        if let Some(ttfp) = self.time_to_first_patch_us {
            lines.push(format!(
                "  Time to first patch: {}us ({:.2}ms)",
                ttfp,
                ttfp as f64 / 1000.0
            ));
        }

        lines.push(format!(
            "  Total: {}us ({:.2}ms)",
            self.total_duration_us,
            self.total_duration_us as f64 / 1000.0
        ));

        if !self.slots.is_empty() {
            lines.push("  Slots:".to_string());
            for (id, slot) in &self.slots {
                let started = slot.start_us as f64 / 1000.0;
                lines.push(match slot.bytes {
                    Some(bytes) => format!(
                        "    {}: started at {:.2}ms, patched at {:.2}ms ({} bytes)",
                        id,
                        started,
                        slot.sent_us as f64 / 1000.0,
                        bytes
                    ),
                    None => format!("    {}: started at {:.2}ms, not patched", id, started),
                });
            }
        }

        if self.failed_slots > 0 {
            lines.push(format!("  Failed slots: {}", self.failed_slots));
        }
        if self.aborted {
            lines.push("  Aborted".to_string());
        }

        lines.join("\n")
    }
}
