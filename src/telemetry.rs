//! Telemetry hub for worker health reporting.
//!
//! Mirrors the original component's periodic log line ("CPU: x%, ring
//! buffer: y%") by also recording it as a bounded-history event so a host
//! can poll `hub().snapshot()` instead of scraping logs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Diagnostic events recorded by the worker and meter facade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Periodic worker health line: CPU busy fraction and ring-buffer
    /// occupancy, both in percent.
    WorkerUtilization { cpu_percent: f32, ring_buffer_percent: f32 },
    /// A recovered-internally condition worth surfacing to a host.
    Warning { message: String },
}

/// Snapshot of hub state for host-side reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Bounded-history telemetry sink.
pub struct TelemetryHub {
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryHub {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn record(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let mut history = self.history.lock().expect("telemetry history poisoned");
        if history.len() == self.history_capacity {
            history.pop_front();
            self.dropped_history.fetch_add(1, Ordering::Relaxed);
        }
        history.push_back(event);
    }

    pub fn record_utilization(&self, cpu_percent: f32, ring_buffer_percent: f32) {
        self.record(MetricEvent::WorkerUtilization {
            cpu_percent,
            ring_buffer_percent,
        });
    }

    pub fn record_warning(&self, message: impl Into<String>) {
        self.record(MetricEvent::Warning {
            message: message.into(),
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().expect("telemetry history poisoned");
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_utilization_events() {
        let hub = TelemetryHub::new(4);
        hub.record_utilization(12.5, 30.0);
        let snap = hub.snapshot();
        assert_eq!(snap.total_events, 1);
        assert!(matches!(snap.recent[0], MetricEvent::WorkerUtilization { .. }));
    }

    #[test]
    fn drops_oldest_when_full() {
        let hub = TelemetryHub::new(2);
        hub.record_warning("a");
        hub.record_warning("b");
        hub.record_warning("c");
        let snap = hub.snapshot();
        assert_eq!(snap.recent.len(), 2);
        assert_eq!(snap.dropped_events, 1);
        assert!(matches!(&snap.recent[0], MetricEvent::Warning { message } if message == "b"));
    }
}
