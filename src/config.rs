//! Meter configuration.
//!
//! Plain data carried by the host; this crate does not read it from disk
//! or any other file format (persisted/CLI configuration is explicitly
//! out of scope). `serde` derives are kept so a host can embed
//! `MeterConfig` inside its own configuration document.

use serde::{Deserialize, Serialize};

/// Top-level meter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Default publication interval, in milliseconds, for sensors without
    /// a per-sensor override.
    pub update_interval_ms: u32,
    /// Ring buffer capacity, in milliseconds of audio.
    pub ring_buffer_size_ms: u32,
    /// Samples discarded at worker start, in milliseconds.
    pub warmup_interval_ms: u32,
    /// Worker stack size in bytes (observability only on platforms with
    /// no user-controllable thread stack size).
    pub task_stack_size: u32,
    /// Worker scheduling priority (observability only; see DESIGN.md).
    pub task_priority: u8,
    /// CPU core the worker requests pinning to.
    pub task_core: usize,
    /// Calibration pair, in dB. Both must be set to take effect.
    pub mic_sensitivity: Option<f32>,
    pub mic_sensitivity_ref: Option<f32>,
    /// Constant dB offset applied after calibration.
    pub offset: Option<f32>,
    /// Request a high-frequency main-loop hint from the host while on.
    pub is_high_freq: bool,
    /// Call `start()` during `Meter::setup`.
    pub is_auto_start: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 60_000,
            ring_buffer_size_ms: 256,
            warmup_interval_ms: 500,
            task_stack_size: 1024,
            task_priority: 1,
            task_core: 1,
            mic_sensitivity: None,
            mic_sensitivity_ref: None,
            offset: None,
            is_high_freq: false,
            is_auto_start: false,
        }
    }
}

/// Per-sensor configuration overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerSensorConfig {
    /// Overrides `MeterConfig::update_interval_ms` for this sensor.
    pub update_interval_ms: Option<u32>,
    /// Inner-window length, in milliseconds, used by Max/Min sensors.
    pub window_size_ms: Option<u32>,
}

impl MeterConfig {
    /// Validates the configuration, returning the reason on failure.
    ///
    /// This is the "configuration error" path of the error taxonomy: it
    /// fails at setup, before any worker thread exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.update_interval_ms == 0 {
            return Err("update_interval_ms must be greater than zero".to_string());
        }
        if self.ring_buffer_size_ms == 0 {
            return Err("ring_buffer_size_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = MeterConfig::default();
        assert_eq!(config.update_interval_ms, 60_000);
        assert_eq!(config.ring_buffer_size_ms, 256);
        assert_eq!(config.warmup_interval_ms, 500);
        assert_eq!(config.task_core, 1);
        assert!(config.mic_sensitivity.is_none());
    }

    #[test]
    fn json_roundtrip() {
        let config = MeterConfig {
            mic_sensitivity: Some(-26.0),
            mic_sensitivity_ref: Some(94.0),
            ..MeterConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MeterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_zero_update_interval() {
        let config = MeterConfig {
            update_interval_ms: 0,
            ..MeterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(MeterConfig::default().validate().is_ok());
    }
}
