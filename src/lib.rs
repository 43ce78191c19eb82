//! Real-time sound-level meter: PCM capture, a biquad filter DAG,
//! statistical accumulators, and calibrated decibel publication.

pub mod audio;
pub mod config;
pub mod dag;
pub mod defer_queue;
pub mod dsp;
pub mod error;
pub mod mic;
pub mod meter;
pub mod sensor;
pub mod telemetry;
pub mod worker;

pub use config::{MeterConfig, PerSensorConfig};
pub use error::{ErrorCode, SoundLevelMeterError};
pub use meter::Meter;

/// Initializes the crate's own `env_logger` backend for tests. Hosts
/// embedding this crate wire their own `log` backend instead.
#[cfg(test)]
#[allow(dead_code)]
fn init_test_logging() {
    let _ = env_logger::try_init();
}
