//! Statistical accumulators: Eq, Max, Min, Peak.
//!
//! Modeled as a closed, tagged-variant enum rather than a trait-object
//! hierarchy - a single `process` dispatch point is all the polymorphism
//! this needs, per the "no deep hierarchies" redesign note. Calibration
//! and deferred-publish submission are passed in explicitly rather than
//! reached for through shared mutable fields on a parent object.

pub mod calibration;
mod eq;
mod max_min;
mod peak;

use std::sync::Arc;

use crate::defer_queue::DeferQueue;
use crate::dsp::Filter;

pub use calibration::CalibrationConfig;
pub use eq::EqSensor;
pub use max_min::{Extremum, MaxMinSensor};
pub use peak::PeakSensor;

/// The publication sink a sensor calls with its (already calibrated)
/// decibel value. `f32::NAN` means "cleared / no value."
pub type PublishSink = Arc<dyn Fn(f32) + Send + Sync>;

fn ms_to_samples(sample_rate: u32, ms: u32) -> u64 {
    (sample_rate as u64 * ms as u64) / 1000
}

/// A sensor: an accumulator plus the ordered filter-reference prefix it
/// reads from. Sort order and prefix-sharing are handled by
/// [`crate::dag`]; this type only holds the per-variant numerics.
pub enum Sensor {
    Eq(EqSensor),
    Max(MaxMinSensor),
    Min(MaxMinSensor),
    Peak(PeakSensor),
}

impl Sensor {
    /// The sensor's effective filter chain, in application order. Used
    /// by the DAG evaluator to compute shared prefixes by filter
    /// identity.
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        match self {
            Sensor::Eq(s) => &s.filters,
            Sensor::Max(s) | Sensor::Min(s) => &s.filters,
            Sensor::Peak(s) => &s.filters,
        }
    }

    /// Consumes the whole buffer, enqueuing a publish closure onto
    /// `defer` every time an update interval completes.
    pub fn process(&mut self, buf: &[f32], defer: &DeferQueue, calibration: &CalibrationConfig) {
        match self {
            Sensor::Eq(s) => s.process(buf, defer, calibration),
            Sensor::Max(s) | Sensor::Min(s) => s.process(buf, defer, calibration),
            Sensor::Peak(s) => s.process(buf, defer, calibration),
        }
    }

    /// Recomputes `update_samples` (and `window_samples` for Max/Min)
    /// from the bound microphone source's sample rate. Called once at
    /// worker bind time.
    pub fn recompute_update_samples(&mut self, sample_rate: u32) {
        match self {
            Sensor::Eq(s) => s.recompute_update_samples(sample_rate),
            Sensor::Max(s) | Sensor::Min(s) => s.recompute_update_samples(sample_rate),
            Sensor::Peak(s) => s.recompute_update_samples(sample_rate),
        }
    }

    /// Zeroes interval-local state without publishing anything.
    pub fn reset(&mut self) {
        match self {
            Sensor::Eq(s) => s.reset(),
            Sensor::Max(s) | Sensor::Min(s) => s.reset(),
            Sensor::Peak(s) => s.reset(),
        }
    }

    /// Enqueues a single NaN publication. Callers are responsible for
    /// calling [`Sensor::reset`] first so the NaN publish is not
    /// discarded by an "only publish when on" guard and subsequent
    /// accumulation starts clean.
    pub fn publish_nan(&self, defer: &DeferQueue) {
        match self {
            Sensor::Eq(s) => s.publish_nan(defer),
            Sensor::Max(s) | Sensor::Min(s) => s.publish_nan(defer),
            Sensor::Peak(s) => s.publish_nan(defer),
        }
    }

    /// Resets state and publishes NaN, in that order - the order the
    /// reference implementation uses on turn-off, stop, and
    /// microphone-lost.
    pub fn reset_and_publish_nan(&mut self, defer: &DeferQueue) {
        self.reset();
        self.publish_nan(defer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sink() -> (PublishSink, Arc<Mutex<Vec<f32>>>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&values);
        (Arc::new(move |v| captured.lock().unwrap().push(v)), values)
    }

    #[test]
    fn reset_and_publish_nan_emits_single_nan() {
        let (publish, values) = sink();
        let mut sensor = Sensor::Eq(EqSensor::new(Vec::new(), publish, 1000));
        sensor.recompute_update_samples(48_000);

        let defer = DeferQueue::new();
        sensor.process(&vec![1.0_f32; 100], &defer, &CalibrationConfig::default());
        sensor.reset_and_publish_nan(&defer);
        defer.drain_tick();

        let published = values.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].is_nan());
    }

    #[test]
    fn empty_filter_list_uses_unfiltered_buffer() {
        let (publish, _values) = sink();
        let sensor = Sensor::Peak(PeakSensor::new(Vec::new(), publish, 1000));
        assert!(sensor.filters().is_empty());
    }
}
