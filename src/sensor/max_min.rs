use std::sync::Arc;

use crate::defer_queue::DeferQueue;
use crate::dsp::Filter;

use super::calibration::CalibrationConfig;
use super::{ms_to_samples, PublishSink};

/// Which extremum a [`MaxMinSensor`] tracks across windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

impl Extremum {
    /// Matches the reference implementation exactly:
    /// `numeric_limits<float>::min()` (smallest positive normal) for Max,
    /// `numeric_limits<float>::max()` for Min - not signed infinities.
    /// See DESIGN.md for the Open Question this resolves.
    fn initial(self) -> f32 {
        match self {
            Extremum::Max => f32::MIN_POSITIVE,
            Extremum::Min => f32::MAX,
        }
    }

    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            Extremum::Max => a.max(b),
            Extremum::Min => a.min(b),
        }
    }
}

/// Windowed mean-square statistic: an inner accumulator over
/// `window_samples` resets at each window boundary; the outer extremum
/// across windows resets only at the update-interval boundary.
pub struct MaxMinSensor {
    pub(crate) filters: Vec<Arc<dyn Filter>>,
    publish: PublishSink,
    extremum: Extremum,
    update_interval_ms: u32,
    window_size_ms: u32,
    update_samples: u64,
    window_samples: u64,
    window_sum: f64,
    window_count: u64,
    outer_extreme: f32,
    interval_count: u64,
}

impl MaxMinSensor {
    pub fn new(
        filters: Vec<Arc<dyn Filter>>,
        publish: PublishSink,
        extremum: Extremum,
        update_interval_ms: u32,
        window_size_ms: u32,
    ) -> Self {
        Self {
            filters,
            publish,
            extremum,
            update_interval_ms,
            window_size_ms,
            update_samples: 0,
            window_samples: 0,
            window_sum: 0.0,
            window_count: 0,
            outer_extreme: extremum.initial(),
            interval_count: 0,
        }
    }

    pub fn recompute_update_samples(&mut self, sample_rate: u32) {
        self.update_samples = ms_to_samples(sample_rate, self.update_interval_ms).max(1);
        self.window_samples = ms_to_samples(sample_rate, self.window_size_ms).max(1);
    }

    pub fn process(&mut self, buf: &[f32], defer: &DeferQueue, calibration: &CalibrationConfig) {
        for &x in buf {
            self.window_sum += (x * x) as f64;
            self.window_count += 1;
            self.interval_count += 1;

            let window_complete = self.window_count >= self.window_samples;
            let interval_complete = self.interval_count >= self.update_samples;

            if window_complete || interval_complete {
                let mean_square = (self.window_sum / self.window_count as f64) as f32;
                self.outer_extreme = self.extremum.combine(self.outer_extreme, mean_square);
                self.window_sum = 0.0;
                self.window_count = 0;
            }

            if interval_complete {
                let raw_db = 10.0 * (self.outer_extreme as f64).log10();
                let adjusted = calibration.adjust_db(raw_db as f32, true);
                let publish = Arc::clone(&self.publish);
                defer.defer(move || publish(adjusted));
                self.outer_extreme = self.extremum.initial();
                self.interval_count = 0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.window_sum = 0.0;
        self.window_count = 0;
        self.outer_extreme = self.extremum.initial();
        self.interval_count = 0;
    }

    pub fn publish_nan(&self, defer: &DeferQueue) {
        let publish = Arc::clone(&self.publish);
        defer.defer(move || publish(f32::NAN));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sink() -> (PublishSink, Arc<Mutex<Vec<f32>>>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&values);
        let sink: PublishSink = Arc::new(move |v| captured.lock().unwrap().push(v));
        (sink, values)
    }

    #[test]
    fn partial_window_at_interval_boundary_still_publishes() {
        // window_size_ms > update_interval_ms: window never completes on
        // its own, the interval boundary must finalize the partial window.
        let (sink, values) = sink();
        let mut sensor = MaxMinSensor::new(Vec::new(), sink, Extremum::Max, 100, 10_000);
        sensor.recompute_update_samples(1000); // update_samples=100, window_samples=10000

        let defer = DeferQueue::new();
        let buf = vec![0.5_f32; 100];
        sensor.process(&buf, &defer, &CalibrationConfig::default());
        defer.drain_tick();
        assert_eq!(values.lock().unwrap().len(), 1);
    }

    #[test]
    fn max_and_min_track_opposite_extremes() {
        let (sink_max, values_max) = sink();
        let mut max_sensor = MaxMinSensor::new(Vec::new(), sink_max, Extremum::Max, 10, 5);
        max_sensor.recompute_update_samples(1000); // update=10, window=5

        let (sink_min, values_min) = sink();
        let mut min_sensor = MaxMinSensor::new(Vec::new(), sink_min, Extremum::Min, 10, 5);
        min_sensor.recompute_update_samples(1000);

        let buf = vec![1.0_f32, 1.0, 1.0, 1.0, 1.0, 0.1, 0.1, 0.1, 0.1, 0.1];
        let defer = DeferQueue::new();
        max_sensor.process(&buf, &defer, &CalibrationConfig::default());
        min_sensor.process(&buf, &defer, &CalibrationConfig::default());
        defer.drain_tick();

        let max_val = values_max.lock().unwrap()[0];
        let min_val = values_min.lock().unwrap()[0];
        assert!(max_val > min_val);
    }

    #[test]
    fn reset_restores_initial_extremum() {
        let (sink, _values) = sink();
        let mut sensor = MaxMinSensor::new(Vec::new(), sink, Extremum::Max, 1000, 100);
        sensor.recompute_update_samples(48_000);
        sensor.process(&vec![0.5; 100], &DeferQueue::new(), &CalibrationConfig::default());
        sensor.reset();
        assert_eq!(sensor.outer_extreme, Extremum::Max.initial());
    }
}
