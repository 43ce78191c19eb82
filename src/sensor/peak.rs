use std::sync::Arc;

use crate::defer_queue::DeferQueue;
use crate::dsp::Filter;

use super::calibration::CalibrationConfig;
use super::{ms_to_samples, PublishSink};

/// Running absolute-value maximum over an update interval, published as
/// `20*log10(peak)` (amplitude, not power - no RMS offset is applied).
pub struct PeakSensor {
    pub(crate) filters: Vec<Arc<dyn Filter>>,
    publish: PublishSink,
    update_interval_ms: u32,
    update_samples: u64,
    count: u64,
    peak: f32,
}

impl PeakSensor {
    pub fn new(filters: Vec<Arc<dyn Filter>>, publish: PublishSink, update_interval_ms: u32) -> Self {
        Self {
            filters,
            publish,
            update_interval_ms,
            update_samples: 0,
            count: 0,
            peak: 0.0,
        }
    }

    pub fn recompute_update_samples(&mut self, sample_rate: u32) {
        self.update_samples = ms_to_samples(sample_rate, self.update_interval_ms).max(1);
    }

    pub fn process(&mut self, buf: &[f32], defer: &DeferQueue, calibration: &CalibrationConfig) {
        for &x in buf {
            let a = x.abs();
            if a > self.peak {
                self.peak = a;
            }
            self.count += 1;

            if self.count >= self.update_samples {
                let raw_db = 20.0 * (self.peak as f64).log10();
                let adjusted = calibration.adjust_db(raw_db as f32, false);
                let publish = Arc::clone(&self.publish);
                defer.defer(move || publish(adjusted));
                self.peak = 0.0;
                self.count = 0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
        self.count = 0;
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
    fn full_scale_sine_peak_is_zero_dbfs() {
        let (sink, values) = sink();
        let mut peak = PeakSensor::new(Vec::new(), sink, 1000);
        peak.recompute_update_samples(48_000);

        let sample_rate = 48_000.0_f32;
        let freq = 1000.0_f32;
        let samples: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let defer = DeferQueue::new();
        peak.process(&samples, &defer, &CalibrationConfig::default());
        defer.drain_tick();

        let published = values.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!((published[0] - 0.0).abs() < 0.001, "got {}", published[0]);
    }

    #[test]
    fn peak_resets_after_publication() {
        let (sink, _) = sink();
        let mut peak = PeakSensor::new(Vec::new(), sink, 10);
        peak.recompute_update_samples(1000); // update_samples = 10

        let defer = DeferQueue::new();
        peak.process(&vec![1.0_f32; 10], &defer, &CalibrationConfig::default());
        assert_eq!(peak.peak, 0.0);
        assert_eq!(peak.count, 0);
    }
}
