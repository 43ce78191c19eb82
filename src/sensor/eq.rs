use std::sync::Arc;

use crate::defer_queue::DeferQueue;
use crate::dsp::Filter;

use super::calibration::CalibrationConfig;
use super::{ms_to_samples, PublishSink};

/// Equivalent continuous level: running RMS over an update interval.
///
/// Per-buffer (strictly, per-segment between publication boundaries)
/// local sum is accumulated in `f32`, then folded into the `f64` global
/// sum once per segment - this avoids the catastrophic cancellation a
/// pure `f32` running sum would suffer over long intervals (e.g. one
/// hour at 48 kHz).
pub struct EqSensor {
    pub(crate) filters: Vec<Arc<dyn Filter>>,
    publish: PublishSink,
    update_interval_ms: u32,
    update_samples: u64,
    sum: f64,
    count: u64,
}

impl EqSensor {
    pub fn new(filters: Vec<Arc<dyn Filter>>, publish: PublishSink, update_interval_ms: u32) -> Self {
        Self {
            filters,
            publish,
            update_interval_ms,
            update_samples: 0,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn recompute_update_samples(&mut self, sample_rate: u32) {
        self.update_samples = ms_to_samples(sample_rate, self.update_interval_ms).max(1);
    }

    pub fn process(&mut self, buf: &[f32], defer: &DeferQueue, calibration: &CalibrationConfig) {
        let mut idx = 0;
        while idx < buf.len() {
            let remaining = self.update_samples.saturating_sub(self.count);
            let take = remaining.min((buf.len() - idx) as u64) as usize;
            if take == 0 {
                break;
            }
            let segment = &buf[idx..idx + take];
            let local_sum: f32 = segment.iter().map(|x| x * x).sum();
            self.sum += local_sum as f64;
            self.count += take as u64;
            idx += take;

            if self.count >= self.update_samples {
                let mean_square = self.sum / self.count as f64;
                let raw_db = 10.0 * mean_square.log10();
                let adjusted = calibration.adjust_db(raw_db as f32, true);
                let publish = Arc::clone(&self.publish);
                defer.defer(move || publish(adjusted));
                self.sum = 0.0;
                self.count = 0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    pub fn publish_nan(&self, defer: &DeferQueue) {
        let publish = Arc::clone(&self.publish);
        defer.defer(move || publish(f32::NAN));
    }
}
