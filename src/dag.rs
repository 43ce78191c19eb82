//! DAG evaluator: runs each sensor's filter chain against a shared
//! [`BufferStack`], reusing the longest filter prefix already applied by
//! the previous sensor in sorted order so each filter instance runs at
//! most once per buffer.

use std::sync::Arc;

use crate::defer_queue::DeferQueue;
use crate::dsp::{BufferStack, Filter};
use crate::sensor::{CalibrationConfig, Sensor};

/// Sorts sensors so that sensors sharing a longest common filter prefix
/// are consecutive. The sort key is the lexicographic order over filter
/// *identity* (pointer address) - two numerically identical filters at
/// different addresses do not share state and must sort as distinct.
pub fn sort_sensors_by_filter_identity(sensors: &mut [Sensor]) {
    sensors.sort_by(|a, b| filter_identities(a).cmp(&filter_identities(b)));
}

fn filter_identities(sensor: &Sensor) -> Vec<usize> {
    sensor
        .filters()
        .iter()
        .map(|f| Arc::as_ptr(f) as *const () as usize)
        .collect()
}

fn common_prefix_len(applied: &[Arc<dyn Filter>], wanted: &[Arc<dyn Filter>]) -> usize {
    applied
        .iter()
        .zip(wanted.iter())
        .take_while(|(a, b)| Arc::ptr_eq(a, b))
        .count()
}

/// Runs every sensor's filter chain over `stack`, starting at depth 0
/// with the unfiltered samples already loaded into `stack.current_mut()`
/// by the caller. Leaves the stack at whatever depth the last sensor
/// used; callers must `reset()` the stack before the next buffer.
///
/// `sensors` must already be sorted via
/// [`sort_sensors_by_filter_identity`].
pub fn process_buffer(
    sensors: &mut [Sensor],
    stack: &mut BufferStack,
    defer: &DeferQueue,
    calibration: &CalibrationConfig,
) {
    let mut applied_prefix: Vec<Arc<dyn Filter>> = Vec::new();

    for sensor in sensors.iter_mut() {
        let wanted: Vec<Arc<dyn Filter>> = sensor.filters().to_vec();
        let k = common_prefix_len(&applied_prefix, &wanted);

        while applied_prefix.len() > k {
            applied_prefix.pop();
            stack.pop();
        }

        for filter in &wanted[k..] {
            stack.push();
            filter.process(stack.current_mut());
            applied_prefix.push(Arc::clone(filter));
        }

        sensor.process(stack.current(), defer, calibration);
    }
}
