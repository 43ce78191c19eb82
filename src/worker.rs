//! Worker lifecycle: a single task, pinned to a configured CPU core,
//! that binds the ring buffer, warms up, runs the steady-state
//! read-unpack-evaluate loop, and tears down on stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::audio::{unpack_samples, AudioStreamInfo, MicrophoneSource, RingBuffer};
use crate::dag;
use crate::defer_queue::DeferQueue;
use crate::dsp::BufferStack;
use crate::sensor::{CalibrationConfig, Sensor};
use crate::telemetry::TelemetryHub;

/// Level-triggered on/off gate: `Condvar::wait_while` re-checks the
/// predicate on every wakeup, so a turn-on that races a not-yet-waiting
/// worker is never missed.
pub struct OnOffGate {
    state: Mutex<bool>,
    cv: Condvar,
}

impl OnOffGate {
    pub fn new(initial_on: bool) -> Self {
        Self {
            state: Mutex::new(initial_on),
            cv: Condvar::new(),
        }
    }

    pub fn set(&self, on: bool) {
        let mut state = self.state.lock().expect("on/off gate poisoned");
        *state = on;
        self.cv.notify_all();
    }

    pub fn is_on(&self) -> bool {
        *self.state.lock().expect("on/off gate poisoned")
    }

    /// Blocks until turned on or `should_wake` becomes true (used to let
    /// a pending stop interrupt a paused worker).
    pub fn wait_until_on(&self, should_wake: &AtomicBool) {
        let guard = self.state.lock().expect("on/off gate poisoned");
        let _ = self
            .cv
            .wait_while(guard, |on| !*on && !should_wake.load(Ordering::SeqCst));
    }
}

/// Everything the worker thread needs, assembled by `Meter::start`.
pub struct WorkerContext {
    pub mic: Arc<dyn MicrophoneSource>,
    pub sensors: Arc<Mutex<Vec<Sensor>>>,
    pub defer: Arc<DeferQueue>,
    pub calibration: CalibrationConfig,
    pub warmup_interval_ms: u32,
    pub update_interval_ms: u32,
    pub is_on: Arc<OnOffGate>,
    pub is_pending_stop: Arc<AtomicBool>,
    pub is_running: Arc<AtomicBool>,
}

/// Default audio buffer duration the worker reads per iteration.
pub const AUDIO_BUFFER_DURATION_MS: u32 = 20;

fn reset_all_sensors_and_publish_nan(sensors: &Mutex<Vec<Sensor>>, defer: &DeferQueue) {
    let mut sensors = sensors.lock().expect("sensors poisoned");

    let mut seen = std::collections::HashSet::new();
    for sensor in sensors.iter() {
        for filter in sensor.filters() {
            if seen.insert(Arc::as_ptr(filter) as *const () as usize) {
                filter.reset();
            }
        }
    }

    for sensor in sensors.iter_mut() {
        sensor.reset_and_publish_nan(defer);
    }
}

/// Runs bind (stream-rate-dependent setup already done by the caller) +
/// warmup + steady state + teardown on the calling thread. Intended to
/// be the body of a dedicated, pinned OS thread.
pub fn run_worker(
    ctx: WorkerContext,
    ring_buffer: Arc<RingBuffer>,
    info: AudioStreamInfo,
    telemetry: &'static TelemetryHub,
) {
    {
        let mut sensors = ctx.sensors.lock().expect("sensors poisoned");
        for sensor in sensors.iter_mut() {
            sensor.recompute_update_samples(info.sample_rate);
        }
    }

    let buffer_frames = (info.sample_rate as u64 * AUDIO_BUFFER_DURATION_MS as u64 / 1000) as usize;
    let buffer_duration = Duration::from_millis(AUDIO_BUFFER_DURATION_MS as u64);
    let read_timeout = buffer_duration * 2;

    warmup(&ring_buffer, &info, ctx.warmup_interval_ms);

    let mut stack = BufferStack::new(buffer_frames.max(1));
    let mut frame_buf = Vec::with_capacity(buffer_frames);
    let mut raw = vec![0u8; info.samples_to_bytes(buffer_frames)];

    let mut warning_active = false;
    let mut elapsed_processing = Duration::ZERO;
    let mut elapsed_wall = Instant::now();

    loop {
        if ctx.is_pending_stop.load(Ordering::SeqCst) {
            break;
        }

        ctx.is_on.wait_until_on(&ctx.is_pending_stop);
        if ctx.is_pending_stop.load(Ordering::SeqCst) {
            break;
        }

        if !ctx.mic.is_running() {
            if !warning_active {
                warning_active = true;
                telemetry.record_warning("microphone source stopped delivering data");
                reset_all_sensors_and_publish_nan(&ctx.sensors, &ctx.defer);
            }
            std::thread::sleep(buffer_duration);
            continue;
        }
        warning_active = false;

        stack.reset(buffer_frames);

        let n = ring_buffer.read(&mut raw, raw.len(), read_timeout);
        if n == 0 {
            continue;
        }

        let tick_start = Instant::now();
        unpack_samples(&raw[..n], info.sample_width_bytes, &mut frame_buf);
        stack.current_mut().clear();
        stack.current_mut().extend_from_slice(&frame_buf);

        {
            let mut sensors = ctx.sensors.lock().expect("sensors poisoned");
            dag::process_buffer(&mut sensors, &mut stack, &ctx.defer, &ctx.calibration);
        }
        elapsed_processing += tick_start.elapsed();

        if elapsed_wall.elapsed() >= Duration::from_millis(ctx.update_interval_ms as u64) {
            let wall = elapsed_wall.elapsed().as_secs_f32().max(f32::EPSILON);
            let cpu_percent = (elapsed_processing.as_secs_f32() / wall * 100.0).min(100.0);
            let ring_buffer_percent =
                ring_buffer.available() as f32 / ring_buffer.capacity().max(1) as f32 * 100.0;
            log::info!(
                "worker health: cpu={:.1}% ring_buffer={:.1}%",
                cpu_percent,
                ring_buffer_percent
            );
            telemetry.record_utilization(cpu_percent, ring_buffer_percent);
            elapsed_processing = Duration::ZERO;
            elapsed_wall = Instant::now();
        }
    }

    teardown(&ctx);
}

fn warmup(ring_buffer: &RingBuffer, info: &AudioStreamInfo, warmup_interval_ms: u32) {
    if warmup_interval_ms == 0 {
        return;
    }
    let chunk_ms = AUDIO_BUFFER_DURATION_MS.min(warmup_interval_ms.max(1));
    let mut scratch = vec![0u8; info.ms_to_bytes(chunk_ms).max(1)];
    let deadline = Instant::now() + Duration::from_millis(warmup_interval_ms as u64);
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        ring_buffer.read(&mut scratch, scratch.len(), remaining.min(Duration::from_millis(chunk_ms as u64)));
    }
}

fn teardown(ctx: &WorkerContext) {
    let _ = ctx.mic.stop();
    reset_all_sensors_and_publish_nan(&ctx.sensors, &ctx.defer);
    ctx.is_running.store(false, Ordering::SeqCst);
}

/// Weak handle the producer callback closure holds, so a worker that has
/// already torn down does not get kept alive by a lingering callback.
pub type RingBufferHandle = Weak<RingBuffer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_off_gate_defaults_to_given_state() {
        let gate = OnOffGate::new(true);
        assert!(gate.is_on());
        gate.set(false);
        assert!(!gate.is_on());
    }

    #[test]
    fn wait_until_on_returns_when_should_wake_is_set() {
        let gate = OnOffGate::new(false);
        let should_wake = AtomicBool::new(true);
        // Must return promptly rather than block forever.
        gate.wait_until_on(&should_wake);
    }
}
