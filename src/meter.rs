//! Meter facade: wires a microphone source, filters, and sensors
//! together and exposes the host-facing lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;

use crate::audio::{MicrophoneSource, RingBuffer};
use crate::config::MeterConfig;
use crate::defer_queue::DeferQueue;
use crate::dsp::Filter;
use crate::error::SoundLevelMeterError;
use crate::sensor::{CalibrationConfig, Sensor};
use crate::telemetry::{hub, TelemetryHub};
use crate::worker::{self, OnOffGate, WorkerContext};

/// Wires together a microphone source, the DAG of filters and sensors,
/// and the worker/main-loop concurrency primitives. Exposes
/// `setup`/`loop_tick` as the two host-facing lifecycle contract points
/// in place of a full component-registration framework.
pub struct Meter {
    config: MeterConfig,
    mic: Option<Arc<dyn MicrophoneSource>>,
    filters: Mutex<Vec<Arc<dyn Filter>>>,
    sensors: Arc<Mutex<Vec<Sensor>>>,
    defer: Arc<DeferQueue>,
    is_on: Arc<OnOffGate>,
    is_pending_stop: Arc<AtomicBool>,
    is_running: Arc<AtomicBool>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    telemetry: &'static TelemetryHub,
}

impl Meter {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            is_on: Arc::new(OnOffGate::new(false)),
            config,
            mic: None,
            filters: Mutex::new(Vec::new()),
            sensors: Arc::new(Mutex::new(Vec::new())),
            defer: Arc::new(DeferQueue::new()),
            is_pending_stop: Arc::new(AtomicBool::new(false)),
            is_running: Arc::new(AtomicBool::new(false)),
            worker_handle: Mutex::new(None),
            telemetry: hub(),
        }
    }

    pub fn set_microphone_source(&mut self, source: Arc<dyn MicrophoneSource>) {
        self.mic = Some(source);
    }

    /// Registers a filter in the meter's filter-owning set (deduplicated
    /// by identity). Sensors reference filters directly via their own
    /// `Arc` clones; this set exists so a meter-wide reset can zero every
    /// filter's state without walking every sensor's prefix list.
    pub fn add_dsp_filter(&self, filter: Arc<dyn Filter>) {
        let mut filters = self.filters.lock().expect("filters poisoned");
        if !filters.iter().any(|f| Arc::ptr_eq(f, &filter)) {
            filters.push(filter);
        }
    }

    pub fn add_sensor(&self, sensor: Sensor) {
        self.sensors.lock().expect("sensors poisoned").push(sensor);
    }

    /// Calls `start()` if `is_auto_start` is configured. The one
    /// host-facing setup contract point.
    pub fn setup(&mut self) -> Result<(), SoundLevelMeterError> {
        if self.config.is_auto_start {
            self.start()?;
        }
        Ok(())
    }

    /// Drains the deferred publish queue. The host calls this at its own
    /// cooperative cadence; this is the other host-facing contract point.
    pub fn loop_tick(&self) -> usize {
        self.defer.drain_tick()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn is_on(&self) -> bool {
        self.is_on.is_on()
    }

    /// Resets all accumulators and publishes NaN, then flips the on-flag -
    /// reset-before-signal, so the NaN publications are never dropped
    /// by a "only publish when on" guard. See DESIGN.md.
    pub fn turn_off(&self) {
        for filter in self.filters.lock().expect("filters poisoned").iter() {
            filter.reset();
        }
        {
            let mut sensors = self.sensors.lock().expect("sensors poisoned");
            for sensor in sensors.iter_mut() {
                sensor.reset_and_publish_nan(&self.defer);
            }
        }
        self.is_on.set(false);
    }

    pub fn turn_on(&self) {
        self.is_on.set(true);
    }

    pub fn toggle(&self) {
        if self.is_on() {
            self.turn_off();
        } else {
            self.turn_on();
        }
    }

    /// Idempotent: a no-op while already running.
    pub fn start(&mut self) -> Result<(), SoundLevelMeterError> {
        if self.is_running() {
            return Ok(());
        }
        self.config
            .validate()
            .map_err(|reason| SoundLevelMeterError::ConfigInvalid { reason })?;

        let mic = self
            .mic
            .clone()
            .ok_or(SoundLevelMeterError::NoMicrophoneSource)?;

        mic.start()
            .map_err(|_| SoundLevelMeterError::ConfigInvalid {
                reason: "microphone source failed to start".to_string(),
            })?;
        let info = mic.audio_stream_info();

        {
            let mut sensors = self.sensors.lock().expect("sensors poisoned");
            crate::dag::sort_sensors_by_filter_identity(&mut sensors);
        }

        let ring_buffer = Arc::new(RingBuffer::new(info.ms_to_bytes(self.config.ring_buffer_size_ms)));
        let producer_ref: Weak<RingBuffer> = Arc::downgrade(&ring_buffer);
        mic.add_data_callback(Box::new(move |bytes| {
            if let Some(rb) = producer_ref.upgrade() {
                rb.write(bytes);
            }
        }));

        self.is_pending_stop.store(false, Ordering::SeqCst);
        self.is_on.set(true);

        let ctx = WorkerContext {
            mic: Arc::clone(&mic),
            sensors: Arc::clone(&self.sensors),
            defer: Arc::clone(&self.defer),
            calibration: CalibrationConfig {
                mic_sensitivity: self.config.mic_sensitivity,
                mic_sensitivity_ref: self.config.mic_sensitivity_ref,
                offset: self.config.offset,
            },
            warmup_interval_ms: self.config.warmup_interval_ms,
            update_interval_ms: self.config.update_interval_ms,
            is_on: Arc::clone(&self.is_on),
            is_pending_stop: Arc::clone(&self.is_pending_stop),
            is_running: Arc::clone(&self.is_running),
        };

        // Set synchronously, before the spawn, so a second start() call
        // made while the worker is still warming up sees true and is a
        // no-op. The worker clears this only at teardown.
        self.is_running.store(true, Ordering::SeqCst);

        let task_core = self.config.task_core;
        let telemetry = self.telemetry;
        let handle = std::thread::spawn(move || {
            match core_affinity::get_core_ids() {
                Some(core_ids) => {
                    let chosen = core_ids
                        .iter()
                        .find(|c| c.id == task_core)
                        .or_else(|| core_ids.first())
                        .copied();
                    match chosen {
                        Some(core) if core_affinity::set_for_current(core) => {}
                        _ => log::warn!("failed to pin worker to core {}", task_core),
                    }
                }
                None => log::warn!("core affinity not supported on this platform, running unpinned"),
            }

            worker::run_worker(ctx, ring_buffer, info, telemetry);
        });

        *self.worker_handle.lock().expect("worker handle poisoned") = Some(handle);
        Ok(())
    }

    /// Idempotent: sets a pending-stop flag the worker observes between
    /// buffers; does not force-kill the thread.
    pub fn stop(&mut self) {
        self.is_pending_stop.store(true, Ordering::SeqCst);
        self.is_on.set(true); // wake a paused worker so it observes the stop flag
        if let Some(handle) = self.worker_handle.lock().expect("worker handle poisoned").take() {
            let _ = handle.join();
        }
        self.is_on.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioStreamInfo;
    use crate::mic::SyntheticSource;
    use crate::sensor::{EqSensor, PublishSink};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn published_values() -> (PublishSink, Arc<StdMutex<Vec<f32>>>) {
        let values = Arc::new(StdMutex::new(Vec::new()));
        let captured = Arc::clone(&values);
        (Arc::new(move |v| captured.lock().unwrap().push(v)), values)
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut meter = Meter::new(MeterConfig {
            warmup_interval_ms: 0,
            update_interval_ms: 10,
            ..MeterConfig::default()
        });
        let source = Arc::new(SyntheticSource::new(AudioStreamInfo::new(8_000, 2)));
        meter.set_microphone_source(source);

        assert!(meter.start().is_ok());
        assert!(meter.start().is_ok());
        assert!(meter.is_running());
        meter.stop();
    }

    #[test]
    fn start_without_microphone_source_errors() {
        let mut meter = Meter::new(MeterConfig::default());
        assert_eq!(meter.start(), Err(SoundLevelMeterError::NoMicrophoneSource));
    }

    #[test]
    fn turn_off_publishes_nan_before_clearing_on_flag() {
        let mut meter = Meter::new(MeterConfig {
            warmup_interval_ms: 0,
            update_interval_ms: 10,
            ..MeterConfig::default()
        });
        let (sink, values) = published_values();
        meter.add_sensor(Sensor::Eq(EqSensor::new(Vec::new(), sink, 1000)));

        let source = Arc::new(SyntheticSource::new(AudioStreamInfo::new(8_000, 2)));
        meter.set_microphone_source(source);
        meter.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        meter.turn_off();
        assert!(!meter.is_on());
        std::thread::sleep(Duration::from_millis(20));
        meter.loop_tick();

        let published = values.lock().unwrap();
        assert!(published.iter().any(|v| v.is_nan()));

        meter.stop();
    }

    #[test]
    fn toggle_is_its_own_inverse_on_is_on() {
        let mut meter = Meter::new(MeterConfig {
            warmup_interval_ms: 0,
            ..MeterConfig::default()
        });
        let source = Arc::new(SyntheticSource::new(AudioStreamInfo::new(8_000, 2)));
        meter.set_microphone_source(source);
        meter.start().unwrap();

        let initial = meter.is_on();
        meter.toggle();
        meter.toggle();
        assert_eq!(meter.is_on(), initial);
        meter.stop();
    }
}
