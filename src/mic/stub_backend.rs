//! Deterministic in-process microphone source for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::{AudioStreamInfo, MicrophoneSource};
use crate::error::SoundLevelMeterError;

type Callback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// A microphone source the test harness drives directly - no real
/// hardware, no background thread. `push_samples` feeds frames exactly
/// as a real capture callback would.
pub struct SyntheticSource {
    callbacks: Arc<Mutex<Vec<Callback>>>,
    running: Arc<AtomicBool>,
    info: AudioStreamInfo,
}

impl SyntheticSource {
    pub fn new(info: AudioStreamInfo) -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            info,
        }
    }

    /// Feeds normalized float samples, converting to the 16-bit PCM
    /// bytes the rest of the pipeline expects, and invokes registered
    /// callbacks as if this were a live capture. No-op while stopped.
    pub fn push_samples(&self, samples: &[f32]) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            let value = (clamped * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let callbacks = self.callbacks.lock().expect("callback registry poisoned");
        for callback in callbacks.iter() {
            callback(&bytes);
        }
    }

    /// Simulates the capture source dying mid-session without `stop`
    /// being called, for "microphone drops mid-interval" scenarios.
    pub fn simulate_drop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl MicrophoneSource for SyntheticSource {
    fn add_data_callback(&self, callback: Callback) {
        self.callbacks
            .lock()
            .expect("callback registry poisoned")
            .push(callback);
    }

    fn start(&self) -> Result<(), SoundLevelMeterError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), SoundLevelMeterError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn audio_stream_info(&self) -> AudioStreamInfo {
        self.info
    }
}
