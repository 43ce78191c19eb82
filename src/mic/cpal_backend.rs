//! Desktop microphone capture via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so, like the teacher's cpal backend,
//! the stream is built and owned entirely on a dedicated OS thread; this
//! struct only holds `Send + Sync` handles (atomics, a join handle, a
//! callback registry) and talks to that thread via shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::audio::{AudioStreamInfo, MicrophoneSource};
use crate::error::SoundLevelMeterError;

type Callback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Every captured sample is normalized to 16-bit PCM before reaching
/// registered callbacks, regardless of the device's native format, so
/// the sample unpacker always sees a consistent width.
const CAPTURE_SAMPLE_WIDTH_BYTES: usize = 2;

pub struct CpalSource {
    callbacks: Arc<Mutex<Vec<Callback>>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    stream_thread: Mutex<Option<JoinHandle<()>>>,
    stream_info: Arc<Mutex<Option<AudioStreamInfo>>>,
}

impl CpalSource {
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            stream_thread: Mutex::new(None),
            stream_info: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MicrophoneSource for CpalSource {
    fn add_data_callback(&self, callback: Callback) {
        self.callbacks
            .lock()
            .expect("callback registry poisoned")
            .push(callback);
    }

    fn start(&self) -> Result<(), SoundLevelMeterError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let callbacks = Arc::clone(&self.callbacks);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let stream_info = Arc::clone(&self.stream_info);
        shutdown.store(false, Ordering::SeqCst);

        let (ready_tx, ready_rx) = mpsc::channel::<Result<AudioStreamInfo, String>>();

        let handle = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err("no default input device".to_string()));
                    return;
                }
            };
            let config = match device.default_input_config() {
                Ok(config) => config,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("no input config: {err}")));
                    return;
                }
            };

            let sample_rate = config.sample_rate().0;
            let channels = config.channels() as usize;
            let info = AudioStreamInfo::new(sample_rate, CAPTURE_SAMPLE_WIDTH_BYTES);
            *stream_info.lock().expect("stream info poisoned") = Some(info);

            let err_fn = |err| log::error!("cpal input stream error: {err}");
            let stream_callbacks = Arc::clone(&callbacks);

            macro_rules! build_stream {
                ($sample_type:ty, $convert:expr) => {
                    device.build_input_stream(
                        &config.into(),
                        move |data: &[$sample_type], _| {
                            emit_mono_pcm16(data, channels, $convert, &stream_callbacks);
                        },
                        err_fn,
                        None,
                    )
                };
            }

            let stream = match config.sample_format() {
                SampleFormat::F32 => build_stream!(f32, |s: f32| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                SampleFormat::I16 => build_stream!(i16, |s: i16| s),
                SampleFormat::U16 => build_stream!(u16, |s: u16| (s as i32 - i16::MAX as i32 - 1) as i16),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format: {other:?}")));
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("failed to build input stream: {err}")));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start input stream: {err}")));
                return;
            }

            running.store(true, Ordering::SeqCst);
            let _ = ready_tx.send(Ok(info));

            while !shutdown.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }
            running.store(false, Ordering::SeqCst);
        });

        *self.stream_thread.lock().expect("stream thread lock poisoned") = Some(handle);

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(_info)) => Ok(()),
            Ok(Err(reason)) => Err(SoundLevelMeterError::ConfigInvalid { reason }),
            Err(_) => Err(SoundLevelMeterError::ConfigInvalid {
                reason: "timed out starting capture stream".to_string(),
            }),
        }
    }

    fn stop(&self) -> Result<(), SoundLevelMeterError> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.stream_thread.lock().expect("stream thread lock poisoned").take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn audio_stream_info(&self) -> AudioStreamInfo {
        self.stream_info
            .lock()
            .expect("stream info poisoned")
            .unwrap_or(AudioStreamInfo::new(48_000, CAPTURE_SAMPLE_WIDTH_BYTES))
    }
}

fn emit_mono_pcm16<T: Copy>(
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> i16,
    callbacks: &Mutex<Vec<Callback>>,
) {
    if channels == 0 || data.is_empty() {
        return;
    }
    let mut bytes = Vec::with_capacity((data.len() / channels) * CAPTURE_SAMPLE_WIDTH_BYTES);
    for frame in data.chunks(channels) {
        let sum: i32 = frame.iter().map(|&s| convert(s) as i32).sum();
        let mono = (sum / frame.len() as i32) as i16;
        bytes.extend_from_slice(&mono.to_le_bytes());
    }

    let callbacks = callbacks.lock().expect("callback registry poisoned");
    for callback in callbacks.iter() {
        callback(&bytes);
    }
}
