//! Microphone source contract and stream metadata.

use crate::error::SoundLevelMeterError;

/// Sample-rate and byte-width metadata, read only after a source is
/// bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub sample_width_bytes: usize,
}

impl AudioStreamInfo {
    pub fn new(sample_rate: u32, sample_width_bytes: usize) -> Self {
        Self {
            sample_rate,
            sample_width_bytes,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.sample_width_bytes
    }

    pub fn ms_to_bytes(&self, ms: u32) -> usize {
        let frames = (self.sample_rate as u64 * ms as u64) / 1000;
        frames as usize * self.bytes_per_frame()
    }

    pub fn samples_to_bytes(&self, samples: usize) -> usize {
        samples * self.bytes_per_frame()
    }
}

/// A bound audio source: the microphone capture backend feeds raw bytes
/// to every registered callback and reports whether it is still alive.
pub trait MicrophoneSource: Send + Sync {
    /// Registers a callback invoked with each chunk of captured bytes.
    /// Must be callable from the capture thread; callbacks must not block.
    fn add_data_callback(&self, callback: Box<dyn Fn(&[u8]) + Send + Sync>);

    fn start(&self) -> Result<(), SoundLevelMeterError>;
    fn stop(&self) -> Result<(), SoundLevelMeterError>;
    fn is_running(&self) -> bool;
    fn audio_stream_info(&self) -> AudioStreamInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_to_bytes_matches_sample_rate_and_width() {
        let info = AudioStreamInfo::new(48_000, 2);
        // 20ms at 48kHz = 960 frames * 2 bytes = 1920 bytes
        assert_eq!(info.ms_to_bytes(20), 1920);
    }

    #[test]
    fn samples_to_bytes_scales_by_width() {
        let info = AudioStreamInfo::new(48_000, 4);
        assert_eq!(info.samples_to_bytes(100), 400);
    }
}
