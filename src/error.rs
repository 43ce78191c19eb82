//! Error types for the sound-level meter.
//!
//! Structured error handling with numeric codes, in the style used
//! throughout this crate's audio pipeline: one enum, one `ErrorCode`
//! impl, `Display`/`std::error::Error`, and a handful of `From` impls
//! for the I/O-adjacent failures that show up at the edges.

use std::fmt;

/// Error codes for structured error reporting.
pub trait ErrorCode {
    /// Get the numeric error code.
    fn code(&self) -> i32;

    /// Get the human-readable error message.
    fn message(&self) -> String;
}

/// Error code constants, grouped by the stage that raises them.
///
/// Error code range: 2001-2010.
pub struct MeterErrorCodes {}

impl MeterErrorCodes {
    pub const CONFIG_INVALID: i32 = 2001;
    pub const ALREADY_RUNNING: i32 = 2002;
    pub const NOT_RUNNING: i32 = 2003;
    pub const MICROPHONE_STOPPED: i32 = 2004;
    pub const BUFFER_FULL: i32 = 2005;
    pub const LOCK_POISONED: i32 = 2006;
    pub const NO_MICROPHONE_SOURCE: i32 = 2007;
}

/// Log a meter error with structured context.
pub fn log_meter_error(err: &SoundLevelMeterError, context: &str) {
    log::error!(
        "sound level meter error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the sound-level meter.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundLevelMeterError {
    /// Configuration failed validation (zero interval, unsupported sample
    /// width, zero buffer capacity, and similar).
    ConfigInvalid { reason: String },

    /// `Meter::start` called while already running. Callers outside this
    /// crate never observe this - `Meter::start` treats it as a no-op -
    /// but internal preconditions assert against it directly.
    AlreadyRunning,

    /// An operation requiring a running meter was attempted while stopped.
    NotRunning,

    /// No `MicrophoneSource` was bound before `start`.
    NoMicrophoneSource,

    /// The microphone source stopped delivering data; recovered internally
    /// by the worker, surfaced to telemetry as a warning.
    MicrophoneStopped,

    /// The capture ring buffer was full when a producer tried to write;
    /// recovered internally by truncating the write, surfaced to
    /// telemetry as a warning.
    BufferFull,

    /// An internal `Mutex`/`Condvar` was poisoned by a panicking holder.
    LockPoisoned { component: String },
}

impl ErrorCode for SoundLevelMeterError {
    fn code(&self) -> i32 {
        match self {
            SoundLevelMeterError::ConfigInvalid { .. } => MeterErrorCodes::CONFIG_INVALID,
            SoundLevelMeterError::AlreadyRunning => MeterErrorCodes::ALREADY_RUNNING,
            SoundLevelMeterError::NotRunning => MeterErrorCodes::NOT_RUNNING,
            SoundLevelMeterError::NoMicrophoneSource => MeterErrorCodes::NO_MICROPHONE_SOURCE,
            SoundLevelMeterError::MicrophoneStopped => MeterErrorCodes::MICROPHONE_STOPPED,
            SoundLevelMeterError::BufferFull => MeterErrorCodes::BUFFER_FULL,
            SoundLevelMeterError::LockPoisoned { .. } => MeterErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SoundLevelMeterError::ConfigInvalid { reason } => {
                format!("invalid configuration: {}", reason)
            }
            SoundLevelMeterError::AlreadyRunning => "meter already running".to_string(),
            SoundLevelMeterError::NotRunning => "meter not running".to_string(),
            SoundLevelMeterError::NoMicrophoneSource => {
                "no microphone source bound to meter".to_string()
            }
            SoundLevelMeterError::MicrophoneStopped => {
                "microphone source stopped delivering data".to_string()
            }
            SoundLevelMeterError::BufferFull => "capture ring buffer is full".to_string(),
            SoundLevelMeterError::LockPoisoned { component } => {
                format!("lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for SoundLevelMeterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SoundLevelMeterError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for SoundLevelMeterError {}

impl From<std::io::Error> for SoundLevelMeterError {
    fn from(err: std::io::Error) -> Self {
        SoundLevelMeterError::ConfigInvalid {
            reason: err.to_string(),
        }
    }
}
