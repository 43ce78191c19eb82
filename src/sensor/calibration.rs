//! Per-sensor calibration arithmetic.

/// RMS-to-dBFS correction so a full-scale sine reads 0 dBFS:
/// `20*log10(sqrt(2))`.
pub const DBFS_OFFSET: f32 = 3.010_299_96;

/// Calibration constants shared by every sensor in a meter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationConfig {
    pub mic_sensitivity: Option<f32>,
    pub mic_sensitivity_ref: Option<f32>,
    pub offset: Option<f32>,
}

impl CalibrationConfig {
    /// Adjusts a raw dB value: adds [`DBFS_OFFSET`] when `is_rms`, then
    /// `mic_sensitivity_ref - mic_sensitivity` when both are set, then
    /// `offset` when set. Order matters - it matches the reference
    /// implementation exactly.
    pub fn adjust_db(&self, db: f32, is_rms: bool) -> f32 {
        let mut result = db;
        if is_rms {
            result += DBFS_OFFSET;
        }
        if let (Some(sensitivity), Some(sensitivity_ref)) =
            (self.mic_sensitivity, self.mic_sensitivity_ref)
        {
            result += sensitivity_ref - sensitivity;
        }
        if let Some(offset) = self.offset {
            result += offset;
        }
        result
    }
}
