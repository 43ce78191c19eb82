//! Biquad (second-order-section) IIR filter cascade.
//!
//! Direct-Form-II-Transposed, one two-word state per section:
//! ```text
//! y   = b0*x + s0
//! s0' = b1*x - a1*y + s1
//! s1' = b2*x - a2*y
//! ```
//! `a0` is assumed normalized to 1 and not stored.

use std::sync::Mutex;

/// A filter transforms a frame buffer in place, preserving its length.
///
/// Identity matters: two sensors holding the same `Arc<dyn Filter>` share
/// state and must be evaluated consecutively by the DAG evaluator - see
/// [`crate::dag`].
pub trait Filter: Send + Sync {
    /// Filters `buf` in place.
    fn process(&self, buf: &mut [f32]);

    /// Zeroes all internal state. Called on meter reset.
    fn reset(&self);
}

/// Coefficients for one second-order section: `{b0, b1, b2, a1, a2}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SosCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl SosCoefficients {
    pub const fn new(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        Self { b0, b1, b2, a1, a2 }
    }

    /// The coefficient set of an identity (pass-through) section.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 0.0)
    }
}

/// A cascade of second-order sections applied in declared order.
///
/// State (two words per section) lives behind a `Mutex` so the filter can
/// be shared as `Arc<dyn Filter>` across sensors without `unsafe` interior
/// mutability, even though in practice only the worker thread ever calls
/// `process`/`reset` between `start` and `stop`.
pub struct SosFilter {
    coeffs: Vec<SosCoefficients>,
    state: Mutex<Vec<[f32; 2]>>,
}

impl SosFilter {
    pub fn new(coeffs: Vec<SosCoefficients>) -> Self {
        let state = vec![[0.0_f32; 2]; coeffs.len()];
        Self {
            coeffs,
            state: Mutex::new(state),
        }
    }

    /// A no-op cascade with zero sections; `process` leaves the buffer
    /// untouched. Used for sensors with an empty filter list.
    pub fn passthrough() -> Self {
        Self::new(Vec::new())
    }

    pub fn section_count(&self) -> usize {
        self.coeffs.len()
    }
}

impl Filter for SosFilter {
    fn process(&self, buf: &mut [f32]) {
        if self.coeffs.is_empty() {
            return;
        }
        let mut state = self.state.lock().expect("SosFilter state poisoned");
        for (section, s) in self.coeffs.iter().zip(state.iter_mut()) {
            let [mut s0, mut s1] = *s;
            for sample in buf.iter_mut() {
                let x = *sample;
                let y = section.b0 * x + s0;
                s0 = section.b1 * x - section.a1 * y + s1;
                s1 = section.b2 * x - section.a2 * y;
                *sample = y;
            }
            *s = [s0, s1];
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("SosFilter state poisoned");
        for s in state.iter_mut() {
            *s = [0.0, 0.0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_leaves_buffer_unchanged() {
        let filter = SosFilter::passthrough();
        let mut buf = vec![0.1, -0.2, 0.3];
        let expected = buf.clone();
        filter.process(&mut buf);
        assert_eq!(buf, expected);
    }

    #[test]
    fn identity_section_is_transparent() {
        let filter = SosFilter::new(vec![SosCoefficients::identity()]);
        let mut buf = vec![0.5, -0.25, 0.125];
        let expected = buf.clone();
        filter.process(&mut buf);
        assert_eq!(buf, expected);
    }

    #[test]
    fn state_carries_across_process_calls() {
        // A single-pole leaky integrator: y[n] = x[n] + 0.5*y[n-1].
        let coeffs = SosCoefficients::new(1.0, 0.5, 0.0, 0.0, 0.0);
        let filter = SosFilter::new(vec![coeffs]);

        let mut whole = vec![1.0_f32, 0.0, 0.0, 0.0];
        filter.reset();
        filter.process(&mut whole);

        let filter_split = SosFilter::new(vec![coeffs]);
        let mut first = vec![1.0_f32, 0.0];
        let mut second = vec![0.0_f32, 0.0];
        filter_split.process(&mut first);
        filter_split.process(&mut second);

        assert_eq!(whole[0], first[0]);
        assert_eq!(whole[1], first[1]);
        assert_eq!(whole[2], second[0]);
        assert_eq!(whole[3], second[1]);
    }

    #[test]
    fn reset_zeroes_state() {
        let coeffs = SosCoefficients::new(1.0, 0.5, 0.0, 0.0, 0.0);
        let filter = SosFilter::new(vec![coeffs]);
        let mut buf = vec![1.0, 1.0, 1.0];
        filter.process(&mut buf);
        filter.reset();

        let mut probe = vec![0.0_f32];
        filter.process(&mut probe);
        assert_eq!(probe[0], 0.0);
    }

    #[test]
    fn sections_apply_in_declared_order() {
        let gain_then_offset_pole = vec![
            SosCoefficients::new(2.0, 0.0, 0.0, 0.0, 0.0),
            SosCoefficients::new(1.0, 0.5, 0.0, 0.0, 0.0),
        ];
        let filter = SosFilter::new(gain_then_offset_pole);
        let mut buf = vec![1.0_f32, 0.0];
        filter.process(&mut buf);
        // First section doubles: [2, 0]. Second is a leaky integrator on that.
        assert_eq!(buf[0], 2.0);
        assert_eq!(buf[1], 1.0);
    }
}
