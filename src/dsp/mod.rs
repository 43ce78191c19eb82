//! Digital signal processing primitives: the biquad filter engine and the
//! buffer stack the DAG evaluator walks through.

mod biquad;
mod buffer_stack;

pub use biquad::{Filter, SosCoefficients, SosFilter};
pub use buffer_stack::BufferStack;
