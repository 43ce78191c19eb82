//! Audio plumbing: sample unpacking, the producer/consumer ring buffer,
//! and the microphone source contract.

mod ring_buffer;
mod stream_info;
mod unpack;

pub use ring_buffer::RingBuffer;
pub use stream_info::{AudioStreamInfo, MicrophoneSource};
pub use unpack::unpack_samples;
