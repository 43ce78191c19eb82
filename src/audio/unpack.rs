//! Packed Q-format byte unpacking into normalized floats.

/// Converts `width`-byte little-endian two's-complement samples into
/// `[-1, +1)` floats, writing into `out` (cleared and resized to the
/// frame count first).
///
/// Iterates back-to-front, mirroring the reference implementation's
/// byte-to-float walk order; unlike the C/C++ original this does not
/// reinterpret the same allocation in place (Rust's aliasing rules make
/// that trick either unsound or pointless once `out` isn't literally the
/// same buffer as `bytes`), so `out` is a separate, reused buffer instead.
///
/// `width` must be 1..=4; out-of-range widths are rejected by
/// configuration validation, not here.
pub fn unpack_samples(bytes: &[u8], width: usize, out: &mut Vec<f32>) {
    debug_assert!((1..=4).contains(&width), "sample width must be 1..=4 bytes");

    let frame_count = bytes.len() / width;
    out.clear();
    out.resize(frame_count, 0.0);

    let shift = 32 - (width * 8) as u32;
    for i in (0..frame_count).rev() {
        let start = i * width;
        let mut value: i32 = 0;
        for (j, &b) in bytes[start..start + width].iter().enumerate() {
            value |= (b as i32) << (8 * j);
        }
        // Left-justify into the high bits: this both scales the sample
        // to full 32-bit range and reproduces two's-complement sign
        // extension, since the original sign bit lands in bit 31.
        value <<= shift;
        out[i] = value as f32 / (i32::MAX as f32 + 1.0);
    }
}
