//! Power-law transfer function used for display encoding.
//!
//! - Encode: linear light → gamma-encoded (`v^(1/2.2)`)
//! - Decode: gamma-encoded → linear light (`v^2.2`)
//!
//! Negative inputs map to 0 in both directions.

/// Display gamma.
pub const GAMMA: f32 = 2.2;

/// Gamma-encode a linear value: `linear^(1/2.2)`.
#[inline]
pub fn gamma_encode(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }
    linear.powf(1.0 / GAMMA)
}

/// Decode a gamma-encoded value back to linear: `encoded^2.2`.
#[inline]
pub fn gamma_decode(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }
    encoded.powf(GAMMA)
}
