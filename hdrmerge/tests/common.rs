//! Common test utilities for synthetic bracket generation.
//!
//! These helpers create exposures programmatically, avoiding the need
//! to include binary test files in the repository.

#![allow(dead_code)]

use hdrmerge::Exposure;

/// Create a solid-color exposure.
pub fn create_solid(width: u32, height: u32, r: f32, g: f32, b: f32) -> Exposure {
    Exposure::solid(width, height, [r, g, b, 1.0]).unwrap()
}

/// Create a flat mid-gray bracket at EV {-2, 0, +1}.
///
/// Every capture holds the same linear values, as if the scene radiance
/// had already been scaled by the camera.
pub fn create_mid_gray_bracket(width: u32, height: u32) -> Vec<Exposure> {
    [-2.0, 0.0, 1.0]
        .iter()
        .map(|&ev| create_solid(width, height, 0.18, 0.18, 0.18).with_ev(ev))
        .collect()
}

/// Linear scene radiance of a horizontal gradient with a checker overlay.
///
/// Values span roughly `[0.01, peak]`.
pub fn scene_radiance(x: u32, y: u32, width: u32, peak: f32) -> [f32; 3] {
    let t = x as f32 / (width - 1).max(1) as f32;
    let base = 0.01 + t * peak;
    let checker = if ((x / 4) + (y / 4)) % 2 == 0 { 1.0 } else { 0.8 };
    [base * checker, base * 0.9 * checker, base * 0.7]
}

/// Simulate a camera capture of [`scene_radiance`] at `ev`.
///
/// The capture scales radiance by `2^ev` and clips at 1.0, like a sensor.
pub fn capture(width: u32, height: u32, peak: f32, ev: f32) -> Exposure {
    let gain = ev.exp2();
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let rgb = scene_radiance(x, y, width, peak);
            data.extend_from_slice(&[
                (rgb[0] * gain).min(1.0),
                (rgb[1] * gain).min(1.0),
                (rgb[2] * gain).min(1.0),
                1.0,
            ]);
        }
    }
    Exposure::from_rgba_f32(width, height, data).unwrap().with_ev(ev)
}

/// Capture a bracket of [`scene_radiance`] at the given EVs.
pub fn capture_bracket(width: u32, height: u32, peak: f32, evs: &[f32]) -> Vec<Exposure> {
    evs.iter()
        .map(|&ev| capture(width, height, peak, ev))
        .collect()
}

/// Assert two floats are within `eps`.
pub fn assert_close(actual: f32, expected: f32, eps: f32, what: &str) {
    assert!(
        (actual - expected).abs() <= eps,
        "{}: expected {} ± {}, got {}",
        what,
        expected,
        eps,
        actual
    );
}

fn hash(x: i32, y: i32, seed: u32) -> f32 {
    let mut h = (x as u32)
        .wrapping_mul(0x27d4_eb2d)
        .wrapping_add((y as u32).wrapping_mul(0x1656_67b1))
        .wrapping_add(seed.wrapping_mul(0x9e37_79b9));
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    (h & 0xffff) as f32 / 65535.0
}

fn value_noise(x: i32, y: i32, cell: i32, seed: u32) -> f32 {
    let gx = x.div_euclid(cell);
    let gy = y.div_euclid(cell);
    let fx = x.rem_euclid(cell) as f32 / cell as f32;
    let fy = y.rem_euclid(cell) as f32 / cell as f32;
    let top = hash(gx, gy, seed) * (1.0 - fx) + hash(gx + 1, gy, seed) * fx;
    let bottom = hash(gx, gy + 1, seed) * (1.0 - fx) + hash(gx + 1, gy + 1, seed) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Textured linear radiance in roughly `[0.05, 0.95]`, defined everywhere.
pub fn textured_radiance(x: i32, y: i32) -> f32 {
    0.05 + 0.55 * value_noise(x, y, 16, 1) + 0.35 * value_noise(x, y, 4, 2)
}

/// Capture of [`textured_radiance`] by a camera displaced by `(dx, dy)`,
/// so that `capture(x, y) = radiance(x - dx, y - dy) * 2^ev`.
pub fn textured_capture(size: u32, dx: i32, dy: i32, ev: f32) -> Exposure {
    let gain = ev.exp2();
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let v = textured_radiance(x - dx, y - dy) * gain;
            data.extend_from_slice(&[v, v * 0.85, v * 0.7, 1.0]);
        }
    }
    Exposure::from_rgba_f32(size, size, data).unwrap().with_ev(ev)
}
