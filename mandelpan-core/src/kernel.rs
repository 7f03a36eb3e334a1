//! Escape-time kernel: `z_{n+1} = z_n² + c`, starting from `z₀ = 0`.
//!
//! Everything here is a pure function of its arguments, so any number of
//! render workers may call it concurrently without coordination.

use crate::complex::Complex;
use crate::viewport::Viewport;

/// Squared bailout radius. An orbit with `|z|² > 4` has escaped.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Returns `true` if `c` lies inside the main cardioid.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

/// Number of recurrence steps taken before `|z|² > 4`, capped at
/// `max_iterations`.
///
/// A return value equal to `max_iterations` means the point never escaped
/// and is treated as belonging to the set.
#[inline]
pub fn escape_time(c: Complex, max_iterations: u32) -> u32 {
    // Both regions never escape; answer them without iterating.
    if in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im) {
        return max_iterations;
    }

    let mut z = Complex::ZERO;
    let mut count = 0;
    while z.norm_sq() <= ESCAPE_RADIUS_SQ && count < max_iterations {
        z = z.square_add(c);
        count += 1;
    }
    count
}

/// Escape count for a single pixel of a `width × height` raster.
#[inline]
pub fn iterations_at(px: u32, py: u32, width: u32, height: u32, viewport: &Viewport) -> u32 {
    escape_time(
        viewport.pixel_to_complex(px, py, width, height),
        viewport.max_iterations,
    )
}

/// Deterministic RGB colour for an escape count.
#[inline]
pub fn color(count: u32) -> [u8; 3] {
    [
        (count % 255) as u8,
        ((count + 20) % 255) as u8,
        ((count + 10) % 255) as u8,
    ]
}

/// Fill one RGBA row of the raster.
///
/// `row` must hold exactly `width * 4` bytes. Alpha is always opaque.
pub fn shade_row(row: &mut [u8], py: u32, width: u32, height: u32, viewport: &Viewport) {
    debug_assert_eq!(row.len(), width as usize * BYTES_PER_PIXEL);
    for (px, pixel) in (0..width).zip(row.chunks_exact_mut(BYTES_PER_PIXEL)) {
        let [r, g, b] = color(iterations_at(px, py, width, height, viewport));
        pixel.copy_from_slice(&[r, g, b, 255]);
    }
}
