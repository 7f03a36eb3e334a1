use crate::complex::Complex;
use crate::error::CoreError;

/// The visible region of the complex plane plus the iteration bound.
///
/// A viewport is an immutable value: every navigation step produces a new
/// one, so a render job can hold a copy without synchronisation. `zoom`
/// is a magnification factor; at `zoom == 1` the raster spans `[-2, 2]`
/// on both axes around the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
    pub max_iterations: u32,
}

impl Viewport {
    pub const MIN_ITERATIONS: u32 = 1;
    pub const MAX_ITERATIONS: u32 = 10_000;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

    /// Width and height of the plane region shown at `zoom == 1`.
    pub const BASE_SPAN: f64 = 4.0;

    /// Create a viewport with explicit parameters.
    pub fn new(center_x: f64, center_y: f64, zoom: f64, max_iterations: u32) -> crate::Result<Self> {
        if !center_x.is_finite() || !center_y.is_finite() {
            return Err(CoreError::InvalidViewport {
                reason: format!("center must be finite, got ({center_x}, {center_y})"),
            });
        }
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidViewport {
                reason: format!("zoom must be positive and finite, got {zoom}"),
            });
        }
        check_max_iterations(max_iterations)?;
        Ok(Self {
            center_x,
            center_y,
            zoom,
            max_iterations,
        })
    }

    /// The base view, centred on the origin and unmagnified.
    pub fn home(max_iterations: u32) -> crate::Result<Self> {
        Self::new(0.0, 0.0, 1.0, max_iterations)
    }

    pub fn center(&self) -> Complex {
        Complex::new(self.center_x, self.center_y)
    }

    /// Map a pixel of a `width × height` raster to the complex plane.
    ///
    /// Row 0 is the top of the raster and maps to the most negative
    /// imaginary part.
    #[inline]
    pub fn pixel_to_complex(&self, px: u32, py: u32, width: u32, height: u32) -> Complex {
        self.point_to_complex(px as f64, py as f64, width, height)
    }

    /// Like [`pixel_to_complex`](Self::pixel_to_complex) for fractional
    /// positions (cursor coordinates).
    #[inline]
    pub fn point_to_complex(&self, px: f64, py: f64, width: u32, height: u32) -> Complex {
        let w = width as f64;
        let h = height as f64;
        Complex::new(
            (px - w / 2.0) * Self::BASE_SPAN / (w * self.zoom) + self.center_x,
            (py - h / 2.0) * Self::BASE_SPAN / (h * self.zoom) + self.center_y,
        )
    }

    /// Translate by a pixel delta, as when dragging: the plane follows the
    /// cursor, so the centre moves the opposite way.
    pub fn panned(&self, dx: f64, dy: f64, width: u32, height: u32) -> crate::Result<Self> {
        let step_x = Self::BASE_SPAN / (width as f64 * self.zoom);
        let step_y = Self::BASE_SPAN / (height as f64 * self.zoom);
        Self::new(
            self.center_x - dx * step_x,
            self.center_y - dy * step_y,
            self.zoom,
            self.max_iterations,
        )
    }

    /// Magnify by `factor` keeping the point under `(px, py)` fixed.
    ///
    /// `factor > 1` zooms in. Fails without side effects when the factor or
    /// the resulting zoom is not a positive finite number.
    pub fn zoomed_at(
        &self,
        px: f64,
        py: f64,
        width: u32,
        height: u32,
        factor: f64,
    ) -> crate::Result<Self> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(CoreError::InvalidParameter {
                reason: format!("zoom factor must be positive and finite, got {factor}"),
            });
        }
        let anchor = self.point_to_complex(px, py, width, height);
        let center = anchor - (anchor - self.center()) / factor;
        Self::new(center.re, center.im, self.zoom * factor, self.max_iterations)
    }

    /// Return a copy with a different iteration bound.
    pub fn with_max_iterations(self, max_iterations: u32) -> crate::Result<Self> {
        check_max_iterations(max_iterations)?;
        Ok(Self {
            max_iterations,
            ..self
        })
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            zoom: 1.0,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

fn check_max_iterations(max_iterations: u32) -> crate::Result<()> {
    if !(Viewport::MIN_ITERATIONS..=Viewport::MAX_ITERATIONS).contains(&max_iterations) {
        return Err(CoreError::InvalidParameter {
            reason: format!(
                "max iterations must be in [{}, {}], got {max_iterations}",
                Viewport::MIN_ITERATIONS,
                Viewport::MAX_ITERATIONS
            ),
        });
    }
    Ok(())
}

/// Parse user-entered max-iterations text.
///
/// Surrounding whitespace is ignored; anything that is not an integer in
/// `[1, 10000]` is an [`CoreError::InvalidParameter`].
pub fn parse_max_iterations(text: &str) -> crate::Result<u32> {
    let trimmed = text.trim();
    let value: u32 = trimmed.parse().map_err(|_| CoreError::InvalidParameter {
        reason: format!("max iterations must be a whole number, got {trimmed:?}"),
    })?;
    check_max_iterations(value)?;
    Ok(value)
}
