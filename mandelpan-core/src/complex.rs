use std::ops::{Div, Sub};

/// A point on the complex plane as two `f64` components.
///
/// Small `Copy` type used by the kernel and by viewport arithmetic
/// (anchored zoom, cursor readout).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    #[inline]
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Returns `re² + im²` without taking the square root.
    #[inline]
    pub fn norm_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// One step of the quadratic recurrence: `self² + c`.
    #[inline]
    pub fn square_add(self, c: Self) -> Self {
        Self {
            re: self.re * self.re - self.im * self.im + c.re,
            im: 2.0 * self.re * self.im + c.im,
        }
    }
}

impl Sub for Complex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Div<f64> for Complex {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self::new(self.re / rhs, self.im / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_add_matches_expansion() {
        // (1 + 2i)² + (0.5 - 1i) = (1 - 4 + 0.5) + (4 - 1)i
        let z = Complex::new(1.0, 2.0).square_add(Complex::new(0.5, -1.0));
        assert_eq!(z, Complex::new(-2.5, 3.0));
    }

    #[test]
    fn scalar_ops() {
        let a = Complex::new(2.0, -4.0);
        assert_eq!(a / 2.0, Complex::new(1.0, -2.0));
        assert_eq!(a - a, Complex::ZERO);
        assert!((a.norm_sq() - 20.0).abs() < f64::EPSILON);
    }
}
