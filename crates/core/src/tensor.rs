//! Symmetric traceless 2x2 tensor.
//!
//! A tensor is stored as the component pair `(a, b) = r * (cos 2theta,
//! sin 2theta)`, where `r >= 0` is the magnitude and `theta` the
//! orientation of the major eigenvector. Component storage makes addition
//! a plain component sum, so the direction of a weighted sum is stable
//! under scaling. A tensor with magnitude below [`Tensor::DEGENERATE_EPS`]
//! has no defined direction.

use crate::vector::Vec2;
use std::f64::consts::FRAC_PI_2;

/// Symmetric traceless tensor in component form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tensor {
    a: f64,
    b: f64,
}

impl Tensor {
    /// Magnitudes below this have no meaningful eigenvector direction.
    pub const DEGENERATE_EPS: f64 = 1e-6;

    /// The degenerate zero tensor.
    pub fn zero() -> Self {
        Self { a: 0.0, b: 0.0 }
    }

    /// Unit tensor whose major eigenvector points along `theta`.
    pub fn from_angle(theta: f64) -> Self {
        Self {
            a: (2.0 * theta).cos(),
            b: (2.0 * theta).sin(),
        }
    }

    /// Tensor from raw components.
    pub fn from_components(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn magnitude(&self) -> f64 {
        self.a.hypot(self.b)
    }

    pub fn is_degenerate(&self) -> bool {
        self.magnitude() < Self::DEGENERATE_EPS
    }

    /// Orientation of the major eigenvector, in (-pi/2, pi/2].
    pub fn theta(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        self.b.atan2(self.a) / 2.0
    }

    /// Component-wise sum. Associative; adding a tensor to itself leaves
    /// its direction unchanged.
    pub fn add(&self, other: &Tensor) -> Tensor {
        Tensor {
            a: self.a + other.a,
            b: self.b + other.b,
        }
    }

    /// Scales the magnitude.
    pub fn scale(&self, s: f64) -> Tensor {
        Tensor {
            a: self.a * s,
            b: self.b * s,
        }
    }

    /// Rescales to unit magnitude; degenerate tensors stay zero.
    pub fn normalized(&self) -> Tensor {
        let r = self.magnitude();
        if r < Self::DEGENERATE_EPS {
            return Tensor::zero();
        }
        Tensor {
            a: self.a / r,
            b: self.b / r,
        }
    }

    /// Rotates the orientation by `angle` radians, keeping the magnitude.
    pub fn rotate(&self, angle: f64) -> Tensor {
        if angle == 0.0 || self.is_degenerate() {
            return *self;
        }
        let r = self.magnitude();
        let theta = self.theta() + angle;
        Tensor {
            a: r * (2.0 * theta).cos(),
            b: r * (2.0 * theta).sin(),
        }
    }

    /// Major eigenvector as a unit vector, or `None` when degenerate.
    pub fn major(&self) -> Option<Vec2> {
        if self.is_degenerate() {
            return None;
        }
        Some(Vec2::from_angle(self.theta()))
    }

    /// Minor eigenvector (perpendicular to the major), or `None` when
    /// degenerate.
    pub fn minor(&self) -> Option<Vec2> {
        if self.is_degenerate() {
            return None;
        }
        Some(Vec2::from_angle(self.theta() + FRAC_PI_2))
    }
}
