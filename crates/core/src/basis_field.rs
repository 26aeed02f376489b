//! Basis fields: the primitive tensor-producing building blocks.
//!
//! A basis field yields a tensor at any query point plus a weight that
//! decays exponentially with distance from its centre. The tensor field
//! sums the weighted tensors of all basis fields, so near a centre that
//! field's direction dominates and far from all centres the field is
//! zero.
//!
//! All implementations are deterministic: same inputs produce the same
//! output.

use crate::tensor::Tensor;
use crate::vector::Vec2;

/// A primitive directional field with a centre and an influence range.
///
/// `weight` is `exp(-decay * |p - centre|^2 / size^2)`: `size` sets the
/// influence radius and `decay` is a pure shape knob for how sharply the
/// influence falls off.
pub trait BasisField: Send + Sync {
    /// The (unweighted) tensor this field contributes at `point`.
    fn tensor_at(&self, point: Vec2) -> Tensor;

    /// Distance-decayed contribution strength at `point`, in [0, 1].
    fn weight(&self, point: Vec2) -> f64;

    fn centre(&self) -> Vec2;

    /// Tensor contribution scaled by the field's weight at `point`.
    fn weighted_tensor(&self, point: Vec2) -> Tensor {
        self.tensor_at(point).scale(self.weight(point))
    }
}

/// Constant-direction field: all streamlines run parallel to `theta`
/// (major) or perpendicular to it (minor).
pub struct GridField {
    pub centre: Vec2,
    pub size: f64,
    pub decay: f64,
    pub theta: f64,
}

/// Field whose tensor is oriented perpendicular to the radius vector, so
/// streamlines circle (and with noise, spiral around) the centre.
pub struct RadialField {
    pub centre: Vec2,
    pub size: f64,
    pub decay: f64,
}

impl GridField {
    pub fn new(centre: Vec2, size: f64, decay: f64, theta: f64) -> Self {
        Self {
            centre,
            size,
            decay,
            theta,
        }
    }
}

impl RadialField {
    pub fn new(centre: Vec2, size: f64, decay: f64) -> Self {
        Self {
            centre,
            size,
            decay,
        }
    }
}

fn exponential_weight(point: Vec2, centre: Vec2, size: f64, decay: f64) -> f64 {
    if size <= 0.0 {
        return 0.0;
    }
    let norm_dist_sq = point.distance_to_sq(centre) / (size * size);
    (-decay * norm_dist_sq).exp()
}

impl BasisField for GridField {
    fn tensor_at(&self, _point: Vec2) -> Tensor {
        Tensor::from_angle(self.theta).scale(self.size * self.size)
    }

    fn weight(&self, point: Vec2) -> f64 {
        exponential_weight(point, self.centre, self.size, self.decay)
    }

    fn centre(&self) -> Vec2 {
        self.centre
    }
}

impl BasisField for RadialField {
    fn tensor_at(&self, point: Vec2) -> Tensor {
        let t = point - self.centre;
        Tensor::from_components(t.y * t.y - t.x * t.x, -2.0 * t.x * t.y)
            .normalized()
            .scale(self.size * self.size)
    }

    fn weight(&self, point: Vec2) -> f64 {
        exponential_weight(point, self.centre, self.size, self.decay)
    }

    fn centre(&self) -> Vec2 {
        self.centre
    }
}
