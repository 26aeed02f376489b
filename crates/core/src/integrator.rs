//! Field integrators: step along a tensor-field eigenvector.
//!
//! The tracer grows streamlines by repeatedly asking an integrator for
//! the next displacement. `Rk4Integrator` is the default; the cheaper
//! `EulerIntegrator` exists as a fallback for quick previews. Both report
//! a degenerate field (water, or far from every basis centre) by
//! returning `None`, which ends growth in that direction.

use crate::tensor_field::TensorField;
use crate::vector::Vec2;

/// Steps along the major or minor eigenvector of a tensor field.
///
/// Object-safe so the tracer can hold `Box<dyn FieldIntegrator>`.
pub trait FieldIntegrator {
    /// Displacement of one integration step from `point`, or `None` at a
    /// degenerate point.
    fn integrate(&self, point: Vec2, major: bool) -> Option<Vec2>;

    /// Whether `point` is on land (outside sea and river masks).
    fn on_land(&self, point: Vec2) -> bool;
}

/// Fourth-order Runge-Kutta integrator.
///
/// Eigenvector fields are defined only up to sign, so each sub-sample is
/// aligned with the first (dot >= 0) to prevent 180-degree flips at
/// tensor sign ambiguities. Any degenerate sub-point makes the whole
/// step degenerate.
pub struct Rk4Integrator<'a> {
    field: &'a TensorField,
    dstep: f64,
}

/// Single-sample Euler integrator.
pub struct EulerIntegrator<'a> {
    field: &'a TensorField,
    dstep: f64,
}

impl<'a> Rk4Integrator<'a> {
    pub fn new(field: &'a TensorField, dstep: f64) -> Self {
        Self { field, dstep }
    }

    fn eigenvector(&self, point: Vec2, major: bool, align_with: Option<Vec2>) -> Option<Vec2> {
        let tensor = self.field.sample(point);
        let mut v = if major { tensor.major()? } else { tensor.minor()? };
        if let Some(reference) = align_with {
            if v.dot(reference) < 0.0 {
                v = -v;
            }
        }
        Some(v)
    }
}

impl FieldIntegrator for Rk4Integrator<'_> {
    fn integrate(&self, point: Vec2, major: bool) -> Option<Vec2> {
        let h = self.dstep;
        let k1 = self.eigenvector(point, major, None)?;
        let k2 = self.eigenvector(point + k1 * (h / 2.0), major, Some(k1))?;
        let k3 = self.eigenvector(point + k2 * (h / 2.0), major, Some(k1))?;
        let k4 = self.eigenvector(point + k3 * h, major, Some(k1))?;
        Some((k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0))
    }

    fn on_land(&self, point: Vec2) -> bool {
        self.field.on_land(point)
    }
}

impl<'a> EulerIntegrator<'a> {
    pub fn new(field: &'a TensorField, dstep: f64) -> Self {
        Self { field, dstep }
    }
}

impl FieldIntegrator for EulerIntegrator<'_> {
    fn integrate(&self, point: Vec2, major: bool) -> Option<Vec2> {
        let tensor = self.field.sample(point);
        let v = if major { tensor.major()? } else { tensor.minor()? };
        Some(v * self.dstep)
    }

    fn on_land(&self, point: Vec2) -> bool {
        self.field.on_land(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::NoiseParams;

    fn uniform_field(theta: f64) -> TensorField {
        let mut field = TensorField::new(NoiseParams::default(), 1);
        field.add_grid(Vec2::new(0.0, 0.0), 1000.0, 0.0, theta);
        field
    }

    #[test]
    fn rk4_step_in_uniform_field_has_step_length() {
        let field = uniform_field(0.0);
        let integrator = Rk4Integrator::new(&field, 2.0);
        let step = integrator.integrate(Vec2::new(10.0, 10.0), true).unwrap();
        assert!((step.length() - 2.0).abs() < 1e-9, "step {step:?}");
        assert!((step.y).abs() < 1e-9);
    }

    #[test]
    fn minor_step_is_perpendicular_to_major() {
        let field = uniform_field(0.3);
        let integrator = Rk4Integrator::new(&field, 1.0);
        let p = Vec2::new(5.0, 5.0);
        let major = integrator.integrate(p, true).unwrap();
        let minor = integrator.integrate(p, false).unwrap();
        assert!(major.dot(minor).abs() < 1e-9);
    }

    #[test]
    fn degenerate_field_returns_none() {
        let field = TensorField::new(NoiseParams::default(), 1);
        let integrator = Rk4Integrator::new(&field, 1.0);
        assert!(integrator.integrate(Vec2::ZERO, true).is_none());
        assert!(integrator.integrate(Vec2::ZERO, false).is_none());
    }

    #[test]
    fn step_into_sea_is_degenerate() {
        let mut field = uniform_field(0.0);
        field.sea = vec![
            Vec2::new(-10.0, -10.0),
            Vec2::new(10.0, -10.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(-10.0, 10.0),
        ];
        let integrator = Rk4Integrator::new(&field, 1.0);
        assert!(integrator.integrate(Vec2::ZERO, true).is_none());
        assert!(!integrator.on_land(Vec2::ZERO));
        assert!(integrator.on_land(Vec2::new(50.0, 50.0)));
    }

    #[test]
    fn euler_matches_rk4_in_uniform_field() {
        let field = uniform_field(0.7);
        let rk4 = Rk4Integrator::new(&field, 1.5);
        let euler = EulerIntegrator::new(&field, 1.5);
        let p = Vec2::new(3.0, -8.0);
        let a = rk4.integrate(p, true).unwrap();
        let b = euler.integrate(p, true).unwrap();
        assert!(a.distance_to(b) < 1e-9, "{a:?} vs {b:?}");
    }

    #[test]
    fn integrators_are_object_safe() {
        let field = uniform_field(0.0);
        let boxed: Box<dyn FieldIntegrator + '_> = Box::new(Rk4Integrator::new(&field, 1.0));
        assert!(boxed.integrate(Vec2::new(1.0, 1.0), true).is_some());
    }
}
