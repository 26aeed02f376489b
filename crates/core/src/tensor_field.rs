//! The combined tensor field sampled by the streamline tracer.
//!
//! A `TensorField` owns an ordered list of basis fields plus the water
//! and park geometry that masks or modulates them. Sampling returns the
//! weighted sum of all basis tensors, rotated by simplex noise inside
//! parks (and everywhere, when global noise is on), and the zero tensor
//! inside water so streamlines never enter the sea or cross the river.

use noise::{NoiseFn, OpenSimplex};

use crate::basis_field::{BasisField, GridField, RadialField};
use crate::params::{BasisFieldSpec, NoiseParams, TensorFieldParams};
use crate::polygon::point_in_polygon;
use crate::tensor::Tensor;
use crate::vector::Vec2;

/// Additively blended basis fields with noise modulation and geometry
/// masks.
pub struct TensorField {
    fields: Vec<Box<dyn BasisField>>,
    noise: OpenSimplex,
    noise_params: NoiseParams,
    /// Sea polygon; the field is degenerate inside it.
    pub sea: Vec<Vec2>,
    /// Outline of the buffered river; degenerate inside unless
    /// `ignore_river` is set (used while tracing the river itself).
    pub river: Vec<Vec2>,
    /// Park polygons; inside them the orientation is perturbed by the
    /// park noise settings.
    pub parks: Vec<Vec<Vec2>>,
    pub ignore_river: bool,
}

impl TensorField {
    /// Creates an empty field. `noise_seed` seeds the simplex backend so
    /// identical seeds give identical noise.
    pub fn new(noise_params: NoiseParams, noise_seed: u32) -> Self {
        Self {
            fields: Vec::new(),
            noise: OpenSimplex::new(noise_seed),
            noise_params,
            sea: Vec::new(),
            river: Vec::new(),
            parks: Vec::new(),
            ignore_river: false,
        }
    }

    /// Builds a field from its serialized parameter form.
    pub fn from_params(params: &TensorFieldParams, noise_seed: u32) -> Self {
        let mut field = Self::new(params.noise_params.clone(), noise_seed);
        for spec in &params.basis_fields {
            match *spec {
                BasisFieldSpec::Grid {
                    x,
                    y,
                    size,
                    decay,
                    theta,
                } => field.add_grid(Vec2::new(x, y), size, decay, theta),
                BasisFieldSpec::Radial { x, y, size, decay } => {
                    field.add_radial(Vec2::new(x, y), size, decay)
                }
            }
        }
        field
    }

    pub fn add_grid(&mut self, centre: Vec2, size: f64, decay: f64, theta: f64) {
        self.add_field(Box::new(GridField::new(centre, size, decay, theta)));
    }

    pub fn add_radial(&mut self, centre: Vec2, size: f64, decay: f64) {
        self.add_field(Box::new(RadialField::new(centre, size, decay)));
    }

    pub fn add_field(&mut self, field: Box<dyn BasisField>) {
        self.fields.push(field);
    }

    pub fn basis_fields(&self) -> &[Box<dyn BasisField>] {
        &self.fields
    }

    /// Centre points of all basis fields, for display.
    pub fn centre_points(&self) -> Vec<Vec2> {
        self.fields.iter().map(|f| f.centre()).collect()
    }

    /// Turns on global rotational noise (used while tracing noisy
    /// coastlines and rivers).
    pub fn enable_global_noise(&mut self, angle_deg: f64, size: f64) {
        self.noise_params.global_noise = true;
        self.noise_params.noise_angle_global = angle_deg;
        self.noise_params.noise_size_global = size;
    }

    pub fn disable_global_noise(&mut self) {
        self.noise_params.global_noise = false;
    }

    /// Samples the field at `point`.
    ///
    /// Returns the zero tensor on water, with no basis fields, or far
    /// from every basis centre.
    pub fn sample(&self, point: Vec2) -> Tensor {
        if !self.on_land(point) {
            return Tensor::zero();
        }
        if self.fields.is_empty() {
            return Tensor::zero();
        }

        let mut acc = Tensor::zero();
        for field in &self.fields {
            acc = acc.add(&field.weighted_tensor(point));
        }

        if self.in_parks(point) {
            acc = acc.rotate(self.rotational_noise(
                point,
                self.noise_params.noise_size_park,
                self.noise_params.noise_angle_park,
            ));
        }
        if self.noise_params.global_noise {
            acc = acc.rotate(self.rotational_noise(
                point,
                self.noise_params.noise_size_global,
                self.noise_params.noise_angle_global,
            ));
        }
        acc
    }

    /// Noise-driven rotation angle in radians: `noise2d(p / size)` scaled
    /// by `angle_deg`.
    fn rotational_noise(&self, point: Vec2, noise_size: f64, noise_angle_deg: f64) -> f64 {
        if noise_size <= 0.0 {
            return 0.0;
        }
        let n = self.noise.get([point.x / noise_size, point.y / noise_size]);
        n * noise_angle_deg.to_radians()
    }

    /// Whether `point` is outside the sea and (unless ignored) the river.
    pub fn on_land(&self, point: Vec2) -> bool {
        if self.in_sea(point) {
            return false;
        }
        self.ignore_river || !self.in_river(point)
    }

    pub fn in_sea(&self, point: Vec2) -> bool {
        point_in_polygon(point, &self.sea)
    }

    pub fn in_river(&self, point: Vec2) -> bool {
        point_in_polygon(point, &self.river)
    }

    pub fn in_parks(&self, point: Vec2) -> bool {
        self.parks.iter().any(|park| point_in_polygon(point, park))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_field() -> TensorField {
        TensorField::new(NoiseParams::default(), 42)
    }

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Vec2> {
        vec![
            Vec2::new(x0, y0),
            Vec2::new(x0 + side, y0),
            Vec2::new(x0 + side, y0 + side),
            Vec2::new(x0, y0 + side),
        ]
    }

    #[test]
    fn empty_field_samples_zero_everywhere() {
        let field = plain_field();
        for p in [Vec2::ZERO, Vec2::new(100.0, -50.0), Vec2::new(1e4, 1e4)] {
            assert!(field.sample(p).is_degenerate(), "non-zero tensor at {p:?}");
        }
    }

    #[test]
    fn single_grid_dominates_near_its_centre() {
        let mut field = plain_field();
        field.add_grid(Vec2::new(100.0, 100.0), 200.0, 10.0, 0.5);
        let major = field.sample(Vec2::new(110.0, 95.0)).major().unwrap();
        let expected = Vec2::from_angle(0.5);
        assert!(
            major.distance_to(expected) < 1e-3 || major.distance_to(-expected) < 1e-3,
            "major {major:?} should align with theta 0.5"
        );
    }

    #[test]
    fn sample_inside_sea_is_degenerate() {
        let mut field = plain_field();
        field.add_grid(Vec2::new(5.0, 5.0), 100.0, 1.0, 0.0);
        field.sea = square(0.0, 0.0, 10.0);
        assert!(field.sample(Vec2::new(5.0, 5.0)).is_degenerate());
        assert!(!field.sample(Vec2::new(50.0, 50.0)).is_degenerate());
    }

    #[test]
    fn river_mask_respects_ignore_flag() {
        let mut field = plain_field();
        field.add_grid(Vec2::new(5.0, 5.0), 100.0, 1.0, 0.0);
        field.river = square(0.0, 0.0, 10.0);
        let inside = Vec2::new(5.0, 5.0);
        assert!(!field.on_land(inside));
        field.ignore_river = true;
        assert!(field.on_land(inside));
        assert!(!field.sample(inside).is_degenerate());
    }

    #[test]
    fn park_noise_rotates_orientation_inside_park_only() {
        let params = NoiseParams {
            global_noise: false,
            noise_size_park: 20.0,
            noise_angle_park: 90.0,
            ..NoiseParams::default()
        };
        let mut field = TensorField::new(params, 7);
        field.add_grid(Vec2::new(50.0, 50.0), 500.0, 0.0, 0.0);
        field.parks = vec![square(0.0, 0.0, 100.0)];

        let outside = field.sample(Vec2::new(500.0, 500.0)).theta();
        assert!(outside.abs() < 1e-9, "outside parks theta should be 0");

        // Somewhere in the park the noise rotation must be visible.
        let rotated = (0..10).any(|i| {
            let p = Vec2::new(5.0 + 9.0 * i as f64, 37.0);
            field.sample(p).theta().abs() > 1e-3
        });
        assert!(rotated, "park noise never rotated the field");
    }

    #[test]
    fn global_noise_toggle_round_trip() {
        let mut field = plain_field();
        field.add_grid(Vec2::new(50.0, 50.0), 500.0, 0.0, 0.0);
        let probes: Vec<Vec2> = (0..10).map(|i| Vec2::new(30.0 + 11.0 * i as f64, 60.0)).collect();
        let clean: Vec<f64> = probes.iter().map(|p| field.sample(*p).theta()).collect();

        field.enable_global_noise(45.0, 50.0);
        let noisy: Vec<f64> = probes.iter().map(|p| field.sample(*p).theta()).collect();
        field.disable_global_noise();
        let clean_again: Vec<f64> = probes.iter().map(|p| field.sample(*p).theta()).collect();

        assert_eq!(clean, clean_again, "disabling noise must restore the field");
        assert!(
            clean
                .iter()
                .zip(noisy.iter())
                .any(|(c, n)| (c - n).abs() > 1e-6),
            "global noise had no effect on orientation"
        );
    }

    #[test]
    fn identical_seeds_sample_identically() {
        let mut params = NoiseParams::default();
        params.global_noise = true;
        let build = || {
            let mut f = TensorField::new(params.clone(), 99);
            f.add_grid(Vec2::new(10.0, 10.0), 300.0, 5.0, 0.2);
            f.add_radial(Vec2::new(200.0, 40.0), 150.0, 2.0);
            f
        };
        let a = build();
        let b = build();
        for i in 0..20 {
            let p = Vec2::new(i as f64 * 13.7, i as f64 * 7.3);
            assert_eq!(a.sample(p).theta().to_bits(), b.sample(p).theta().to_bits());
        }
    }

    #[test]
    fn two_fields_blend_toward_the_nearer_centre() {
        let mut field = plain_field();
        field.add_grid(Vec2::new(0.0, 0.0), 100.0, 5.0, 0.0);
        field.add_grid(Vec2::new(1000.0, 0.0), 100.0, 5.0, 1.0);
        let near_first = field.sample(Vec2::new(10.0, 0.0)).theta();
        let near_second = field.sample(Vec2::new(990.0, 0.0)).theta();
        assert!(near_first.abs() < 0.05, "near first centre theta {near_first}");
        assert!(
            (near_second - 1.0).abs() < 0.05,
            "near second centre theta {near_second}"
        );
    }
}
