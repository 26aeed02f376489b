//! Pseudo-3D building projection.
//!
//! Lots become buildings with a random height; each building's roof is
//! its lot projected away from the camera, and side quads connect lot
//! and roof edges. Buildings are sorted by ascending height so taller
//! buildings draw over shorter ones.

use serde::Serialize;

use city_engine_core::prng::Xorshift64;
use city_engine_core::vector::Vec2;

/// Focal length numerator: `d = FOCAL_BASE / zoom`.
const FOCAL_BASE: f64 = 1000.0;

/// Explicit view value threaded through projection; the generation
/// pipeline itself never depends on it.
#[derive(Debug, Clone, Copy)]
pub struct ViewState {
    pub origin: Vec2,
    pub zoom: f64,
    pub world_dimensions: Vec2,
    /// Camera offset from the world centre, in world units. Its
    /// direction controls orthographic lean; its screen position is the
    /// perspective vanishing centre.
    pub camera: Vec2,
    pub orthographic: bool,
}

impl ViewState {
    pub fn world_to_screen(&self, v: Vec2) -> Vec2 {
        (v - self.origin) * self.zoom
    }

    /// Perspective focal parameter.
    pub fn focal(&self) -> f64 {
        FOCAL_BASE / self.zoom
    }

    /// Screen position of the camera (perspective vanishing centre).
    pub fn camera_screen(&self) -> Vec2 {
        let world_centre = self.origin + self.world_dimensions * 0.5;
        self.world_to_screen(world_centre + self.camera)
    }

    /// Unit camera direction for orthographic lean; zero when the camera
    /// sits at the centre.
    pub fn camera_direction(&self) -> Vec2 {
        self.camera.normalize_or_zero()
    }
}

/// One projected building.
#[derive(Debug, Clone, Serialize)]
pub struct BuildingModel {
    /// Lot polygon in world coordinates.
    pub footprint: Vec<Vec2>,
    /// Lot polygon projected to screen.
    pub lot_screen: Vec<Vec2>,
    /// Roof polygon in screen coordinates.
    pub roof: Vec<Vec2>,
    /// One quad per lot edge: `[lot_i, lot_i+1, roof_i+1, roof_i]`.
    pub sides: Vec<[Vec2; 4]>,
    pub height: f64,
}

/// Projects lots into building models, sorted by ascending height.
///
/// Heights are drawn uniformly from `[height_min, height_max]` in lot
/// order, so the same RNG state reproduces the same skyline.
pub fn generate_buildings(
    lots: &[Vec<Vec2>],
    view: &ViewState,
    height_min: f64,
    height_max: f64,
    rng: &mut Xorshift64,
) -> Vec<BuildingModel> {
    let mut with_heights: Vec<(Vec<Vec2>, f64)> = lots
        .iter()
        .map(|lot| (lot.clone(), rng.next_range(height_min, height_max)))
        .collect();
    with_heights.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    with_heights
        .into_iter()
        .map(|(footprint, height)| project_building(footprint, height, view))
        .collect()
}

fn project_building(footprint: Vec<Vec2>, height: f64, view: &ViewState) -> BuildingModel {
    let d = view.focal();
    let scale = d / (d - height);
    let lot_screen: Vec<Vec2> = footprint.iter().map(|v| view.world_to_screen(*v)).collect();

    let roof: Vec<Vec2> = if view.orthographic {
        let lean = view.camera_direction() * (height * scale);
        lot_screen.iter().map(|v| *v - lean).collect()
    } else {
        let centre = view.camera_screen();
        lot_screen
            .iter()
            .map(|v| centre + (*v - centre) * scale)
            .collect()
    };

    let n = lot_screen.len();
    let sides: Vec<[Vec2; 4]> = (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            [lot_screen[i], lot_screen[j], roof[j], roof[i]]
        })
        .collect();

    BuildingModel {
        footprint,
        lot_screen,
        roof,
        sides,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_view(orthographic: bool, camera: Vec2) -> ViewState {
        ViewState {
            origin: Vec2::ZERO,
            zoom: 1.0,
            world_dimensions: Vec2::new(2000.0, 1000.0),
            camera,
            orthographic,
        }
    }

    fn square_lot() -> Vec<Vec2> {
        vec![
            Vec2::new(100.0, 100.0),
            Vec2::new(120.0, 100.0),
            Vec2::new(120.0, 120.0),
            Vec2::new(100.0, 120.0),
        ]
    }

    #[test]
    fn orthographic_roof_is_translated_footprint() {
        let view = unit_view(true, Vec2::new(0.0, -1.0));
        let mut rng = Xorshift64::new(1);
        let buildings = generate_buildings(&[square_lot()], &view, 40.0, 40.0, &mut rng);
        let b = &buildings[0];

        // lean = direction * h * d/(d-h) with d = 1000, h = 40.
        let expected_offset = Vec2::new(0.0, -1.0) * (40.0 * 1000.0 / 960.0);
        for (lot_v, roof_v) in b.lot_screen.iter().zip(b.roof.iter()) {
            let offset = *roof_v - *lot_v;
            assert!(
                (offset + expected_offset).length() < 1e-9,
                "roof offset {offset:?}, expected {:?}",
                -expected_offset
            );
        }
    }

    #[test]
    fn perspective_roof_scales_away_from_camera_centre() {
        let view = unit_view(false, Vec2::ZERO);
        let mut rng = Xorshift64::new(1);
        let buildings = generate_buildings(&[square_lot()], &view, 30.0, 30.0, &mut rng);
        let b = &buildings[0];
        let centre = view.camera_screen();
        let scale = 1000.0 / (1000.0 - 30.0);
        for (lot_v, roof_v) in b.lot_screen.iter().zip(b.roof.iter()) {
            let expected = centre + (*lot_v - centre) * scale;
            assert!(roof_v.distance_to(expected) < 1e-9);
        }
    }

    #[test]
    fn heights_fall_in_the_configured_range() {
        let lots: Vec<Vec<Vec2>> = (0..50).map(|_| square_lot()).collect();
        let view = unit_view(false, Vec2::ZERO);
        let mut rng = Xorshift64::new(42);
        let buildings = generate_buildings(&lots, &view, 20.0, 40.0, &mut rng);
        for b in &buildings {
            assert!(
                (20.0..=40.0).contains(&b.height),
                "height {} out of range",
                b.height
            );
        }
    }

    #[test]
    fn buildings_are_sorted_by_ascending_height() {
        let lots: Vec<Vec<Vec2>> = (0..20).map(|_| square_lot()).collect();
        let view = unit_view(false, Vec2::ZERO);
        let mut rng = Xorshift64::new(42);
        let buildings = generate_buildings(&lots, &view, 20.0, 40.0, &mut rng);
        for pair in buildings.windows(2) {
            assert!(pair[0].height <= pair[1].height);
        }
    }

    #[test]
    fn one_side_quad_per_lot_edge() {
        let view = unit_view(false, Vec2::ZERO);
        let mut rng = Xorshift64::new(1);
        let buildings = generate_buildings(&[square_lot()], &view, 25.0, 25.0, &mut rng);
        let b = &buildings[0];
        assert_eq!(b.sides.len(), 4);
        for (i, quad) in b.sides.iter().enumerate() {
            let j = (i + 1) % 4;
            assert_eq!(quad[0], b.lot_screen[i]);
            assert_eq!(quad[1], b.lot_screen[j]);
            assert_eq!(quad[2], b.roof[j]);
            assert_eq!(quad[3], b.roof[i]);
        }
    }

    #[test]
    fn zoom_scales_screen_coordinates() {
        let mut view = unit_view(true, Vec2::ZERO);
        view.zoom = 2.0;
        let mut rng = Xorshift64::new(1);
        let buildings = generate_buildings(&[square_lot()], &view, 20.0, 20.0, &mut rng);
        assert_eq!(buildings[0].lot_screen[0], Vec2::new(200.0, 200.0));
        // Camera at the centre: no orthographic lean, roof == lot.
        assert_eq!(buildings[0].roof, buildings[0].lot_screen);
    }

    #[test]
    fn projection_is_deterministic_per_rng_state() {
        let lots: Vec<Vec<Vec2>> = (0..10).map(|_| square_lot()).collect();
        let view = unit_view(false, Vec2::new(10.0, 20.0));
        let mut rng_a = Xorshift64::new(5);
        let mut rng_b = Xorshift64::new(5);
        let a = generate_buildings(&lots, &view, 20.0, 40.0, &mut rng_a);
        let b = generate_buildings(&lots, &view, 20.0, 40.0, &mut rng_b);
        assert_eq!(a.len(), b.len());
        for (ba, bb) in a.iter().zip(b.iter()) {
            assert_eq!(ba.height, bb.height);
            assert_eq!(ba.roof, bb.roof);
        }
    }

    #[test]
    fn empty_lot_list_gives_no_buildings() {
        let view = unit_view(false, Vec2::ZERO);
        let mut rng = Xorshift64::new(1);
        assert!(generate_buildings(&[], &view, 20.0, 40.0, &mut rng).is_empty());
    }
}
