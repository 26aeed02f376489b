//! Coastline and river generation.
//!
//! Both features are single streamlines that must cross the whole world:
//! the coastline splits the world rectangle into land and sea, and the
//! river is buffered into a polygon whose banks become roads. The river
//! follows the eigenvector family perpendicular to the coastline's, so
//! the two cross at right angles.

use city_engine_core::integrator::Rk4Integrator;
use city_engine_core::params::{StreamlineParams, WaterParams};
use city_engine_core::polygon::{buffer_polyline, point_in_polygon, slice_rectangle};
use city_engine_core::prng::Xorshift64;
use city_engine_core::simplify::simplify;
use city_engine_core::tensor_field::TensorField;
use city_engine_core::vector::Vec2;

use crate::streamlines::StreamlineGenerator;

/// Attempts at finding a streamline that reaches both world edges.
const WATER_TRIES: usize = 100;

/// Integration cap for water streamlines; they must be able to cross the
/// whole world.
const WATER_PATH_ITERATIONS: usize = 10_000;

/// Tangent extension applied to both coastline ends, in `dstep` units,
/// to force clean edge exits.
const EDGE_EXTENSION_STEPS: f64 = 5.0;

/// Everything the water stage produces.
#[derive(Debug, Clone, Default)]
pub struct WaterFeatures {
    /// Simplified noisy coastline, recorded as a road.
    pub coastline: Vec<Vec2>,
    /// The smaller side of the world rectangle split by the coastline.
    pub sea_polygon: Vec<Vec2>,
    /// River water surface (`riverSize - riverBankSize` buffer).
    pub river_polygon: Vec<Vec2>,
    /// Bank road on the near side of the river.
    pub river_main_road: Vec<Vec2>,
    /// Bank road on the far side of the river.
    pub river_secondary_road: Vec<Vec2>,
    /// Which eigenvector family the coastline followed.
    pub coastline_major: bool,
    /// Dense committed samples per family, seeded into later road
    /// stages' grids so roads keep their distance from water.
    pub dense_major: Vec<Vec<Vec2>>,
    pub dense_minor: Vec<Vec<Vec2>>,
}

impl WaterFeatures {
    /// Dense streamlines of one family.
    pub fn dense(&self, major: bool) -> &[Vec<Vec2>] {
        if major {
            &self.dense_major
        } else {
            &self.dense_minor
        }
    }
}

/// Runs both water phases, mutating `field` so downstream stages see the
/// sea, river, and noise state the roads must respect.
pub fn generate(
    field: &mut TensorField,
    origin: Vec2,
    world_dimensions: Vec2,
    water: &WaterParams,
    base_params: &StreamlineParams,
    rng: &mut Xorshift64,
) -> WaterFeatures {
    let params = StreamlineParams {
        path_iterations: WATER_PATH_ITERATIONS,
        ..base_params.clone()
    };
    let mut features = WaterFeatures::default();

    create_coast(field, origin, world_dimensions, water, &params, rng, &mut features);
    create_river(field, origin, world_dimensions, water, &params, rng, &mut features);
    features
}

fn create_coast(
    field: &mut TensorField,
    origin: Vec2,
    world_dimensions: Vec2,
    water: &WaterParams,
    params: &StreamlineParams,
    rng: &mut Xorshift64,
    features: &mut WaterFeatures,
) {
    if water.coast_params.noise_enabled {
        field.enable_global_noise(water.coast_params.noise_angle, water.coast_params.noise_size);
    }

    let mut found: Option<(Vec<Vec2>, bool)> = None;
    {
        let integrator = Rk4Integrator::new(field, params.dstep);
        let generator = StreamlineGenerator::new(
            Box::new(integrator),
            origin,
            world_dimensions,
            params.clone(),
        );
        for _ in 0..WATER_TRIES {
            let major = rng.next_bool();
            let Some(seed) = generator.get_seed(major, rng) else {
                continue;
            };
            let streamline =
                extend_ends(generator.integrate_streamline(seed, major), params.dstep);
            if reaches_edges(&streamline, origin, world_dimensions) {
                found = Some((streamline, major));
                break;
            }
        }
    }
    field.disable_global_noise();

    let Some((coast_streamline, major)) = found else {
        log::warn!("no coastline reached both world edges after {WATER_TRIES} attempts");
        return;
    };

    let road = simplify(&coast_streamline, params.simplify_tolerance);
    features.sea_polygon = slice_rectangle(origin, world_dimensions, &road);
    features.coastline = road.clone();
    features.coastline_major = major;
    field.sea = features.sea_polygon.clone();

    // Dense resampling of the simplified road, so later grids see evenly
    // spaced samples.
    let dense = densify(&road, params.dstep);
    if major {
        features.dense_major.push(dense);
    } else {
        features.dense_minor.push(dense);
    }
}

fn create_river(
    field: &mut TensorField,
    origin: Vec2,
    world_dimensions: Vec2,
    water: &WaterParams,
    params: &StreamlineParams,
    rng: &mut Xorshift64,
    features: &mut WaterFeatures,
) {
    let major = !features.coastline_major;

    // The river must reach both edges, so the sea mask is lifted while it
    // is traced; ignore_river covers re-running on a dirtied pipeline.
    let old_sea = std::mem::take(&mut field.sea);
    field.ignore_river = true;
    if water.river_params.noise_enabled {
        field.enable_global_noise(water.river_params.noise_angle, water.river_params.noise_size);
    }

    let mut found: Option<Vec<Vec2>> = None;
    {
        let integrator = Rk4Integrator::new(field, params.dstep);
        let mut generator = StreamlineGenerator::new(
            Box::new(integrator),
            origin,
            world_dimensions,
            params.clone(),
        );
        // Keep the river away from the coastline.
        for line in features.dense(!major) {
            generator.add_existing(!major, line);
        }
        for _ in 0..WATER_TRIES {
            let Some(seed) = generator.get_seed(major, rng) else {
                continue;
            };
            let streamline =
                extend_ends(generator.integrate_streamline(seed, major), params.dstep);
            if reaches_edges(&streamline, origin, world_dimensions) {
                found = Some(streamline);
                break;
            }
        }
    }
    field.sea = old_sea;
    field.ignore_river = false;
    field.disable_global_noise();

    let Some(river_streamline) = found else {
        log::warn!("no river reached both world edges after {WATER_TRIES} attempts");
        return;
    };

    let Some(outline) = buffer_polyline(&river_streamline, water.river_size) else {
        log::warn!("river buffer produced degenerate geometry; river skipped");
        return;
    };
    features.river_polygon =
        buffer_polyline(&river_streamline, water.river_size - water.river_bank_size)
            .unwrap_or_default();

    // Split the buffered outline into one road per bank, using the side
    // of the river's own rectangle split.
    let expanded = densify(&outline, params.dstep);
    let river_side = slice_rectangle(origin, world_dimensions, &river_streamline);
    let off_screen = |v: Vec2| {
        let local = v - origin;
        local.x <= 0.0
            || local.y <= 0.0
            || local.x >= world_dimensions.x
            || local.y >= world_dimensions.y
    };
    let on_road = |v: Vec2| !point_in_polygon(v, &features.sea_polygon) && !off_screen(v);
    let road1: Vec<Vec2> = expanded
        .iter()
        .copied()
        .filter(|v| on_road(*v) && point_in_polygon(*v, &river_side))
        .collect();
    let road2: Vec<Vec2> = expanded
        .iter()
        .copied()
        .filter(|v| on_road(*v) && !point_in_polygon(*v, &river_side))
        .collect();
    if road1.is_empty() || road2.is_empty() {
        log::warn!("river banks degenerate after filtering; river roads skipped");
        return;
    }

    let road1_simple = simplify(&road1, params.simplify_tolerance);
    let mut road2_simple = simplify(&road2, params.simplify_tolerance);
    // Orient the far bank opposite the near one, so the concatenated
    // banks trace a loop.
    if road1[0].distance_to_sq(road2[0]) < road1[0].distance_to_sq(road2[road2.len() - 1]) {
        road2_simple.reverse();
    }

    // The two banks joined end-to-end outline the unbuildable river
    // strip; roads of later stages must not cross it.
    let mut river_mask = road1_simple.clone();
    river_mask.extend(road2_simple.iter().copied());
    field.river = river_mask;

    features.river_main_road = road1_simple;
    features.river_secondary_road = road2_simple;
    if major {
        features.dense_major.push(road1);
        features.dense_major.push(road2);
    } else {
        features.dense_minor.push(road1);
        features.dense_minor.push(road2);
    }
}

/// Extends both polyline ends along their tangents so a streamline that
/// stopped at the world boundary exits it cleanly.
fn extend_ends(mut streamline: Vec<Vec2>, dstep: f64) -> Vec<Vec2> {
    if streamline.len() < 2 {
        return streamline;
    }
    let lead = streamline[0]
        + (streamline[0] - streamline[1]).with_length(dstep * EDGE_EXTENSION_STEPS);
    let n = streamline.len();
    let tail = streamline[n - 1]
        + (streamline[n - 1] - streamline[n - 2]).with_length(dstep * EDGE_EXTENSION_STEPS);
    streamline.insert(0, lead);
    streamline.push(tail);
    streamline
}

/// Whether both polyline endpoints lie outside the world rectangle.
fn reaches_edges(streamline: &[Vec2], origin: Vec2, world_dimensions: Vec2) -> bool {
    let off_screen = |v: Vec2| {
        let local = v - origin;
        local.x <= 0.0
            || local.y <= 0.0
            || local.x >= world_dimensions.x
            || local.y >= world_dimensions.y
    };
    match (streamline.first(), streamline.last()) {
        (Some(first), Some(last)) => off_screen(*first) && off_screen(*last),
        _ => false,
    }
}

/// Resamples a polyline by recursive midpoint insertion until every gap
/// is at most `dstep`.
fn densify(line: &[Vec2], dstep: f64) -> Vec<Vec2> {
    let mut out = Vec::new();
    for pair in line.windows(2) {
        densify_segment(pair[0], pair[1], dstep * dstep, &mut out);
    }
    out.dedup_by(|a, b| a == b);
    out
}

fn densify_segment(v1: Vec2, v2: Vec2, dstep_sq: f64, out: &mut Vec<Vec2>) {
    if v1.distance_to_sq(v2) <= dstep_sq {
        out.push(v1);
        out.push(v2);
        return;
    }
    let halfway = v1.lerp(v2, 0.5);
    densify_segment(v1, halfway, dstep_sq, out);
    densify_segment(halfway, v2, dstep_sq, out);
}
