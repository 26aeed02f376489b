//! The generation pipeline: sequences water, roads, parks, and
//! buildings, with explicit stage dependencies and invalidation.
//!
//! Stages run strictly forward: coastline and river first, then the
//! three road families coarse-to-fine, big parks between major and minor
//! roads (so minor roads avoid park interiors), small parks from the
//! minor grid, and buildings last. Each road stage seeds its proximity
//! grids with every earlier family's samples, so main roads avoid the
//! water roads, major roads avoid main and water, and so on.
//!
//! Invalidation restores the PRNG state snapshotted at the dirtied
//! stage, so a partial rerun is bit-identical to a full run with the
//! same parameters.

use std::time::{Duration, Instant};

use serde::Serialize;

use city_engine_core::error::MapError;
use city_engine_core::integrator::Rk4Integrator;
use city_engine_core::params::{MapParams, StreamlineParams};
use city_engine_core::prng::Xorshift64;
use city_engine_core::tensor_field::TensorField;
use city_engine_core::vector::Vec2;

use crate::buildings::{self, BuildingModel, ViewState};
use crate::graph::{Graph, RoadKind, RoadPolyline};
use crate::polygon_finder;
use crate::streamlines::StreamlineGenerator;
use crate::water::{self, WaterFeatures};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Water,
    MainRoads,
    MajorRoads,
    BigParks,
    MinorRoads,
    SmallParks,
    Buildings,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Water,
        Stage::MainRoads,
        Stage::MajorRoads,
        Stage::BigParks,
        Stage::MinorRoads,
        Stage::SmallParks,
        Stage::Buildings,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap()
    }

    fn next(self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

/// Output of one road family: simplified polylines for rendering and
/// graphing, dense polylines per eigenvector family for collision
/// seeding of later stages.
#[derive(Debug, Clone, Default)]
struct RoadSet {
    simple: Vec<Vec<Vec2>>,
    dense_major: Vec<Vec<Vec2>>,
    dense_minor: Vec<Vec<Vec2>>,
}

/// Drives the full generation sequence and owns every output surface.
pub struct MapPipeline {
    params: MapParams,
    rng: Xorshift64,
    field: TensorField,
    water: WaterFeatures,
    main_roads: RoadSet,
    major_roads: RoadSet,
    minor_roads: RoadSet,
    big_parks: Vec<Vec<Vec2>>,
    small_parks: Vec<Vec<Vec2>>,
    blocks: Vec<Vec<Vec2>>,
    lots: Vec<Vec<Vec2>>,
    buildings: Vec<BuildingModel>,
    next_stage: Option<Stage>,
    /// PRNG state captured before each stage ran, for deterministic
    /// partial reruns.
    rng_snapshots: [Option<Xorshift64>; 7],
}

impl MapPipeline {
    pub fn new(params: MapParams) -> Result<Self, MapError> {
        params.validate()?;
        let field = TensorField::from_params(&params.tensor_field, params.seed as u32);
        let rng = Xorshift64::new(params.seed);
        Ok(Self {
            params,
            rng,
            field,
            water: WaterFeatures::default(),
            main_roads: RoadSet::default(),
            major_roads: RoadSet::default(),
            minor_roads: RoadSet::default(),
            big_parks: Vec::new(),
            small_parks: Vec::new(),
            blocks: Vec::new(),
            lots: Vec::new(),
            buildings: Vec::new(),
            next_stage: Some(Stage::Water),
            rng_snapshots: Default::default(),
        })
    }

    pub fn params(&self) -> &MapParams {
        &self.params
    }

    /// Runs the whole pipeline to completion.
    pub fn generate(&mut self) {
        while self.step(Duration::from_secs(3600)) {}
    }

    /// Performs at most roughly `budget` of work, yielding between
    /// stages. Returns whether work remains.
    pub fn step(&mut self, budget: Duration) -> bool {
        let start = Instant::now();
        while let Some(stage) = self.next_stage {
            self.rng_snapshots[stage.index()] = Some(self.rng.clone());
            self.run_stage(stage);
            self.next_stage = stage.next();
            if start.elapsed() >= budget {
                break;
            }
        }
        self.next_stage.is_some()
    }

    /// Cooperative tick using the configured `animationSpeed` budget.
    pub fn update(&mut self) -> bool {
        let budget = Duration::from_millis(self.params.options.animation_speed);
        self.step(budget)
    }

    /// Marks a stage dirty: clears its outputs and every dependent
    /// stage's, restores the PRNG snapshot, and rewinds the cursor.
    pub fn invalidate(&mut self, stage: Stage) {
        let already_ran = match self.next_stage {
            None => true,
            Some(cursor) => cursor.index() > stage.index(),
        };

        for s in Stage::ALL {
            if s.index() >= stage.index() {
                self.clear_stage_outputs(s);
            }
            if s.index() > stage.index() {
                self.rng_snapshots[s.index()] = None;
            }
        }

        if already_ran {
            if let Some(snapshot) = self.rng_snapshots[stage.index()].clone() {
                self.rng = snapshot;
            } else {
                self.rng = Xorshift64::new(self.params.seed);
            }
            self.next_stage = Some(stage);
        }
        // Otherwise the cursor is already at or before the dirtied stage.
    }

    /// Replaces the parameters and restarts from the earliest dirtied
    /// stage.
    pub fn set_params(&mut self, params: MapParams) -> Result<(), MapError> {
        params.validate()?;
        let dirty = self.earliest_dirty_stage(&params);
        let rebuild_field = params.seed != self.params.seed
            || params.tensor_field != self.params.tensor_field;
        self.params = params;
        if let Some(stage) = dirty {
            if rebuild_field || stage == Stage::Water {
                self.field =
                    TensorField::from_params(&self.params.tensor_field, self.params.seed as u32);
                self.rng = Xorshift64::new(self.params.seed);
                self.rng_snapshots = Default::default();
                self.clear_all_outputs();
                self.next_stage = Some(Stage::Water);
            } else {
                self.invalidate(stage);
            }
        }
        Ok(())
    }

    fn earliest_dirty_stage(&self, new: &MapParams) -> Option<Stage> {
        let old = &self.params;
        if new.seed != old.seed
            || new.world_dimensions != old.world_dimensions
            || new.origin != old.origin
            || new.tensor_field != old.tensor_field
            || new.water != old.water
        {
            return Some(Stage::Water);
        }
        if new.streamlines.main != old.streamlines.main {
            return Some(Stage::MainRoads);
        }
        if new.streamlines.major != old.streamlines.major {
            return Some(Stage::MajorRoads);
        }
        if new.parks != old.parks {
            return Some(Stage::BigParks);
        }
        if new.streamlines.minor != old.streamlines.minor {
            return Some(Stage::MinorRoads);
        }
        if new.buildings != old.buildings
            || new.zoom != old.zoom
            || new.options != old.options
        {
            return Some(Stage::Buildings);
        }
        None
    }

    fn run_stage(&mut self, stage: Stage) {
        log::info!("running stage {stage:?}");
        match stage {
            Stage::Water => {
                self.water = water::generate(
                    &mut self.field,
                    self.params.origin,
                    self.params.world_dimensions,
                    &self.params.water,
                    &self.params.streamlines.main,
                    &mut self.rng,
                );
            }
            Stage::MainRoads => {
                let sp = self.params.streamlines.main.clone();
                self.main_roads = self.trace_family(&sp, false, false);
            }
            Stage::MajorRoads => {
                let sp = self.params.streamlines.major.clone();
                self.major_roads = self.trace_family(&sp, true, false);
            }
            Stage::BigParks => {
                let polylines = self.road_polylines(true, true, false);
                let graph = Graph::new(&polylines, self.params.streamlines.major.dstep, true);
                let candidates =
                    polygon_finder::find_blocks(&graph, self.params.buildings.min_area, &self.field);
                self.big_parks = if self.params.parks.cluster_big_parks {
                    select_clustered(&candidates, self.params.parks.num_big_parks, &mut self.rng)
                } else {
                    select_random(&candidates, self.params.parks.num_big_parks, &mut self.rng)
                };
                // Minor roads must avoid park interiors.
                self.field.parks = self.big_parks.clone();
            }
            Stage::MinorRoads => {
                let sp = self.params.streamlines.minor.clone();
                self.minor_roads = self.trace_family(&sp, true, true);
            }
            Stage::SmallParks => {
                let polylines: Vec<RoadPolyline> = self
                    .minor_roads
                    .simple
                    .iter()
                    .map(|points| RoadPolyline {
                        kind: RoadKind::Minor,
                        points: points.clone(),
                    })
                    .collect();
                let graph = Graph::new(&polylines, self.params.streamlines.minor.dstep, true);
                let candidates =
                    polygon_finder::find_blocks(&graph, self.params.buildings.min_area, &self.field);
                self.small_parks =
                    select_random(&candidates, self.params.parks.num_small_parks, &mut self.rng);
                let mut parks = self.big_parks.clone();
                parks.extend(self.small_parks.iter().cloned());
                self.field.parks = parks;
            }
            Stage::Buildings => {
                let polylines = self.road_polylines(true, true, true);
                let graph = Graph::new(&polylines, self.params.streamlines.minor.dstep, true);
                self.blocks =
                    polygon_finder::find_blocks(&graph, self.params.buildings.min_area, &self.field);
                let divided = polygon_finder::divide_into_lots(
                    &self.blocks,
                    self.params.buildings.min_area,
                    self.params.buildings.chance_no_divide,
                    &mut self.rng,
                );
                let mut lots =
                    polygon_finder::shrink_lots(&divided, self.params.buildings.shrink_spacing);
                // No lot may touch the water.
                lots.retain(|lot| {
                    lot.iter()
                        .all(|v| !self.field.in_sea(*v) && !self.field.in_river(*v))
                });
                self.lots = lots;
                let view = self.view();
                self.buildings = buildings::generate_buildings(
                    &self.lots,
                    &view,
                    self.params.buildings.height_min,
                    self.params.buildings.height_max,
                    &mut self.rng,
                );
            }
        }
    }

    /// Traces one road family, seeding its grids with the water
    /// streamlines and the already-generated coarser families.
    fn trace_family(
        &mut self,
        sp: &StreamlineParams,
        include_main: bool,
        include_major: bool,
    ) -> RoadSet {
        let integrator = Rk4Integrator::new(&self.field, sp.dstep);
        let mut generator = StreamlineGenerator::new(
            Box::new(integrator),
            self.params.origin,
            self.params.world_dimensions,
            sp.clone(),
        );
        for line in &self.water.dense_major {
            generator.add_existing(true, line);
        }
        for line in &self.water.dense_minor {
            generator.add_existing(false, line);
        }
        if include_main {
            for line in &self.main_roads.dense_major {
                generator.add_existing(true, line);
            }
            for line in &self.main_roads.dense_minor {
                generator.add_existing(false, line);
            }
        }
        if include_major {
            for line in &self.major_roads.dense_major {
                generator.add_existing(true, line);
            }
            for line in &self.major_roads.dense_minor {
                generator.add_existing(false, line);
            }
        }

        generator.create_all_streamlines(&mut self.rng);

        let mut set = RoadSet {
            simple: generator.simplified().to_vec(),
            ..RoadSet::default()
        };
        for s in generator.streamlines() {
            if s.major {
                set.dense_major.push(s.points.clone());
            } else {
                set.dense_minor.push(s.points.clone());
            }
        }
        set
    }

    /// Labeled polylines of the generated network, for graph building
    /// and rendering.
    fn road_polylines(
        &self,
        include_main: bool,
        include_major: bool,
        include_minor: bool,
    ) -> Vec<RoadPolyline> {
        let mut out = Vec::new();
        if !self.water.coastline.is_empty() {
            out.push(RoadPolyline {
                kind: RoadKind::Coastline,
                points: self.water.coastline.clone(),
            });
        }
        for road in [&self.water.river_main_road, &self.water.river_secondary_road] {
            if !road.is_empty() {
                out.push(RoadPolyline {
                    kind: RoadKind::River,
                    points: road.clone(),
                });
            }
        }
        let families = [
            (include_main, &self.main_roads, RoadKind::Main),
            (include_major, &self.major_roads, RoadKind::Major),
            (include_minor, &self.minor_roads, RoadKind::Minor),
        ];
        for (include, set, kind) in families {
            if !include {
                continue;
            }
            for points in &set.simple {
                out.push(RoadPolyline {
                    kind,
                    points: points.clone(),
                });
            }
        }
        out
    }

    fn view(&self) -> ViewState {
        ViewState {
            origin: self.params.origin,
            zoom: self.params.zoom,
            world_dimensions: self.params.world_dimensions,
            camera: Vec2::new(self.params.options.camera_x, self.params.options.camera_y),
            orthographic: self.params.options.orthographic,
        }
    }

    fn clear_stage_outputs(&mut self, stage: Stage) {
        match stage {
            Stage::Water => {
                self.water = WaterFeatures::default();
                self.field.sea.clear();
                self.field.river.clear();
            }
            Stage::MainRoads => self.main_roads = RoadSet::default(),
            Stage::MajorRoads => self.major_roads = RoadSet::default(),
            Stage::BigParks => {
                self.big_parks.clear();
                self.field.parks.clear();
            }
            Stage::MinorRoads => self.minor_roads = RoadSet::default(),
            Stage::SmallParks => {
                self.small_parks.clear();
                self.field.parks = self.big_parks.clone();
            }
            Stage::Buildings => {
                self.blocks.clear();
                self.lots.clear();
                self.buildings.clear();
            }
        }
    }

    fn clear_all_outputs(&mut self) {
        for stage in Stage::ALL {
            self.clear_stage_outputs(stage);
        }
    }

    // -- Output surfaces (world coordinates unless noted) --

    pub fn sea_polygon(&self) -> &[Vec2] {
        &self.water.sea_polygon
    }

    pub fn river_polygon(&self) -> &[Vec2] {
        &self.water.river_polygon
    }

    pub fn coastline(&self) -> &[Vec2] {
        &self.water.coastline
    }

    pub fn river_main_road(&self) -> &[Vec2] {
        &self.water.river_main_road
    }

    pub fn river_secondary_road(&self) -> &[Vec2] {
        &self.water.river_secondary_road
    }

    pub fn main_roads(&self) -> &[Vec<Vec2>] {
        &self.main_roads.simple
    }

    pub fn major_roads(&self) -> &[Vec<Vec2>] {
        &self.major_roads.simple
    }

    pub fn minor_roads(&self) -> &[Vec<Vec2>] {
        &self.minor_roads.simple
    }

    pub fn big_parks(&self) -> &[Vec<Vec2>] {
        &self.big_parks
    }

    pub fn small_parks(&self) -> &[Vec<Vec2>] {
        &self.small_parks
    }

    /// All parks, big first.
    pub fn parks(&self) -> Vec<Vec<Vec2>> {
        let mut parks = self.big_parks.clone();
        parks.extend(self.small_parks.iter().cloned());
        parks
    }

    pub fn blocks(&self) -> &[Vec<Vec2>] {
        &self.blocks
    }

    pub fn lots(&self) -> &[Vec<Vec2>] {
        &self.lots
    }

    /// Building models; lot and roof polygons are in screen coordinates.
    pub fn building_models(&self) -> &[BuildingModel] {
        &self.buildings
    }

    pub fn tensor_field(&self) -> &TensorField {
        &self.field
    }
}

/// `count` consecutive polygons starting at a random index (no wrap), or
/// everything when `count` covers the whole list.
fn select_clustered(
    polygons: &[Vec<Vec2>],
    count: usize,
    rng: &mut Xorshift64,
) -> Vec<Vec<Vec2>> {
    if count == 0 || polygons.is_empty() {
        return Vec::new();
    }
    if count >= polygons.len() {
        return polygons.to_vec();
    }
    let start = rng.next_usize(polygons.len() - count + 1);
    polygons[start..start + count].to_vec()
}

/// `count` distinct random polygons, in index order. Never duplicates;
/// asking for more than exist returns everything.
fn select_random(polygons: &[Vec<Vec2>], count: usize, rng: &mut Xorshift64) -> Vec<Vec<Vec2>> {
    if count == 0 || polygons.is_empty() {
        return Vec::new();
    }
    if count >= polygons.len() {
        return polygons.to_vec();
    }
    let mut chosen = vec![false; polygons.len()];
    let mut remaining = count;
    while remaining > 0 {
        let i = rng.next_usize(polygons.len());
        if !chosen[i] {
            chosen[i] = true;
            remaining -= 1;
        }
    }
    polygons
        .iter()
        .zip(chosen.iter())
        .filter_map(|(p, &c)| c.then(|| p.clone()))
        .collect()
}

/// Serializable snapshot of every output surface, for the geometry JSON
/// export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapGeometry {
    pub sea_polygon: Vec<Vec2>,
    pub river_polygon: Vec<Vec2>,
    pub coastline: Vec<Vec2>,
    pub river_roads: Vec<Vec<Vec2>>,
    pub main_roads: Vec<Vec<Vec2>>,
    pub major_roads: Vec<Vec<Vec2>>,
    pub minor_roads: Vec<Vec<Vec2>>,
    pub parks: Vec<Vec<Vec2>>,
    pub blocks: Vec<Vec<Vec2>>,
    pub lots: Vec<Vec<Vec2>>,
    pub buildings: Vec<BuildingModel>,
}

impl MapGeometry {
    pub fn from_pipeline(pipeline: &MapPipeline) -> Self {
        let mut river_roads = Vec::new();
        for road in [
            pipeline.river_main_road(),
            pipeline.river_secondary_road(),
        ] {
            if !road.is_empty() {
                river_roads.push(road.to_vec());
            }
        }
        Self {
            sea_polygon: pipeline.sea_polygon().to_vec(),
            river_polygon: pipeline.river_polygon().to_vec(),
            coastline: pipeline.coastline().to_vec(),
            river_roads,
            main_roads: pipeline.main_roads().to_vec(),
            major_roads: pipeline.major_roads().to_vec(),
            minor_roads: pipeline.minor_roads().to_vec(),
            parks: pipeline.parks(),
            blocks: pipeline.blocks().to_vec(),
            lots: pipeline.lots().to_vec(),
            buildings: pipeline.building_models().to_vec(),
        }
    }
}
