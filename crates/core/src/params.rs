//! The nested parameter object driving map generation.
//!
//! Parameters arrive either programmatically or as a JSON document with
//! camelCase keys (`pathIterations`, `clusterBigParks`, ...). Every group
//! has sensible defaults, so an empty document `{}` generates a complete
//! map. [`MapParams::validate`] enforces the documented ranges and is the
//! only place a parameter error can originate.

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::vector::Vec2;

/// Top-level parameter object: world frame, tensor field, water, the
/// three road families, parks, buildings, and host options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapParams {
    pub zoom: f64,
    pub world_dimensions: Vec2,
    pub origin: Vec2,
    pub seed: u64,
    pub tensor_field: TensorFieldParams,
    pub water: WaterParams,
    pub streamlines: StreamlineFamilies,
    pub parks: ParkParams,
    pub buildings: BuildingParams,
    pub options: OptionParams,
}

/// Basis fields plus noise modulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TensorFieldParams {
    pub noise_params: NoiseParams,
    pub basis_fields: Vec<BasisFieldSpec>,
}

/// Rotational noise settings for parks and (optionally) the whole field.
/// Angles are in degrees; sizes are the noise sampling wavelength in
/// world units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseParams {
    pub global_noise: bool,
    pub noise_size_park: f64,
    pub noise_angle_park: f64,
    pub noise_size_global: f64,
    pub noise_angle_global: f64,
}

/// Serialized form of one basis field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BasisFieldSpec {
    #[serde(rename = "grid")]
    Grid {
        x: f64,
        y: f64,
        size: f64,
        decay: f64,
        #[serde(default)]
        theta: f64,
    },
    #[serde(rename = "radial")]
    Radial { x: f64, y: f64, size: f64, decay: f64 },
}

/// Coastline and river settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterParams {
    pub coast_params: NoiseStreamlineParams,
    pub river_params: NoiseStreamlineParams,
    /// Half-width of the river including its banks.
    pub river_size: f64,
    /// Width of each bank strip; the water surface is
    /// `river_size - river_bank_size` wide.
    pub river_bank_size: f64,
}

/// Noise applied while tracing a single water streamline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseStreamlineParams {
    pub noise_enabled: bool,
    pub noise_size: f64,
    pub noise_angle: f64,
}

/// The full tracer parameter record for one road family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamlineParams {
    /// Minimum separation between streamline seeds.
    pub dsep: f64,
    /// Minimum separation a candidate sample must keep from committed
    /// samples of the same family.
    pub dtest: f64,
    /// Integration step length.
    pub dstep: f64,
    /// Search distance when joining dangling streamline ends.
    pub dlookahead: f64,
    /// Self-join distance for closing circular streamlines.
    pub dcirclejoin: f64,
    /// Maximum approach angle (radians) for a join.
    pub joinangle: f64,
    /// Cap on integration steps per streamline.
    pub path_iterations: usize,
    /// Rejection-sampling attempts before a family gives up seeding.
    pub seed_tries: usize,
    pub simplify_tolerance: f64,
    /// Scales a forward collision probe; 0 disables early termination.
    pub collide_early: f64,
}

/// Tracer parameters for the three road families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamlineFamilies {
    pub main: StreamlineParams,
    pub major: StreamlineParams,
    pub minor: StreamlineParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParkParams {
    pub num_big_parks: usize,
    pub num_small_parks: usize,
    /// When set, big parks are contiguous blocks starting at a random
    /// index instead of independently random blocks.
    pub cluster_big_parks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildingParams {
    /// Blocks and lots below half this area are discarded; lots below
    /// twice it stop subdividing.
    pub min_area: f64,
    /// Street setback: final lots shrink inward by this distance.
    pub shrink_spacing: f64,
    /// Probability a lot stops subdividing early.
    pub chance_no_divide: f64,
    /// Building heights are drawn uniformly from this range.
    pub height_min: f64,
    pub height_max: f64,
}

/// Host-facing options that do not affect the street network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionParams {
    pub draw_centre: bool,
    /// Cooperative work budget per `step()` call, in milliseconds.
    pub animation_speed: u64,
    pub orthographic: bool,
    pub camera_x: f64,
    pub camera_y: f64,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            world_dimensions: Vec2::new(2000.0, 1000.0),
            origin: Vec2::ZERO,
            seed: 42,
            tensor_field: TensorFieldParams {
                noise_params: NoiseParams::default(),
                basis_fields: vec![
                    BasisFieldSpec::Grid {
                        x: 700.0,
                        y: 500.0,
                        size: 800.0,
                        decay: 2.0,
                        theta: 0.0,
                    },
                    BasisFieldSpec::Radial {
                        x: 1500.0,
                        y: 400.0,
                        size: 400.0,
                        decay: 5.0,
                    },
                ],
            },
            water: WaterParams::default(),
            streamlines: StreamlineFamilies::default(),
            parks: ParkParams::default(),
            buildings: BuildingParams::default(),
            options: OptionParams::default(),
        }
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            global_noise: false,
            noise_size_park: 20.0,
            noise_angle_park: 90.0,
            noise_size_global: 30.0,
            noise_angle_global: 20.0,
        }
    }
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            coast_params: NoiseStreamlineParams {
                noise_enabled: true,
                noise_size: 30.0,
                noise_angle: 20.0,
            },
            river_params: NoiseStreamlineParams {
                noise_enabled: true,
                noise_size: 30.0,
                noise_angle: 20.0,
            },
            river_size: 30.0,
            river_bank_size: 10.0,
        }
    }
}

impl Default for NoiseStreamlineParams {
    fn default() -> Self {
        Self {
            noise_enabled: false,
            noise_size: 30.0,
            noise_angle: 20.0,
        }
    }
}

impl Default for StreamlineParams {
    fn default() -> Self {
        // Minor-road scale; the coarser families override separation.
        Self {
            dsep: 20.0,
            dtest: 15.0,
            dstep: 1.0,
            dlookahead: 40.0,
            dcirclejoin: 5.0,
            joinangle: 0.1,
            path_iterations: 1000,
            seed_tries: 300,
            simplify_tolerance: 0.5,
            collide_early: 0.0,
        }
    }
}

impl Default for StreamlineFamilies {
    fn default() -> Self {
        Self {
            main: StreamlineParams {
                dsep: 400.0,
                dtest: 200.0,
                dlookahead: 500.0,
                path_iterations: 2500,
                ..StreamlineParams::default()
            },
            major: StreamlineParams {
                dsep: 100.0,
                dtest: 30.0,
                dlookahead: 200.0,
                path_iterations: 1500,
                ..StreamlineParams::default()
            },
            minor: StreamlineParams::default(),
        }
    }
}

impl Default for ParkParams {
    fn default() -> Self {
        Self {
            num_big_parks: 2,
            num_small_parks: 0,
            cluster_big_parks: false,
        }
    }
}

impl Default for BuildingParams {
    fn default() -> Self {
        Self {
            min_area: 150.0,
            shrink_spacing: 4.0,
            chance_no_divide: 0.05,
            height_min: 20.0,
            height_max: 40.0,
        }
    }
}

impl Default for OptionParams {
    fn default() -> Self {
        Self {
            draw_centre: false,
            animation_speed: 30,
            orthographic: false,
            camera_x: 0.0,
            camera_y: 0.0,
        }
    }
}

impl MapParams {
    /// Parses and validates a JSON parameter document.
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        let params: MapParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Checks every parameter against its documented range.
    pub fn validate(&self) -> Result<(), MapError> {
        if !(0.3..=20.0).contains(&self.zoom) {
            return Err(MapError::param("zoom", "must lie in [0.3, 20]"));
        }
        if self.world_dimensions.x <= 0.0 || self.world_dimensions.y <= 0.0 {
            return Err(MapError::InvalidDimensions {
                x: self.world_dimensions.x,
                y: self.world_dimensions.y,
            });
        }
        for spec in &self.tensor_field.basis_fields {
            let (size, decay) = match spec {
                BasisFieldSpec::Grid { size, decay, .. } => (*size, *decay),
                BasisFieldSpec::Radial { size, decay, .. } => (*size, *decay),
            };
            if size <= 0.0 {
                return Err(MapError::param("basisFields.size", "must be positive"));
            }
            if decay < 0.0 {
                return Err(MapError::param("basisFields.decay", "must be non-negative"));
            }
        }
        for (name, family) in [
            ("main", &self.streamlines.main),
            ("major", &self.streamlines.major),
            ("minor", &self.streamlines.minor),
        ] {
            family
                .validate()
                .map_err(|e| MapError::param(&format!("streamlines.{name}"), e.to_string()))?;
        }
        if self.water.river_size <= 0.0 {
            return Err(MapError::param("water.riverSize", "must be positive"));
        }
        if self.water.river_bank_size <= 0.0 || self.water.river_bank_size >= self.water.river_size
        {
            return Err(MapError::param(
                "water.riverBankSize",
                "must be positive and smaller than riverSize",
            ));
        }
        self.buildings.validate()?;
        Ok(())
    }
}

impl StreamlineParams {
    /// Range checks plus the separation-ordering constraint
    /// `dstep <= dtest <= dsep`.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.dsep <= 0.0 || self.dtest <= 0.0 || self.dstep <= 0.0 {
            return Err(MapError::param(
                "dsep/dtest/dstep",
                "separation distances must be positive",
            ));
        }
        if self.dtest > self.dsep {
            return Err(MapError::param("dtest", "must not exceed dsep"));
        }
        if self.dstep > self.dtest {
            return Err(MapError::param("dstep", "must not exceed dtest"));
        }
        if !(0.0..=1.0).contains(&self.collide_early) {
            return Err(MapError::param("collideEarly", "must lie in [0, 1]"));
        }
        if self.path_iterations == 0 || self.seed_tries == 0 {
            return Err(MapError::param(
                "pathIterations/seedTries",
                "must be positive",
            ));
        }
        if self.simplify_tolerance < 0.0 {
            return Err(MapError::param("simplifyTolerance", "must be non-negative"));
        }
        if self.dlookahead < 0.0 || self.dcirclejoin < 0.0 || self.joinangle < 0.0 {
            return Err(MapError::param(
                "dlookahead/dcirclejoin/joinangle",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

impl BuildingParams {
    fn validate(&self) -> Result<(), MapError> {
        if self.min_area <= 0.0 {
            return Err(MapError::param("buildings.minArea", "must be positive"));
        }
        if self.shrink_spacing < 0.0 {
            return Err(MapError::param(
                "buildings.shrinkSpacing",
                "must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.chance_no_divide) {
            return Err(MapError::param(
                "buildings.chanceNoDivide",
                "must lie in [0, 1]",
            ));
        }
        if self.height_min <= 0.0 || self.height_max < self.height_min {
            return Err(MapError::param(
                "buildings.heightMin/heightMax",
                "need 0 < heightMin <= heightMax",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        MapParams::default().validate().unwrap();
    }

    #[test]
    fn empty_document_uses_defaults() {
        let params = MapParams::from_json_str("{}").unwrap();
        assert_eq!(params, MapParams::default());
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let mut params = MapParams::default();
        params.seed = 7;
        params.streamlines.minor.dsep = 25.0;
        params.parks.cluster_big_parks = true;
        let json = serde_json::to_string_pretty(&params).unwrap();
        let back = MapParams::from_json_str(&json).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let json = serde_json::to_value(MapParams::default()).unwrap();
        assert!(json.get("worldDimensions").is_some());
        assert!(json["streamlines"]["minor"].get("pathIterations").is_some());
        assert!(json["parks"].get("clusterBigParks").is_some());
        assert!(json["buildings"].get("chanceNoDivide").is_some());
        assert!(json["tensorField"].get("noiseParams").is_some());
    }

    #[test]
    fn basis_fields_parse_from_tagged_json() {
        let json = r#"{
            "tensorField": {
                "basisFields": [
                    {"type": "grid", "x": 1000, "y": 500, "size": 500, "decay": 50, "theta": 0.0},
                    {"type": "radial", "x": 500, "y": 500, "size": 200, "decay": 5}
                ]
            }
        }"#;
        let params = MapParams::from_json_str(json).unwrap();
        assert_eq!(params.tensor_field.basis_fields.len(), 2);
        assert!(matches!(
            params.tensor_field.basis_fields[0],
            BasisFieldSpec::Grid { size, .. } if size == 500.0
        ));
        assert!(matches!(
            params.tensor_field.basis_fields[1],
            BasisFieldSpec::Radial { .. }
        ));
    }

    #[test]
    fn grid_theta_defaults_to_zero() {
        let json = r#"{"tensorField": {"basisFields": [
            {"type": "grid", "x": 0, "y": 0, "size": 100, "decay": 1}
        ]}}"#;
        let params = MapParams::from_json_str(json).unwrap();
        assert!(matches!(
            params.tensor_field.basis_fields[0],
            BasisFieldSpec::Grid { theta, .. } if theta == 0.0
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = MapParams::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, MapError::ParamParse(_)));
    }

    #[test]
    fn out_of_range_zoom_is_rejected() {
        for zoom in [0.2, 25.0, -1.0] {
            let mut params = MapParams::default();
            params.zoom = zoom;
            assert!(params.validate().is_err(), "zoom {zoom} should be invalid");
        }
    }

    #[test]
    fn negative_world_dimensions_are_rejected() {
        let mut params = MapParams::default();
        params.world_dimensions = Vec2::new(-100.0, 500.0);
        assert!(matches!(
            params.validate(),
            Err(MapError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn dtest_larger_than_dsep_is_rejected() {
        let mut params = MapParams::default();
        params.streamlines.minor.dtest = params.streamlines.minor.dsep + 1.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn collide_early_outside_unit_interval_is_rejected() {
        let mut params = MapParams::default();
        params.streamlines.major.collide_early = 1.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn river_bank_wider_than_river_is_rejected() {
        let mut params = MapParams::default();
        params.water.river_bank_size = params.water.river_size;
        assert!(params.validate().is_err());
    }

    #[test]
    fn inverted_height_range_is_rejected() {
        let mut params = MapParams::default();
        params.buildings.height_min = 50.0;
        params.buildings.height_max = 40.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn partial_documents_override_only_named_fields() {
        let params = MapParams::from_json_str(r#"{"seed": 99, "zoom": 2.0}"#).unwrap();
        assert_eq!(params.seed, 99);
        assert_eq!(params.zoom, 2.0);
        assert_eq!(
            params.world_dimensions,
            MapParams::default().world_dimensions
        );
    }
}
