#![deny(unsafe_code)]
//! Map generation for city-engine: the streamline tracer, water
//! generator, planar road graph, block/lot polygon finder, building
//! projector, the staged pipeline that sequences them, and SVG export.
//!
//! The usual entry point is [`MapPipeline`]: construct it from a
//! [`city_engine_core::MapParams`], call `generate()` (or `step()` for
//! cooperative animation), then read the output surfaces or export them
//! with [`svg`] / [`MapGeometry`].

pub mod buildings;
pub mod graph;
pub mod pipeline;
pub mod polygon_finder;
pub mod streamlines;
pub mod svg;
pub mod water;

pub use buildings::{BuildingModel, ViewState};
pub use graph::{Graph, RoadKind, RoadPolyline};
pub use pipeline::{MapGeometry, MapPipeline, Stage};
pub use streamlines::{Streamline, StreamlineGenerator};
pub use water::WaterFeatures;
