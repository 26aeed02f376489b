//! SVG export of a generated map.
//!
//! Renders every output surface into a single self-contained SVG
//! document: sea and river fills, park fills, per-class road strokes,
//! and pseudo-3D buildings (side quads first, then roofs). Styling lives
//! in a `<style>` block keyed by class so downstream tooling can restyle
//! without touching geometry.

use std::fmt::Write as _;
use std::path::Path;

use city_engine_core::error::MapError;
use city_engine_core::vector::Vec2;

use crate::pipeline::MapPipeline;

/// Stroke width per road class, in world units.
const MAIN_ROAD_WIDTH: f64 = 4.0;
const MAJOR_ROAD_WIDTH: f64 = 3.0;
const MINOR_ROAD_WIDTH: f64 = 1.5;
const COAST_ROAD_WIDTH: f64 = 4.0;

/// Renders the map as an SVG document string.
pub fn render(map: &MapPipeline) -> String {
    let params = map.params();
    let origin = params.origin;
    let dims = params.world_dimensions;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">
"#,
        origin.x, origin.y, dims.x, dims.y
    );
    svg.push_str(concat!(
        "  <style>\n",
        "    .land { fill: #efe9dc; }\n",
        "    .sea { fill: #a9c9e0; }\n",
        "    .river { fill: #a9c9e0; }\n",
        "    .park { fill: #c2d6a9; }\n",
        "    .road { fill: none; stroke: #ffffff; stroke-linecap: round; }\n",
        "    .road-outline { fill: none; stroke: #8a8a7a; stroke-linecap: round; }\n",
        "    .lot { fill: #d8d0c0; stroke: #a89f8d; stroke-width: 0.5; }\n",
        "    .building-side { fill: #b5ab99; stroke: #8a8272; stroke-width: 0.3; }\n",
        "    .building-roof { fill: #cec5b2; stroke: #8a8272; stroke-width: 0.3; }\n",
        "  </style>\n",
    ));

    // Land backdrop.
    let _ = writeln!(
        svg,
        r#"  <rect x="{}" y="{}" width="{}" height="{}" class="land" />"#,
        origin.x, origin.y, dims.x, dims.y
    );

    draw_polygon(&mut svg, map.sea_polygon(), "sea");
    draw_polygon(&mut svg, map.river_polygon(), "river");
    for park in map.parks() {
        draw_polygon(&mut svg, &park, "park");
    }

    // Roads, coarse classes on top of fine ones.
    for road in map.minor_roads() {
        draw_road(&mut svg, road, MINOR_ROAD_WIDTH);
    }
    for road in map.major_roads() {
        draw_road(&mut svg, road, MAJOR_ROAD_WIDTH);
    }
    for road in map.main_roads() {
        draw_road(&mut svg, road, MAIN_ROAD_WIDTH);
    }
    draw_road(&mut svg, map.coastline(), COAST_ROAD_WIDTH);
    draw_road(&mut svg, map.river_main_road(), MINOR_ROAD_WIDTH);
    draw_road(&mut svg, map.river_secondary_road(), MINOR_ROAD_WIDTH);

    // Buildings are pre-sorted by height; draw order preserves that.
    if map.building_models().is_empty() {
        for lot in map.lots() {
            draw_polygon(&mut svg, lot, "lot");
        }
    } else {
        for building in map.building_models() {
            for quad in &building.sides {
                draw_polygon(&mut svg, quad, "building-side");
            }
            draw_polygon(&mut svg, &building.roof, "building-roof");
        }
    }

    if params.options.draw_centre {
        for centre in map.tensor_field().centre_points() {
            let _ = writeln!(
                svg,
                r##"  <circle cx="{:.2}" cy="{:.2}" r="6" fill="#c0504d" />"##,
                centre.x, centre.y
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// Renders and writes the document to `path`.
pub fn write(map: &MapPipeline, path: &Path) -> Result<(), MapError> {
    std::fs::write(path, render(map)).map_err(|e| MapError::Io(e.to_string()))
}

fn draw_polygon(svg: &mut String, polygon: &[Vec2], class: &str) {
    if polygon.len() < 3 {
        return;
    }
    let points = polygon
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(svg, r#"  <polygon points="{points}" class="{class}" />"#);
}

fn draw_road(svg: &mut String, road: &[Vec2], width: f64) {
    if road.len() < 2 {
        return;
    }
    let points = road
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(
        svg,
        r#"  <polyline points="{points}" class="road-outline" stroke-width="{:.2}" />"#,
        width + 1.0
    );
    let _ = writeln!(
        svg,
        r#"  <polyline points="{points}" class="road" stroke-width="{width:.2}" />"#
    );
}
