//! Uniform spatial hash over streamline sample points.
//!
//! Cells have side `dsep`, so a 3x3 cell neighbourhood is guaranteed to
//! contain every stored sample within `dsep` of a query point. Each
//! streamline family (major, minor) keeps its own index; separation
//! queries run at every integration step, so lookups stay allocation-free.

use crate::vector::Vec2;

/// Grid-accelerated proximity index over sample points.
#[derive(Debug, Clone)]
pub struct GridIndex {
    origin: Vec2,
    world_dimensions: Vec2,
    dsep: f64,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Vec2>>,
}

impl GridIndex {
    /// Creates an empty index covering the world rectangle with cell side
    /// `dsep`.
    pub fn new(origin: Vec2, world_dimensions: Vec2, dsep: f64) -> Self {
        let cols = (world_dimensions.x / dsep).ceil().max(1.0) as usize;
        let rows = (world_dimensions.y / dsep).ceil().max(1.0) as usize;
        Self {
            origin,
            world_dimensions,
            dsep,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    pub fn dsep(&self) -> f64 {
        self.dsep
    }

    /// Total number of stored samples.
    pub fn sample_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    /// Inserts every sample of the polyline (not just endpoints).
    /// Separation is not enforced here; commit-time checks are the
    /// caller's responsibility.
    pub fn add_polyline(&mut self, line: &[Vec2]) {
        for v in line {
            self.add_sample(*v);
        }
    }

    /// Inserts a single sample. Points outside the world rectangle are
    /// clamped into the border cells.
    pub fn add_sample(&mut self, v: Vec2) {
        let (col, row) = self.clamped_cell(v);
        self.cells[row * self.cols + col].push(v);
    }

    /// Copies every sample of `other` into this index. Used to seed a
    /// road family's grid with the streamlines it must avoid.
    pub fn add_all(&mut self, other: &GridIndex) {
        for cell in &other.cells {
            for v in cell {
                self.add_sample(*v);
            }
        }
    }

    /// Whether `v` is at least `sqrt(d_sq)` away from every stored
    /// sample. Checks the 3x3 neighbourhood, which is complete for radii
    /// up to `dsep`. A stored sample equal to `v` itself is ignored.
    pub fn is_valid_sample(&self, v: Vec2, d_sq: f64) -> bool {
        let (col, row) = self.clamped_cell(v);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let c = col as i64 + dx;
                let r = row as i64 + dy;
                if c < 0 || r < 0 || c >= self.cols as i64 || r >= self.rows as i64 {
                    continue;
                }
                let cell = &self.cells[r as usize * self.cols + c as usize];
                for sample in cell {
                    if *sample != v && sample.distance_to_sq(v) < d_sq {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// All samples in the cells overlapping a square of half-side
    /// `distance` around `v`. A cell-granular superset of the true
    /// radius query.
    pub fn nearby_points(&self, v: Vec2, distance: f64) -> Vec<Vec2> {
        let radius = (distance / self.dsep).ceil() as i64;
        let (col, row) = self.clamped_cell(v);
        let mut out = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let c = col as i64 + dx;
                let r = row as i64 + dy;
                if c < 0 || r < 0 || c >= self.cols as i64 || r >= self.rows as i64 {
                    continue;
                }
                out.extend_from_slice(&self.cells[r as usize * self.cols + c as usize]);
            }
        }
        out
    }

    /// Drops every stored sample, keeping the cell structure.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    fn clamped_cell(&self, v: Vec2) -> (usize, usize) {
        let local = v - self.origin;
        let col = (local.x / self.dsep).floor();
        let row = (local.y / self.dsep).floor();
        let col = col.clamp(0.0, (self.cols - 1) as f64) as usize;
        let row = row.clamp(0.0, (self.rows - 1) as f64) as usize;
        (col, row)
    }
}
