//! # Region Index
//!
//! Rectangle membership, grid-cell addressing and path signatures.
//!
//! Every [`Rectangle`] carries the [`CoordFrame`] it was declared in. A
//! [`Region`] tests WGS84 samples by first projecting them into that frame,
//! so a region drawn on the display map is never compared against raw GPS
//! coordinates.
//!
//! A [`GridIndex`] can be attached to a region to answer most membership
//! tests with a single cell lookup. Cells that straddle the rectangle edge,
//! and points outside the indexed extent, always fall back to the exact test,
//! so the index never changes a result.

use serde::{Deserialize, Serialize};

use crate::coord::CoordFrame;
use crate::error::{Result, TrajectoryError};
use crate::{LngLat, Sample};

/// Upper bound on the number of cells a [`GridIndex`] may allocate.
const MAX_INDEX_CELLS: usize = 4_000_000;

/// An axis-aligned rectangle in a declared frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    #[serde(default)]
    pub frame: CoordFrame,
}

impl Rectangle {
    /// Create a rectangle. Bounds are taken as given; see [`Rectangle::normalized`].
    pub fn new(min_lng: f64, max_lng: f64, min_lat: f64, max_lat: f64, frame: CoordFrame) -> Self {
        Self {
            min_lng,
            max_lng,
            min_lat,
            max_lat,
            frame,
        }
    }

    /// Build from a top-left / bottom-right `(lng, lat)` corner pair, as map
    /// selection tools report them. The result is normalized.
    pub fn from_corners(top_left: (f64, f64), bottom_right: (f64, f64), frame: CoordFrame) -> Result<Self> {
        Self::new(top_left.0, bottom_right.0, bottom_right.1, top_left.1, frame).normalized()
    }

    /// Swap inverted bounds into `(min, max)` order.
    ///
    /// Fails when a bound is not finite, since no ordering can fix it.
    pub fn normalized(&self) -> Result<Self> {
        let rect = Self {
            min_lng: self.min_lng.min(self.max_lng),
            max_lng: self.min_lng.max(self.max_lng),
            min_lat: self.min_lat.min(self.max_lat),
            max_lat: self.min_lat.max(self.max_lat),
            frame: self.frame,
        };
        let finite = [rect.min_lng, rect.max_lng, rect.min_lat, rect.max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !finite || rect.min_lng > rect.max_lng || rect.min_lat > rect.max_lat {
            return Err(TrajectoryError::InvalidRectangle {
                min_lng: self.min_lng,
                max_lng: self.max_lng,
                min_lat: self.min_lat,
                max_lat: self.max_lat,
                message: "bounds must be finite".to_string(),
            });
        }
        Ok(rect)
    }

    /// Inclusive membership test for a point already in this rectangle's frame.
    #[inline]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        in_rectangle(lng, lat, self)
    }

    /// Lower-left corner.
    pub fn origin(&self) -> LngLat {
        LngLat::new(self.min_lng, self.min_lat)
    }
}

/// Inclusive bounds test. The point must be in `rect.frame`.
#[inline]
pub fn in_rectangle(lng: f64, lat: f64, rect: &Rectangle) -> bool {
    rect.min_lng <= lng && lng <= rect.max_lng && rect.min_lat <= lat && lat <= rect.max_lat
}

// ============================================================================
// Grid cells
// ============================================================================

/// Integer address of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub col: i64,
    pub row: i64,
}

/// Cell containing `(lng, lat)` on a grid anchored at `origin`.
#[inline]
pub fn grid_cell(lng: f64, lat: f64, origin: LngLat, cell_size: f64) -> GridCell {
    GridCell {
        col: ((lng - origin.lng) / cell_size).floor() as i64,
        row: ((lat - origin.lat) / cell_size).floor() as i64,
    }
}

/// Center of `cell` on a grid anchored at `origin`.
#[inline]
pub fn cell_center(cell: GridCell, origin: LngLat, cell_size: f64) -> LngLat {
    LngLat::new(
        origin.lng + (cell.col as f64 + 0.5) * cell_size,
        origin.lat + (cell.row as f64 + 0.5) * cell_size,
    )
}

/// Hashable signature of a path: the sequence of grid cells it visits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(pub Vec<GridCell>);

/// Encode a path on a grid anchored at `(0, 0)`.
///
/// One cell per point; repeated cells are kept, so two paths share a key
/// only when they visit the same cells with the same sampling.
pub fn encode_path(points: &[LngLat], cell_size: f64) -> PathKey {
    let origin = LngLat::new(0.0, 0.0);
    PathKey(
        points
            .iter()
            .map(|p| grid_cell(p.lng, p.lat, origin, cell_size))
            .collect(),
    )
}

// ============================================================================
// Grid accelerator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellClass {
    Inside,
    Outside,
    Edge,
}

/// Uniform grid over an extent, classifying each cell against a rectangle.
#[derive(Debug, Clone)]
pub struct GridIndex {
    rect: Rectangle,
    origin: LngLat,
    cell_size: f64,
    cols: i64,
    rows: i64,
    classes: Vec<CellClass>,
}

impl GridIndex {
    /// Index `rect` over `extent` with square cells of `cell_size` degrees.
    ///
    /// Both rectangles must be normalized and share a frame.
    pub fn new(rect: &Rectangle, extent: &Rectangle, cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TrajectoryError::config(format!(
                "grid index cell size must be positive, got {}",
                cell_size
            )));
        }
        if rect.frame != extent.frame {
            return Err(TrajectoryError::config(
                "grid index extent and region must use the same frame",
            ));
        }
        let cols = ((extent.max_lng - extent.min_lng) / cell_size).ceil().max(1.0);
        let rows = ((extent.max_lat - extent.min_lat) / cell_size).ceil().max(1.0);
        if cols * rows > MAX_INDEX_CELLS as f64 {
            return Err(TrajectoryError::config(format!(
                "grid index of {} x {} cells is too large",
                cols, rows
            )));
        }
        let (cols, rows) = (cols as i64, rows as i64);
        let origin = extent.origin();

        // Margin absorbs rounding in the floor() cell assignment.
        let margin = cell_size * 1e-6;
        let mut classes = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let min_lng = origin.lng + col as f64 * cell_size - margin;
                let max_lng = origin.lng + (col + 1) as f64 * cell_size + margin;
                let min_lat = origin.lat + row as f64 * cell_size - margin;
                let max_lat = origin.lat + (row + 1) as f64 * cell_size + margin;

                let class = if min_lng >= rect.min_lng
                    && max_lng <= rect.max_lng
                    && min_lat >= rect.min_lat
                    && max_lat <= rect.max_lat
                {
                    CellClass::Inside
                } else if max_lng < rect.min_lng
                    || min_lng > rect.max_lng
                    || max_lat < rect.min_lat
                    || min_lat > rect.max_lat
                {
                    CellClass::Outside
                } else {
                    CellClass::Edge
                };
                classes.push(class);
            }
        }

        Ok(Self {
            rect: *rect,
            origin,
            cell_size,
            cols,
            rows,
            classes,
        })
    }

    /// Membership test, identical in result to [`in_rectangle`].
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        if lng.is_finite() && lat.is_finite() {
            let cell = grid_cell(lng, lat, self.origin, self.cell_size);
            if (0..self.cols).contains(&cell.col) && (0..self.rows).contains(&cell.row) {
                match self.classes[(cell.row * self.cols + cell.col) as usize] {
                    CellClass::Inside => return true,
                    CellClass::Outside => return false,
                    CellClass::Edge => {}
                }
            }
        }
        in_rectangle(lng, lat, &self.rect)
    }
}

// ============================================================================
// Region
// ============================================================================

/// A validated rectangle used as an analysis region.
#[derive(Debug, Clone)]
pub struct Region {
    rect: Rectangle,
    index: Option<GridIndex>,
}

impl Region {
    /// Normalize `rect` and wrap it. Fails on non-finite bounds.
    pub fn new(rect: Rectangle) -> Result<Self> {
        Ok(Self {
            rect: rect.normalized()?,
            index: None,
        })
    }

    /// Attach a grid accelerator covering `extent`.
    pub fn with_grid_index(mut self, extent: &Rectangle, cell_size: f64) -> Result<Self> {
        let extent = extent.normalized()?;
        self.index = Some(GridIndex::new(&self.rect, &extent, cell_size)?);
        Ok(self)
    }

    pub fn rectangle(&self) -> &Rectangle {
        &self.rect
    }

    pub fn frame(&self) -> CoordFrame {
        self.rect.frame
    }

    /// Membership of a point already in the region's frame.
    #[inline]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        match &self.index {
            Some(index) => index.contains(lng, lat),
            None => in_rectangle(lng, lat, &self.rect),
        }
    }

    /// Membership of a raw WGS84 sample.
    pub fn contains_sample(&self, sample: &Sample) -> bool {
        let (lng, lat) = self.frame().project(sample.lng, sample.lat);
        self.contains(lng, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn area1() -> Rectangle {
        Rectangle::new(116.30, 116.40, 39.90, 40.00, CoordFrame::Gcj02)
    }

    #[test]
    fn test_in_rectangle_inclusive() {
        let r = area1();
        assert!(in_rectangle(116.30, 39.90, &r));
        assert!(in_rectangle(116.40, 40.00, &r));
        assert!(in_rectangle(116.35, 39.95, &r));
        assert!(!in_rectangle(116.29, 39.95, &r));
        assert!(!in_rectangle(116.35, 40.01, &r));
    }

    #[test]
    fn test_normalize_inverted_bounds() {
        let r = Rectangle::new(116.40, 116.30, 40.00, 39.90, CoordFrame::Wgs84)
            .normalized()
            .unwrap();
        assert_eq!(r.min_lng, 116.30);
        assert_eq!(r.max_lat, 40.00);
        assert_eq!(r.frame, CoordFrame::Wgs84);
    }

    #[test]
    fn test_normalize_rejects_nan() {
        let r = Rectangle::new(f64::NAN, 116.30, 39.9, 40.0, CoordFrame::Gcj02);
        assert!(matches!(r.normalized(), Err(TrajectoryError::InvalidRectangle { .. })));
        assert!(Region::new(r).is_err());
    }

    #[test]
    fn test_from_corners() {
        // Top-left has the larger latitude
        let r = Rectangle::from_corners((116.0, 40.0), (117.0, 39.0), CoordFrame::Gcj02).unwrap();
        assert_eq!((r.min_lng, r.max_lng, r.min_lat, r.max_lat), (116.0, 117.0, 39.0, 40.0));
    }

    #[test]
    fn test_grid_cell_and_center() {
        let origin = LngLat::new(0.0, 0.0);
        let cell = grid_cell(116.305, 39.915, origin, 0.01);
        assert_eq!(cell, GridCell { col: 11630, row: 3991 });
        let center = cell_center(cell, origin, 0.01);
        assert!((center.lng - 116.305).abs() < 1e-9);
        assert!((center.lat - 39.915).abs() < 1e-9);

        let negative = grid_cell(-0.5, -0.5, origin, 1.0);
        assert_eq!(negative, GridCell { col: -1, row: -1 });
    }

    #[test]
    fn test_encode_path_groups_nearby_points() {
        let a = [LngLat::new(116.3001, 39.9001), LngLat::new(116.3102, 39.9103)];
        let b = [LngLat::new(116.3004, 39.9004), LngLat::new(116.3105, 39.9106)];
        assert_eq!(encode_path(&a, 0.001), encode_path(&b, 0.001));

        let c = [LngLat::new(116.3001, 39.9001), LngLat::new(116.3202, 39.9103)];
        assert_ne!(encode_path(&a, 0.001), encode_path(&c, 0.001));
    }

    #[test]
    fn test_grid_index_agrees_with_exact_test() {
        let rect = area1();
        let extent = Rectangle::new(116.0, 116.8, 39.6, 40.3, CoordFrame::Gcj02);
        let index = GridIndex::new(&rect, &extent, 0.013).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50_000 {
            let lng = rng.gen_range(115.9..116.9);
            let lat = rng.gen_range(39.5..40.4);
            assert_eq!(index.contains(lng, lat), in_rectangle(lng, lat, &rect), "({}, {})", lng, lat);
        }

        // Exactly on the edges and corners
        for &(lng, lat) in &[
            (116.30, 39.90),
            (116.40, 40.00),
            (116.30, 40.00),
            (116.40, 39.90),
            (116.35, 39.90),
            (116.40, 39.95),
            (116.4000000001, 39.95),
            (116.2999999999, 39.95),
        ] {
            assert_eq!(index.contains(lng, lat), in_rectangle(lng, lat, &rect));
        }
        assert!(!index.contains(f64::NAN, 39.95));
    }

    #[test]
    fn test_grid_index_rejects_bad_input() {
        let rect = area1();
        let wgs_extent = Rectangle::new(116.0, 116.8, 39.6, 40.3, CoordFrame::Wgs84);
        assert!(GridIndex::new(&rect, &wgs_extent, 0.01).is_err());
        assert!(GridIndex::new(&rect, &rect, 0.0).is_err());
        assert!(GridIndex::new(&rect, &rect, 1e-7).is_err());
    }

    #[test]
    fn test_region_contains_sample_projects_frame() {
        // The GCJ02 offset in Beijing is ~0.006 deg east: a raw point just
        // west of the box is inside once projected.
        let region = Region::new(Rectangle::new(116.300, 116.310, 39.90, 39.92, CoordFrame::Gcj02)).unwrap();
        let s = crate::test_support::sample("1", 8, 0, 116.297, 39.91);
        assert!(region.contains_sample(&s));

        let raw = Region::new(Rectangle::new(116.300, 116.310, 39.90, 39.92, CoordFrame::Wgs84)).unwrap();
        assert!(!raw.contains_sample(&s));
    }
}
