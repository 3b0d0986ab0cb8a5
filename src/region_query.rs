//! # Region / Time Query Index
//!
//! In-memory lookup of "every sample inside rectangle R between t0 and t1",
//! grouped per vehicle. Samples are kept in an R-tree keyed by their raw
//! WGS84 position; a query rectangle in another frame is first widened into
//! a WGS84 search envelope, then every candidate is re-tested exactly in the
//! rectangle's own frame.
//!
//! ## Example
//!
//! ```rust
//! use trajectory_engine::parser::parse_timestamp;
//! use trajectory_engine::{parse_line, CoordFrame, Rectangle, RegionQueryIndex};
//!
//! let rows = [
//!     "1,2008-02-02 08:00:00,116.35,39.95",
//!     "2,2008-02-02 08:01:00,116.60,40.20",
//! ];
//! let index = RegionQueryIndex::from_samples(rows.iter().filter_map(|l| parse_line(l)).collect());
//!
//! let start = parse_timestamp("2008-02-02 00:00:00").unwrap();
//! let end = parse_timestamp("2008-02-02 23:59:59").unwrap();
//! let rect = Rectangle::new(116.30, 116.40, 39.90, 40.00, CoordFrame::Wgs84);
//! let hits = index.query(start, end, &rect).unwrap();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].vehicle_id, "1");
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rstar::{RTree, RTreeObject, AABB};

use crate::coord::{gcj02_to_wgs84, CoordFrame};
use crate::error::{Result, TrajectoryError};
use crate::region::Rectangle;
use crate::source::{units_from_samples, WorkUnit};
use crate::{Sample, Trajectory};

/// Padding in degrees added around a non-WGS84 envelope. Covers the error of
/// the approximate GCJ02 inverse and the variation of the offset across one
/// rectangle.
const ENVELOPE_PAD: f64 = 0.001;

/// A sample position with its index into the sample store.
#[derive(Debug, Clone, Copy)]
struct IndexedSample {
    idx: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedSample {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// R-tree over a fixed set of WGS84 samples.
pub struct RegionQueryIndex {
    samples: Vec<Sample>,
    tree: RTree<IndexedSample>,
}

impl RegionQueryIndex {
    /// Index `samples` (WGS84, any order).
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let indexed: Vec<IndexedSample> = samples
            .iter()
            .enumerate()
            .map(|(idx, s)| IndexedSample {
                idx,
                lng: s.lng,
                lat: s.lat,
            })
            .collect();
        Self {
            samples,
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// WGS84 search envelope guaranteed to cover every sample that projects
    /// into `rect`.
    fn search_envelope(rect: &Rectangle) -> AABB<[f64; 2]> {
        match rect.frame {
            CoordFrame::Wgs84 => AABB::from_corners([rect.min_lng, rect.min_lat], [rect.max_lng, rect.max_lat]),
            CoordFrame::Gcj02 => {
                let corners = [
                    gcj02_to_wgs84(rect.min_lng, rect.min_lat),
                    gcj02_to_wgs84(rect.min_lng, rect.max_lat),
                    gcj02_to_wgs84(rect.max_lng, rect.min_lat),
                    gcj02_to_wgs84(rect.max_lng, rect.max_lat),
                ];
                let min_lng = corners.iter().map(|c| c.0).fold(f64::MAX, f64::min);
                let max_lng = corners.iter().map(|c| c.0).fold(f64::MIN, f64::max);
                let min_lat = corners.iter().map(|c| c.1).fold(f64::MAX, f64::min);
                let max_lat = corners.iter().map(|c| c.1).fold(f64::MIN, f64::max);
                AABB::from_corners(
                    [min_lng - ENVELOPE_PAD, min_lat - ENVELOPE_PAD],
                    [max_lng + ENVELOPE_PAD, max_lat + ENVELOPE_PAD],
                )
            }
        }
    }

    /// Matching samples grouped by vehicle id (ascending), each group in
    /// time order. Coordinates stay WGS84.
    fn matching(&self, start: NaiveDateTime, end: NaiveDateTime, rect: &Rectangle) -> Result<BTreeMap<String, Vec<Sample>>> {
        if start > end {
            return Err(TrajectoryError::config(format!(
                "query start {} is after end {}",
                start, end
            )));
        }
        let rect = rect.normalized()?;

        let mut groups: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
        for hit in self.tree.locate_in_envelope(&Self::search_envelope(&rect)) {
            let sample = &self.samples[hit.idx];
            if sample.timestamp < start || sample.timestamp > end {
                continue;
            }
            let (lng, lat) = rect.frame.project(sample.lng, sample.lat);
            if rect.contains(lng, lat) {
                groups.entry(sample.vehicle_id.clone()).or_default().push(sample.clone());
            }
        }
        for points in groups.values_mut() {
            points.sort_by_key(|s| s.timestamp);
        }
        Ok(groups)
    }

    /// Samples inside `rect` within `[start, end]`, one GCJ02 trajectory per
    /// vehicle, vehicle ids ascending.
    pub fn query(&self, start: NaiveDateTime, end: NaiveDateTime, rect: &Rectangle) -> Result<Vec<Trajectory>> {
        Ok(self
            .matching(start, end, rect)?
            .into_iter()
            .map(|(id, points)| Trajectory::new(id, points).to_display_frame())
            .collect())
    }

    /// The same selection as [`query`](Self::query), as WGS84 work units
    /// ready for [`run_analysis`](crate::run_analysis).
    pub fn query_units(&self, start: NaiveDateTime, end: NaiveDateTime, rect: &Rectangle) -> Result<Vec<WorkUnit>> {
        let rows: Vec<Sample> = self.matching(start, end, rect)?.into_values().flatten().collect();
        Ok(units_from_samples(rows))
    }
}
