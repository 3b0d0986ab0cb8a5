//! Property checks over seeded random inputs.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trajectory_engine::{
    clean, dedup, gcj02_to_wgs84, simplify, wgs84_to_gcj02, CoordFrame, GridIndex, Rectangle,
    Sample, Trajectory,
};

fn random_track(rng: &mut StdRng, len: usize) -> Vec<Sample> {
    let base = NaiveDate::from_ymd_opt(2008, 2, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let mut lng = 116.3;
    let mut lat = 39.9;
    (0..len)
        .map(|i| {
            // Repeat the previous position now and then
            if rng.gen_bool(0.8) {
                lng += rng.gen_range(-0.001..0.001);
                lat += rng.gen_range(-0.001..0.001);
            }
            Sample::new("1", base + chrono::Duration::seconds(i as i64 * 30), lng, lat)
        })
        .collect()
}

fn is_subsequence(sub: &[Sample], full: &[Sample]) -> bool {
    let mut it = full.iter();
    sub.iter().all(|s| it.any(|f| f == s))
}

#[test]
fn test_simplify_properties() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let len = rng.gen_range(0..120);
        let track = random_track(&mut rng, len);
        let tolerance = rng.gen_range(0.0..0.002);

        let simplified = simplify(&track, tolerance);
        assert!(simplified.len() <= track.len());
        assert!(is_subsequence(&simplified, &track));
        if len >= 1 {
            assert_eq!(simplified.first(), track.first());
            assert_eq!(simplified.last(), track.last());
        }
        assert_eq!(simplify(&simplified, tolerance), simplified);
    }
}

#[test]
fn test_zero_tolerance_keeps_every_bend() {
    let mut rng = StdRng::seed_from_u64(3);
    let track = dedup(&random_track(&mut rng, 50));
    // Random steps are never exactly collinear
    assert_eq!(simplify(&track, 0.0).len(), track.len());
}

#[test]
fn test_dedup_idempotent() {
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..100 {
        let len = rng.gen_range(0..80);
        let track = random_track(&mut rng, len);
        let once = dedup(&track);
        assert_eq!(dedup(&once), once);
        assert!(once.windows(2).all(|w| (w[0].lng, w[0].lat) != (w[1].lng, w[1].lat)));
    }
}

#[test]
fn test_clean_keeps_vehicle_and_frame() {
    let mut rng = StdRng::seed_from_u64(5);
    let trajectory = Trajectory::new("1", random_track(&mut rng, 40));
    let cleaned = clean(&trajectory, true, 0.0005);
    assert_eq!(cleaned.vehicle_id, "1");
    assert_eq!(cleaned.frame, CoordFrame::Wgs84);
    assert!(cleaned.len() <= trajectory.len());
}

#[test]
fn test_coordinate_round_trip_inside_china() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..10_000 {
        let lng = rng.gen_range(73.0..135.0);
        let lat = rng.gen_range(18.0..53.0);
        let (g_lng, g_lat) = wgs84_to_gcj02(lng, lat);
        let (w_lng, w_lat) = gcj02_to_wgs84(g_lng, g_lat);
        assert!((w_lng - lng).abs() < 1e-4 && (w_lat - lat).abs() < 1e-4, "({}, {})", lng, lat);
    }
}

#[test]
fn test_coordinate_identity_outside_china() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..1_000 {
        let lng = rng.gen_range(-180.0..72.0);
        let lat = rng.gen_range(-90.0..90.0);
        assert_eq!(wgs84_to_gcj02(lng, lat), (lng, lat));
        assert_eq!(gcj02_to_wgs84(lng, lat), (lng, lat));
    }
}

#[test]
fn test_grid_index_matches_exact_test_for_many_rectangles() {
    let mut rng = StdRng::seed_from_u64(77);
    let extent = Rectangle::new(115.7, 117.4, 39.4, 41.0, CoordFrame::Wgs84);
    for _ in 0..20 {
        let lng0 = rng.gen_range(115.8..117.2);
        let lat0 = rng.gen_range(39.5..40.8);
        let rect = Rectangle::new(
            lng0,
            lng0 + rng.gen_range(0.001..0.2),
            lat0,
            lat0 + rng.gen_range(0.001..0.2),
            CoordFrame::Wgs84,
        );
        let cell = rng.gen_range(0.001..0.05);
        let index = GridIndex::new(&rect, &extent, cell).unwrap();
        for _ in 0..5_000 {
            let lng = rng.gen_range(115.6..117.5);
            let lat = rng.gen_range(39.3..41.1);
            assert_eq!(index.contains(lng, lat), rect.contains(lng, lat));
        }
        // Corners
        for (lng, lat) in [
            (rect.min_lng, rect.min_lat),
            (rect.max_lng, rect.max_lat),
            (rect.min_lng, rect.max_lat),
            (rect.max_lng, rect.min_lat),
        ] {
            assert!(index.contains(lng, lat));
        }
    }
}
