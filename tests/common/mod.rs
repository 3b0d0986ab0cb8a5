//! Shared fixtures: vehicle log directories on disk.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write one `<id>.txt` log.
pub fn write_vehicle(dir: &Path, id: &str, lines: &[String]) {
    fs::write(dir.join(format!("{}.txt", id)), lines.join("\n")).unwrap();
}

/// One raw log line at `hh:mm:ss` on 2008-02-02.
pub fn line(id: &str, hour: u32, minute: u32, second: u32, lng: f64, lat: f64) -> String {
    format!("{},2008-02-02 {:02}:{:02}:{:02},{},{}", id, hour, minute, second, lng, lat)
}

/// Random walks around central Beijing, one sample per minute from 07:00,
/// with a sprinkling of malformed lines.
pub fn random_fleet(vehicles: usize, samples: usize, seed: u64) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(seed);

    for v in 0..vehicles {
        let id = format!("{}", 1000 + v);
        let mut lng = rng.gen_range(116.30..116.40);
        let mut lat = rng.gen_range(39.90..39.95);
        let mut lines = Vec::with_capacity(samples);
        for i in 0..samples {
            let minute = 7 * 60 + i as u32;
            if rng.gen_bool(0.02) {
                lines.push(format!("{},not-a-time,{},{}", id, lng, lat));
                continue;
            }
            lng += rng.gen_range(-0.004..0.004);
            lat += rng.gen_range(-0.003..0.003);
            lines.push(line(&id, (minute / 60) % 24, minute % 60, 0, lng, lat));
        }
        write_vehicle(dir.path(), &id, &lines);
    }
    dir
}
