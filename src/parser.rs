//! # Point Parser
//!
//! Decodes raw log lines of the form `vehicle_id,YYYY-MM-DD HH:MM:SS,lng,lat`.
//!
//! A line that does not split into exactly four fields, has a non-numeric
//! coordinate, a malformed timestamp, or a position outside the analysis
//! area is dropped. Nothing here returns an error for bad content; only a
//! file that cannot be opened or read is reported.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{Result, TrajectoryError};
use crate::{Sample, Trajectory, TIMESTAMP_FORMAT};

/// Latitude range of the analysis area (WGS84).
pub const LAT_RANGE: (f64, f64) = (39.4, 41.0);

/// Longitude range of the analysis area (WGS84).
pub const LNG_RANGE: (f64, f64) = (115.7, 117.4);

/// Parse a raw timestamp field.
#[inline]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

/// Validity predicate for a sample: inside the analysis area with a
/// well-formed timestamp.
pub fn is_valid_point(lat: f64, lng: f64, timestamp: &str) -> bool {
    in_analysis_area(lat, lng) && parse_timestamp(timestamp).is_some()
}

#[inline]
fn in_analysis_area(lat: f64, lng: f64) -> bool {
    (LAT_RANGE.0..=LAT_RANGE.1).contains(&lat) && (LNG_RANGE.0..=LNG_RANGE.1).contains(&lng)
}

/// Parse one raw line into a validated sample.
///
/// # Example
///
/// ```rust
/// use trajectory_engine::parse_line;
///
/// assert!(parse_line("1131,2008-02-02 13:30:44,116.30,39.90").is_some());
/// assert!(parse_line("1131,2008-02-02 13:30:44,116.30").is_none());
/// assert!(parse_line("1131,2008-02-02 13:30:44,0.0,0.0").is_none());
/// ```
pub fn parse_line(line: &str) -> Option<Sample> {
    let mut fields = line.trim().split(',');
    let (id, time, lng, lat) = (fields.next()?, fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }

    let lng: f64 = lng.trim().parse().ok()?;
    let lat: f64 = lat.trim().parse().ok()?;
    if !in_analysis_area(lat, lng) {
        return None;
    }
    let timestamp = parse_timestamp(time)?;

    Some(Sample::new(id, timestamp, lng, lat))
}

/// Parse every line of an iterator, keeping only valid samples.
pub fn parse_lines<I, S>(lines: I) -> Vec<Sample>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| parse_line(line.as_ref()))
        .collect()
}

/// Read all valid samples from one vehicle file.
///
/// Returns an error when the file cannot be opened or a read fails midway;
/// malformed lines are skipped.
pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    let file = File::open(path).map_err(|e| TrajectoryError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| TrajectoryError::io(path, e))?;
        if let Some(sample) = parse_line(&line) {
            samples.push(sample);
        }
    }
    Ok(samples)
}

/// Load one vehicle's trajectory from its log file.
///
/// The vehicle id is taken from the first valid sample. Returns `Ok(None)`
/// when the file holds no valid sample.
pub fn read_trajectory(path: &Path) -> Result<Option<Trajectory>> {
    let samples = read_samples(path)?;
    Ok(samples
        .first()
        .map(|first| first.vehicle_id.clone())
        .map(|id| Trajectory::new(id, samples)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_valid_line() {
        let s = parse_line("366,2008-02-03 08:15:02,116.51172,39.92123").unwrap();
        assert_eq!(s.vehicle_id, "366");
        assert_eq!(s.lng, 116.51172);
        assert_eq!(s.lat, 39.92123);
        assert_eq!(s.timestamp.hour(), 8);
    }

    #[test]
    fn test_parse_trailing_newline() {
        assert!(parse_line("366,2008-02-03 08:15:02,116.51172,39.92123\r\n").is_some());
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(parse_line("").is_none());
        assert!(parse_line("366,2008-02-03 08:15:02,116.5").is_none());
        assert!(parse_line("366,2008-02-03 08:15:02,116.5,39.9,extra").is_none());
    }

    #[test]
    fn test_non_numeric_coordinates() {
        assert!(parse_line("366,2008-02-03 08:15:02,abc,39.9").is_none());
        assert!(parse_line("366,2008-02-03 08:15:02,116.5,").is_none());
    }

    #[test]
    fn test_out_of_area() {
        assert!(parse_line("366,2008-02-03 08:15:02,121.47,31.23").is_none());
        assert!(parse_line("366,2008-02-03 08:15:02,116.5,41.01").is_none());
        // Bounds are inclusive
        assert!(parse_line("366,2008-02-03 08:15:02,115.7,39.4").is_some());
        assert!(parse_line("366,2008-02-03 08:15:02,117.4,41.0").is_some());
    }

    #[test]
    fn test_bad_timestamp() {
        assert!(parse_line("366,2008/02/03 08:15:02,116.5,39.9").is_none());
        assert!(parse_line("366,2008-02-30 08:15:02,116.5,39.9").is_none());
        assert!(parse_line("366,2008-02-03 25:15:02,116.5,39.9").is_none());
    }

    #[test]
    fn test_is_valid_point() {
        assert!(is_valid_point(39.9, 116.3, "2008-02-02 13:30:44"));
        assert!(!is_valid_point(39.9, 116.3, "yesterday"));
        assert!(!is_valid_point(0.0, 116.3, "2008-02-02 13:30:44"));
    }

    #[test]
    fn test_parse_lines_skips_garbage() {
        let lines = [
            "1,2008-02-02 13:30:44,116.30,39.90",
            "garbage",
            "1,2008-02-02 13:31:44,116.31,39.91",
        ];
        assert_eq!(parse_lines(lines).len(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_trajectory(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, TrajectoryError::Io { .. }));
    }
}
