//! Reachable-space reconstruction. A pure, deterministic pass over one
//! session's orientation samples: project onto a sphere, find the farthest
//! point per azimuth sector, and lift the resulting polygon to a common
//! top plane so sessions compare on equal footing.

use std::f64::consts::TAU;

use glam::DVec3;

use crate::error::Error;
use crate::types::{OrientationState, SessionRecord};

/// Points already on the top plane are kept as-is within this tolerance.
const PLANE_TOLERANCE: f64 = 1e-10;

#[derive(Clone, Copy, Debug)]
pub struct AnalyzerConfig {
    /// Radius of the projection sphere.
    pub sphere_radius: f64,
    /// Number of equal azimuth sectors over the full circle.
    pub sectors: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            sphere_radius: 1.0,
            sectors: 180,
        }
    }
}

/// Outcome of one analysis run. Recomputed per request, never mutated.
#[derive(Clone, Debug)]
pub struct AnalysisResult {
    pub success: bool,
    pub message: String,
    /// Every projected sample point.
    pub points: Vec<DVec3>,
    /// Farthest point per non-empty sector, azimuth-ascending.
    pub boundary: Vec<DVec3>,
    /// Boundary lifted to the common maximum-height plane.
    pub extended_boundary: Vec<DVec3>,
    /// Maximum z over the boundary points.
    pub max_height: f64,
    pub total_points: usize,
}

impl AnalysisResult {
    fn failure(message: String, points: Vec<DVec3>, boundary: Vec<DVec3>) -> Self {
        let total_points = points.len();
        AnalysisResult {
            success: false,
            message,
            points,
            boundary,
            extended_boundary: Vec::new(),
            max_height: 0.0,
            total_points,
        }
    }
}

/// Coordinate-wise min/max over a point set.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateRanges {
    pub min: DVec3,
    pub max: DVec3,
}

/// Project one orientation onto the sphere. The neutral stick points along
/// +z; tilt bends it away, azimuth picks the direction in the roll/pitch
/// plane.
pub fn project(orientation: &OrientationState, radius: f64) -> DVec3 {
    let tilt = orientation.tilt_angle();
    let azimuth = orientation.pitch.atan2(orientation.roll);
    DVec3::new(
        radius * tilt.sin() * azimuth.cos(),
        radius * tilt.sin() * azimuth.sin(),
        radius * tilt.cos(),
    )
}

/// Azimuth of a projected point, normalized to [0, 2π).
pub fn normalized_azimuth(point: DVec3) -> f64 {
    let azimuth = point.y.atan2(point.x);
    if azimuth < 0.0 {
        azimuth + TAU
    } else {
        azimuth
    }
}

/// Sector owning the given azimuth. Sectors are centered on k·(2π/N);
/// sector 0 straddles the 0/2π seam, so the half-width shift wraps.
fn sector_index(azimuth: f64, sectors: usize) -> usize {
    let width = TAU / sectors as f64;
    (((azimuth + width / 2.0) / width).floor() as usize) % sectors
}

/// Farthest point from the origin within each non-empty sector, sorted by
/// azimuth ascending. Deterministic: distance ties keep the earliest point.
pub fn extract_boundary(points: &[DVec3], sectors: usize) -> Vec<DVec3> {
    let mut best: Vec<Option<(f64, DVec3)>> = vec![None; sectors];

    for &point in points {
        let sector = sector_index(normalized_azimuth(point), sectors);
        let distance = point.length();
        match best[sector] {
            Some((incumbent, _)) if incumbent >= distance => {}
            _ => best[sector] = Some((distance, point)),
        }
    }

    let mut boundary: Vec<DVec3> = best.into_iter().flatten().map(|(_, p)| p).collect();
    boundary.sort_by(|a, b| normalized_azimuth(*a).total_cmp(&normalized_azimuth(*b)));
    boundary
}

/// Lift boundary points to the common maximum-height plane by similar
/// triangles. Points with z ≤ 0 cannot be scaled and stay where they are.
pub fn extend_boundary(boundary: &[DVec3]) -> (Vec<DVec3>, f64) {
    let max_height = boundary.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);

    let extended = boundary
        .iter()
        .map(|&p| {
            if (p.z - max_height).abs() < PLANE_TOLERANCE || p.z <= 0.0 {
                p
            } else {
                p * (max_height / p.z)
            }
        })
        .collect();

    (extended, max_height)
}

/// Run the full reconstruction over a session record.
pub fn analyze(record: &SessionRecord, config: &AnalyzerConfig) -> AnalysisResult {
    if record.training_data.is_empty() {
        return AnalysisResult::failure(Error::EmptySession.to_string(), Vec::new(), Vec::new());
    }

    let points: Vec<DVec3> = record
        .training_data
        .iter()
        .map(|s| project(&s.input_state, config.sphere_radius))
        .collect();

    let boundary = extract_boundary(&points, config.sectors);
    if boundary.len() < 3 {
        let found = boundary.len();
        return AnalysisResult::failure(
            Error::InsufficientBoundary { found }.to_string(),
            points,
            boundary,
        );
    }

    let (extended_boundary, max_height) = extend_boundary(&boundary);
    let total_points = points.len();
    AnalysisResult {
        success: true,
        message: format!(
            "reconstructed reachable space from {} points ({} boundary sectors)",
            total_points,
            boundary.len()
        ),
        points,
        boundary,
        extended_boundary,
        max_height,
        total_points,
    }
}

/// Coordinate-wise min/max over all projected points. `None` when empty.
pub fn coordinate_ranges(points: &[DVec3]) -> Option<CoordinateRanges> {
    let first = *points.first()?;
    let mut ranges = CoordinateRanges {
        min: first,
        max: first,
    };
    for p in &points[1..] {
        ranges.min = ranges.min.min(*p);
        ranges.max = ranges.max.max(*p);
    }
    Some(ranges)
}
