//! Reporting handoff: a plain-text summary for the console and a mesh
//! dataset for whatever renders the reachable space.

use std::fmt::Write as _;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::analyzer::{coordinate_ranges, AnalysisResult};

/// Renderable closed cone: a triangle fan from the origin over the
/// extended boundary, with per-vertex normalized height for color mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReachMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
    pub normalized_heights: Vec<f64>,
}

/// Build the fan mesh from a successful analysis. `None` when the analysis
/// failed or the extended boundary is degenerate.
pub fn build_mesh(result: &AnalysisResult) -> Option<ReachMesh> {
    if !result.success || result.extended_boundary.len() < 3 {
        return None;
    }

    let mut vertices: Vec<[f64; 3]> = Vec::with_capacity(result.extended_boundary.len() + 1);
    vertices.push([0.0, 0.0, 0.0]);
    for p in &result.extended_boundary {
        vertices.push([p.x, p.y, p.z]);
    }

    let n_boundary = result.extended_boundary.len() as u32;
    let mut triangles = Vec::with_capacity(n_boundary as usize);
    for i in 0..n_boundary {
        let next = (i + 1) % n_boundary;
        triangles.push([0, i + 1, next + 1]);
    }

    let heights: Vec<f64> = vertices.iter().map(|v| v[2]).collect();
    let min = heights.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let normalized_heights = heights
        .iter()
        .map(|h| if range > 0.0 { (h - min) / range } else { 0.5 })
        .collect();

    Some(ReachMesh {
        vertices,
        triangles,
        normalized_heights,
    })
}

/// Console summary of an analysis run: counts, coordinate ranges, cap
/// height. Mirrors what clinicians see after a session.
pub fn render_report(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reachable space analysis");
    let _ = writeln!(out, "  data points:     {}", result.total_points);
    let _ = writeln!(out, "  boundary points: {}", result.boundary.len());

    if let Some(ranges) = coordinate_ranges(&result.points) {
        let _ = writeln!(out, "  x range: [{:.3}, {:.3}]", ranges.min.x, ranges.max.x);
        let _ = writeln!(out, "  y range: [{:.3}, {:.3}]", ranges.min.y, ranges.max.y);
        let _ = writeln!(out, "  z range: [{:.3}, {:.3}]", ranges.min.z, ranges.max.z);
    }

    if result.success {
        let _ = writeln!(out, "  cap height: {:.4}", result.max_height);
        let _ = writeln!(out, "  status: ok");
    } else {
        let _ = writeln!(out, "  status: failed ({})", result.message);
    }
    out
}

/// Area of the flat cap polygon, handy for cross-session comparison
/// tables. Shoelace over the cap's x/y footprint.
pub fn cap_area_estimate(extended_boundary: &[DVec3]) -> f64 {
    if extended_boundary.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0.0;
    for i in 0..extended_boundary.len() {
        let a = extended_boundary[i];
        let b = extended_boundary[(i + 1) % extended_boundary.len()];
        doubled += a.x * b.y - b.x * a.y;
    }
    doubled.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, AnalyzerConfig};
    use crate::types::{GameStateSnapshot, OrientationState, Sample, SessionRecord, UserInfo};
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::f64::consts::TAU;

    fn sweep_record(count: usize, tilt: f64) -> SessionRecord {
        let now = Utc::now();
        let training_data: Vec<Sample> = (0..count)
            .map(|i| {
                let azimuth = i as f64 / count as f64 * TAU;
                let input_state = OrientationState {
                    roll: tilt * azimuth.cos(),
                    pitch: tilt * azimuth.sin(),
                    yaw: 0.0,
                };
                Sample {
                    timestamp: i as f64 * 10.0,
                    localtime: String::new(),
                    has_valid_input: true,
                    input_state,
                    game_state: GameStateSnapshot::default(),
                    actual_interval: 10.0,
                }
            })
            .collect();
        SessionRecord {
            session_id: "test".to_string(),
            user: UserInfo {
                uid: "u".to_string(),
                display_name: "T".to_string(),
                email: String::new(),
            },
            session_start_time: now,
            session_end_time: now,
            session_duration_ms: 0.0,
            total_data_points: training_data.len(),
            training_data,
        }
    }

    #[test]
    fn test_mesh_is_closed_fan() {
        let result = analyze(&sweep_record(360, 0.25), &AnalyzerConfig::default());
        let mesh = build_mesh(&result).unwrap();

        assert_eq!(mesh.vertices.len(), result.extended_boundary.len() + 1);
        assert_eq!(mesh.triangles.len(), result.extended_boundary.len());
        // The last triangle wraps back to the first boundary vertex.
        let last = mesh.triangles.last().unwrap();
        assert_eq!(last[0], 0);
        assert_eq!(last[2], 1);

        for h in &mesh.normalized_heights {
            assert!((0.0..=1.0).contains(h));
        }
        assert_eq!(mesh.normalized_heights.len(), mesh.vertices.len());
    }

    #[test]
    fn test_mesh_absent_on_failure() {
        let result = analyze(&sweep_record(0, 0.0), &AnalyzerConfig::default());
        assert!(build_mesh(&result).is_none());
    }

    #[test]
    fn test_report_mentions_counts_and_failure() {
        let good = analyze(&sweep_record(360, 0.25), &AnalyzerConfig::default());
        let text = render_report(&good);
        assert!(text.contains("data points:     360"));
        assert!(text.contains("status: ok"));

        let bad = analyze(&sweep_record(0, 0.0), &AnalyzerConfig::default());
        let text = render_report(&bad);
        assert!(text.contains("status: failed"));
    }

    #[test]
    fn test_cap_area_of_regular_polygon() {
        // A dense regular polygon of radius r approaches area π·r².
        let result = analyze(&sweep_record(720, 0.3), &AnalyzerConfig::default());
        let r = 0.3f64.sin();
        let area = cap_area_estimate(&result.extended_boundary);
        assert_relative_eq!(area, std::f64::consts::PI * r * r, epsilon = 1e-3);
    }
}
