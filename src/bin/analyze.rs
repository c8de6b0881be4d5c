use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use flate2::read::GzDecoder;

use balance_tracker_rs::analyzer::{analyze, AnalyzerConfig};
use balance_tracker_rs::defaults;
use balance_tracker_rs::report::{build_mesh, render_report};
use balance_tracker_rs::types::SessionRecord;

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Reconstruct the reachable space from a persisted session record", long_about = None)]
struct Args {
    /// Path to a session record (.json or .json.gz)
    session: PathBuf,

    /// Azimuth sector count
    #[arg(long, default_value_t = defaults::SECTORS)]
    sectors: usize,

    /// Projection sphere radius
    #[arg(long, default_value_t = defaults::SPHERE_RADIUS)]
    radius: f64,

    /// Write the renderable mesh dataset as JSON to this path
    #[arg(long)]
    mesh_out: Option<PathBuf>,
}

fn load_record(path: &Path) -> Result<SessionRecord> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let record = load_record(&args.session)?;
    println!(
        "Session {} ({}, {} data points, {:.1} s)",
        record.session_id,
        record.user.display_name,
        record.total_data_points,
        record.session_duration_ms / 1000.0
    );

    let config = AnalyzerConfig {
        sphere_radius: args.radius,
        sectors: args.sectors,
    };
    let result = analyze(&record, &config);
    print!("{}", render_report(&result));

    if let Some(mesh_path) = &args.mesh_out {
        match build_mesh(&result) {
            Some(mesh) => {
                fs::write(mesh_path, serde_json::to_vec_pretty(&mesh)?)?;
                println!("mesh written to {}", mesh_path.display());
            }
            None => println!("no mesh written: analysis did not produce a boundary"),
        }
    }

    if !result.success {
        bail!("analysis failed: {}", result.message);
    }
    Ok(())
}
