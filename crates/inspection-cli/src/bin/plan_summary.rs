//! Compile an inspection plan and print its summary.
//!
//! Usage:
//!   cargo run -p inspection-cli --bin plan_summary -- \
//!     --structures data/structures.json --offsets data/offsets.json --output plan.json

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use inspection_cli::input::{load_offsets, load_structures};
use inspection_core::{build_plan, GeoPoint, MissionParameters, PlanSummary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compile structures and photo offsets into a waypoint plan
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON array of structures
    #[arg(long)]
    structures: PathBuf,

    /// JSON array of photo offsets
    #[arg(long)]
    offsets: PathBuf,

    /// Home latitude (default: first structure)
    #[arg(long, requires = "home_lon")]
    home_lat: Option<f64>,

    /// Home longitude (default: first structure)
    #[arg(long, requires = "home_lat")]
    home_lon: Option<f64>,

    /// Transit and safety leg altitude in meters
    #[arg(long, default_value_t = 25.0)]
    safety_altitude: f64,

    /// Height above the structure top for inspection waypoints
    #[arg(long, default_value_t = 2.5)]
    clearance: f64,

    /// Write the compiled plan as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("inspection_core=info".parse()?))
        .init();

    let args = Args::parse();

    let structures = load_structures(&args.structures)?;
    let offsets = load_offsets(&args.offsets)?;

    let home = match (args.home_lat, args.home_lon, structures.first()) {
        (Some(lat), Some(lon), _) => GeoPoint::new(lat, lon),
        (_, _, Some(first)) => {
            tracing::warn!("No home given, using the first structure");
            GeoPoint::new(first.latitude, first.longitude)
        }
        _ => anyhow::bail!("No structures in {}", args.structures.display()),
    };

    let parameters = MissionParameters {
        safety_altitude_m: args.safety_altitude,
        safety_clearance_m: args.clearance,
        ..MissionParameters::default()
    };
    let plan = build_plan(&structures, &offsets, home, &parameters)?;
    let summary = PlanSummary::from_plan(&plan);

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = args.output {
        fs::write(&path, plan.to_json()?).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✅ Plan with {} waypoints written to {}", plan.len(), path.display());
    }

    Ok(())
}
