//! Fly a full inspection against the simulated aircraft.
//!
//! The supervisor pauses at every photo waypoint, pulls the photo from the
//! simulated camera and waits for a decision from the scripted operator.
//!
//! Usage:
//!   cargo run -p inspection-cli --bin fly_inspection -- --retake-first
//!   cargo run -p inspection-cli --bin fly_inspection -- --abort-after 3 --sd-card

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use inspection_cli::input::{load_offsets, load_structures};
use inspection_cli::sim::{demo_offsets, demo_structures, SimConfig, SimulatedAircraft};
use inspection_cli::{AutoOperator, ConsolePresenter, OperatorAction, OperatorPrompt};
use inspection_core::GeoPoint;
use inspection_mission::{spawn_control_loop, MissionConfig, MissionLinks, MissionPhase};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated inspection flight with a scripted operator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON array of structures (default: built-in demo masts)
    #[arg(long, requires = "offsets")]
    structures: Option<PathBuf>,

    /// JSON array of photo offsets
    #[arg(long, requires = "structures")]
    offsets: Option<PathBuf>,

    /// Home latitude
    #[arg(long, default_value_t = 47.3977)]
    home_lat: f64,

    /// Home longitude
    #[arg(long, default_value_t = 8.5456)]
    home_lon: f64,

    /// Override the transit and safety leg altitude
    #[arg(long)]
    safety_altitude: Option<f64>,

    /// Simulated seconds per wall-clock second on legs
    #[arg(long, default_value_t = 10.0)]
    time_scale: f64,

    /// Chance that a photo waypoint's "reached" flag never arrives
    #[arg(long, default_value_t = 0.15)]
    drop_reached: f64,

    /// Chance that a photo waypoint's "reached" flag arrives 3.5 s late
    #[arg(long, default_value_t = 0.15)]
    late_reached: f64,

    /// Chance that a thumbnail download fails
    #[arg(long, default_value_t = 0.2)]
    thumbnail_failure: f64,

    /// Store photos on the SD card only
    #[arg(long)]
    sd_card: bool,

    /// Simulation RNG seed
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Ask for a retake of the first photo
    #[arg(long)]
    retake_first: bool,

    /// Abort the mission after accepting this many photos
    #[arg(long)]
    abort_after: Option<usize>,

    /// Retrieval retries before skipping a photo
    #[arg(long, default_value_t = 1)]
    fetch_retries: u32,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 900)]
    max_duration: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json_logs).then(tracing_subscriber::fmt::layer))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("inspection_mission=debug".parse()?))
        .init();

    let mut config = MissionConfig::from_env();
    if let Some(altitude) = args.safety_altitude {
        config.parameters.safety_altitude_m = altitude;
    }

    let home = GeoPoint::new(args.home_lat, args.home_lon);
    let (structures, offsets) = match (&args.structures, &args.offsets) {
        (Some(structures), Some(offsets)) => (load_structures(structures)?, load_offsets(offsets)?),
        _ => (demo_structures(home), demo_offsets()),
    };

    let aircraft = SimulatedAircraft::new(
        SimConfig {
            time_scale: args.time_scale,
            drop_reached_probability: args.drop_reached,
            late_reached_probability: args.late_reached,
            thumbnail_failure_probability: args.thumbnail_failure,
            photos_on_sd_card: args.sd_card,
            seed: args.seed,
            ..SimConfig::default()
        },
        home,
    );

    let (prompt_tx, mut prompts) = mpsc::unbounded_channel();
    let runtime = spawn_control_loop(
        config,
        MissionLinks {
            flight: aircraft.clone(),
            media: aircraft.clone(),
            presenter: Arc::new(ConsolePresenter::new(prompt_tx)),
        },
    );
    aircraft.attach(runtime.sink.clone());
    aircraft.announce_home();

    let handle = runtime.handle.clone();
    println!("🚁 Inspection Simulator");
    println!("   Structures: {}", structures.len());
    println!("   Photos per structure: {}", offsets.len());
    println!();

    let summary = handle.build_plan(structures, offsets).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    handle.upload_and_start().await?;

    let mut operator = AutoOperator::new(args.retake_first, args.abort_after, args.fetch_retries);
    let flight = async {
        let mut started = false;
        while let Some(prompt) = prompts.recv().await {
            let result = match operator.on_prompt(&prompt) {
                OperatorAction::Review(decision) => handle.decide_review(decision).await,
                OperatorAction::FetchFailure(decision) => handle.decide_fetch_failure(decision).await,
                OperatorAction::Abort => {
                    println!("🛑 Aborting after {} photos", operator.accepted());
                    handle.abort().await
                }
                OperatorAction::Wait => Ok(()),
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "Operator command rejected");
            }

            match prompt {
                OperatorPrompt::Phase(MissionPhase::Executing) => started = true,
                OperatorPrompt::Phase(MissionPhase::Idle) if started => return Ok(()),
                OperatorPrompt::Phase(MissionPhase::Failed) => {
                    let reason = handle.snapshot().last_error.unwrap_or_default();
                    anyhow::bail!("Mission failed: {}", reason);
                }
                _ => {}
            }
        }
        anyhow::bail!("Presenter channel closed")
    };

    let outcome = tokio::time::timeout(Duration::from_secs(args.max_duration), flight).await;

    let snapshot = handle.snapshot();
    println!();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("   Photos on aircraft: {}", aircraft.photo_count());

    handle.shutdown();
    runtime.task.await?;

    match outcome {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Mission did not finish within {} s", args.max_duration),
    }
}
