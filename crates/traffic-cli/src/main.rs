//! Headless traffic runner.
//!
//! Loads an airport table and a timetable directory, then drives the traffic
//! manager at a fixed tick rate with a stationary observer, logging
//! interpolated positions and promotions. Useful for exercising timetables
//! without a renderer attached.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_core::models::AiPose;
use traffic_core::CoreError;
use traffic_sim::schedule::Observer;
use traffic_sim::services::{AirportTable, EntityFactory, EntityId};
use traffic_sim::{FlightPlan, TrafficConfig, TrafficManager};

#[derive(Parser, Debug)]
#[command(name = "traffic-run", about = "Run the AI-traffic core headless")]
struct Args {
    /// Directory of timetable fragments (JSON).
    #[arg(long)]
    timetables: PathBuf,

    /// Airport table document (JSON array).
    #[arg(long)]
    airports: PathBuf,

    /// Number of manager ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Simulated seconds per tick.
    #[arg(long, default_value_t = 1.0)]
    tick_secs: f64,

    /// Observer latitude in degrees.
    #[arg(long, default_value_t = 0.0)]
    observer_lat: f64,

    /// Observer longitude in degrees.
    #[arg(long, default_value_t = 0.0)]
    observer_lon: f64,

    /// Promotion radius in nautical miles.
    #[arg(long)]
    activation_radius_nm: Option<f64>,
}

/// Stand-in for the detailed-simulation layer: logs every promotion and
/// hands back monotonically increasing handles.
#[derive(Default)]
struct LoggingFactory {
    next_id: EntityId,
}

impl EntityFactory for LoggingFactory {
    fn instantiate(
        &mut self,
        model_path: &str,
        pose: &AiPose,
        plan: FlightPlan,
    ) -> Result<EntityId, CoreError> {
        self.next_id += 1;
        tracing::info!(
            "instantiated {model_path} as #{} at ({:.3}, {:.3}) fl{:.0} leg {:?} ({} waypoints)",
            self.next_id,
            pose.lat,
            pose.lon,
            pose.altitude_ft / 100.0,
            plan.leg(),
            plan.waypoint_count(),
        );
        Ok(self.next_id)
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traffic_run=info".parse()?)
                .add_directive("traffic_sim=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let airports = AirportTable::from_file(&args.airports)?;
    tracing::info!("loaded {} airports", airports.len());

    let mut cfg = TrafficConfig::default();
    if let Some(radius) = args.activation_radius_nm {
        cfg.activation_radius_nm = radius;
    }

    let mut manager = TrafficManager::new(cfg);
    let loaded = manager.load_timetable_dir(&args.timetables, &airports);
    tracing::info!("loaded {loaded} schedules");

    let observer = Observer {
        lat: args.observer_lat,
        lon: args.observer_lon,
    };
    let mut factory = LoggingFactory::default();

    let mut now = Utc::now();
    let step = Duration::milliseconds((args.tick_secs * 1000.0) as i64);
    for _ in 0..args.ticks {
        manager.update(now, &observer, &mut factory);
        now += step;
    }

    let enroute = manager
        .schedules()
        .iter()
        .filter(|schedule| schedule.last_position().is_some())
        .count();
    let promoted = manager
        .schedules()
        .iter()
        .filter(|schedule| schedule.entity().is_some())
        .count();
    tracing::info!(
        "done: {} schedules, {enroute} enroute, {promoted} promoted",
        manager.schedule_count()
    );

    Ok(())
}
