//! AI-traffic simulation core.
//!
//! Synthesizes plausible autonomous traffic without a full flight-dynamics
//! model: flight plans, a ballistic integrator, station-keeping escorts, and
//! wall-clock-driven background schedules with promotion near the observer.
//! Everything runs synchronously from a single simulation tick.

pub mod ballistic;
pub mod config;
pub mod escort;
pub mod flightplan;
pub mod loader;
pub mod manager;
pub mod schedule;
pub mod services;

pub use ballistic::{BallisticConfig, BallisticEntity, ImpactReport};
pub use config::TrafficConfig;
pub use escort::{EscortConfig, EscortController, EscortPose, ParentState, StationCommand};
pub use flightplan::{FlightPlan, Leg, SynthesisContext};
pub use manager::TrafficManager;
pub use schedule::{Observer, RepeatPeriod, ScheduledFlight, TrafficSchedule, WeekTime};
pub use services::{
    AirportDirectory, AirportTable, EntityFactory, EntityId, FlatTerrain, GroundMaterial,
    LocalAtmosphere, ReleaseLedger, TerrainQuery, TerrainSample,
};
