pub mod error;
pub mod geo;
pub mod models;

pub use error::CoreError;
pub use models::{
    AiPose, AirportRecord, FlightRules, PerformanceClass, Waypoint, CROSS_AT_UNSET_FT,
    END_WAYPOINT_NAME,
};
