//! Station-keeping control for escort and formation vehicles.
//!
//! The controller holds a bearing/range offset from a moving parent. Output
//! commands are always clamped to the configured speed and angle envelopes,
//! and recomputation is throttled to a configurable interval.

use rand::Rng;
use serde::{Deserialize, Serialize};

use traffic_core::geo;
use traffic_core::CoreError;

/// Configured station geometry and maneuvering limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscortConfig {
    /// Name of the parent entity this escort holds station on.
    pub parent_name: String,
    /// Station bearing in degrees; true, or relative to the parent heading.
    pub station_bearing_deg: f64,
    pub bearing_is_relative: bool,
    /// Station range from the parent in meters.
    pub station_range_m: f64,
    /// Range tolerance before corrective maneuvering starts.
    pub range_limit_m: f64,
    /// Maximum commanded heading offset from the parent heading.
    pub angle_limit_deg: f64,
    /// Nominal correction speed offset in knots.
    pub station_speed_kt: f64,
    /// Commanded altitude, unconditional.
    pub station_height_ft: f64,
    pub max_speed_kt: f64,
    /// Range error beyond `snap_range_multiplier * range_limit_m` snaps a
    /// remote-controlled formation straight to station instead of flying
    /// there. Tuned by feel, so configurable.
    pub snap_range_multiplier: f64,
    /// Wander around the station point instead of holding it exactly.
    pub patrol: bool,
    /// Seconds between command recomputations.
    pub update_interval_secs: f64,
}

impl Default for EscortConfig {
    fn default() -> Self {
        Self {
            parent_name: String::new(),
            station_bearing_deg: 0.0,
            bearing_is_relative: true,
            station_range_m: 1000.0,
            range_limit_m: 50.0,
            angle_limit_deg: 45.0,
            station_speed_kt: 5.0,
            station_height_ft: 0.0,
            max_speed_kt: 30.0,
            snap_range_multiplier: 4.0,
            patrol: false,
            update_interval_secs: 1.0,
        }
    }
}

/// Own-ship state fed to the controller.
#[derive(Debug, Clone, Copy)]
pub struct EscortPose {
    pub lat: f64,
    pub lon: f64,
    pub heading_deg: f64,
}

/// Parent state as last observed.
#[derive(Debug, Clone, Copy)]
pub struct ParentState {
    pub lat: f64,
    pub lon: f64,
    pub heading_deg: f64,
    pub speed_kt: f64,
    /// Parent is driven externally (e.g. a multiplayer peer) and may jump.
    pub remote_controlled: bool,
}

/// One station-keeping command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationCommand {
    pub speed_kt: f64,
    pub heading_deg: f64,
    pub altitude_ft: f64,
    /// Direct position snap for a grossly displaced remote-controlled parent.
    pub snap_to: Option<(f64, f64)>,
}

impl Default for StationCommand {
    fn default() -> Self {
        Self {
            speed_kt: 5.0,
            heading_deg: 0.0,
            altitude_ft: 0.0,
            snap_to: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscortController {
    cfg: EscortConfig,
    accumulated_secs: f64,
    last_command: StationCommand,
    relative_bearing_deg: f64,
    range_to_station_m: f64,
}

impl EscortController {
    pub fn new(cfg: EscortConfig) -> Self {
        Self {
            // Force a recompute on the first update.
            accumulated_secs: cfg.update_interval_secs,
            cfg,
            last_command: StationCommand::default(),
            relative_bearing_deg: 0.0,
            range_to_station_m: 0.0,
        }
    }

    pub fn config(&self) -> &EscortConfig {
        &self.cfg
    }

    /// Relative bearing to the station point from the last recompute.
    pub fn relative_bearing_deg(&self) -> f64 {
        self.relative_bearing_deg
    }

    /// Range to the station point from the last recompute.
    pub fn range_to_station_m(&self) -> f64 {
        self.range_to_station_m
    }

    /// Advance the throttle clock and recompute when due. A missing parent is
    /// fatal to this escort: the caller marks it for destruction.
    pub fn update(
        &mut self,
        dt: f64,
        pose: &EscortPose,
        parent: Option<&ParentState>,
    ) -> Result<StationCommand, CoreError> {
        let Some(parent) = parent else {
            tracing::error!(
                "escort lost its parent {:?}; marking for destruction",
                self.cfg.parent_name
            );
            return Err(CoreError::ParentMissing(self.cfg.parent_name.clone()));
        };

        self.accumulated_secs += dt;
        if self.accumulated_secs < self.cfg.update_interval_secs {
            return Ok(self.last_command);
        }
        self.accumulated_secs = 0.0;

        let command = self.compute_station_command(pose, parent);
        self.last_command = command;
        Ok(command)
    }

    /// Compute one command from current geometry. Decision policy, in
    /// priority order: remote catch-up snap, out-of-tolerance correction
    /// (behind or ahead of the beam), then on-station hold or patrol wander.
    pub fn compute_station_command(
        &mut self,
        pose: &EscortPose,
        parent: &ParentState,
    ) -> StationCommand {
        let cfg = &self.cfg;
        let station_bearing = if cfg.bearing_is_relative {
            geo::normalize_deg(parent.heading_deg + cfg.station_bearing_deg)
        } else {
            geo::normalize_deg(cfg.station_bearing_deg)
        };
        let (target_lat, target_lon, _) = geo::offset_by_bearing_deg(
            parent.lat,
            parent.lon,
            cfg.station_range_m,
            station_bearing,
        );

        let range_m = geo::haversine_distance_m(pose.lat, pose.lon, target_lat, target_lon);
        let bearing_to_target = geo::bearing_deg(pose.lat, pose.lon, target_lat, target_lon);
        let rel_bearing = geo::relative_bearing_deg(bearing_to_target, pose.heading_deg);
        self.relative_bearing_deg = rel_bearing;
        self.range_to_station_m = range_m;

        let grossly_out = range_m > cfg.snap_range_multiplier * cfg.range_limit_m;
        let min_speed = 5.0;
        let max_speed = cfg.max_speed_kt.max(min_speed);
        let angle_limit = cfg.angle_limit_deg.abs();

        let (speed_offset_kt, angle_offset_deg, snap_to) = if parent.remote_controlled
            && grossly_out
        {
            // Catch-up for parents whose position jumped: snap, don't chase.
            (0.0, 0.0, Some((target_lat, target_lon)))
        } else if range_m > cfg.range_limit_m {
            let magnitude = if grossly_out {
                4.0 * cfg.station_speed_kt
            } else {
                cfg.station_speed_kt
            };
            let steer = rel_bearing.max(-angle_limit).min(angle_limit);
            if rel_bearing.abs() > 90.0 {
                // Station is behind the beam: back toward it.
                (-magnitude, steer, None)
            } else {
                (magnitude, steer, None)
            }
        } else if cfg.patrol {
            let mut rng = rand::rng();
            (
                rng.random_range(-0.1..0.1) * cfg.station_speed_kt.max(1.0),
                rng.random_range(-0.1..0.1) * angle_limit,
                None,
            )
        } else {
            (0.0, 0.0, None)
        };

        StationCommand {
            speed_kt: (parent.speed_kt + speed_offset_kt).max(min_speed).min(max_speed),
            heading_deg: geo::normalize_deg(
                parent.heading_deg + angle_offset_deg.max(-angle_limit).min(angle_limit),
            ),
            altitude_ft: cfg.station_height_ft,
            snap_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_at(lat: f64, lon: f64) -> ParentState {
        ParentState {
            lat,
            lon,
            heading_deg: 0.0,
            speed_kt: 12.0,
            remote_controlled: false,
        }
    }

    fn escort_on_station(cfg: &EscortConfig, parent: &ParentState) -> EscortPose {
        let bearing = if cfg.bearing_is_relative {
            geo::normalize_deg(parent.heading_deg + cfg.station_bearing_deg)
        } else {
            cfg.station_bearing_deg
        };
        let (lat, lon, _) =
            geo::offset_by_bearing_deg(parent.lat, parent.lon, cfg.station_range_m, bearing);
        EscortPose {
            lat,
            lon,
            heading_deg: parent.heading_deg,
        }
    }

    #[test]
    fn test_command_clamps_hold_for_any_limits() {
        let parent = parent_at(33.0, -117.0);
        for (max_speed, angle_limit) in [(8.0, 10.0), (40.0, 60.0), (200.0, 179.0)] {
            let cfg = EscortConfig {
                max_speed_kt: max_speed,
                angle_limit_deg: angle_limit,
                ..Default::default()
            };
            let mut controller = EscortController::new(cfg);
            // Far out of position in several directions.
            for bearing in [0.0, 90.0, 180.0, 270.0] {
                let (lat, lon, _) =
                    geo::offset_by_bearing_deg(parent.lat, parent.lon, 25_000.0, bearing);
                let pose = EscortPose {
                    lat,
                    lon,
                    heading_deg: 45.0,
                };
                let command = controller.compute_station_command(&pose, &parent);
                assert!(command.speed_kt >= 5.0 && command.speed_kt <= max_speed);
                let offset =
                    geo::relative_bearing_deg(command.heading_deg, parent.heading_deg);
                assert!(offset.abs() <= angle_limit + 1e-9);
            }
        }
    }

    #[test]
    fn test_remote_parent_jump_snaps_to_station() {
        let cfg = EscortConfig {
            station_range_m: 500.0,
            range_limit_m: 50.0,
            ..Default::default()
        };
        let mut parent = parent_at(33.0, -117.0);
        parent.remote_controlled = true;
        let mut controller = EscortController::new(cfg.clone());

        // Parent jumped: escort is ~20km from station, far past 4x the limit.
        let pose = EscortPose {
            lat: 33.2,
            lon: -117.0,
            heading_deg: 0.0,
        };
        let command = controller.compute_station_command(&pose, &parent);
        let (station_lat, station_lon, _) = geo::offset_by_bearing_deg(
            parent.lat,
            parent.lon,
            cfg.station_range_m,
            parent.heading_deg + cfg.station_bearing_deg,
        );
        let (snap_lat, snap_lon) = command.snap_to.expect("expected a position snap");
        assert!((snap_lat - station_lat).abs() < 1e-9);
        assert!((snap_lon - station_lon).abs() < 1e-9);
        // Zero computed offsets: parent speed and heading pass through.
        assert!((command.speed_kt - parent.speed_kt).abs() < 1e-9);
        assert!((command.heading_deg - parent.heading_deg).abs() < 1e-9);
    }

    #[test]
    fn test_local_parent_never_snaps() {
        let parent = parent_at(33.0, -117.0);
        let mut controller = EscortController::new(EscortConfig::default());
        let pose = EscortPose {
            lat: 33.2,
            lon: -117.0,
            heading_deg: 0.0,
        };
        let command = controller.compute_station_command(&pose, &parent);
        assert!(command.snap_to.is_none());
        // Gross displacement: 4x correction speed, still clamped.
        assert!(command.speed_kt > parent.speed_kt || command.speed_kt == 5.0);
    }

    #[test]
    fn test_station_behind_beam_commands_reverse() {
        let cfg = EscortConfig {
            station_bearing_deg: 180.0,
            bearing_is_relative: true,
            station_range_m: 5000.0,
            range_limit_m: 50.0,
            max_speed_kt: 30.0,
            ..Default::default()
        };
        let parent = parent_at(33.0, -117.0);
        let mut controller = EscortController::new(cfg);
        // Escort sitting on the parent, station 5km astern, range error 5km.
        let pose = EscortPose {
            lat: parent.lat,
            lon: parent.lon,
            heading_deg: parent.heading_deg,
        };
        let command = controller.compute_station_command(&pose, &parent);
        assert!(controller.relative_bearing_deg().abs() > 90.0);
        // Reverse offset pulls the command below parent speed (floored at 5).
        assert!(command.speed_kt <= parent.speed_kt);
    }

    #[test]
    fn test_on_station_holds_parent_speed_and_heading() {
        let cfg = EscortConfig::default();
        let parent = parent_at(33.0, -117.0);
        let pose = escort_on_station(&cfg, &parent);
        let mut controller = EscortController::new(cfg);
        let command = controller.compute_station_command(&pose, &parent);
        assert!((command.speed_kt - parent.speed_kt).abs() < 1e-9);
        assert!((command.heading_deg - parent.heading_deg).abs() < 1e-9);
        assert!(command.snap_to.is_none());
    }

    #[test]
    fn test_patrol_wander_stays_clamped() {
        let cfg = EscortConfig {
            patrol: true,
            max_speed_kt: 14.0,
            angle_limit_deg: 20.0,
            ..Default::default()
        };
        let parent = parent_at(33.0, -117.0);
        let pose = escort_on_station(&cfg, &parent);
        let mut controller = EscortController::new(cfg);
        for _ in 0..50 {
            let command = controller.compute_station_command(&pose, &parent);
            assert!(command.speed_kt >= 5.0 && command.speed_kt <= 14.0);
            let offset = geo::relative_bearing_deg(command.heading_deg, parent.heading_deg);
            assert!(offset.abs() <= 20.0 + 1e-9);
        }
    }

    #[test]
    fn test_update_throttles_recomputation() {
        let cfg = EscortConfig {
            update_interval_secs: 10.0,
            ..Default::default()
        };
        let mut parent = parent_at(33.0, -117.0);
        let pose = escort_on_station(&cfg, &parent);
        let mut controller = EscortController::new(cfg);

        let first = controller.update(0.1, &pose, Some(&parent)).unwrap();
        // Parent accelerates; the throttled controller keeps the old command.
        parent.speed_kt = 25.0;
        let second = controller.update(0.1, &pose, Some(&parent)).unwrap();
        assert_eq!(first, second);
        // After the interval elapses the new speed shows up.
        let third = controller.update(10.0, &pose, Some(&parent)).unwrap();
        assert!((third.speed_kt - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let mut controller = EscortController::new(EscortConfig {
            parent_name: "HMS Example".to_string(),
            ..Default::default()
        });
        let pose = EscortPose {
            lat: 0.0,
            lon: 0.0,
            heading_deg: 0.0,
        };
        let err = controller.update(0.1, &pose, None).unwrap_err();
        assert!(matches!(err, CoreError::ParentMissing(_)));
    }
}
