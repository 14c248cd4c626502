//! Flight plans: ordered waypoint sequences with a cursor.
//!
//! A plan either comes from a stored document or is synthesized from a
//! departure/arrival airport pair. Synthesis picks a phase of flight from the
//! wall-clock time elapsed since scheduled departure, so a freshly promoted
//! aircraft appears mid-flight instead of always starting at a gate.

use std::path::Path;

use traffic_core::geo;
use traffic_core::models::{AirportRecord, PerformanceClass, Waypoint};

use crate::loader::{self, FlightPlanDocument};

/// Empirical turn radius in feet for a standard-rate (~25° bank) turn.
pub fn turn_radius_ft(speed_kt: f64) -> f64 {
    0.1911 * speed_kt * speed_kt
}

/// Phase of flight used to pick a synthesis branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Leg {
    #[default]
    Taxi,
    Climb,
    Cruise,
    Descent,
    Approach,
}

impl Leg {
    /// Phase for the wall-clock time elapsed since scheduled departure.
    pub fn for_elapsed_secs(elapsed_secs: f64) -> Self {
        if elapsed_secs < 300.0 {
            Leg::Taxi
        } else if elapsed_secs < 1200.0 {
            Leg::Climb
        } else if elapsed_secs < 1500.0 {
            Leg::Cruise
        } else if elapsed_secs < 2000.0 {
            Leg::Descent
        } else {
            Leg::Approach
        }
    }

    /// 1-based phase counter (taxi..approach).
    pub fn number(&self) -> u8 {
        match self {
            Leg::Taxi => 1,
            Leg::Climb => 2,
            Leg::Cruise => 3,
            Leg::Descent => 4,
            Leg::Approach => 5,
        }
    }
}

/// Inputs for synthesizing a plan when no stored document exists.
#[derive(Debug, Clone)]
pub struct SynthesisContext<'a> {
    pub departure: &'a AirportRecord,
    pub arrival: &'a AirportRecord,
    /// Wall-clock seconds since the scheduled departure time.
    pub elapsed_secs: f64,
    pub current_lat: f64,
    pub current_lon: f64,
    pub current_altitude_ft: f64,
    pub current_speed_kt: f64,
    /// First leg of a multi-leg route (controls gate/parking synthesis).
    pub first_leg: bool,
    /// Turn radius in feet at the aircraft's maneuvering speed.
    pub turn_radius_ft: f64,
    pub performance: PerformanceClass,
    pub cruise_altitude_ft: f64,
    pub airline: &'a str,
    pub aircraft_type: &'a str,
    pub flight_type: &'a str,
}

/// An ordered waypoint sequence plus a cursor.
///
/// The cursor always points at a valid element or sits one past the end.
/// `previous` of the first element and `next` of the last are both "none".
#[derive(Debug, Clone, Default)]
pub struct FlightPlan {
    name: String,
    waypoints: Vec<Waypoint>,
    cursor: usize,
    repeat: bool,
    leg: Leg,
    lead_angle_deg: f64,
    lead_distance_ft: f64,
    /// Named ground-taxi route handle, resolved by the ground network.
    taxi_route: Option<String>,
}

impl FlightPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Load a stored plan. Failure is non-fatal: the condition is logged and
    /// an empty plan is returned. An empty plan means "nothing to fly".
    pub fn load(path: &Path) -> Self {
        match loader::read_structured_file::<FlightPlanDocument>(path) {
            Ok(doc) => {
                let mut plan = Self::new(doc.name);
                plan.repeat = doc.repeat;
                plan.waypoints = doc.waypoints;
                plan
            }
            Err(err) => {
                tracing::warn!("flight plan {} not loaded: {err}", path.display());
                Self::new(path.display().to_string())
            }
        }
    }

    pub fn from_waypoints(name: impl Into<String>, waypoints: Vec<Waypoint>) -> Self {
        let mut plan = Self::new(name);
        plan.waypoints = waypoints;
        plan
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leg(&self) -> Leg {
        self.leg
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn taxi_route(&self) -> Option<&str> {
        self.taxi_route.as_deref()
    }

    pub fn set_taxi_route(&mut self, route: Option<String>) {
        self.taxi_route = route;
    }

    /// Waypoint under the cursor, or `None` once the plan is consumed.
    pub fn current_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.cursor)
    }

    /// Waypoint behind the cursor; `None` at the first element.
    pub fn previous_waypoint(&self) -> Option<&Waypoint> {
        if self.cursor == 0 {
            return None;
        }
        self.waypoints.get(self.cursor - 1)
    }

    /// Waypoint ahead of the cursor; `None` at the last element.
    pub fn next_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.cursor + 1)
    }

    /// Move the cursor forward one element. With `erase_consumed`, waypoints
    /// behind the new cursor position are discarded permanently, but the
    /// list is never reduced below one element.
    pub fn advance(&mut self, erase_consumed: bool) {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
        if erase_consumed && self.cursor > 0 && self.waypoints.len() > 1 {
            let drop = self.cursor.min(self.waypoints.len() - 1);
            self.waypoints.drain(..drop);
            self.cursor -= drop;
        }
    }

    /// Discard all waypoints except the final one, which becomes the sole
    /// start point of the next leg. Keeps route continuity across legs.
    pub fn reset_to_last(&mut self) {
        if self.waypoints.len() > 1 {
            let keep = self.waypoints.len() - 1;
            self.waypoints.drain(..keep);
        }
        self.cursor = 0;
    }

    /// Rewind the cursor to the first waypoint (for repeating plans).
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Flat-earth distance in feet from a position to a waypoint, using local
    /// per-degree scale factors. An approximation valid only over short
    /// ranges; use the great-circle helpers for anything long.
    pub fn distance_to_go_ft(lat: f64, lon: f64, wp: &Waypoint) -> f64 {
        let dlat_ft = (wp.lat - lat) * geo::ft_per_deg_lat(lat);
        let dlon_ft = (wp.lon - lon) * geo::ft_per_deg_lon(lat);
        (dlat_ft * dlat_ft + dlon_ft * dlon_ft).sqrt()
    }

    /// Estimate how far before `current` the turn toward `next` must begin.
    /// Stores the lead angle and lead distance; call whenever the next
    /// waypoint changes.
    pub fn compute_lead_distance(
        &mut self,
        speed_kt: f64,
        bearing_in_deg: f64,
        current: &Waypoint,
        next: &Waypoint,
    ) {
        let bearing_out = geo::bearing_deg(current.lat, current.lon, next.lat, next.lon);
        let mut angle = geo::relative_bearing_deg(bearing_out, bearing_in_deg).abs();
        if angle < 1.0 {
            // Floor avoids degenerate zero-length leads on near-straight legs.
            angle = 1.0;
        }
        self.lead_angle_deg = angle;
        self.lead_distance_ft = turn_radius_ft(speed_kt) * (angle.to_radians() / 2.0).tan();
    }

    pub fn lead_angle_deg(&self) -> f64 {
        self.lead_angle_deg
    }

    pub fn lead_distance_ft(&self) -> f64 {
        self.lead_distance_ft
    }

    /// Build a plan covering the remainder of a flight, starting at the phase
    /// implied by the elapsed time since scheduled departure.
    pub fn synthesize(ctx: &SynthesisContext) -> Self {
        let leg = Leg::for_elapsed_secs(ctx.elapsed_secs);
        let mut plan = Self::new(format!("{}-{}", ctx.departure.id, ctx.arrival.id));
        plan.leg = leg;

        let wps = &mut plan.waypoints;
        match leg {
            Leg::Taxi => {
                push_departure(wps, ctx);
                push_climb(wps, ctx);
                push_descent(wps, ctx);
                push_approach(wps, ctx);
            }
            Leg::Climb => {
                push_present_position(wps, ctx);
                push_climb(wps, ctx);
                push_descent(wps, ctx);
                push_approach(wps, ctx);
            }
            Leg::Cruise => {
                push_present_position(wps, ctx);
                push_descent(wps, ctx);
                push_approach(wps, ctx);
            }
            Leg::Descent => {
                push_present_position(wps, ctx);
                push_approach(wps, ctx);
            }
            Leg::Approach => {
                push_present_position(wps, ctx);
                push_approach(wps, ctx);
            }
        }

        let arr = ctx.arrival;
        wps.push(Waypoint::end(arr.lat, arr.lon, arr.elevation_ft));
        plan
    }
}

/// Course from departure to arrival, degrees true.
fn route_course_deg(ctx: &SynthesisContext) -> f64 {
    geo::bearing_deg(
        ctx.departure.lat,
        ctx.departure.lon,
        ctx.arrival.lat,
        ctx.arrival.lon,
    )
}

fn push_present_position(wps: &mut Vec<Waypoint>, ctx: &SynthesisContext) {
    let mut wp = Waypoint::new(
        "present-position",
        ctx.current_lat,
        ctx.current_lon,
        ctx.current_altitude_ft,
        ctx.current_speed_kt,
    );
    wp.on_ground = ctx.current_altitude_ft <= ctx.departure.elevation_ft + 1.0;
    wps.push(wp);
}

fn push_departure(wps: &mut Vec<Waypoint>, ctx: &SynthesisContext) {
    let dep = ctx.departure;
    let course = route_course_deg(ctx);
    let taxi_speed = ctx.performance.taxi_speed_kt();

    if ctx.first_leg {
        // Parking stand a short push back from the threshold, spaced so the
        // taxi turn onto the runway stays inside the turn radius.
        let back_m = (2.0 * ctx.turn_radius_ft * geo::M_PER_FT).max(400.0);
        let stand = if ctx.flight_type == "cargo" {
            "freight"
        } else {
            "parking"
        };
        let (lat, lon, _) =
            geo::offset_by_bearing_deg(dep.lat, dep.lon, back_m, geo::reciprocal_deg(course));
        let mut parking = Waypoint::new(
            format!("{}-{}-{stand}", ctx.airline, dep.id),
            lat,
            lon,
            dep.elevation_ft,
            taxi_speed,
        );
        parking.on_ground = true;
        wps.push(parking);
    }

    let mut threshold = Waypoint::new(
        format!("{}-threshold", dep.id),
        dep.lat,
        dep.lon,
        dep.elevation_ft,
        taxi_speed,
    );
    threshold.on_ground = true;
    wps.push(threshold);

    // Rotation point down the runway.
    let (lat, lon, _) = geo::offset_by_bearing_deg(dep.lat, dep.lon, 1800.0, course);
    let mut rotate = Waypoint::new(
        format!("{}-rotate", dep.id),
        lat,
        lon,
        dep.elevation_ft + 100.0,
        ctx.performance.approach_speed_kt() + 20.0,
    );
    rotate.route_index = 1;
    wps.push(rotate);
}

fn push_climb(wps: &mut Vec<Waypoint>, ctx: &SynthesisContext) {
    let dep = ctx.departure;
    let course = route_course_deg(ctx);
    let climb_speed_kt = ctx.performance.cruise_speed_kt().min(250.0);

    let (lat, lon, _) = geo::offset_by_bearing_deg(dep.lat, dep.lon, 5.0 * geo::M_PER_NM, course);
    wps.push(Waypoint::new(
        "climbout",
        lat,
        lon,
        dep.elevation_ft + 3000.0,
        climb_speed_kt,
    ));

    // Distance to reach cruise altitude at the class climb rate.
    let climb_ft = (ctx.cruise_altitude_ft - dep.elevation_ft).max(0.0);
    let climb_minutes = climb_ft / ctx.performance.climb_rate_fpm();
    let climb_nm = climb_minutes * climb_speed_kt / 60.0;
    let (lat, lon, _) =
        geo::offset_by_bearing_deg(dep.lat, dep.lon, climb_nm * geo::M_PER_NM, course);
    wps.push(Waypoint::new(
        "top-of-climb",
        lat,
        lon,
        ctx.cruise_altitude_ft,
        ctx.performance.cruise_speed_kt(),
    ));
}

fn push_descent(wps: &mut Vec<Waypoint>, ctx: &SynthesisContext) {
    let arr = ctx.arrival;
    let cruise_speed_kt = ctx.performance.cruise_speed_kt();

    // Top of descent backed off from the arrival by the distance needed to
    // lose cruise altitude at the class descent rate.
    let descent_ft = (ctx.cruise_altitude_ft - arr.elevation_ft).max(0.0);
    let descent_minutes = descent_ft / ctx.performance.climb_rate_fpm();
    let descent_nm = (descent_minutes * cruise_speed_kt / 60.0).max(5.0);
    let back_course = geo::bearing_deg(arr.lat, arr.lon, ctx.departure.lat, ctx.departure.lon);
    let (lat, lon, _) =
        geo::offset_by_bearing_deg(arr.lat, arr.lon, descent_nm * geo::M_PER_NM, back_course);
    wps.push(Waypoint::new(
        "top-of-descent",
        lat,
        lon,
        ctx.cruise_altitude_ft,
        cruise_speed_kt,
    ));
}

fn push_approach(wps: &mut Vec<Waypoint>, ctx: &SynthesisContext) {
    let arr = ctx.arrival;
    let back_course = geo::bearing_deg(arr.lat, arr.lon, ctx.departure.lat, ctx.departure.lon);
    let approach_speed = ctx.performance.approach_speed_kt();

    let (lat, lon, _) =
        geo::offset_by_bearing_deg(arr.lat, arr.lon, 5.0 * geo::M_PER_NM, back_course);
    let mut final_fix = Waypoint::new(
        format!("{}-final", arr.id),
        lat,
        lon,
        arr.elevation_ft + 1500.0,
        approach_speed,
    );
    final_fix.gear_down = true;
    final_fix.flaps_down = true;
    final_fix.cross_at_ft = arr.elevation_ft + 1500.0;
    wps.push(final_fix);

    let mut threshold = Waypoint::new(
        format!("{}-threshold", arr.id),
        arr.lat,
        arr.lon,
        arr.elevation_ft,
        approach_speed - 20.0,
    );
    threshold.gear_down = true;
    threshold.flaps_down = true;
    threshold.on_ground = true;
    wps.push(threshold);
}
