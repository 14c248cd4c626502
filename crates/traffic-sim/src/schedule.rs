//! Timetabled background traffic.
//!
//! A `TrafficSchedule` is one simulated aircraft identity replaying a weekly
//! or daily timetable. While far from the observer it is advanced by cheap
//! great-circle interpolation; once it comes inside the activation radius it
//! is promoted to a fully simulated entity through the entity factory.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use traffic_core::geo;
use traffic_core::models::{AiPose, AirportRecord, FlightRules, PerformanceClass};
use traffic_core::CoreError;

use crate::config::TrafficConfig;
use crate::flightplan::{FlightPlan, SynthesisContext};
use crate::loader::{AircraftEntry, FlightEntry};
use crate::services::{AirportDirectory, EntityFactory, EntityId, ReleaseLedger};

/// How often a timetabled flight repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPeriod {
    Day,
    #[default]
    Week,
}

impl RepeatPeriod {
    pub fn duration(&self) -> Duration {
        match self {
            RepeatPeriod::Day => Duration::days(1),
            RepeatPeriod::Week => Duration::weeks(1),
        }
    }
}

/// Week-anchored time of day, e.g. `"Tue/14:30:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekTime {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl WeekTime {
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let malformed = |reason: &str| CoreError::MalformedDocument {
            path: text.to_string(),
            reason: reason.to_string(),
        };
        let (day, time) = text
            .split_once('/')
            .ok_or_else(|| malformed("expected Ddd/HH:MM:SS"))?;
        let weekday: Weekday = day
            .parse()
            .map_err(|_| malformed("unknown weekday"))?;
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .map_err(|_| malformed("bad time of day"))?;
        Ok(Self { weekday, time })
    }

    /// Concrete instant for this week-time inside the week containing `now`.
    pub fn in_week_of(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days_from_monday = now.date_naive().weekday().num_days_from_monday() as i64;
        let monday = now.date_naive() - Duration::days(days_from_monday);
        let date = monday + Duration::days(self.weekday.num_days_from_monday() as i64);
        date.and_time(self.time).and_utc()
    }
}

/// One timetabled journey. Identity fields are immutable; the concrete times
/// roll forward by the repeat period whenever they fall in the past.
#[derive(Debug, Clone)]
pub struct ScheduledFlight {
    pub callsign: String,
    pub rules: FlightRules,
    pub departure_id: String,
    pub arrival_id: String,
    /// Resolved lazily at schedule init.
    pub departure: Option<AirportRecord>,
    pub arrival: Option<AirportRecord>,
    departure_week: Option<WeekTime>,
    arrival_week: Option<WeekTime>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub repeat: RepeatPeriod,
    pub cruise_altitude_ft: Option<f64>,
    pub required_aircraft: String,
}

impl ScheduledFlight {
    /// Programmatic constructor with concrete times (tests, tools).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        callsign: impl Into<String>,
        departure_id: impl Into<String>,
        arrival_id: impl Into<String>,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        repeat: RepeatPeriod,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            rules: FlightRules::default(),
            departure_id: departure_id.into(),
            arrival_id: arrival_id.into(),
            departure: None,
            arrival: None,
            departure_week: None,
            arrival_week: None,
            departure_time,
            arrival_time,
            repeat,
            cruise_altitude_ft: None,
            required_aircraft: String::new(),
        }
    }

    /// Build from a timetable document entry. Week-anchored times stay
    /// symbolic until the owning schedule's first update normalizes them.
    pub fn from_entry(entry: &FlightEntry) -> Result<Self, CoreError> {
        let departure_week = WeekTime::parse(&entry.departure_time)?;
        let arrival_week = WeekTime::parse(&entry.arrival_time)?;
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Ok(Self {
            callsign: entry.callsign.clone(),
            rules: entry.rules,
            departure_id: entry.departure.clone(),
            arrival_id: entry.arrival.clone(),
            departure: None,
            arrival: None,
            departure_week: Some(departure_week),
            arrival_week: Some(arrival_week),
            departure_time: epoch,
            arrival_time: epoch,
            repeat: entry.repeat,
            cruise_altitude_ft: entry.cruise_altitude_ft,
            required_aircraft: entry.required_aircraft.clone(),
        })
    }

    /// Resolve airport ids to records. Failure invalidates this flight only.
    pub fn resolve_airports(&mut self, airports: &dyn AirportDirectory) -> Result<(), CoreError> {
        self.departure = Some(
            airports
                .find(&self.departure_id)
                .ok_or_else(|| CoreError::UnknownAirport(self.departure_id.clone()))?,
        );
        self.arrival = Some(
            airports
                .find(&self.arrival_id)
                .ok_or_else(|| CoreError::UnknownAirport(self.arrival_id.clone()))?,
        );
        Ok(())
    }

    /// Pin week-anchored times into the week containing `now`, then roll
    /// forward so the flight is in the future or in progress.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        if let (Some(dep), Some(arr)) = (self.departure_week, self.arrival_week) {
            self.departure_time = dep.in_week_of(now);
            self.arrival_time = arr.in_week_of(now);
            if self.arrival_time <= self.departure_time {
                // Crosses the week boundary (e.g. Sun departure, Mon arrival).
                self.arrival_time += Duration::weeks(1);
            }
        }
        self.roll_forward(now);
    }

    pub fn in_progress(&self, now: DateTime<Utc>) -> bool {
        self.departure_time <= now && now < self.arrival_time
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.arrival_time <= now
    }

    /// Advance by whole repeat periods until the flight departs in the
    /// future or is currently in progress. Handles arbitrarily large gaps.
    pub fn roll_forward(&mut self, now: DateTime<Utc>) {
        let period = self.repeat.duration();
        while self.arrival_time <= now {
            self.departure_time += period;
            self.arrival_time += period;
        }
    }

    pub fn duration(&self) -> Duration {
        self.arrival_time - self.departure_time
    }
}

/// Observer position used for the promotion distance check.
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub lat: f64,
    pub lon: f64,
}

/// One simulated traffic identity and its timetable.
#[derive(Debug)]
pub struct TrafficSchedule {
    pub model_path: String,
    pub livery: String,
    pub registration: String,
    pub aircraft_type: String,
    pub airline: String,
    pub performance: PerformanceClass,
    pub flight_type: String,
    /// Parking geometry hints.
    pub radius_m: f64,
    pub ground_offset_ft: f64,
    required_aircraft: String,
    flights: Vec<ScheduledFlight>,
    last_position: Option<(f64, f64)>,
    entity: Option<EntityId>,
    first_run: bool,
}

impl TrafficSchedule {
    pub fn from_entry(entry: &AircraftEntry) -> Self {
        Self {
            model_path: entry.model.clone(),
            livery: entry.livery.clone(),
            registration: entry.registration.clone(),
            aircraft_type: entry.aircraft_type.clone(),
            airline: entry.airline.clone(),
            performance: entry.performance_class,
            flight_type: entry.flight_type.clone(),
            radius_m: entry.radius_m,
            ground_offset_ft: entry.ground_offset_ft,
            required_aircraft: entry.required_aircraft.clone(),
            flights: Vec::new(),
            last_position: None,
            entity: None,
            first_run: true,
        }
    }

    /// Key joining this identity to flights authored in other fragments.
    pub fn required_aircraft(&self) -> &str {
        &self.required_aircraft
    }

    pub fn push_flight(&mut self, flight: ScheduledFlight) {
        self.flights.push(flight);
    }

    pub fn flights(&self) -> &[ScheduledFlight] {
        &self.flights
    }

    /// Cached position from the last interpolation tick.
    pub fn last_position(&self) -> Option<(f64, f64)> {
        self.last_position
    }

    /// Handle of the promoted detailed entity, if any.
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Resolve airports for every flight, dropping flights whose airports are
    /// unknown. Returns the number of flights that survived.
    pub fn init(&mut self, airports: &dyn AirportDirectory) -> usize {
        let registration = self.registration.clone();
        self.flights.retain_mut(|flight| {
            match flight.resolve_airports(airports) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        "{registration}: dropping flight {}: {err}",
                        flight.callsign
                    );
                    false
                }
            }
        });
        self.flights.len()
    }

    /// Advance this schedule to `now`.
    pub fn update(
        &mut self,
        now: DateTime<Utc>,
        observer: &Observer,
        cfg: &TrafficConfig,
        factory: &mut dyn EntityFactory,
        released: &mut ReleaseLedger,
    ) {
        // A promoted entity torn down by the detailed layer frees this
        // schedule to re-promote later.
        if let Some(id) = self.entity {
            if released.take(id) {
                tracing::debug!("{}: entity {id} released", self.registration);
                self.entity = None;
            }
        }

        if self.first_run {
            // Replay a once-authored timetable in the current week.
            for flight in &mut self.flights {
                flight.normalize(now);
            }
            self.sort_flights();
            self.first_run = false;
        }

        let (is_past, in_progress) = match self.flights.first() {
            Some(head) => (head.is_past(now), head.in_progress(now)),
            None => return,
        };

        if is_past {
            self.flights[0].roll_forward(now);
            self.sort_flights();
            return;
        }

        if !in_progress {
            // Parked: both times in the future.
            return;
        }

        let head = &self.flights[0];
        let (Some(dep), Some(arr)) = (head.departure.clone(), head.arrival.clone()) else {
            return;
        };
        let total_secs = head.duration().num_seconds() as f64;
        if total_secs <= 0.0 {
            return;
        }
        let elapsed_secs = (now - head.departure_time).num_seconds() as f64;
        let fraction = elapsed_secs / total_secs;

        let (lat, lon) = geo::intermediate_point(dep.lat, dep.lon, arr.lat, arr.lon, fraction);
        self.last_position = Some((lat, lon));

        let distance_m = geo::haversine_distance_m(lat, lon, observer.lat, observer.lon);
        if distance_m <= cfg.activation_radius_nm * geo::M_PER_NM && self.entity.is_none() {
            self.promote(elapsed_secs, lat, lon, &dep, &arr, factory);
        }
    }

    /// Force-advance the earliest flight and re-sort.
    pub fn next(&mut self, now: DateTime<Utc>) {
        if let Some(head) = self.flights.first_mut() {
            let period = head.repeat.duration();
            head.departure_time += period;
            head.arrival_time += period;
            head.roll_forward(now);
        }
        self.sort_flights();
    }

    /// Earliest-departing flight is always the list head.
    fn sort_flights(&mut self) {
        self.flights
            .sort_by_key(|flight| flight.departure_time);
    }

    fn promote(
        &mut self,
        elapsed_secs: f64,
        lat: f64,
        lon: f64,
        dep: &AirportRecord,
        arr: &AirportRecord,
        factory: &mut dyn EntityFactory,
    ) {
        let head = &self.flights[0];
        let total_secs = head.duration().num_seconds() as f64;
        let route_m = geo::haversine_distance_m(dep.lat, dep.lon, arr.lat, arr.lon);
        let groundspeed_kt = route_m / total_secs / geo::MPS_PER_KT;
        let cruise_altitude_ft = head
            .cruise_altitude_ft
            .unwrap_or_else(|| self.performance.cruise_altitude_ft());

        let plan = FlightPlan::synthesize(&SynthesisContext {
            departure: dep,
            arrival: arr,
            elapsed_secs,
            current_lat: lat,
            current_lon: lon,
            current_altitude_ft: cruise_altitude_ft,
            current_speed_kt: groundspeed_kt,
            first_leg: true,
            turn_radius_ft: crate::flightplan::turn_radius_ft(
                self.performance.taxi_speed_kt(),
            ),
            performance: self.performance,
            cruise_altitude_ft,
            airline: &self.airline,
            aircraft_type: &self.aircraft_type,
            flight_type: &self.flight_type,
        });

        let pose = AiPose {
            lat,
            lon,
            altitude_ft: cruise_altitude_ft,
            heading_deg: geo::bearing_deg(lat, lon, arr.lat, arr.lon),
            speed_kt: groundspeed_kt,
        };

        match factory.instantiate(&self.model_path, &pose, plan) {
            Ok(id) => {
                tracing::info!(
                    "{}: promoted {} at ({lat:.3}, {lon:.3})",
                    self.registration,
                    self.flights[0].callsign
                );
                self.entity = Some(id);
            }
            Err(err) => {
                // No latch here: the next enroute tick retries. Accepted
                // inefficiency when a model stays missing.
                tracing::warn!(
                    "{}: promotion of {} skipped: {err}",
                    self.registration,
                    self.flights[0].callsign
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AirportTable;
    use chrono::TimeZone;

    struct CountingFactory {
        next_id: EntityId,
        poses: Vec<AiPose>,
        fail: bool,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                next_id: 1,
                poses: Vec::new(),
                fail: false,
            }
        }
    }

    impl EntityFactory for CountingFactory {
        fn instantiate(
            &mut self,
            model_path: &str,
            pose: &AiPose,
            _plan: FlightPlan,
        ) -> Result<EntityId, CoreError> {
            if self.fail {
                return Err(CoreError::ModelMissing(model_path.to_string()));
            }
            self.poses.push(*pose);
            let id = self.next_id;
            self.next_id += 1;
            Ok(id)
        }
    }

    fn equator_airports() -> AirportTable {
        AirportTable::from_records([
            AirportRecord {
                id: "EQA".to_string(),
                lat: 0.0,
                lon: 0.0,
                elevation_ft: 0.0,
            },
            AirportRecord {
                id: "EQB".to_string(),
                lat: 0.0,
                lon: 90.0,
                elevation_ft: 0.0,
            },
        ])
    }

    fn schedule_with_flight(
        airports: &AirportTable,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
    ) -> TrafficSchedule {
        let entry = AircraftEntry {
            model: "Aircraft/747/747.xml".to_string(),
            livery: String::new(),
            registration: "PH-EQX".to_string(),
            aircraft_type: "B744".to_string(),
            airline: "EQX".to_string(),
            performance_class: PerformanceClass::Jet,
            flight_type: "gate".to_string(),
            radius_m: 40.0,
            ground_offset_ft: 0.0,
            required_aircraft: "EQX-744".to_string(),
        };
        let mut schedule = TrafficSchedule::from_entry(&entry);
        let mut flight =
            ScheduledFlight::new("EQX001", "EQA", "EQB", departure_time, arrival_time, RepeatPeriod::Week);
        flight.required_aircraft = "EQX-744".to_string();
        schedule.push_flight(flight);
        schedule.init(airports);
        schedule
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_week_time_parse_and_pin() {
        let wt = WeekTime::parse("Tue/14:30:00").unwrap();
        assert_eq!(wt.weekday, Weekday::Tue);
        let pinned = wt.in_week_of(t0()); // t0 is a Monday
        assert_eq!(pinned.weekday(), Weekday::Tue);
        assert_eq!(
            pinned,
            Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()
        );
        assert!(WeekTime::parse("14:30:00").is_err());
        assert!(WeekTime::parse("Xyz/14:30:00").is_err());
    }

    #[test]
    fn test_rollover_skips_multiple_missed_periods() {
        let dep = t0() - Duration::weeks(5);
        let arr = dep + Duration::hours(8);
        let mut flight =
            ScheduledFlight::new("EQX001", "EQA", "EQB", dep, arr, RepeatPeriod::Week);
        flight.roll_forward(t0());
        assert!(flight.arrival_time > t0());
        assert!(flight.departure_time > t0() - Duration::hours(8));
        // Advanced by whole periods: same weekday and time of day.
        assert_eq!(flight.departure_time.weekday(), dep.weekday());
        assert_eq!(flight.departure_time.time(), dep.time());
    }

    #[test]
    fn test_rollover_daily_repeat() {
        let dep = t0() - Duration::days(3) - Duration::hours(1);
        let arr = dep + Duration::hours(2);
        let mut flight = ScheduledFlight::new("EQX002", "EQA", "EQB", dep, arr, RepeatPeriod::Day);
        flight.roll_forward(t0());
        assert!(flight.arrival_time > t0());
        assert_eq!(flight.departure_time.time(), dep.time());
    }

    #[test]
    fn test_enroute_interpolation_midpoint() {
        let airports = equator_airports();
        let dep_time = t0();
        let arr_time = t0() + Duration::seconds(3600);
        let mut schedule = schedule_with_flight(&airports, dep_time, arr_time);
        let mut factory = CountingFactory::new();
        let mut released = ReleaseLedger::default();
        // Observer far away: no promotion, just interpolation.
        let observer = Observer { lat: 45.0, lon: -120.0 };
        let cfg = TrafficConfig::default();

        let now = t0() + Duration::seconds(1800);
        schedule.update(now, &observer, &cfg, &mut factory, &mut released);

        let (lat, lon) = schedule.last_position().expect("expected a position");
        assert!(lat.abs() < 1e-6, "expected equator, got {lat}");
        assert!((lon - 45.0).abs() < 1e-6, "expected 45E, got {lon}");
        assert!(schedule.entity().is_none());
        assert!(factory.poses.is_empty());
    }

    #[test]
    fn test_promotion_inside_activation_radius() {
        let airports = equator_airports();
        let mut schedule =
            schedule_with_flight(&airports, t0(), t0() + Duration::seconds(3600));
        let mut factory = CountingFactory::new();
        let mut released = ReleaseLedger::default();
        let observer = Observer { lat: 0.0, lon: 45.0 };
        let cfg = TrafficConfig::default();

        let now = t0() + Duration::seconds(1800);
        schedule.update(now, &observer, &cfg, &mut factory, &mut released);

        assert_eq!(schedule.entity(), Some(1));
        assert_eq!(factory.poses.len(), 1);
        let pose = &factory.poses[0];
        assert!(pose.lat.abs() < 1e-6);
        assert!((pose.lon - 45.0).abs() < 1e-6);
        // Eastbound along the equator.
        assert!((pose.heading_deg - 90.0).abs() < 0.5);

        // Already promoted: a second tick must not instantiate again.
        schedule.update(
            now + Duration::seconds(10),
            &observer,
            &cfg,
            &mut factory,
            &mut released,
        );
        assert_eq!(factory.poses.len(), 1);
    }

    #[test]
    fn test_release_allows_repromotion() {
        let airports = equator_airports();
        let mut schedule =
            schedule_with_flight(&airports, t0(), t0() + Duration::seconds(3600));
        let mut factory = CountingFactory::new();
        let mut released = ReleaseLedger::default();
        let observer = Observer { lat: 0.0, lon: 45.0 };
        let cfg = TrafficConfig::default();

        let now = t0() + Duration::seconds(1800);
        schedule.update(now, &observer, &cfg, &mut factory, &mut released);
        assert_eq!(schedule.entity(), Some(1));

        released.record(1);
        schedule.update(
            now + Duration::seconds(10),
            &observer,
            &cfg,
            &mut factory,
            &mut released,
        );
        assert_eq!(schedule.entity(), Some(2), "expected re-promotion");
    }

    #[test]
    fn test_failed_promotion_retries_later() {
        let airports = equator_airports();
        let mut schedule =
            schedule_with_flight(&airports, t0(), t0() + Duration::seconds(3600));
        let mut factory = CountingFactory::new();
        factory.fail = true;
        let mut released = ReleaseLedger::default();
        let observer = Observer { lat: 0.0, lon: 45.0 };
        let cfg = TrafficConfig::default();

        let now = t0() + Duration::seconds(1800);
        schedule.update(now, &observer, &cfg, &mut factory, &mut released);
        assert!(schedule.entity().is_none());

        // Model shows up later: the next tick promotes.
        factory.fail = false;
        schedule.update(
            now + Duration::seconds(10),
            &observer,
            &cfg,
            &mut factory,
            &mut released,
        );
        assert_eq!(schedule.entity(), Some(1));
    }

    #[test]
    fn test_unknown_airport_drops_only_that_flight() {
        let airports = equator_airports();
        let entry = AircraftEntry {
            model: "m".to_string(),
            livery: String::new(),
            registration: "PH-EQX".to_string(),
            aircraft_type: String::new(),
            airline: String::new(),
            performance_class: PerformanceClass::Jet,
            flight_type: String::new(),
            radius_m: 20.0,
            ground_offset_ft: 0.0,
            required_aircraft: "k".to_string(),
        };
        let mut schedule = TrafficSchedule::from_entry(&entry);
        schedule.push_flight(ScheduledFlight::new(
            "GOOD",
            "EQA",
            "EQB",
            t0(),
            t0() + Duration::hours(1),
            RepeatPeriod::Week,
        ));
        schedule.push_flight(ScheduledFlight::new(
            "BAD",
            "EQA",
            "XXXX",
            t0(),
            t0() + Duration::hours(1),
            RepeatPeriod::Week,
        ));
        assert_eq!(schedule.init(&airports), 1);
        assert_eq!(schedule.flights()[0].callsign, "GOOD");
    }

    #[test]
    fn test_past_flight_rolls_and_resorts() {
        let airports = equator_airports();
        let mut schedule = schedule_with_flight(
            &airports,
            t0() - Duration::hours(10),
            t0() - Duration::hours(2),
        );
        let mut factory = CountingFactory::new();
        let mut released = ReleaseLedger::default();
        let observer = Observer { lat: 0.0, lon: 45.0 };
        let cfg = TrafficConfig::default();

        schedule.update(t0(), &observer, &cfg, &mut factory, &mut released);
        let head = &schedule.flights()[0];
        assert!(head.arrival_time > t0());
        assert!(factory.poses.is_empty());
    }
}
