//! Owner of all traffic schedules.
//!
//! Exactly one schedule is advanced per manager tick, round-robin, so a
//! timetable with thousands of identities never spikes per-frame cost.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::TrafficConfig;
use crate::loader::{self, TimetableDocument};
use crate::schedule::{Observer, ScheduledFlight, TrafficSchedule};
use crate::services::{AirportDirectory, EntityFactory, EntityId, ReleaseLedger};

#[derive(Debug, Default)]
pub struct TrafficManager {
    cfg: TrafficConfig,
    schedules: Vec<TrafficSchedule>,
    /// Flights waiting for an aircraft with a matching required-aircraft key.
    /// One timetable fragment may reference flights defined in another.
    flight_pool: HashMap<String, Vec<ScheduledFlight>>,
    cursor: usize,
    released: ReleaseLedger,
}

impl TrafficManager {
    pub fn new(cfg: TrafficConfig) -> Self {
        Self {
            cfg,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &TrafficConfig {
        &self.cfg
    }

    pub fn schedules(&self) -> &[TrafficSchedule] {
        &self.schedules
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    pub fn add_schedule(&mut self, schedule: TrafficSchedule) {
        self.schedules.push(schedule);
    }

    /// Load every timetable fragment in a directory. A missing or unreadable
    /// directory degrades to zero scheduled traffic; a bad fragment is
    /// skipped. Returns the number of schedules loaded.
    pub fn load_timetable_dir(&mut self, dir: &Path, airports: &dyn AirportDirectory) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    "timetable directory {} unavailable ({err}); no scheduled traffic",
                    dir.display()
                );
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match loader::read_structured_file::<TimetableDocument>(&path) {
                Ok(doc) => loaded += self.ingest_fragment(doc, &path),
                Err(err) => tracing::warn!("skipping timetable fragment: {err}"),
            }
        }

        self.assign_pooled_flights(airports);
        loaded
    }

    /// Merge one parsed fragment: pool its flights, create its schedules.
    fn ingest_fragment(&mut self, doc: TimetableDocument, path: &Path) -> usize {
        for entry in &doc.flights {
            match ScheduledFlight::from_entry(entry) {
                Ok(flight) => self
                    .flight_pool
                    .entry(flight.required_aircraft.clone())
                    .or_default()
                    .push(flight),
                Err(err) => {
                    tracing::warn!("{}: dropping flight {}: {err}", path.display(), entry.callsign)
                }
            }
        }

        let mut created = 0;
        for entry in &doc.aircraft {
            self.schedules.push(TrafficSchedule::from_entry(entry));
            created += 1;
        }
        created
    }

    /// Attach pooled flights to schedules with a matching key, then resolve
    /// airports. Schedules keep whatever flights survive resolution.
    fn assign_pooled_flights(&mut self, airports: &dyn AirportDirectory) {
        for schedule in &mut self.schedules {
            if let Some(flights) = self.flight_pool.remove(schedule.required_aircraft()) {
                for flight in flights {
                    schedule.push_flight(flight);
                }
            }
            schedule.init(airports);
        }
    }

    /// Advance exactly one schedule. Round-robin over the collection; never
    /// more than one promotion or demotion per tick.
    pub fn update(
        &mut self,
        now: DateTime<Utc>,
        observer: &Observer,
        factory: &mut dyn EntityFactory,
    ) {
        if self.schedules.is_empty() {
            return;
        }
        if self.cursor >= self.schedules.len() {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.schedules.len();

        self.schedules[index].update(now, observer, &self.cfg, factory, &mut self.released);
    }

    /// Notification from the detailed layer that a promoted entity was torn
    /// down. The owning schedule re-arms on its next round-robin turn.
    pub fn release(&mut self, id: EntityId) {
        self.released.record(id);
    }

    /// One-shot check-and-clear: true at most once per release.
    pub fn is_released(&mut self, id: EntityId) -> bool {
        self.released.take(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::AircraftEntry;
    use crate::schedule::RepeatPeriod;
    use crate::services::AirportTable;
    use chrono::{Duration, TimeZone};
    use traffic_core::models::{AiPose, AirportRecord, PerformanceClass};
    use traffic_core::CoreError;
    use crate::flightplan::FlightPlan;

    struct NullFactory {
        instantiated: usize,
    }

    impl EntityFactory for NullFactory {
        fn instantiate(
            &mut self,
            _model_path: &str,
            _pose: &AiPose,
            _plan: FlightPlan,
        ) -> Result<EntityId, CoreError> {
            self.instantiated += 1;
            Ok(self.instantiated as EntityId)
        }
    }

    fn airports() -> AirportTable {
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

    fn aircraft_entry(registration: &str, key: &str) -> AircraftEntry {
        AircraftEntry {
            model: format!("Aircraft/{registration}.xml"),
            livery: String::new(),
            registration: registration.to_string(),
            aircraft_type: "B744".to_string(),
            airline: "EQX".to_string(),
            performance_class: PerformanceClass::Jet,
            flight_type: "gate".to_string(),
            radius_m: 40.0,
            ground_offset_ft: 0.0,
            required_aircraft: key.to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_directory_degrades_to_zero_traffic() {
        let mut manager = TrafficManager::new(TrafficConfig::default());
        let table = airports();
        let loaded = manager.load_timetable_dir(Path::new("/nonexistent/timetables"), &table);
        assert_eq!(loaded, 0);
        assert_eq!(manager.schedule_count(), 0);

        // Updating with no schedules is a no-op, not a panic.
        let mut factory = NullFactory { instantiated: 0 };
        manager.update(t0(), &Observer { lat: 0.0, lon: 0.0 }, &mut factory);
    }

    #[test]
    fn test_round_robin_advances_one_schedule_per_tick() {
        let mut manager = TrafficManager::new(TrafficConfig::default());
        let table = airports();
        for i in 0..3 {
            let mut schedule = TrafficSchedule::from_entry(&aircraft_entry(
                &format!("PH-EQ{i}"),
                &format!("key-{i}"),
            ));
            let mut flight = ScheduledFlight::new(
                format!("EQX00{i}"),
                "EQA",
                "EQB",
                t0(),
                t0() + Duration::seconds(3600),
                RepeatPeriod::Week,
            );
            flight.required_aircraft = format!("key-{i}");
            schedule.push_flight(flight);
            schedule.init(&table);
            manager.add_schedule(schedule);
        }

        let mut factory = NullFactory { instantiated: 0 };
        let observer = Observer { lat: 0.0, lon: 45.0 };
        let now = t0() + Duration::seconds(1800);

        // Each tick touches one schedule: all three need three ticks.
        manager.update(now, &observer, &mut factory);
        assert_eq!(factory.instantiated, 1);
        manager.update(now, &observer, &mut factory);
        manager.update(now, &observer, &mut factory);
        assert_eq!(factory.instantiated, 3);
    }

    #[test]
    fn test_release_round_trips_through_manager() {
        let mut manager = TrafficManager::new(TrafficConfig::default());
        manager.release(9);
        assert!(manager.is_released(9));
        assert!(!manager.is_released(9));
    }
}
