//! Point-mass ballistic integration under drag, gravity, buoyancy, and wind.
//!
//! No full flight-dynamics model: the body flies its pitch/heading, drag
//! bleeds speed, gravity pulls the vertical component, and an optional
//! aerodynamic stabilization keeps the body aligned with the velocity vector.

use rand::Rng;

use traffic_core::geo::{self, FT_PER_M, M_PER_FT};

use crate::services::{LocalAtmosphere, TerrainQuery};

const GRAVITY_MPS2: f64 = 9.80665;

/// Below this altitude the entity is marked dead regardless of other state.
const DESTRUCTION_FLOOR_FT: f64 = -1000.0;

/// Drag-coefficient rise as a function of Mach number.
///
/// Empirical transonic fit in three branches: linear below Mach 0.7, a
/// quadratic through the transonic region, and a decaying power tail above
/// Mach 1.2. The linear slope and the tail anchor are derived from the
/// quadratic so the branches meet exactly.
pub fn mach_drag_adjustment(mach: f64) -> f64 {
    const Q_A: f64 = 0.3742;
    const Q_B: f64 = -0.252;
    const Q_C: f64 = 0.0021;
    const AT_07: f64 = Q_A * 0.49 + Q_B * 0.7 + Q_C;
    const AT_12: f64 = Q_A * 1.44 + Q_B * 1.2 + Q_C;

    if mach < 0.7 {
        AT_07 / 0.7 * mach
    } else if mach <= 1.2 {
        Q_A * mach * mach + Q_B * mach + Q_C
    } else {
        AT_12 * (mach / 1.2).powf(-1.1506)
    }
}

/// Static configuration for one projectile.
///
/// `mass_kg` must be validated > 0 by the caller; the integrator divides by
/// it and does not defend against zero.
#[derive(Debug, Clone)]
pub struct BallisticConfig {
    /// Base drag coefficient.
    pub cd: f64,
    pub mass_kg: f64,
    /// Drag reference area in square meters.
    pub drag_area_m2: f64,
    /// Lifetime in seconds; expiry marks the entity for destruction.
    pub life_secs: f64,
    /// Upward acceleration opposing gravity (m/s²).
    pub buoyancy_mps2: f64,
    pub wind_enabled: bool,
    pub wind_north_mps: f64,
    pub wind_east_mps: f64,
    /// Keep the body pointed along the velocity vector.
    pub aero_stabilized: bool,
    /// Jitter Cd by ±5% each tick.
    pub randomize_cd: bool,
    /// Capture an impact report on ground contact.
    pub report_impact: bool,
}

impl Default for BallisticConfig {
    fn default() -> Self {
        Self {
            cd: 0.295,
            mass_kg: 11.0,
            drag_area_m2: 0.008,
            life_secs: 900.0,
            buoyancy_mps2: 0.0,
            wind_enabled: true,
            wind_north_mps: 0.0,
            wind_east_mps: 0.0,
            aero_stabilized: true,
            randomize_cd: false,
            report_impact: true,
        }
    }
}

/// Impact physics captured once at ground contact. Never overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactReport {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    pub speed_mps: f64,
    /// Kinetic energy at impact in kilojoules.
    pub energy_kj: f64,
    pub material_name: String,
    pub material_solid: bool,
    pub material_load_resistance: f64,
}

/// A projectile in flight.
#[derive(Debug, Clone)]
pub struct BallisticEntity {
    cfg: BallisticConfig,
    lat: f64,
    lon: f64,
    altitude_m: f64,
    heading_deg: f64,
    pitch_deg: f64,
    roll_deg: f64,
    speed_mps: f64,
    vertical_speed_mps: f64,
    cd_mach: f64,
    life_timer_secs: f64,
    impact: Option<ImpactReport>,
    dead: bool,
}

impl BallisticEntity {
    pub fn launch(
        cfg: BallisticConfig,
        lat: f64,
        lon: f64,
        altitude_m: f64,
        heading_deg: f64,
        pitch_deg: f64,
        speed_mps: f64,
    ) -> Self {
        let cd = cfg.cd;
        Self {
            cfg,
            lat,
            lon,
            altitude_m,
            heading_deg: geo::normalize_deg(heading_deg),
            pitch_deg,
            roll_deg: 0.0,
            speed_mps: speed_mps.max(0.0),
            vertical_speed_mps: speed_mps * pitch_deg.to_radians().sin(),
            cd_mach: cd,
            life_timer_secs: 0.0,
            impact: None,
            dead: false,
        }
    }

    /// Advance one tick. Expiry and impact both mark the entity for
    /// destruction but still finish this tick's integration.
    pub fn run(&mut self, dt: f64, env: &LocalAtmosphere, terrain: &dyn TerrainQuery) {
        self.life_timer_secs += dt;
        if self.cfg.life_secs > 0.0 && self.life_timer_secs > self.cfg.life_secs {
            self.dead = true;
        }

        let mut cd = self.cfg.cd;
        if self.cfg.randomize_cd {
            cd *= 1.0 + rand::rng().random_range(-0.05..0.05);
        }
        self.cd_mach = cd + mach_drag_adjustment(env.mach);

        let decel_mps2 = self.cd_mach * 0.5 * env.air_density_kgm3 * self.speed_mps
            * self.speed_mps
            * self.cfg.drag_area_m2
            / self.cfg.mass_kg;
        self.speed_mps = (self.speed_mps - decel_mps2 * dt).max(0.0);

        let pitch_rad = self.pitch_deg.to_radians();
        let heading_rad = self.heading_deg.to_radians();
        let horizontal_mps = self.speed_mps * pitch_rad.cos();
        let mut vertical_mps = self.speed_mps * pitch_rad.sin();

        let mut north_mps = horizontal_mps * heading_rad.cos();
        let mut east_mps = horizontal_mps * heading_rad.sin();
        if self.cfg.wind_enabled {
            north_mps += self.cfg.wind_north_mps;
            east_mps += self.cfg.wind_east_mps;
        }

        self.lat += north_mps / geo::meters_per_deg_lat(self.lat) * dt;
        self.lon += east_mps / geo::meters_per_deg_lon(self.lat).max(1e-9) * dt;

        vertical_mps -= (GRAVITY_MPS2 - self.cfg.buoyancy_mps2) * dt;
        self.altitude_m += vertical_mps * dt;

        if self.cfg.aero_stabilized
            && (horizontal_mps.abs() > f64::EPSILON || vertical_mps.abs() > f64::EPSILON)
        {
            self.pitch_deg = vertical_mps.atan2(horizontal_mps).to_degrees();
        }

        self.vertical_speed_mps = vertical_mps;
        self.speed_mps = (horizontal_mps * horizontal_mps + vertical_mps * vertical_mps).sqrt();

        if self.cfg.report_impact && self.impact.is_none() && vertical_mps < 0.0 {
            // A failed query is simply retried on the next eligible tick.
            if let Some(sample) =
                terrain.elevation(self.lat, self.lon, self.altitude_m + 100.0)
            {
                if self.altitude_m <= sample.elevation_m {
                    let speed = self.speed_mps;
                    let (name, solid, load) = sample
                        .material
                        .map(|m| (m.name, m.solid, m.load_resistance))
                        .unwrap_or_else(|| (String::new(), false, 0.0));
                    self.impact = Some(ImpactReport {
                        lat: self.lat,
                        lon: self.lon,
                        elevation_m: sample.elevation_m,
                        speed_mps: speed,
                        energy_kj: 0.5 * self.cfg.mass_kg * speed * speed / 1000.0,
                        material_name: name,
                        material_solid: solid,
                        material_load_resistance: load,
                    });
                    self.dead = true;
                }
            }
        }

        if self.altitude_m < DESTRUCTION_FLOOR_FT * M_PER_FT {
            self.dead = true;
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }

    pub fn altitude_ft(&self) -> f64 {
        self.altitude_m * FT_PER_M
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn pitch_deg(&self) -> f64 {
        self.pitch_deg
    }

    pub fn roll_deg(&self) -> f64 {
        self.roll_deg
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    pub fn vertical_speed_mps(&self) -> f64 {
        self.vertical_speed_mps
    }

    /// Mach-adjusted drag coefficient from the last tick.
    pub fn cd_mach(&self) -> f64 {
        self.cd_mach
    }

    /// Marked for destruction; the owner tears the entity down and releases
    /// any externally registered state synchronously.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// True once impact physics have been captured.
    pub fn impact_data(&self) -> bool {
        self.impact.is_some()
    }

    pub fn impact_report(&self) -> Option<&ImpactReport> {
        self.impact.as_ref()
    }
}
