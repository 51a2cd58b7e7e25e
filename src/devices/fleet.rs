use crate::devices::charger::{Charger, ChargerClass};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// One sampled charging session on one socket.
///
/// `arrival` and `departure` are series indices; the vehicle is present
/// from `arrival` through `departure` inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub socket: usize,
    pub arrival: usize,
    pub departure: usize,
    pub soc_start: f64,
    pub required_soc: f64,
}

/// Random daily session sampler for a fleet of sockets.
///
/// Each simulated day, every socket gets at most one session with:
/// - a random arrival hour in `[arrival_min_hour, arrival_max_hour]`
/// - a random dwell of `dwell_min..=dwell_max` hours (which sets departure)
/// - a random arrival SOC and required SOC
///
/// Sessions that would run past the end of the series are dropped.
#[derive(Debug, Clone)]
pub struct FleetSampler {
    /// Earliest arrival hour of day.
    pub arrival_min_hour: usize,

    /// Latest arrival hour of day.
    pub arrival_max_hour: usize,

    /// Minimum dwell in hours (>= 1).
    pub dwell_min: usize,

    /// Maximum dwell in hours.
    pub dwell_max: usize,

    /// Range of SOC on arrival.
    pub soc_start: (f64, f64),

    /// Range of SOC required at departure.
    pub required_soc: (f64, f64),

    /// Probability that a socket sees a session on a given day.
    pub occupancy: f64,

    rng: StdRng,
}

impl FleetSampler {
    /// Creates a sampler with the mall site's session statistics.
    pub fn new(seed: u64) -> Self {
        Self {
            arrival_min_hour: 9,
            arrival_max_hour: 20,
            dwell_min: 1,
            dwell_max: 4,
            soc_start: (0.2, 0.6),
            required_soc: (0.8, 1.0),
            occupancy: 0.85,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Samples sessions for `socket_count` sockets over `hours` series steps.
    ///
    /// `start_hour` is the hour of day of series index 0.
    ///
    /// # Panics
    ///
    /// Panics if the dwell or arrival ranges are empty.
    pub fn sample(&mut self, socket_count: usize, hours: usize, start_hour: usize) -> Vec<Session> {
        assert!(self.dwell_min >= 1 && self.dwell_max >= self.dwell_min);
        assert!(self.arrival_min_hour <= self.arrival_max_hour && self.arrival_max_hour < 24);

        let start_hour = start_hour % 24;
        // Day 0 starts at midnight before index 0; shift so indices line up.
        let days = (hours + start_hour).div_ceil(24);
        let mut sessions = Vec::new();

        for day in 0..days {
            for socket in 0..socket_count {
                if !self.rng.random_bool(self.occupancy.clamp(0.0, 1.0)) {
                    continue;
                }
                let arrival_hod = self
                    .rng
                    .random_range(self.arrival_min_hour..=self.arrival_max_hour);
                let dwell = self.rng.random_range(self.dwell_min..=self.dwell_max);
                let soc_start = self.rng.random_range(self.soc_start.0..=self.soc_start.1);
                let required_soc = self
                    .rng
                    .random_range(self.required_soc.0..=self.required_soc.1);

                let absolute = day * 24 + arrival_hod;
                if absolute < start_hour {
                    continue;
                }
                let arrival = absolute - start_hour;
                let departure = arrival + dwell - 1;
                if departure >= hours {
                    continue;
                }

                sessions.push(Session {
                    socket,
                    arrival,
                    departure,
                    soc_start,
                    required_soc: required_soc.max(soc_start),
                });
            }
        }

        sessions
    }
}

/// Builds a fleet of sockets with class defaults: `moto` sockets first, then `mototaxi`.
///
/// Ids are `moto_000`, `moto_001`, ..., `mototaxi_000`, ...
pub fn fleet_layout(moto: usize, mototaxi: usize) -> Vec<Charger> {
    let motos = (0..moto).map(|i| Charger::with_class_defaults(format!("moto_{i:03}"), ChargerClass::Moto));
    let taxis = (0..mototaxi)
        .map(|i| Charger::with_class_defaults(format!("mototaxi_{i:03}"), ChargerClass::Mototaxi));
    motos.chain(taxis).collect()
}
