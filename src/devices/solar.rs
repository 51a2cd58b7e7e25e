use crate::devices::types::{HourlySource, daylight_frac, gaussian_noise};
use rand::{SeedableRng, rngs::StdRng};

/// A synthetic rooftop PV array standing in for the PV oracle.
///
/// `SolarPv` creates a half-cosine generation profile between sunrise and
/// sunset with a configurable AC peak and multiplicative noise for cloud
/// cover. Output never exceeds the installed AC capacity and is zero at night.
#[derive(Debug, Clone)]
pub struct SolarPv {
    /// Installed AC capacity in kilowatts (inverter limit).
    pub ac_capacity_kw: f64,

    /// Hour of day when generation starts (inclusive).
    pub sunrise_hour: usize,

    /// Hour of day when generation stops (exclusive).
    pub sunset_hour: usize,

    /// Standard deviation of the multiplicative noise.
    pub noise_std: f64,

    /// Hour of day of series index 0.
    start_hour: usize,

    /// Random number generator for noise generation.
    rng: StdRng,
}

impl SolarPv {
    /// Creates a new synthetic PV array.
    ///
    /// # Arguments
    ///
    /// * `ac_capacity_kw` - Installed AC capacity in kW
    /// * `sunrise_hour` - Hour of day when generation starts (inclusive)
    /// * `sunset_hour` - Hour of day when generation stops (exclusive)
    /// * `noise_std` - Standard deviation of noise (e.g., 0.1 for +/-10% variation)
    /// * `start_hour` - Hour of day of the first series index
    /// * `seed` - Random seed for reproducible noise generation
    ///
    /// # Panics
    ///
    /// Panics if `sunrise_hour >= sunset_hour` or `sunset_hour > 24`.
    pub fn new(
        ac_capacity_kw: f64,
        sunrise_hour: usize,
        sunset_hour: usize,
        noise_std: f64,
        start_hour: usize,
        seed: u64,
    ) -> Self {
        assert!(sunrise_hour < sunset_hour && sunset_hour <= 24);
        Self {
            ac_capacity_kw: ac_capacity_kw.max(0.0),
            sunrise_hour,
            sunset_hour,
            noise_std: noise_std.max(0.0),
            start_hour: start_hour % 24,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl HourlySource for SolarPv {
    /// AC energy over the hour at series index `t`, clipped to the inverter limit.
    fn energy_kwh(&mut self, t: usize) -> f64 {
        let hour = (self.start_hour + t) % 24;
        let frac = daylight_frac(hour, self.sunrise_hour, self.sunset_hour);
        if frac <= 0.0 {
            return 0.0;
        }

        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (self.ac_capacity_kw * frac * noise_mult).clamp(0.0, self.ac_capacity_kw)
    }

    fn label(&self) -> &'static str {
        "SolarPV"
    }
}
