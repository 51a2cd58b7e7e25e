//! Common types and helpers for the synthetic upstream generators.

use rand::{Rng, rngs::StdRng};

/// A source of hourly energy values, one call per hour in order.
///
/// Implemented by the synthetic PV and mall-load generators so the
/// dataset builder can treat them like any other upstream series.
pub trait HourlySource {
    /// Returns the energy in kWh for hour index `t` (hours since series start).
    fn energy_kwh(&mut self, t: usize) -> f64;

    /// Returns a human-readable name for the source.
    fn label(&self) -> &'static str;
}

/// Half-cosine daylight fraction for hour-of-day `hour`.
///
/// Returns 0.0 outside `[sunrise, sunset)` and peaks at 1.0 mid-way.
pub fn daylight_frac(hour: usize, sunrise: usize, sunset: usize) -> f64 {
    if hour < sunrise || hour >= sunset || sunset <= sunrise {
        return 0.0;
    }
    let span = (sunset - sunrise) as f64;
    // Centre of the hour so the curve is symmetric around solar noon.
    let x = (hour - sunrise) as f64 + 0.5;
    (std::f64::consts::PI * x / span).sin().max(0.0)
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and specified standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
