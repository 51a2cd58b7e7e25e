use crate::devices::types::{HourlySource, gaussian_noise};
use rand::{SeedableRng, rngs::StdRng};

/// A synthetic shopping-mall load with opening hours and an evening peak.
///
/// Outside opening hours the mall draws `night_kwh`. While open the load
/// rises as a half sine from `open_base_kwh` to `open_base_kwh + peak_extra_kwh`
/// with its crest at `peak_hour`, plus Gaussian noise.
#[derive(Debug, Clone)]
pub struct MallLoad {
    /// Load while closed (kWh per hour).
    pub night_kwh: f64,

    /// Load floor while open (kWh per hour).
    pub open_base_kwh: f64,

    /// Additional load at the crest (kWh per hour).
    pub peak_extra_kwh: f64,

    /// Opening hour (inclusive).
    pub open_hour: usize,

    /// Closing hour (exclusive).
    pub close_hour: usize,

    /// Hour of day at which the load crests.
    pub peak_hour: usize,

    /// Standard deviation of the Gaussian noise (kWh).
    pub noise_std: f64,

    start_hour: usize,
    rng: StdRng,
}

impl MallLoad {
    /// Creates a new mall load generator.
    ///
    /// # Panics
    ///
    /// Panics if the opening window is empty or `peak_hour` lies outside it.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        night_kwh: f64,
        open_base_kwh: f64,
        peak_extra_kwh: f64,
        open_hour: usize,
        close_hour: usize,
        peak_hour: usize,
        noise_std: f64,
        start_hour: usize,
        seed: u64,
    ) -> Self {
        assert!(open_hour < close_hour && close_hour <= 24);
        assert!((open_hour..close_hour).contains(&peak_hour));
        Self {
            night_kwh: night_kwh.max(0.0),
            open_base_kwh: open_base_kwh.max(0.0),
            peak_extra_kwh: peak_extra_kwh.max(0.0),
            open_hour,
            close_hour,
            peak_hour,
            noise_std: noise_std.max(0.0),
            start_hour: start_hour % 24,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn shape(&self, hour: usize) -> f64 {
        if hour < self.open_hour || hour >= self.close_hour {
            return 0.0;
        }
        // Rise from opening to the crest, fall from the crest to closing.
        let h = hour as f64;
        let (from, to) = if hour <= self.peak_hour {
            (self.open_hour as f64, self.peak_hour as f64)
        } else {
            (self.close_hour as f64, self.peak_hour as f64)
        };
        if (to - from).abs() < f64::EPSILON {
            return 1.0;
        }
        let x = ((h - from) / (to - from)).clamp(0.0, 1.0);
        (x * std::f64::consts::FRAC_PI_2).sin()
    }
}

impl HourlySource for MallLoad {
    fn energy_kwh(&mut self, t: usize) -> f64 {
        let hour = (self.start_hour + t) % 24;
        let noise = gaussian_noise(&mut self.rng, self.noise_std);
        let base = if hour < self.open_hour || hour >= self.close_hour {
            self.night_kwh
        } else {
            self.open_base_kwh + self.peak_extra_kwh * self.shape(hour)
        };
        (base + noise).max(0.0) // no negative demand
    }

    fn label(&self) -> &'static str {
        "MallLoad"
    }
}
