//! Row-aligned hourly table: the canonical dataset in memory.

use chrono::NaiveDateTime;

/// Hourly series for one socket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocketSeries {
    /// Vehicle present during the hour.
    pub available: Vec<bool>,
    /// SOC at hour start. Outside sessions this is 0.
    pub soc: Vec<f64>,
    /// Session target SOC, repeated over every hour of the session.
    pub required_soc: Vec<f64>,
    /// Vehicle leaves at the end of this hour.
    pub departure: Vec<bool>,
}

impl SocketSeries {
    /// An empty socket (no sessions) of `len` hours.
    pub fn idle(len: usize) -> Self {
        Self {
            available: vec![false; len],
            soc: vec![0.0; len],
            required_soc: vec![0.0; len],
            departure: vec![false; len],
        }
    }

    /// True when a new session starts at `t`.
    pub fn arrives_at(&self, t: usize) -> bool {
        self.available.get(t).copied().unwrap_or(false)
            && (t == 0 || !self.available[t - 1] || self.departure[t - 1])
    }

    /// True when the session present at `t` is still present at `t + 1`.
    pub fn continues_after(&self, t: usize) -> bool {
        t + 1 < self.available.len()
            && self.available[t]
            && !self.departure[t]
            && self.available[t + 1]
            && !self.arrives_at(t + 1)
    }
}

/// Column-major canonical table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub pv_kwh: Vec<f64>,
    pub mall_kwh: Vec<f64>,
    pub carbon_intensity: Vec<f64>,
    pub tariff: Vec<f64>,
    pub peak_flag: Vec<bool>,
    /// One entry per socket, in schema charger order.
    pub sockets: Vec<SocketSeries>,
}

impl CanonicalTable {
    /// Number of rows, taken from the timestamp column.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(available: &[bool], departure: &[bool]) -> SocketSeries {
        SocketSeries {
            available: available.to_vec(),
            soc: vec![0.5; available.len()],
            required_soc: vec![1.0; available.len()],
            departure: departure.to_vec(),
        }
    }

    #[test]
    fn back_to_back_sessions_do_not_continue() {
        // session A at 0..=1, session B at 2..=3
        let s = series(&[true, true, true, true], &[false, true, false, true]);
        assert!(s.arrives_at(0));
        assert!(s.continues_after(0));
        assert!(!s.continues_after(1));
        assert!(s.arrives_at(2));
        assert!(!s.continues_after(3));
    }

    #[test]
    fn gap_starts_new_session() {
        let s = series(&[true, false, true], &[true, false, true]);
        assert!(s.arrives_at(2));
        assert!(!s.continues_after(0));
    }
}
