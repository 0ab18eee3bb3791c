//! Energy throughput integrated over wall-clock time.

use std::time::{Duration, Instant};

/// Integrates pack power between successful polls.
///
/// The total is signed: charging adds energy, discharging removes it. The first
/// sample is held over the time since the meter was created.
#[derive(Debug)]
pub struct EnergyMeter {
    started: Instant,
    last_sample: Option<Instant>,
    total_wh: f64,
}

impl EnergyMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(started: Instant) -> Self {
        Self {
            started,
            last_sample: None,
            total_wh: 0.0,
        }
    }

    /// Accounts `power_w` over the time since the previous sample.
    pub fn sample(&mut self, power_w: f32, now: Instant) -> f64 {
        let since = self.last_sample.unwrap_or(self.started);
        self.accumulate(power_w, now.saturating_duration_since(since));
        self.last_sample = Some(now);
        self.total_wh
    }

    /// Accounts `power_w` held constant over `interval`.
    pub fn accumulate(&mut self, power_w: f32, interval: Duration) -> f64 {
        if power_w.is_finite() {
            self.total_wh += f64::from(power_w) * interval.as_secs_f64() / 3600.0;
        }
        self.total_wh
    }

    pub fn total_wh(&self) -> f64 {
        self.total_wh
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

impl Default for EnergyMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// `HH:MM:SS`, hours keep counting past a day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_watt_hours() {
        let mut meter = EnergyMeter::new();
        meter.accumulate(100.0, Duration::from_secs(1800));
        assert!((meter.total_wh() - 50.0).abs() < 1e-9);
        meter.accumulate(-200.0, Duration::from_secs(900));
        assert!(meter.total_wh().abs() < 1e-9);
    }

    #[test]
    fn samples_use_wall_clock() {
        let start = Instant::now();
        let mut meter = EnergyMeter::starting_at(start);
        meter.sample(360.0, start + Duration::from_secs(10));
        let total = meter.sample(360.0, start + Duration::from_secs(20));
        assert!((total - 2.0).abs() < 1e-9);
        assert_eq!(meter.elapsed(start + Duration::from_secs(20)).as_secs(), 20);
    }

    #[test]
    fn first_sample_counts_from_start() {
        let start = Instant::now();
        let mut meter = EnergyMeter::starting_at(start);
        let total = meter.sample(360.0, start + Duration::from_secs(10));
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ignores_non_finite_power() {
        let mut meter = EnergyMeter::new();
        meter.accumulate(f32::NAN, Duration::from_secs(60));
        meter.accumulate(f32::INFINITY, Duration::from_secs(60));
        assert_eq!(meter.total_wh(), 0.0);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }
}
