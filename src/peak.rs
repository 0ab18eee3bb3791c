//! Session peaks of the absolute pack current and power.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Peaks {
    pub current: f32,
    pub power: f32,
}

/// Running maxima, never decreasing for the life of the tracker.
#[derive(Debug, Default)]
pub struct PeakTracker {
    peaks: Peaks,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one successful reading into the peaks and returns the new values.
    /// A NaN reading leaves the peaks untouched.
    pub fn update(&mut self, current: f32, power: f32) -> Peaks {
        self.peaks.current = self.peaks.current.max(current.abs());
        self.peaks.power = self.peaks.power.max(power.abs());
        self.peaks
    }

    pub fn peaks(&self) -> Peaks {
        self.peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(PeakTracker::new().peaks(), Peaks::default());
    }

    #[test]
    fn tracks_absolute_maximum() {
        let mut tracker = PeakTracker::new();
        assert_eq!(tracker.update(5.0, 250.0).current, 5.0);
        let peaks = tracker.update(-12.5, -625.0);
        assert_eq!(peaks.current, 12.5);
        assert_eq!(peaks.power, 625.0);
        assert_eq!(tracker.update(3.0, 150.0), peaks);
    }

    #[test]
    fn never_decreases() {
        let mut tracker = PeakTracker::new();
        let readings = [1.0f32, -4.0, 2.0, 0.0, 7.5, -7.0, f32::NAN, 3.0];
        let mut previous = tracker.peaks();
        for current in readings {
            let peaks = tracker.update(current, current * 50.0);
            assert!(peaks.current >= previous.current);
            assert!(peaks.power >= previous.power);
            previous = peaks;
        }
        assert_eq!(previous.current, 7.5);
        assert_eq!(previous.power, 375.0);
    }
}
