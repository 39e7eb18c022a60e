//! False phase lock detection
//!
//! A Costas loop can settle on a frequency alias where the phase error
//! is small but the carrier frequency is off by a multiple of the
//! integration rate. The detector compares the prompt from the short
//! first half of a long integration against the mean prompt of the
//! remaining long half: a residual frequency error shows up as a steady
//! rotation between the two snapshots.

use std::f32::consts::PI;

use gpsdr_nap::Correlation;

/// Dot/cross accumulator over first-half/second-half prompt pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AliasDetector {
    /// First-half prompt snapshot, taken at correlation read time.
    pub first: Correlation,
    acc_len: u32,
    count: u32,
    dot: f32,
    cross: f32,
    time_diff_s: f32,
}

impl AliasDetector {
    /// # Arguments
    /// * `acc_len` - Number of half-pairs accumulated per estimate
    /// * `time_diff_s` - Time between the two halves of an integration
    pub fn new(acc_len: u32, time_diff_s: f32) -> Self {
        Self {
            acc_len,
            time_diff_s,
            ..Self::default()
        }
    }

    /// Store the first-half prompt.
    pub fn set_first(&mut self, prompt: Correlation) {
        self.first = prompt;
    }

    /// Fold in the second-half mean prompt. Returns the estimated
    /// frequency error in Hz once per accumulation window, 0.0 in
    /// between.
    pub fn second(&mut self, i: i32, q: i32) -> f32 {
        if self.acc_len == 0 {
            return 0.0;
        }

        let (i, q) = (i as f32, q as f32);
        self.dot += i * self.first.re as f32 + q * self.first.im as f32;
        self.cross += self.first.re as f32 * q - i * self.first.im as f32;
        self.count += 1;

        if self.count < self.acc_len {
            return 0.0;
        }

        let err = self.cross.atan2(self.dot) / (2.0 * PI * self.time_diff_s);
        self.count = 0;
        self.dot = 0.0;
        self.cross = 0.0;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated(mag: f32, cycles: f32) -> (i32, i32) {
        let rad = 2.0 * PI * cycles;
        ((mag * rad.cos()) as i32, (mag * rad.sin()) as i32)
    }

    #[test]
    fn aligned_halves_report_zero_error() {
        let mut det = AliasDetector::new(1, 4e-3);
        det.set_first(Correlation::new(1000, 0));
        let err = det.second(1000, 0);
        assert_eq!(err, 0.0);
    }

    #[test]
    fn hundred_hz_rotation_is_measured() {
        // 100 Hz over a 4 ms half-spacing is 0.4 cycles of rotation.
        let mut det = AliasDetector::new(1, 4e-3);
        det.set_first(Correlation::new(1000, 0));
        let (i, q) = rotated(1000.0, 0.4);
        let err = det.second(i, q);
        assert!((err - 100.0).abs() < 1.0, "got {}", err);
    }

    #[test]
    fn estimate_waits_for_the_accumulation_window() {
        let mut det = AliasDetector::new(3, 4e-3);
        det.set_first(Correlation::new(1000, 0));
        let (i, q) = rotated(1000.0, 0.1);
        assert_eq!(det.second(i, q), 0.0);
        assert_eq!(det.second(i, q), 0.0);
        let err = det.second(i, q);
        assert!((err - 25.0).abs() < 1.0, "got {}", err);
        // The window restarts afterwards.
        assert_eq!(det.second(i, q), 0.0);
    }

    #[test]
    fn negative_rotation_gives_negative_error() {
        let mut det = AliasDetector::new(1, 4e-3);
        det.set_first(Correlation::new(1000, 0));
        let (i, q) = rotated(1000.0, -0.25);
        let err = det.second(i, q);
        assert!((err + 62.5).abs() < 1.0, "got {}", err);
    }
}
