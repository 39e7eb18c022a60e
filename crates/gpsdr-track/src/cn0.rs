//! Carrier-to-noise density estimation
//!
//! First-difference estimator: at phase lock the in-phase prompt holds
//! signal plus noise and differencing consecutive magnitudes cancels the
//! (slowly varying) signal, leaving a noise sample. The noise-to-signal
//! ratio is smoothed with a one-pole low-pass and reported against the
//! estimator bandwidth in dB-Hz.

use std::f32::consts::PI;

/// Running C/N₀ estimate over the prompt correlations of one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cn0Estimator {
    /// Estimator bandwidth in dB.
    log_bw: f32,
    /// One-pole smoothing coefficient.
    alpha: f32,
    /// Smoothed noise-to-signal ratio.
    nsr: f32,
    prev_abs_i: Option<f32>,
}

impl Cn0Estimator {
    /// Create an estimator seeded at `cn0_init` dB-Hz.
    ///
    /// # Arguments
    /// * `bw_hz` - Estimator bandwidth (the coherent integration rate)
    /// * `cn0_init` - Starting estimate in dB-Hz
    /// * `cutoff_hz` - Low-pass cutoff for the noise-to-signal ratio
    /// * `loop_freq_hz` - Update rate
    pub fn new(bw_hz: f32, cn0_init: f32, cutoff_hz: f32, loop_freq_hz: f32) -> Self {
        let log_bw = 10.0 * bw_hz.log10();
        Self {
            log_bw,
            alpha: 1.0 - (-2.0 * PI * cutoff_hz / loop_freq_hz).exp(),
            nsr: 10f32.powf(0.1 * (log_bw - cn0_init)),
            prev_abs_i: None,
        }
    }

    /// Fold in one prompt correlation (normalized per millisecond) and
    /// return the current estimate in dB-Hz.
    pub fn update(&mut self, i: f32, _q: f32) -> f32 {
        if let Some(prev) = self.prev_abs_i.replace(i.abs()) {
            let p_n = (i.abs() - prev) * (i.abs() - prev);
            let p_s = 0.5 * (i * i + prev * prev);
            if p_s > 0.0 {
                self.nsr += self.alpha * (p_n / p_s - self.nsr);
            }
        }
        self.log_bw - 10.0 * self.nsr.max(1e-10).log10()
    }
}
