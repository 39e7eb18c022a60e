//! Aided tracking loop (DLL + PLL/FLL)
//!
//! One loop pair per channel: a carrier loop (Costas PLL with an FLL
//! aiding term for pull-in) and a code loop (early-late DLL) whose rate
//! is aided by the carrier frequency estimate scaled down by the
//! carrier-to-code ratio.
//!
//! ```text
//!        prompt ──→ Costas ─┐
//!  prompt, prev ──→ freq ───┴→ [ carr_filt ] ──→ carr_freq
//!                                                   │ / carr_to_code
//!   early, late ──→ E-L ─────→ [ code_filt ] ──(+)──→ code_freq
//! ```
//!
//! Both filters are bilinear-transform PI sections. Their `y` history
//! holds the steered frequency directly, and is public on purpose: the
//! false-lock corrector snaps `carr_filt.y` onto the corrected carrier
//! frequency so the integrator does not fight the jump, and the
//! drop-satellite test aid clobbers `code_filt.y`.

use std::f32::consts::PI;

use gpsdr_nap::Correlation;

use crate::params::LoopParams;

/// Proportional and integral gains for a loop bandwidth, damping ratio,
/// discriminator gain and update rate.
fn loop_gains(bw: f32, zeta: f32, k: f32, loop_freq: f32) -> (f32, f32) {
    let omega_n = bw * 8.0 * zeta / (4.0 * zeta * zeta + 1.0);
    let pgain = 2.0 * zeta * omega_n / k;
    let igain = omega_n * omega_n / (k * loop_freq);
    (pgain, igain)
}

/// Bilinear-transform PI loop filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleLoopFilter {
    pgain: f32,
    igain: f32,
    /// Filter history; holds the currently steered frequency.
    pub y: f32,
    prev_error: f32,
}

impl SimpleLoopFilter {
    pub fn new(y0: f32, pgain: f32, igain: f32) -> Self {
        Self {
            pgain,
            igain,
            y: y0,
            prev_error: 0.0,
        }
    }

    /// Swap in new gains; the integrator state carries over.
    pub fn retune(&mut self, pgain: f32, igain: f32) {
        self.pgain = pgain;
        self.igain = igain;
    }

    pub fn update(&mut self, error: f32) -> f32 {
        self.y += self.pgain * (error - self.prev_error) + self.igain * error;
        self.prev_error = error;
        self.y
    }
}

/// PI loop filter with an extra frequency-aiding integrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AidedLoopFilter {
    pgain: f32,
    igain: f32,
    aiding_igain: f32,
    /// Filter history; holds the currently steered frequency.
    pub y: f32,
    prev_error: f32,
}

impl AidedLoopFilter {
    pub fn new(y0: f32, pgain: f32, igain: f32, aiding_igain: f32) -> Self {
        Self {
            pgain,
            igain,
            aiding_igain,
            y: y0,
            prev_error: 0.0,
        }
    }

    pub fn retune(&mut self, pgain: f32, igain: f32, aiding_igain: f32) {
        self.pgain = pgain;
        self.igain = igain;
        self.aiding_igain = aiding_igain;
    }

    pub fn update(&mut self, phase_error: f32, freq_error: f32) -> f32 {
        self.y += self.pgain * (phase_error - self.prev_error)
            + self.igain * phase_error
            + self.aiding_igain * freq_error;
        self.prev_error = phase_error;
        self.y
    }
}

/// Costas discriminator: phase error in cycles, insensitive to the
/// navigation-bit sign.
fn costas_discriminator(prompt: Correlation) -> f32 {
    if prompt.re == 0 {
        return 0.0;
    }
    (prompt.im as f32 / prompt.re as f32).atan() / (2.0 * PI)
}

/// Frequency discriminator between consecutive prompts: rotation in
/// cycles per update, insensitive to the navigation-bit sign.
fn frequency_discriminator(prompt: Correlation, prev: Correlation) -> f32 {
    let mut dot = prompt.re as f32 * prev.re as f32 + prompt.im as f32 * prev.im as f32;
    let mut cross = prev.re as f32 * prompt.im as f32 - prompt.re as f32 * prev.im as f32;
    // A bit flip negates both products; fold it out.
    if dot < 0.0 {
        dot = -dot;
        cross = -cross;
    }
    cross.atan2(dot) / (2.0 * PI)
}

/// Normalized early-minus-late power discriminator: code error in chips.
fn dll_discriminator(early: Correlation, late: Correlation) -> f32 {
    let early_mag = ((early.re as f32).powi(2) + (early.im as f32).powi(2)).sqrt();
    let late_mag = ((late.re as f32).powi(2) + (late.im as f32).powi(2)).sqrt();
    if early_mag + late_mag == 0.0 {
        return 0.0;
    }
    0.5 * (early_mag - late_mag) / (early_mag + late_mag)
}

/// Carrier-aided DLL with FLL-assisted PLL.
#[derive(Debug, Clone, Copy, Default)]
pub struct AidedTrackingLoop {
    /// Carrier loop filter; `y` is the carrier frequency in Hz.
    pub carr_filt: AidedLoopFilter,
    /// Code loop filter; `y` is the unaided code Doppler in chips/s.
    pub code_filt: SimpleLoopFilter,
    /// Current carrier frequency (Doppler) estimate in Hz.
    pub carr_freq: f32,
    /// Current code frequency offset from the nominal chipping rate, in
    /// chips/s.
    pub code_freq: f32,
    loop_freq: f32,
    /// Carrier-to-code aiding factor (1 / carr_to_code, 0 = disabled).
    code_aiding: f32,
    prev_prompt: Correlation,
}

impl AidedTrackingLoop {
    /// Set up the loop pair around an initial code Doppler and carrier
    /// frequency, with the given stage coefficients.
    pub fn new(code_freq: f32, carr_freq: f32, params: &LoopParams) -> Self {
        let loop_freq = 1e3 / params.coherent_ms as f32;
        let (code_pgain, code_igain) =
            loop_gains(params.code_bw, params.code_zeta, params.code_k, loop_freq);
        let (carr_pgain, carr_igain) =
            loop_gains(params.carr_bw, params.carr_zeta, params.carr_k, loop_freq);
        let code_aiding = aiding_factor(params.carr_to_code);

        Self {
            carr_filt: AidedLoopFilter::new(
                carr_freq,
                carr_pgain,
                carr_igain,
                params.carr_fll_aid_gain / loop_freq,
            ),
            // The filter holds the unaided residual; the carrier-derived
            // share of the code Doppler re-enters at update time.
            code_filt: SimpleLoopFilter::new(
                code_freq - code_aiding * carr_freq,
                code_pgain,
                code_igain,
            ),
            carr_freq,
            code_freq,
            loop_freq,
            code_aiding,
            prev_prompt: Correlation::new(0, 0),
        }
    }

    /// Recompute coefficients for a new stage; integrator state and the
    /// current frequency estimates survive.
    pub fn retune(&mut self, params: &LoopParams) {
        let loop_freq = 1e3 / params.coherent_ms as f32;
        let (code_pgain, code_igain) =
            loop_gains(params.code_bw, params.code_zeta, params.code_k, loop_freq);
        let (carr_pgain, carr_igain) =
            loop_gains(params.carr_bw, params.carr_zeta, params.carr_k, loop_freq);

        self.carr_filt
            .retune(carr_pgain, carr_igain, params.carr_fll_aid_gain / loop_freq);
        self.code_filt.retune(code_pgain, code_igain);
        self.loop_freq = loop_freq;
        self.code_aiding = aiding_factor(params.carr_to_code);
    }

    /// Advance both loops by one integration.
    ///
    /// The correlation triple arrives late-first: `[late, prompt, early]`.
    pub fn update(&mut self, cs: &[Correlation; 3]) {
        let late = cs[0];
        let prompt = cs[1];
        let early = cs[2];

        let phase_error = costas_discriminator(prompt);
        let freq_error = frequency_discriminator(prompt, self.prev_prompt) * self.loop_freq;
        self.prev_prompt = prompt;
        self.carr_freq = self.carr_filt.update(phase_error, freq_error);

        let code_error = dll_discriminator(early, late);
        self.code_freq = self.code_filt.update(code_error) + self.code_aiding * self.carr_freq;
    }
}

fn aiding_factor(carr_to_code: f32) -> f32 {
    if carr_to_code > 0.0 {
        1.0 / carr_to_code
    } else {
        0.0
    }
}
