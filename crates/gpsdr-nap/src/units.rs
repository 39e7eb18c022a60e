//! Fixed-point unit system of the NAP track channels
//!
//! The device NCOs do not work in Hz or chips; every word written to or
//! read from a track channel is expressed in the accumulator units below.
//!
//! ```text
//! Code phase (chips * 2^32):
//! |  Chip no.  | Sub-chip | Fractional sub-chip |
//! | 0 ... 1022 | 0 ... 15 |  0 ... (2^28 - 1)   |
//! ```
//!
//! The code NCO adds one `code_phase_rate` word per sample; the nominal
//! rate corresponds to exactly one sub-chip per sample (16 samples per
//! chip at the 16.368 MHz front-end clock). The carrier NCO accumulates
//! `carrier_freq` words into a cycles * 2^24 phase register.

/// Front-end sample clock in Hz.
pub const SAMPLE_FREQ: f64 = 16.368e6;

/// GPS C/A chipping rate the code NCO is scaled against, in chips/s.
pub const CA_CHIPPING_RATE: f64 = 1.023e6;

/// Code phase register units per chip (32.32 fixed point).
pub const CODE_PHASE_UNITS_PER_CHIP: u64 = 1 << 32;

/// Nominal code phase rate word: one sub-chip (1/16 chip) per sample.
pub const NOMINAL_CODE_PHASE_RATE: u32 = 1 << 28;

/// Code phase rate NCO units per Hz of chipping rate.
pub const CODE_PHASE_RATE_UNITS_PER_HZ: f64 =
    NOMINAL_CODE_PHASE_RATE as f64 / CA_CHIPPING_RATE;

/// Carrier frequency NCO units per Hz.
///
/// The carrier phase register accumulates one frequency word per sample
/// into cycles * 2^24, so a frequency of `f` Hz is programmed as
/// `f * 2^24 / SAMPLE_FREQ`.
pub const CARRIER_FREQ_UNITS_PER_HZ: f64 = (1u64 << 24) as f64 / SAMPLE_FREQ;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_code_rate_is_one_subchip_per_sample() {
        // 16 samples per chip and 16 sub-chips per chip: the nominal
        // word must advance the 32.32 register by exactly one sub-chip.
        let samples_per_chip = SAMPLE_FREQ / CA_CHIPPING_RATE;
        assert_eq!(samples_per_chip, 16.0);
        assert_eq!(
            NOMINAL_CODE_PHASE_RATE as u64 * 16,
            CODE_PHASE_UNITS_PER_CHIP
        );
    }

    #[test]
    fn carrier_units_round_trip() {
        let word = (1000.0 * CARRIER_FREQ_UNITS_PER_HZ).round();
        let hz = word / CARRIER_FREQ_UNITS_PER_HZ;
        assert!((hz - 1000.0).abs() < 0.5, "1 kHz must survive quantization");
    }
}
