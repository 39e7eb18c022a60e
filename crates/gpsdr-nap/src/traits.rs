//! Correlator device trait definition

use crate::types::Correlation;

/// Trait for the NAP track-channel peripheral
///
/// This is the seam between the tracking core and the hardware: the core
/// only ever talks to a channel through these six operations. Register
/// writes are pipelined inside the device; a word written with
/// [`update_wr`](CorrelatorDevice::update_wr) takes effect on the
/// integration after the one currently in flight.
///
/// All operations are infallible from the caller's point of view.
/// Implementations retry or busy-wait on the device internally; a write
/// that cannot be delivered is a hardware fault the tracking core cannot
/// meaningfully react to within its deadline.
pub trait CorrelatorDevice {
    /// Number of track channels this device build provides.
    fn n_channels(&self) -> usize;

    /// Program a channel's code RAM with the C/A code for a PRN.
    ///
    /// # Arguments
    /// * `channel` - Track channel number
    /// * `prn` - Satellite PRN, zero-based
    fn code_wr(&mut self, channel: u8, prn: u8);

    /// Set a channel's starting code and carrier phase.
    ///
    /// Takes effect when the timing strobe fires.
    fn init_wr(&mut self, channel: u8, prn: u8, code_phase: u32, carrier_phase: u32);

    /// Write new NCO words for the next-but-one integration.
    ///
    /// # Arguments
    /// * `carrier_freq_fp` - Carrier NCO word ([`units::CARRIER_FREQ_UNITS_PER_HZ`](crate::units::CARRIER_FREQ_UNITS_PER_HZ))
    /// * `code_phase_rate_fp` - Code NCO word ([`units::CODE_PHASE_RATE_UNITS_PER_HZ`](crate::units::CODE_PHASE_RATE_UNITS_PER_HZ))
    /// * `length_code` - Extra code periods to integrate over beyond the
    ///   pipelined pair (0 for 1 ms integrations, `int_ms - 2` otherwise)
    /// * `flags` - Device control flags, currently unused
    fn update_wr(
        &mut self,
        channel: u8,
        carrier_freq_fp: i32,
        code_phase_rate_fp: u32,
        length_code: u8,
        flags: u8,
    );

    /// Read the completed integration from a channel.
    ///
    /// Returns the number of samples consumed and the early, prompt and
    /// late complex accumulations, in that order.
    fn corr_rd(&mut self, channel: u8) -> (u32, [Correlation; 3]);

    /// Arm the timing strobe to start pending channels at `sample_count`.
    fn timing_strobe(&mut self, sample_count: u32);
}
