//! Register definitions for the NAP track-channel block

/// Track-channel register block
///
/// Each channel occupies one `CHANNEL_STRIDE`-sized window starting at
/// `BASE`. All registers are 32 bit.
pub mod track {
    /// Base address of channel 0
    pub const BASE: usize = 0x0400;
    /// Address stride between adjacent channels
    pub const CHANNEL_STRIDE: usize = 0x40;

    /// Code RAM write port (1023 chips, one bit per chip)
    pub const CODE: usize = 0x00;
    /// Initial code phase register
    pub const INIT_CODE: usize = 0x04;
    /// Initial carrier phase register
    pub const INIT_CARR: usize = 0x08;
    /// NCO update register: carrier frequency word
    pub const UPDATE_CARR: usize = 0x0C;
    /// NCO update register: code phase rate word
    pub const UPDATE_CODE: usize = 0x10;
    /// NCO update register: integration length and flags
    pub const UPDATE_LEN: usize = 0x14;
    /// Correlation readout base (sample count, then E/P/L I and Q)
    pub const CORR: usize = 0x18;
    /// Status register
    pub const STATUS: usize = 0x30;

    // Status bits
    pub const STATUS_READY: u32 = 1 << 0;
    pub const STATUS_RUNNING: u32 = 1 << 1;
    pub const STATUS_OVERRUN: u32 = 1 << 2;

    /// Width of the carrier frequency NCO word (signed)
    pub const CARRIER_FREQ_WIDTH: u32 = 24;
    /// Width of the code phase rate NCO word (unsigned)
    pub const CODE_PHASE_RATE_WIDTH: u32 = 29;
}

/// Timing block
///
/// The timing strobe arms the correlator to start a set of channels at
/// an exact future sample count.
pub mod timing {
    /// Base address of the timing block
    pub const BASE: usize = 0x0200;

    /// Strobe compare register (sample count)
    pub const COMPARE: usize = 0x00;
    /// Control register
    pub const CTRL: usize = 0x04;

    // Control bits
    pub const CTRL_ARM: u32 = 1 << 0;
    pub const CTRL_CANCEL: u32 = 1 << 31;
}

/// Address of a track-channel register
pub fn track_reg(channel: u8, offset: usize) -> usize {
    track::BASE + channel as usize * track::CHANNEL_STRIDE + offset
}
