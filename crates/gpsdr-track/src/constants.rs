//! Receiver-wide constants

pub use gpsdr_nap::units::CA_CHIPPING_RATE as GPS_CA_CHIPPING_RATE;
pub use gpsdr_nap::units::SAMPLE_FREQ;

/// GPS L1 carrier frequency in Hz.
pub const GPS_L1_HZ: f64 = 1.57542e9;

/// Number of GPS satellite PRNs.
pub const MAX_SATS: usize = 32;

/// Milliseconds in one GPS week.
pub const WEEK_MS: u32 = 7 * 24 * 60 * 60 * 1000;
