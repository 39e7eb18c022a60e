//! NAP Correlator Device Abstraction
//!
//! The NAP (Navigation Acquisition Processor) is the FPGA peripheral that
//! runs the hardware correlator channels of the GPSDR receiver. Each
//! channel mixes the incoming sample stream with a local carrier NCO,
//! despreads it against three taps of a locally generated C/A code
//! (early, prompt, late) and accumulates the complex products over one
//! coherent integration period.
//!
//! This crate provides:
//!
//! - [`CorrelatorDevice`]: the trait through which the tracking core
//!   drives a channel (code programming, NCO updates, correlation
//!   readout, timing strobes)
//! - [`registers`]: the register map of the track-channel block
//! - [`units`]: the fixed-point unit system of the device NCOs
//! - [`CaCode`]: the C/A Gold-code generator used to fill a channel's
//!   code RAM
//! - [`SimNap`]: a software backend for development and unit testing
//!   without hardware
//!
//! # Example
//!
//! ```rust
//! use gpsdr_nap::{CorrelatorDevice, SimNap};
//!
//! let mut nap = SimNap::new(8);
//! nap.code_wr(0, 4); // program channel 0 with PRN 5 (zero-based 4)
//! assert_eq!(nap.n_channels(), 8);
//! ```

pub mod ca_code;
pub mod registers;
pub mod sim;
pub mod traits;
pub mod types;
pub mod units;

pub use ca_code::CaCode;
pub use sim::{NapWrite, SimNap};
pub use traits::CorrelatorDevice;
pub use types::Correlation;
