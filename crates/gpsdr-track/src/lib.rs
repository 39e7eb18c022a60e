//! GPSDR Tracking Core
//!
//! Closes the code and carrier tracking loops around the NAP hardware
//! correlator channels. For every channel the core:
//!
//! - reads the early/prompt/late correlations once per coherent
//!   integration period,
//! - maintains fixed-point code phase, carrier phase and time-of-week,
//! - runs a carrier-aided DLL with an FLL-assisted PLL,
//! - estimates C/N₀, watches for false phase lock, and extracts
//!   navigation bits,
//! - writes fresh NCO words back to the correlator one integration
//!   ahead of when they take effect.
//!
//! ## Signal flow per integration
//!
//! ```text
//! ┌─────────┐  corr_rd   ┌──────────────┐  update_wr  ┌─────────┐
//! │   NAP   │ ─────────→ │ Tracking     │ ──────────→ │   NAP   │
//! │ channel │  E, P, L   │ channel      │  NCO words  │ channel │
//! └─────────┘            │  DLL+PLL/FLL │             └─────────┘
//!                        │  C/N0, nav   │
//!                        └──────┬───────┘
//!                               ↓ export_measurement
//!                        code phase, carrier phase, TOW, C/N0
//! ```
//!
//! The channel bank and its two-stage state machine (1 ms bit-sync
//! stage, then long coherent integrations) live in [`bank`] and
//! [`channel`]; the DSP collaborators in [`loop_filter`], [`cn0`],
//! [`alias`] and [`bit_sync`]; the loop-parameter configuration grammar
//! in [`params`].

pub mod alias;
pub mod bank;
pub mod bit_sync;
pub mod channel;
pub mod cn0;
pub mod constants;
pub mod loop_filter;
pub mod params;
pub mod phase;
pub mod telemetry;

pub use bank::TrackingBank;
pub use channel::{ChannelState, Measurement, Stage, TrackingChannel};
pub use params::{LoopParams, LoopParamsSet, ParseLoopParamsError, DEFAULT_LOOP_PARAMS};
pub use phase::propagate_code_phase;
