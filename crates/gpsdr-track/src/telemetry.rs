//! Tracking telemetry messages
//!
//! Two fixed-shape messages leave the core: a bank-wide state summary
//! and, per channel and only when enabled, the raw correlator taps.
//! The wire transport behind [`TelemetrySink`] is someone else's
//! problem.

use serde::Serialize;

use gpsdr_nap::Correlation;

/// Per-channel entry of [`TrackingStateMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStateEntry {
    /// 0 = disabled, 1 = running.
    pub state: u8,
    /// Signal id on the wire; currently the zero-based PRN.
    pub sid: u8,
    /// C/N₀ in dB-Hz, -1.0 when the channel is not running.
    pub cn0: f32,
}

/// State of every channel in the bank, always sent as one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingStateMessage {
    pub channels: Vec<ChannelStateEntry>,
}

/// Raw correlator taps of one channel for one integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackingIqMessage {
    pub channel: u8,
    /// Signal id on the wire; currently the zero-based PRN.
    pub sid: u8,
    /// Early, prompt, late.
    pub corrs: [Correlation; 3],
}

/// Consumer of tracking telemetry.
pub trait TelemetrySink {
    fn tracking_state(&mut self, msg: &TrackingStateMessage);
    fn tracking_iq(&mut self, msg: &TrackingIqMessage);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn tracking_state(&mut self, _msg: &TrackingStateMessage) {}
    fn tracking_iq(&mut self, _msg: &TrackingIqMessage) {}
}
