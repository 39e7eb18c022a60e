//! The tracking bank
//!
//! Owns the correlator device, the per-channel tracking state, the live
//! loop parameters and the PRN lock-counter table. These aggregates are
//! initialized at boot and live for the life of the receiver.
//!
//! ## Execution contexts
//!
//! [`fetch_correlations`](TrackingBank::fetch_correlations) and
//! [`update`](TrackingBank::update) run in the per-channel completion
//! interrupt and must finish before the channel's next integration
//! ends. Everything else runs in the foreground; the embedding is
//! responsible for masking a channel's interrupt around foreground
//! calls that touch it. The lock-counter table is atomic so
//! [`mark_ambiguous`](TrackingBank::mark_ambiguous) is safe from either
//! context.

use std::sync::atomic::{AtomicU16, Ordering};

use rand::Rng;

use gpsdr_nap::CorrelatorDevice;

use crate::channel::{ChannelState, Measurement, TrackingChannel};
use crate::constants::MAX_SATS;
use crate::params::{LoopParamsSet, ParseLoopParamsError};
use crate::telemetry::{ChannelStateEntry, TelemetrySink, TrackingStateMessage};

/// The bank of tracking channels behind one correlator device.
pub struct TrackingBank<D: CorrelatorDevice> {
    nap: D,
    channels: Vec<TrackingChannel>,
    loop_params: LoopParamsSet,
    /// Map of PRN to a number that increments each time that PRN begins
    /// being tracked or loses its carrier-phase ambiguity. Starts at
    /// random values.
    lock_counters: [AtomicU16; MAX_SATS],
}

impl<D: CorrelatorDevice> TrackingBank<D> {
    /// Build a bank sized to the device's channel count.
    pub fn new(nap: D) -> Self {
        let mut rng = rand::thread_rng();
        let n = nap.n_channels();
        Self {
            nap,
            channels: (0..n).map(|_| TrackingChannel::default()).collect(),
            loop_params: LoopParamsSet::default(),
            lock_counters: std::array::from_fn(|_| AtomicU16::new(rng.gen())),
        }
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, channel: u8) -> &TrackingChannel {
        &self.channels[channel as usize]
    }

    /// Start a channel from an acquisition hand-off.
    pub fn init_channel(
        &mut self,
        channel: u8,
        prn: u8,
        carrier_freq: f64,
        start_sample_count: u32,
        cn0_init: f32,
    ) {
        let lock_counter = self.bump_lock_counter(prn);
        self.channels[channel as usize].init(
            channel,
            prn,
            carrier_freq,
            start_sample_count,
            cn0_init,
            &self.loop_params,
            lock_counter,
            &mut self.nap,
        );
    }

    /// ISR entry: read the completed integration of a channel.
    pub fn fetch_correlations(&mut self, channel: u8) {
        self.channels[channel as usize].fetch_correlations(channel, &mut self.nap);
    }

    /// ISR entry: close the loops and reprogram a channel.
    pub fn update(&mut self, channel: u8, telemetry: &mut dyn TelemetrySink) {
        self.channels[channel as usize].update(
            channel,
            &self.loop_params,
            &mut self.nap,
            telemetry,
        );
    }

    /// Stop a channel.
    pub fn disable(&mut self, channel: u8) {
        self.channels[channel as usize].disable(channel, &mut self.nap);
    }

    /// Mark a channel's carrier-phase ambiguity as lost: the nav
    /// decoder forgets its bit polarity and the PRN's lock counter
    /// advances. Call on a suspected cycle slip.
    pub fn mark_ambiguous(&mut self, channel: u8) {
        let prn = self.channels[channel as usize].prn;
        let lock_counter = self.bump_lock_counter(prn);
        self.channels[channel as usize].set_ambiguous(lock_counter);
    }

    fn bump_lock_counter(&self, prn: u8) -> u16 {
        self.lock_counters[prn as usize]
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }

    /// Current lock counter of a PRN.
    pub fn lock_counter(&self, prn: u8) -> u16 {
        self.lock_counters[prn as usize].load(Ordering::Relaxed)
    }

    /// Snapshot a channel for the navigation pipeline.
    pub fn measurement(&self, channel: u8) -> Measurement {
        self.channels[channel as usize].measurement()
    }

    /// Current C/N₀ of a channel in dB-Hz.
    pub fn snr(&self, channel: u8) -> f32 {
        self.channels[channel as usize].snr()
    }

    /// Testing aid: clobber the code frequency of every channel
    /// tracking `prn` so its correlations collapse. The channel manager
    /// notices the dropped SNR and disables the channel.
    pub fn drop_satellite(&mut self, prn: u8) {
        for ch in &mut self.channels {
            if ch.prn != prn {
                continue;
            }
            ch.tl.code_filt.y += 500.0;
        }
    }

    /// Replace the live loop parameters from a `track.loop_params`
    /// string. Rejection leaves the live parameters untouched.
    pub fn set_loop_params(&mut self, val: &str) -> Result<(), ParseLoopParamsError> {
        match val.parse::<LoopParamsSet>() {
            Ok(parsed) => {
                self.loop_params = parsed;
                Ok(())
            }
            Err(err) => {
                tracing::error!("rejected loop parameter string: {}", err);
                Err(err)
            }
        }
    }

    pub fn loop_params(&self) -> &LoopParamsSet {
        &self.loop_params
    }

    /// Emit the bank-wide tracking state message.
    pub fn send_state(&self, telemetry: &mut dyn TelemetrySink) {
        let channels = self
            .channels
            .iter()
            .map(|ch| ChannelStateEntry {
                state: ch.state as u8,
                sid: ch.prn,
                cn0: if ch.state == ChannelState::Running {
                    ch.cn0
                } else {
                    -1.0
                },
            })
            .collect();
        telemetry.tracking_state(&TrackingStateMessage { channels });
    }

    pub fn device(&self) -> &D {
        &self.nap
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.nap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_sync::BitPolarity;
    use crate::telemetry::{TrackingIqMessage, TrackingStateMessage};
    use gpsdr_nap::SimNap;

    struct CollectState(Vec<TrackingStateMessage>);

    impl TelemetrySink for CollectState {
        fn tracking_state(&mut self, msg: &TrackingStateMessage) {
            self.0.push(msg.clone());
        }
        fn tracking_iq(&mut self, _msg: &TrackingIqMessage) {}
    }

    fn bank() -> TrackingBank<SimNap> {
        TrackingBank::new(SimNap::new(4))
    }

    #[test]
    fn bank_is_sized_to_the_device() {
        assert_eq!(bank().n_channels(), 4);
    }

    #[test]
    fn init_advances_the_prn_lock_counter() {
        let mut bank = bank();
        let before = bank.lock_counter(9);
        bank.init_channel(0, 9, 500.0, 32_000, 38.0);

        assert_eq!(bank.lock_counter(9), before.wrapping_add(1));
        assert_eq!(bank.channel(0).lock_counter(), bank.lock_counter(9));
        // Code, init, update and strobe writes all reached the device.
        assert_eq!(bank.device().writes().len(), 4);
    }

    #[test]
    fn mark_ambiguous_bumps_and_copies_the_counter() {
        let mut bank = bank();
        bank.init_channel(0, 9, 500.0, 32_000, 38.0);
        let before = bank.lock_counter(9);

        bank.mark_ambiguous(0);

        assert_eq!(bank.lock_counter(9), before.wrapping_add(1));
        assert_eq!(bank.channel(0).lock_counter(), bank.lock_counter(9));
        assert_eq!(bank.channel(0).nav_msg.bit_polarity, BitPolarity::Unknown);
    }

    #[test]
    fn counters_are_independent_per_prn() {
        let mut bank = bank();
        let other = bank.lock_counter(3);
        bank.init_channel(0, 9, 500.0, 32_000, 38.0);
        assert_eq!(bank.lock_counter(3), other);
    }

    #[test]
    fn send_state_reports_every_channel() {
        let mut bank = bank();
        bank.init_channel(1, 9, 500.0, 32_000, 38.0);

        let mut sink = CollectState(Vec::new());
        bank.send_state(&mut sink);

        assert_eq!(sink.0.len(), 1);
        let msg = &sink.0[0];
        assert_eq!(msg.channels.len(), 4);
        assert_eq!(msg.channels[0].state, 0);
        assert_eq!(msg.channels[0].cn0, -1.0);
        assert_eq!(msg.channels[1].state, 1);
        assert_eq!(msg.channels[1].sid, 9);
        assert_eq!(msg.channels[1].cn0, 38.0);
    }

    #[test]
    fn drop_satellite_clobbers_the_code_filter() {
        let mut bank = bank();
        bank.init_channel(0, 9, 500.0, 32_000, 38.0);
        let before = bank.channel(0).tl.code_filt.y;

        bank.drop_satellite(9);
        assert_eq!(bank.channel(0).tl.code_filt.y, before + 500.0);

        // Channels on other PRNs are left alone.
        bank.init_channel(1, 5, 0.0, 48_000, 40.0);
        let untouched = bank.channel(1).tl.code_filt.y;
        bank.drop_satellite(9);
        assert_eq!(bank.channel(1).tl.code_filt.y, untouched);
    }

    #[test]
    fn rejected_loop_params_leave_the_live_set_unchanged() {
        let mut bank = bank();
        let live = *bank.loop_params();

        let err = bank.set_loop_params("(2 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5))");
        assert!(err.is_err());
        assert_eq!(*bank.loop_params(), live);

        let err = bank.set_loop_params("not a loop param string");
        assert!(err.is_err());
        assert_eq!(*bank.loop_params(), live);
    }

    #[test]
    fn accepted_loop_params_replace_the_live_set() {
        let mut bank = bank();
        bank.set_loop_params(
            "(1 ms, (2, 0.7, 1, 1540), (12, 0.7, 1, 5)), (10 ms, (2, 0.7, 1, 1540), (30, 0.7, 1, 0))",
        )
        .unwrap();
        assert_eq!(bank.loop_params().stages[1].coherent_ms, 10);
        assert_eq!(bank.loop_params().stages[0].code_bw, 2.0);
    }

    #[test]
    fn measurement_comes_from_the_requested_channel() {
        let mut bank = bank();
        bank.init_channel(2, 7, 250.0, 64_000, 42.0);
        let meas = bank.measurement(2);
        assert_eq!(meas.prn, 7);
        assert_eq!(meas.snr, 42.0);
        assert_eq!(meas.tow_ms, None);
    }
}
