//! Per-channel tracking state machine
//!
//! One [`TrackingChannel`] per hardware correlator channel. The channel
//! is driven from the correlator's completion interrupt:
//! [`fetch_correlations`](TrackingChannel::fetch_correlations) first,
//! then [`update`](TrackingChannel::update), both to completion before
//! the next integration ends.
//!
//! Two stages:
//!
//! - **Bit sync**: 1 ms integrations until the navigation bit edges are
//!   known.
//! - **Long coherent**: `int_ms` integrations, run as a 1 ms short
//!   cycle followed by an `int_ms - 1` ms long cycle. NCO writes take
//!   effect one integration late, so the loop filter only runs when the
//!   pair completes; the short-cycle update re-issues the current words.

use serde::Serialize;

use gpsdr_nap::{Correlation, CorrelatorDevice};

use crate::alias::AliasDetector;
use crate::bit_sync::{BitPolarity, NavBitSync};
use crate::cn0::Cn0Estimator;
use crate::constants::{GPS_CA_CHIPPING_RATE, GPS_L1_HZ, SAMPLE_FREQ, WEEK_MS};
use crate::loop_filter::AidedTrackingLoop;
use crate::params::LoopParamsSet;
use crate::phase::{carrier_freq_fp, code_phase_rate_fp, CarrierPhase, CodePhase};
use crate::telemetry::{TelemetrySink, TrackingIqMessage};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[repr(u8)]
pub enum ChannelState {
    #[default]
    Disabled = 0,
    Running = 1,
}

/// Tracking stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Stage {
    /// 1 ms integrations while searching for the navigation bit edge.
    #[default]
    BitSync,
    /// Long coherent integrations with stage-1 loop coefficients.
    LongCoherent,
}

/// Snapshot of a channel for the navigation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Zero-based PRN.
    pub prn: u8,
    /// Accumulated early-tap code phase in chips.
    pub code_phase_chips: f64,
    /// Code phase rate in chips/s.
    pub code_phase_rate: f64,
    /// Accumulated carrier phase in cycles; half a cycle is added when
    /// the decoded bit polarity is inverted.
    pub carrier_phase: f64,
    /// Carrier frequency (Doppler) in Hz.
    pub carrier_freq: f64,
    /// Time of week in milliseconds, when known.
    pub tow_ms: Option<u32>,
    /// Receiver time of the snapshot in seconds (modular).
    pub receiver_time: f64,
    /// C/N₀ in dB-Hz.
    pub snr: f32,
    /// Carrier-phase ambiguity epoch; a change means the ambiguity must
    /// be re-resolved downstream.
    pub lock_counter: u16,
}

/// One hardware correlator channel's tracking state.
#[derive(Debug, Default)]
pub struct TrackingChannel {
    pub(crate) state: ChannelState,
    pub(crate) prn: u8,
    pub(crate) stage: Stage,
    pub(crate) int_ms: u8,
    pub(crate) short_cycle: bool,

    pub(crate) sample_count: u32,
    pub(crate) update_count: u32,
    pub(crate) mode_change_count: u32,
    pub(crate) tow_ms: Option<u32>,

    pub(crate) code_phase_early: CodePhase,
    pub(crate) carrier_phase: CarrierPhase,
    pub(crate) code_phase_rate: f64,
    pub(crate) code_phase_rate_fp: u32,
    pub(crate) code_phase_rate_fp_prev: u32,
    pub(crate) carrier_freq: f64,
    pub(crate) carrier_freq_fp: i32,
    pub(crate) carrier_freq_fp_prev: i32,

    pub(crate) tl: AidedTrackingLoop,
    pub(crate) cn0: f32,
    pub(crate) cn0_est: Cn0Estimator,
    pub(crate) alias_detect: AliasDetector,
    pub(crate) nav_msg: NavBitSync,

    pub(crate) cs: [Correlation; 3],
    pub(crate) corr_sample_count: u32,

    pub(crate) output_iq: bool,
    pub(crate) lock_counter: u16,
}

impl TrackingChannel {
    /// Configure the channel from an acquisition hand-off and start it.
    ///
    /// `start_sample_count` must land on a prompt code-phase rollover;
    /// the channel itself starts half a chip earlier, on the early
    /// rollover.
    ///
    /// # Arguments
    /// * `channel` - Hardware channel number
    /// * `prn` - Satellite PRN, zero-based
    /// * `carrier_freq` - Carrier frequency (Doppler) from acquisition, Hz
    /// * `start_sample_count` - Sample count to start tracking at
    /// * `cn0_init` - C/N₀ estimate from acquisition, dB-Hz
    /// * `lock_counter` - Fresh value from the bank's lock-counter table
    pub fn init(
        &mut self,
        channel: u8,
        prn: u8,
        carrier_freq: f64,
        start_sample_count: u32,
        cn0_init: f32,
        params: &LoopParamsSet,
        lock_counter: u16,
        nap: &mut dyn CorrelatorDevice,
    ) {
        let code_phase_rate = (1.0 + carrier_freq / GPS_L1_HZ) * GPS_CA_CHIPPING_RATE;

        let half_chip_samples = (0.5 * SAMPLE_FREQ / GPS_CA_CHIPPING_RATE) as u32;
        let start_sample_count = start_sample_count.wrapping_sub(half_chip_samples);

        self.state = ChannelState::Running;
        self.prn = prn;
        self.stage = Stage::BitSync;
        self.update_count = 0;
        self.mode_change_count = 0;
        self.tow_ms = None;
        self.lock_counter = lock_counter;

        let l = &params.stages[0];
        self.tl = AidedTrackingLoop::new(
            (code_phase_rate - GPS_CA_CHIPPING_RATE) as f32,
            carrier_freq as f32,
            l,
        );
        self.int_ms = l.coherent_ms;
        self.short_cycle = true;

        self.code_phase_early = CodePhase::ZERO;
        self.code_phase_rate = code_phase_rate;
        self.code_phase_rate_fp = code_phase_rate_fp(code_phase_rate);
        self.code_phase_rate_fp_prev = self.code_phase_rate_fp;
        self.carrier_phase = CarrierPhase::ZERO;
        self.carrier_freq = carrier_freq;
        self.carrier_freq_fp = carrier_freq_fp(carrier_freq);
        self.carrier_freq_fp_prev = self.carrier_freq_fp;
        self.sample_count = start_sample_count;
        self.corr_sample_count = 0;
        self.cs = [Correlation::new(0, 0); 3];

        self.nav_msg = NavBitSync::new();
        self.cn0 = cn0_init;
        self.cn0_est = Cn0Estimator::new(
            1e3 / l.coherent_ms as f32,
            cn0_init,
            5.0,
            1e3 / l.coherent_ms as f32,
        );

        let stage1_ms = params.stages[1].coherent_ms;
        self.alias_detect = AliasDetector::new(
            500 / stage1_ms as u32,
            (stage1_ms - 1) as f32 * 1e-3,
        );

        // Code and carrier phase both start at zero: the timing strobe
        // lands on an early code rollover, and the carrier frequency is
        // not known well enough for an absolute phase to mean anything.
        nap.code_wr(channel, prn);
        nap.init_wr(channel, prn, 0, 0);
        nap.update_wr(
            channel,
            self.carrier_freq_fp,
            self.code_phase_rate_fp,
            0,
            0,
        );
        nap.timing_strobe(start_sample_count);
    }

    /// Read the completed integration out of the correlator.
    ///
    /// On the long half of a long integration the taps accumulate onto
    /// the short half; otherwise they replace it and the prompt is
    /// snapshotted for the false-lock detector.
    pub fn fetch_correlations(&mut self, channel: u8, nap: &mut dyn CorrelatorDevice) {
        match self.state {
            ChannelState::Running => {
                let (sample_count, cs) = nap.corr_rd(channel);
                self.corr_sample_count = sample_count;
                if self.int_ms > 1 && !self.short_cycle {
                    for (acc, c) in self.cs.iter_mut().zip(cs) {
                        *acc += c;
                    }
                } else {
                    self.cs = cs;
                    self.alias_detect.set_first(cs[1]);
                }
            }
            ChannelState::Disabled => {}
        }
    }

    /// Close the loops over the integration read by
    /// [`fetch_correlations`](Self::fetch_correlations) and reprogram
    /// the correlator.
    pub fn update(
        &mut self,
        channel: u8,
        params: &LoopParamsSet,
        nap: &mut dyn CorrelatorDevice,
        telemetry: &mut dyn TelemetrySink,
    ) {
        match self.state {
            ChannelState::Running => self.run_update(channel, params, nap, telemetry),
            // A completion interrupt on a dead channel: make sure the
            // correlator really is quiet.
            ChannelState::Disabled => self.disable(channel, nap),
        }
    }

    fn run_update(
        &mut self,
        channel: u8,
        params: &LoopParamsSet,
        nap: &mut dyn CorrelatorDevice,
        telemetry: &mut dyn TelemetrySink,
    ) {
        // Time advance. The integration just read ran on the previous
        // NCO words.
        self.sample_count = self.sample_count.wrapping_add(self.corr_sample_count);
        self.code_phase_early
            .advance(self.code_phase_rate_fp_prev, self.corr_sample_count);
        self.carrier_phase
            .advance(self.carrier_freq_fp_prev, self.corr_sample_count);
        if self.update_count == 0 {
            // The hardware's very first integration is one sample short
            // of the programmed length.
            self.carrier_phase
                .retreat_one_sample(self.carrier_freq_fp_prev);
        }
        self.code_phase_rate_fp_prev = self.code_phase_rate_fp;
        self.carrier_freq_fp_prev = self.carrier_freq_fp;

        if let Some(tow) = self.tow_ms.as_mut() {
            *tow += if self.short_cycle {
                1
            } else {
                self.int_ms as u32 - 1
            };
            *tow %= WEEK_MS;
        }

        if self.int_ms > 1 {
            self.short_cycle = !self.short_cycle;
            if !self.short_cycle {
                // Entering the long half: the loop filter only runs
                // when the pair completes, so re-issue the current
                // words and wait.
                nap.update_wr(
                    channel,
                    self.carrier_freq_fp,
                    self.code_phase_rate_fp,
                    0,
                    0,
                );
                return;
            }
        }

        self.update_count = self.update_count.wrapping_add(self.int_ms as u32);

        let tow = self.nav_msg.update(self.cs[1].re, self.int_ms);
        // TODO: a decoded TOW of exactly 0 ms is valid GPS time but is
        // indistinguishable from "no fix" here.
        if tow > 0 && self.tow_ms != Some(tow as u32) {
            if let Some(old) = self.tow_ms {
                tracing::error!("PRN {} TOW mismatch: {} != {}", self.prn + 1, old, tow);
            }
            self.tow_ms = Some(tow as u32);
        }

        let int_ms = self.int_ms as i32;
        self.cn0 = self.cn0_est.update(
            (self.cs[1].re / int_ms) as f32,
            (self.cs[1].im / int_ms) as f32,
        );

        // The aided loop takes the taps late-first.
        let reordered = [self.cs[2], self.cs[1], self.cs[0]];
        self.tl.update(&reordered);
        self.carrier_freq = self.tl.carr_freq as f64;
        self.code_phase_rate = self.tl.code_freq as f64 + GPS_CA_CHIPPING_RATE;
        self.code_phase_rate_fp = code_phase_rate_fp(self.code_phase_rate);
        self.carrier_freq_fp = carrier_freq_fp(self.carrier_freq);

        if self.output_iq && self.int_ms > 1 {
            telemetry.tracking_iq(&TrackingIqMessage {
                channel,
                sid: self.prn,
                corrs: self.cs,
            });
        }

        if self.int_ms > 1 {
            // Compare the long-half mean prompt against the short-half
            // snapshot; a steady rotation between them is a carrier
            // frequency alias the PLL cannot see.
            let half = self.int_ms as i32 - 1;
            let i = (self.cs[1].re - self.alias_detect.first.re) / half;
            let q = (self.cs[1].im - self.alias_detect.first.im) / half;
            let err = self.alias_detect.second(i, q);
            // Integer division: the threshold is 62 Hz at 4 ms and
            // 12 Hz at 20 ms, not 62.5 and 12.5.
            if err.abs() > (250 / self.int_ms as i32) as f32 {
                tracing::warn!(
                    "false phase lock on PRN {}: err = {:.1} Hz",
                    self.prn + 1,
                    err
                );
                self.mode_change_count = self.update_count;
                self.tl.carr_freq += err;
                self.tl.carr_filt.y = self.tl.carr_freq;
            }
        }

        if self.stage == Stage::BitSync
            && self.int_ms == 1
            && self.nav_msg.bit_phase as i8 == self.nav_msg.bit_phase_ref
        {
            tracing::info!(
                "PRN {} synced @ {} ms, {:.1} dB-Hz",
                self.prn + 1,
                self.update_count,
                self.cn0
            );
            let l = &params.stages[1];
            self.stage = Stage::LongCoherent;
            self.int_ms = l.coherent_ms;
            self.short_cycle = true;
            self.cn0_est = Cn0Estimator::new(
                1e3 / l.coherent_ms as f32,
                self.cn0,
                5.0,
                1e3 / l.coherent_ms as f32,
            );
            self.tl.retune(l);
            self.mode_change_count = self.update_count;
        }

        let length_code = if self.int_ms == 1 { 0 } else { self.int_ms - 2 };
        nap.update_wr(
            channel,
            self.carrier_freq_fp,
            self.code_phase_rate_fp,
            length_code,
            0,
        );
    }

    /// Stop the channel: zero the correlator NCOs so it raises no more
    /// interrupts and mark it disabled.
    pub fn disable(&mut self, channel: u8, nap: &mut dyn CorrelatorDevice) {
        nap.update_wr(channel, 0, 0, 0, 0);
        self.state = ChannelState::Disabled;
    }

    /// Flag the carrier-phase ambiguity as lost.
    pub(crate) fn set_ambiguous(&mut self, lock_counter: u16) {
        self.nav_msg.bit_polarity = BitPolarity::Unknown;
        self.lock_counter = lock_counter;
    }

    /// Snapshot the channel into a [`Measurement`].
    ///
    /// Pure with respect to the channel state: consecutive calls
    /// without an intervening update return identical records.
    pub fn measurement(&self) -> Measurement {
        let mut carrier_phase = self.carrier_phase.cycles();
        if self.nav_msg.bit_polarity == BitPolarity::Inverted {
            carrier_phase += 0.5;
        }
        Measurement {
            prn: self.prn,
            code_phase_chips: self.code_phase_early.chips(),
            code_phase_rate: self.code_phase_rate,
            carrier_phase,
            carrier_freq: self.carrier_freq,
            tow_ms: self.tow_ms,
            receiver_time: self.sample_count as f64 / SAMPLE_FREQ,
            snr: self.cn0,
            lock_counter: self.lock_counter,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn prn(&self) -> u8 {
        self.prn
    }

    /// Current C/N₀ in dB-Hz.
    pub fn snr(&self) -> f32 {
        self.cn0
    }

    pub fn int_ms(&self) -> u8 {
        self.int_ms
    }

    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// `update_count` at the last disturbance (stage change or
    /// false-lock correction); downstream filters restart from here.
    pub fn mode_change_count(&self) -> u32 {
        self.mode_change_count
    }

    pub fn tow_ms(&self) -> Option<u32> {
        self.tow_ms
    }

    pub fn lock_counter(&self) -> u16 {
        self.lock_counter
    }

    /// Enable or disable raw I/Q telemetry for this channel.
    pub fn set_output_iq(&mut self, enable: bool) {
        self.output_iq = enable;
    }
}
