//! Simulated NAP backend for development and testing
//!
//! A software stand-in for the FPGA correlator, useful for unit testing
//! the tracking core and for development without hardware. Every write
//! the core performs is recorded in order, and tests script the
//! correlation readings a channel will return.

use std::collections::{HashMap, VecDeque};

use crate::ca_code::CaCode;
use crate::registers::{self, timing, track};
use crate::traits::CorrelatorDevice;
use crate::types::{Correlation, MAX_TRACK_CHANNELS};

/// One recorded device write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NapWrite {
    Code {
        channel: u8,
        prn: u8,
    },
    Init {
        channel: u8,
        prn: u8,
        code_phase: u32,
        carrier_phase: u32,
    },
    Update {
        channel: u8,
        carrier_freq_fp: i32,
        code_phase_rate_fp: u32,
        length_code: u8,
        flags: u8,
    },
    TimingStrobe {
        sample_count: u32,
    },
}

#[derive(Default)]
struct SimChannel {
    code: Option<CaCode>,
    pending: VecDeque<(u32, [Correlation; 3])>,
}

/// Simulated NAP for development without hardware.
pub struct SimNap {
    channels: Vec<SimChannel>,
    writes: Vec<NapWrite>,
    /// Simulated register file, mirroring what the writes would put on
    /// the bus.
    registers: HashMap<usize, u32>,
}

impl SimNap {
    /// Create a simulated device with `n_channels` track channels.
    pub fn new(n_channels: usize) -> Self {
        assert!(
            n_channels <= MAX_TRACK_CHANNELS,
            "NAP builds provide at most {} channels",
            MAX_TRACK_CHANNELS
        );
        Self {
            channels: (0..n_channels).map(|_| SimChannel::default()).collect(),
            writes: Vec::new(),
            registers: HashMap::new(),
        }
    }

    /// Read back a simulated register (0 when never written).
    pub fn read_register(&self, address: usize) -> u32 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    /// Queue a correlation reading for a channel.
    ///
    /// Each queued entry satisfies exactly one
    /// [`corr_rd`](CorrelatorDevice::corr_rd) call.
    pub fn push_correlations(
        &mut self,
        channel: u8,
        sample_count: u32,
        corrs: [Correlation; 3],
    ) {
        self.channels[channel as usize]
            .pending
            .push_back((sample_count, corrs));
    }

    /// All writes recorded so far, in order.
    pub fn writes(&self) -> &[NapWrite] {
        &self.writes
    }

    /// Forget the recorded writes.
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// The most recent `Update` write for a channel, if any.
    pub fn last_update(&self, channel: u8) -> Option<&NapWrite> {
        self.writes
            .iter()
            .rev()
            .find(|w| matches!(w, NapWrite::Update { channel: c, .. } if *c == channel))
    }

    /// The code currently programmed into a channel's code RAM.
    pub fn code(&self, channel: u8) -> Option<&CaCode> {
        self.channels[channel as usize].code.as_ref()
    }
}

impl CorrelatorDevice for SimNap {
    fn n_channels(&self) -> usize {
        self.channels.len()
    }

    fn code_wr(&mut self, channel: u8, prn: u8) {
        tracing::debug!("sim nap: channel {} code RAM <- PRN {}", channel, prn + 1);
        self.channels[channel as usize].code = Some(CaCode::new(prn));
        self.registers
            .insert(registers::track_reg(channel, track::CODE), prn as u32);
        self.writes.push(NapWrite::Code { channel, prn });
    }

    fn init_wr(&mut self, channel: u8, prn: u8, code_phase: u32, carrier_phase: u32) {
        self.registers
            .insert(registers::track_reg(channel, track::INIT_CODE), code_phase);
        self.registers
            .insert(registers::track_reg(channel, track::INIT_CARR), carrier_phase);
        self.writes.push(NapWrite::Init {
            channel,
            prn,
            code_phase,
            carrier_phase,
        });
    }

    fn update_wr(
        &mut self,
        channel: u8,
        carrier_freq_fp: i32,
        code_phase_rate_fp: u32,
        length_code: u8,
        flags: u8,
    ) {
        self.registers.insert(
            registers::track_reg(channel, track::UPDATE_CARR),
            carrier_freq_fp as u32,
        );
        self.registers.insert(
            registers::track_reg(channel, track::UPDATE_CODE),
            code_phase_rate_fp,
        );
        self.registers.insert(
            registers::track_reg(channel, track::UPDATE_LEN),
            (flags as u32) << 8 | length_code as u32,
        );
        self.writes.push(NapWrite::Update {
            channel,
            carrier_freq_fp,
            code_phase_rate_fp,
            length_code,
            flags,
        });
    }

    fn corr_rd(&mut self, channel: u8) -> (u32, [Correlation; 3]) {
        self.channels[channel as usize]
            .pending
            .pop_front()
            .unwrap_or((0, [Correlation::new(0, 0); 3]))
    }

    fn timing_strobe(&mut self, sample_count: u32) {
        self.registers
            .insert(timing::BASE + timing::COMPARE, sample_count);
        self.registers
            .insert(timing::BASE + timing::CTRL, timing::CTRL_ARM);
        self.writes.push(NapWrite::TimingStrobe { sample_count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_writes_in_order() {
        let mut nap = SimNap::new(2);
        nap.code_wr(0, 4);
        nap.init_wr(0, 4, 0, 0);
        nap.update_wr(0, 1025, 268_435_456, 0, 0);
        nap.timing_strobe(16_000);

        assert_eq!(nap.writes().len(), 4);
        assert_eq!(nap.writes()[0], NapWrite::Code { channel: 0, prn: 4 });
        assert_eq!(
            nap.writes()[3],
            NapWrite::TimingStrobe {
                sample_count: 16_000
            }
        );
    }

    #[test]
    fn code_wr_fills_code_ram() {
        let mut nap = SimNap::new(1);
        assert!(nap.code(0).is_none());
        nap.code_wr(0, 0);
        assert_eq!(nap.code(0).unwrap().chips().len(), 1023);
    }

    #[test]
    fn writes_land_in_the_register_file() {
        let mut nap = SimNap::new(2);
        nap.update_wr(1, -7, 268_435_626, 3, 0);
        nap.timing_strobe(16_000);

        assert_eq!(
            nap.read_register(registers::track_reg(1, track::UPDATE_CARR)),
            -7i32 as u32
        );
        assert_eq!(
            nap.read_register(registers::track_reg(1, track::UPDATE_CODE)),
            268_435_626
        );
        assert_eq!(
            nap.read_register(registers::track_reg(1, track::UPDATE_LEN)),
            3
        );
        assert_eq!(nap.read_register(timing::BASE + timing::COMPARE), 16_000);
        assert_eq!(
            nap.read_register(timing::BASE + timing::CTRL),
            timing::CTRL_ARM
        );
        // Channel 0's window stays untouched.
        assert_eq!(nap.read_register(registers::track_reg(0, track::UPDATE_CODE)), 0);
    }

    #[test]
    fn corr_rd_drains_queue_then_reads_zero() {
        let mut nap = SimNap::new(1);
        let cs = [
            Correlation::new(10, 1),
            Correlation::new(100, 3),
            Correlation::new(11, -2),
        ];
        nap.push_correlations(0, 16_368, cs);

        assert_eq!(nap.corr_rd(0), (16_368, cs));
        assert_eq!(nap.corr_rd(0), (0, [Correlation::new(0, 0); 3]));
    }
}
