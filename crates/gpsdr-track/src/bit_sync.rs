//! Navigation bit synchronization and TOW extraction
//!
//! The 1 ms correlator epochs must be aligned to the 20 ms navigation
//! bit before long coherent integrations can start. Alignment is found
//! by voting sign transitions of the prompt correlation into a 20-bin
//! histogram; once one bin wins, `bit_phase_ref` marks the bit edge and
//! completed bits are streamed into an LNAV word decoder.
//!
//! ```text
//! TLM word                      HOW word
//! ┌────────┬──────────┬──────┐ ┌───────┬────┬───────┬──────┐
//! │preamble│ message  │parity│ │  TOW  │flag│ SF id │parity│
//! │ 8 bits │ 16 bits  │ 6 b  │ │ 17 b  │ 2b │  3 b  │ 6 b  │
//! └────────┴──────────┴──────┘ └───────┴────┴───────┴──────┘
//! ```
//!
//! A preamble match (normal or inverted) followed by two clean parity
//! checks yields the time of week and pins down the bit polarity.

use crate::constants::WEEK_MS;

/// Number of edge votes a histogram bin needs to win bit sync.
const BITSYNC_THRES: u8 = 5;
/// Margin over the runner-up bin.
const BITSYNC_MARGIN: u8 = 2;

/// LNAV TLM preamble, and its complement for inverted streams.
const PREAMBLE: u64 = 0x8B;
const PREAMBLE_INV: u64 = 0x74;

/// Navigation bit polarity relative to the local carrier replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitPolarity {
    #[default]
    Unknown,
    Normal,
    Inverted,
}

/// Bit synchronizer and LNAV TOW decoder for one channel.
#[derive(Debug, Clone)]
pub struct NavBitSync {
    /// Millisecond phase within the 20 ms bit, advanced by each update.
    pub bit_phase: u8,
    /// Bit-edge reference phase; -1 until bit sync is achieved. Bit
    /// sync is achieved exactly when `bit_phase == bit_phase_ref`.
    pub bit_phase_ref: i8,
    /// Resolved polarity of the decoded bits.
    pub bit_polarity: BitPolarity,
    hist: [u8; 20],
    prev_negative: Option<bool>,
    bit_acc: i64,
    /// Most recent data bits, newest in bit 0; a set bit is a negative
    /// prompt accumulation.
    bits: u64,
    bit_count: u32,
}

impl NavBitSync {
    pub fn new() -> Self {
        Self {
            bit_phase: 0,
            bit_phase_ref: -1,
            bit_polarity: BitPolarity::Unknown,
            hist: [0; 20],
            prev_negative: None,
            bit_acc: 0,
            bits: 0,
            bit_count: 0,
        }
    }

    /// Advance by one integration of `ms` milliseconds with the given
    /// prompt in-phase accumulation.
    ///
    /// Returns a decoded time of week in milliseconds when a subframe
    /// boundary passes, 0 otherwise.
    pub fn update(&mut self, prompt_i: i32, ms: u8) -> i32 {
        self.bit_phase = (self.bit_phase + ms) % 20;

        if self.bit_phase_ref < 0 {
            self.vote_edge(prompt_i);
            return 0;
        }

        self.bit_acc += prompt_i as i64;
        if self.bit_phase == self.bit_phase_ref as u8 {
            let negative = self.bit_acc < 0;
            self.bit_acc = 0;
            return self.push_bit(negative);
        }
        0
    }

    /// Histogram a sign transition against the current bit phase. Only
    /// meaningful while integrating at 1 ms.
    fn vote_edge(&mut self, prompt_i: i32) {
        let negative = prompt_i < 0;
        if let Some(prev) = self.prev_negative.replace(negative) {
            if prev != negative {
                // The edge sits at the start of this epoch.
                let idx = (self.bit_phase as usize + 19) % 20;
                self.hist[idx] = self.hist[idx].saturating_add(1);

                let runner_up = self
                    .hist
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != idx)
                    .map(|(_, &v)| v)
                    .max()
                    .unwrap_or(0);
                if self.hist[idx] >= BITSYNC_THRES
                    && self.hist[idx] >= runner_up + BITSYNC_MARGIN
                {
                    self.bit_phase_ref = idx as i8;
                    self.bit_acc = 0;
                }
            }
        }
    }

    /// Shift in a completed bit and look for a subframe boundary.
    fn push_bit(&mut self, negative: bool) -> i32 {
        self.bits = (self.bits << 1) | negative as u64;
        self.bit_count += 1;
        if self.bit_count < 62 {
            return 0;
        }
        self.try_decode_tow()
    }

    /// Try to read D29*/D30* + TLM + HOW out of the last 62 bits.
    fn try_decode_tow(&mut self) -> i32 {
        let preamble = (self.bits >> 52) & 0xFF;
        let (inverted, window) = match preamble {
            PREAMBLE => (false, self.bits),
            PREAMBLE_INV => (true, !self.bits),
            _ => return 0,
        };

        let d29_star = (window >> 61) & 1 == 1;
        let d30_star = (window >> 60) & 1 == 1;
        let tlm = ((window >> 30) & 0x3FFF_FFFF) as u32;
        let how = (window & 0x3FFF_FFFF) as u32;

        if !check_parity(tlm, d29_star, d30_star) {
            return 0;
        }
        if !check_parity(how, (tlm >> 1) & 1 == 1, tlm & 1 == 1) {
            return 0;
        }

        let subframe_id = (how >> 8) & 0x7;
        if !(1..=5).contains(&subframe_id) {
            return 0;
        }
        let tow_count = how >> 13;
        if tow_count * 6000 >= WEEK_MS {
            return 0;
        }

        self.bit_polarity = if inverted {
            BitPolarity::Inverted
        } else {
            BitPolarity::Normal
        };

        // The HOW holds the TOW of the next subframe start; the HOW's
        // last bit is 60 of 300 bits into this one.
        let mut tow_ms = tow_count as i64 * 6000 - (300 - 60) * 20;
        if tow_ms < 0 {
            tow_ms += WEEK_MS as i64;
        }
        tow_ms as i32
    }
}

impl Default for NavBitSync {
    fn default() -> Self {
        Self::new()
    }
}

/// One parity bit: even parity over the masked data bits, XOR a carry
/// bit from the previous word.
fn parity_bit(data: u32, mask: u32, d_star: bool) -> bool {
    ((data & mask).count_ones() & 1 == 1) ^ d_star
}

/// The six parity bits D25-D30 of a word (IS-GPS-200 Table 20-XIV).
fn parity6(data: u32, d29_star: bool, d30_star: bool) -> u32 {
    let d25 = parity_bit(data, 0xBB1F34, d29_star);
    let d26 = parity_bit(data, 0x5D8F9A, d30_star);
    let d27 = parity_bit(data, 0xAEC7CD, d29_star);
    let d28 = parity_bit(data, 0x5763E6, d30_star);
    let d29 = parity_bit(data, 0x6BB1F3, d30_star);
    let d30 = parity_bit(data, 0x8B7A89, d29_star);
    (d25 as u32) << 5
        | (d26 as u32) << 4
        | (d27 as u32) << 3
        | (d28 as u32) << 2
        | (d29 as u32) << 1
        | d30 as u32
}

/// Check a received 30-bit word. The 24 data bits travel complemented
/// when D30* is set.
fn check_parity(word: u32, d29_star: bool, d30_star: bool) -> bool {
    let data = if d30_star {
        (word >> 6) ^ 0xFF_FFFF
    } else {
        word >> 6
    };
    parity6(data, d29_star, d30_star) == (word & 0x3F)
}
