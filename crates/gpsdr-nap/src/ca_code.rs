//! GPS C/A Gold-code generation
//!
//! Each track channel despreads against a locally generated 1023-chip
//! Gold code. The code RAM is filled at channel setup time from the
//! generator below.
//!
//! ```text
//! G1 LFSR (10-bit): x^10 + x^3 + 1
//! G2 LFSR (10-bit): x^10 + x^9 + x^8 + x^6 + x^3 + x^2 + 1
//!
//! C/A code = G1 output ⊕ G2(tap_a) ⊕ G2(tap_b)
//! ```

/// G2 delay taps for PRN 1-32 (IS-GPS-200), 1-based stage positions.
/// Indexed by zero-based PRN.
const G2_TAPS: [(u8, u8); 32] = [
    (2, 6),
    (3, 7),
    (4, 8),
    (5, 9),
    (1, 9),
    (2, 10),
    (1, 8),
    (2, 9),
    (3, 10),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (9, 10),
    (1, 4),
    (2, 5),
    (3, 6),
    (4, 7),
    (5, 8),
    (6, 9),
    (1, 3),
    (4, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (1, 6),
    (2, 7),
    (3, 8),
    (4, 9),
];

/// One period of a C/A code, as 0/1 chips.
#[derive(Clone)]
pub struct CaCode {
    chips: [u8; 1023],
}

impl CaCode {
    /// Generate the C/A code for a zero-based PRN (0-31).
    pub fn new(prn: u8) -> Self {
        // Stage i of each register lives in bit (10 - i); the output is
        // stage 10, i.e. bit 0.
        fn tap(reg: u16, pos: u8) -> u16 {
            (reg >> (10 - pos)) & 1
        }

        let (tap_a, tap_b) = G2_TAPS[prn as usize];
        let mut g1: u16 = 0x3FF;
        let mut g2: u16 = 0x3FF;
        let mut chips = [0u8; 1023];

        for chip in chips.iter_mut() {
            *chip = ((g1 & 1) ^ tap(g2, tap_a) ^ tap(g2, tap_b)) as u8;

            let g1_fb = tap(g1, 3) ^ tap(g1, 10);
            let g2_fb = tap(g2, 2)
                ^ tap(g2, 3)
                ^ tap(g2, 6)
                ^ tap(g2, 8)
                ^ tap(g2, 9)
                ^ tap(g2, 10);
            g1 = (g1 >> 1) | (g1_fb << 9);
            g2 = (g2 >> 1) | (g2_fb << 9);
        }

        Self { chips }
    }

    /// The full 1023-chip sequence.
    pub fn chips(&self) -> &[u8; 1023] {
        &self.chips
    }

    /// One chip, index taken modulo the code length.
    pub fn chip(&self, idx: usize) -> u8 {
        self.chips[idx % 1023]
    }
}

impl std::fmt::Debug for CaCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaCode({:04o}...)", self.first_10_octal())
    }
}

impl CaCode {
    fn first_10_octal(&self) -> u16 {
        self.chips[..10]
            .iter()
            .fold(0u16, |acc, &c| (acc << 1) | c as u16)
    }
}
