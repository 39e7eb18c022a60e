//! Correlator data types

use num_complex::Complex;

/// One complex correlator accumulation.
///
/// The hardware accumulates signed integer I/Q sums; over a 20 ms
/// coherent integration the magnitudes stay well inside `i32`.
pub type Correlation = Complex<i32>;

/// Maximum number of track channels any NAP build provides.
pub const MAX_TRACK_CHANNELS: usize = 12;
