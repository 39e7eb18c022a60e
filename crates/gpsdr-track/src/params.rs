//! Tracking loop parameter configuration
//!
//! The `track.loop_params` setting is a string describing one or two
//! loop-filter stages:
//!
//! ```text
//! ( <coherent_ms> ms , ( <code_bw> , <code_zeta> , <code_k> , <carr_to_code> )
//!                    , ( <carr_bw> , <carr_zeta> , <carr_k> , <carr_fll_aid_gain> ) )
//! ```
//!
//! Stages are separated by a comma; a single-stage string applies to
//! both stages. Parsing is atomic: the live parameters are only
//! replaced once the whole string has validated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default two-stage parameter string: 1 ms bit-sync stage, 5 ms long
/// coherent stage.
pub const DEFAULT_LOOP_PARAMS: &str =
    "(1 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5)), (5 ms, (1, 0.7, 1, 1540), (50, 0.7, 1, 0))";

/// Loop-filter coefficients for one tracking stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopParams {
    /// Coherent integration length in milliseconds.
    pub coherent_ms: u8,
    pub code_bw: f32,
    pub code_zeta: f32,
    pub code_k: f32,
    /// Carrier-to-code aiding ratio (1540 for L1 C/A; 0 disables aiding).
    pub carr_to_code: f32,
    pub carr_bw: f32,
    pub carr_zeta: f32,
    pub carr_k: f32,
    /// FLL aiding gain for carrier pull-in.
    pub carr_fll_aid_gain: f32,
}

/// The two-stage parameter set used by the tracking bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopParamsSet {
    pub stages: [LoopParams; 2],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseLoopParamsError {
    #[error("ill-formatted tracking loop parameter string")]
    Malformed,
    #[error("invalid coherent integration length: {0} ms")]
    InvalidCoherentMs(u8),
    #[error("first-stage coherent integration must be 1 ms, got {0}")]
    FirstStageNotOneMs(u8),
}

impl Default for LoopParamsSet {
    fn default() -> Self {
        Self {
            stages: [
                LoopParams {
                    coherent_ms: 1,
                    code_bw: 1.0,
                    code_zeta: 0.7,
                    code_k: 1.0,
                    carr_to_code: 1540.0,
                    carr_bw: 10.0,
                    carr_zeta: 0.7,
                    carr_k: 1.0,
                    carr_fll_aid_gain: 5.0,
                },
                LoopParams {
                    coherent_ms: 5,
                    code_bw: 1.0,
                    code_zeta: 0.7,
                    code_k: 1.0,
                    carr_to_code: 1540.0,
                    carr_bw: 50.0,
                    carr_zeta: 0.7,
                    carr_k: 1.0,
                    carr_fll_aid_gain: 0.0,
                },
            ],
        }
    }
}

impl FromStr for LoopParamsSet {
    type Err = ParseLoopParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cur = Cursor { rest: s };

        let stage0 = parse_stage(&mut cur)?;
        validate(0, &stage0)?;

        let stage1 = if cur.at_end() {
            stage0
        } else {
            cur.eat(",")?;
            parse_stage(&mut cur)?
        };
        validate(1, &stage1)?;

        if !cur.at_end() {
            return Err(ParseLoopParamsError::Malformed);
        }
        Ok(Self {
            stages: [stage0, stage1],
        })
    }
}

fn validate(stage: usize, p: &LoopParams) -> Result<(), ParseLoopParamsError> {
    // Valid lengths are the divisors of the 20 ms bit: 1, 2, 4, 5, 10, 20.
    if p.coherent_ms == 0 || 20 % p.coherent_ms != 0 {
        return Err(ParseLoopParamsError::InvalidCoherentMs(p.coherent_ms));
    }
    if stage == 0 && p.coherent_ms != 1 {
        return Err(ParseLoopParamsError::FirstStageNotOneMs(p.coherent_ms));
    }
    Ok(())
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> Result<(), ParseLoopParamsError> {
        self.skip_ws();
        self.rest = self
            .rest
            .strip_prefix(token)
            .ok_or(ParseLoopParamsError::Malformed)?;
        Ok(())
    }

    fn number(&mut self) -> Result<f32, ParseLoopParamsError> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
            .unwrap_or(self.rest.len());
        let (num, rest) = self.rest.split_at(end);
        self.rest = rest;
        num.parse().map_err(|_| ParseLoopParamsError::Malformed)
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest.is_empty()
    }
}

fn parse_stage(cur: &mut Cursor) -> Result<LoopParams, ParseLoopParamsError> {
    cur.eat("(")?;
    let coherent = cur.number()?;
    if coherent.fract() != 0.0 || !(0.0..=255.0).contains(&coherent) {
        return Err(ParseLoopParamsError::Malformed);
    }
    cur.eat("ms")?;
    cur.eat(",")?;

    cur.eat("(")?;
    let code_bw = cur.number()?;
    cur.eat(",")?;
    let code_zeta = cur.number()?;
    cur.eat(",")?;
    let code_k = cur.number()?;
    cur.eat(",")?;
    let carr_to_code = cur.number()?;
    cur.eat(")")?;
    cur.eat(",")?;

    cur.eat("(")?;
    let carr_bw = cur.number()?;
    cur.eat(",")?;
    let carr_zeta = cur.number()?;
    cur.eat(",")?;
    let carr_k = cur.number()?;
    cur.eat(",")?;
    let carr_fll_aid_gain = cur.number()?;
    cur.eat(")")?;
    cur.eat(")")?;

    Ok(LoopParams {
        coherent_ms: coherent as u8,
        code_bw,
        code_zeta,
        code_k,
        carr_to_code,
        carr_bw,
        carr_zeta,
        carr_k,
        carr_fll_aid_gain,
    })
}

impl fmt::Display for LoopParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} ms, ({}, {}, {}, {}), ({}, {}, {}, {}))",
            self.coherent_ms,
            self.code_bw,
            self.code_zeta,
            self.code_k,
            self.carr_to_code,
            self.carr_bw,
            self.carr_zeta,
            self.carr_k,
            self.carr_fll_aid_gain
        )
    }
}

impl fmt::Display for LoopParamsSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.stages[0], self.stages[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_two_stage_string() {
        let set: LoopParamsSet = DEFAULT_LOOP_PARAMS.parse().unwrap();
        assert_eq!(set.stages[0].coherent_ms, 1);
        assert_eq!(set.stages[1].coherent_ms, 5);
        assert_eq!(set.stages[1].carr_bw, 50.0);
        assert_eq!(set, LoopParamsSet::default());
    }

    #[test]
    fn single_stage_string_fills_both_stages() {
        let set: LoopParamsSet = "(1 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5))"
            .parse()
            .unwrap();
        assert_eq!(set.stages[0], set.stages[1]);
        assert_eq!(set.stages[1].coherent_ms, 1);
    }

    #[test]
    fn rejects_first_stage_longer_than_one_ms() {
        let err = "(2 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5))"
            .parse::<LoopParamsSet>()
            .unwrap_err();
        assert_eq!(err, ParseLoopParamsError::FirstStageNotOneMs(2));
    }

    #[test]
    fn rejects_lengths_that_do_not_divide_the_bit() {
        for ms in [3u8, 6, 7, 15] {
            let spec = format!(
                "(1 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5)), ({} ms, (1, 0.7, 1, 1540), (50, 0.7, 1, 0))",
                ms
            );
            assert_eq!(
                spec.parse::<LoopParamsSet>().unwrap_err(),
                ParseLoopParamsError::InvalidCoherentMs(ms)
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        for bad in [
            "",
            "(1 ms",
            "(1 ms, (1, 0.7, 1), (10, 0.7, 1, 5))",
            "(1 ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5)) trailing",
            "(x ms, (1, 0.7, 1, 1540), (10, 0.7, 1, 5))",
        ] {
            assert!(bad.parse::<LoopParamsSet>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn display_round_trips() {
        let set = LoopParamsSet::default();
        let reparsed: LoopParamsSet = set.to_string().parse().unwrap();
        assert_eq!(set, reparsed);
    }
}
