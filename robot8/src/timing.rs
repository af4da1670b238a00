//! Tick-count timing
//!
//! All durations the receiver works with are tick counts. They are derived
//! from the nominal durations below at a given tick rate.

use std::{
    fmt::Display,
    str::FromStr,
};

pub const LEADER_TIME: f64 = 0.300;
pub const LEADER_BREAK_TIME: f64 = 0.010;
pub const VIS_BIT_TIME: f64 = 0.030;
pub const HSYNC_TIME: f64 = 0.005;
pub const PIXEL_TIME: f64 = 0.35e-3;

/// Tick rate of the real-time profile.
pub const REAL_TICK_RATE: u32 = 20_000_000;

/// The test profile compresses time by this factor.
pub const TEST_COMPRESSION: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub tick_rate: u32,
    pub bit_period: u32,
    pub leader: u32,
    pub leader_break: u32,
    pub hsync_gap: u32,
    pub pixel_period: u32,
}

impl Timing {
    pub const REAL: Self = Self {
        tick_rate: REAL_TICK_RATE,
        bit_period: 600_000,
        leader: 6_000_000,
        leader_break: 200_000,
        hsync_gap: 100_000,
        pixel_period: 7_000,
    };

    pub const TEST: Self = Self {
        tick_rate: REAL_TICK_RATE / TEST_COMPRESSION,
        bit_period: 600,
        leader: 6_000,
        leader_break: 200,
        hsync_gap: 100,
        pixel_period: 7,
    };

    /// Derives tick counts for an arbitrary tick rate.
    ///
    /// Every window needs at least 2 ticks, so that it has a distinct
    /// midpoint.
    pub fn from_tick_rate(tick_rate: u32) -> Result<Self, TimingError> {
        let ticks = |name: &'static str, duration: f64| {
            let ticks = (duration * f64::from(tick_rate)).round() as u32;
            if ticks < 2 {
                Err(TimingError::TooShort {
                    name,
                    tick_rate,
                    ticks,
                })
            }
            else {
                Ok(ticks)
            }
        };

        Ok(Self {
            tick_rate,
            bit_period: ticks("bit period", VIS_BIT_TIME)?,
            leader: ticks("leader", LEADER_TIME)?,
            leader_break: ticks("leader break", LEADER_BREAK_TIME)?,
            hsync_gap: ticks("hsync gap", HSYNC_TIME)?,
            pixel_period: ticks("pixel period", PIXEL_TIME)?,
        })
    }

    #[inline]
    pub fn bit_midpoint(&self) -> u32 {
        self.bit_period / 2
    }

    #[inline]
    pub fn pixel_midpoint(&self) -> u32 {
        self.pixel_period / 2
    }

    /// Ticks of the calibration preamble and VIS header.
    pub fn header_length(&self) -> usize {
        2 * self.leader as usize + self.leader_break as usize + 10 * self.bit_period as usize
    }

    pub fn line_length(&self) -> usize {
        self.hsync_gap as usize + crate::WIDTH * self.pixel_period as usize
    }

    /// Ticks of a complete transmission.
    pub fn transmission_length(&self) -> usize {
        self.header_length() + crate::HEIGHT * self.line_length()
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::REAL
    }
}

impl From<TimingProfile> for Timing {
    fn from(value: TimingProfile) -> Self {
        value.timing()
    }
}

#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum TimingError {
    #[error("{name} is {ticks} ticks at {tick_rate} Hz, need at least 2")]
    TooShort {
        name: &'static str,
        tick_rate: u32,
        ticks: u32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TimingProfile {
    #[default]
    Real,
    Test,
}

impl TimingProfile {
    pub fn timing(&self) -> Timing {
        match self {
            Self::Real => Timing::REAL,
            Self::Test => Timing::TEST,
        }
    }
}

impl Display for TimingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Test => write!(f, "test"),
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown timing profile: {0:?} (expected `real` or `test`)")]
pub struct ParseTimingProfileError(String);

impl FromStr for TimingProfile {
    type Err = ParseTimingProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "test" => Ok(Self::Test),
            _ => Err(ParseTimingProfileError(s.to_owned())),
        }
    }
}
