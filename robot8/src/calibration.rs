//! Calibration preamble detection
//!
//! A transmission starts with a leader tone, a short break at the sync
//! frequency and a second leader tone. The receiver only needs to know
//! whether such a preamble is currently being received (`active`) and
//! whether one completed (`ok`), so any source of these two flags can be
//! plugged in through [`CalibrationSource`].

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    Frequency,
    LEADER_TONE,
    SYNC_TONE,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    timing::Timing,
    util::within_tolerance,
};

/// Leader lengths are accepted within ± 1/10.
const LEADER_TOLERANCE: u32 = 10;

/// Break lengths are accepted within ± 1/2.
const BREAK_TOLERANCE: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalibrationStatus {
    pub active: bool,
    pub ok: bool,
}

impl CalibrationStatus {
    pub const IDLE: Self = Self {
        active: false,
        ok: false,
    };
    pub const ACTIVE: Self = Self {
        active: true,
        ok: false,
    };
    pub const OK: Self = Self {
        active: false,
        ok: true,
    };
}

pub trait CalibrationSource {
    /// Status as of the start of the current tick.
    fn status(&self) -> CalibrationStatus;

    /// Consumes the current tick's frequency and commits the next state.
    fn advance(&mut self, frequency: Frequency);

    fn reset(&mut self);
}

impl<C> CalibrationSource for &mut C
where
    C: CalibrationSource,
{
    #[inline]
    fn status(&self) -> CalibrationStatus {
        (&**self).status()
    }

    #[inline]
    fn advance(&mut self, frequency: Frequency) {
        (&mut **self).advance(frequency);
    }

    #[inline]
    fn reset(&mut self) {
        (&mut **self).reset();
    }
}

/// Calibration flags supplied from outside, e.g. replayed from a recording
/// or driven by a test.
///
/// The status is whatever was last set; advancing does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalCalibration {
    status: CalibrationStatus,
}

impl ExternalCalibration {
    pub fn new(status: CalibrationStatus) -> Self {
        Self { status }
    }

    #[inline]
    pub fn set(&mut self, status: CalibrationStatus) {
        self.status = status;
    }
}

impl CalibrationSource for ExternalCalibration {
    #[inline]
    fn status(&self) -> CalibrationStatus {
        self.status
    }

    #[inline]
    fn advance(&mut self, _frequency: Frequency) {}

    #[inline]
    fn reset(&mut self) {
        self.status = CalibrationStatus::IDLE;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalibrationState {
    #[default]
    Idle,
    Leader1 {
        length: u32,
    },
    Break {
        length: u32,
    },
    Leader2 {
        length: u32,
    },
    /// A preamble completed. `silence` and `leader` count consecutive ticks
    /// of silence and of leader tone, either of which ends the lock.
    Locked {
        silence: u32,
        leader: u32,
    },
    /// A leader run ended the lock. Reports idle for this one tick, so that
    /// a receiver drops what it was decoding, then continues as the first
    /// leader.
    Relock {
        length: u32,
    },
}

/// Tick-level detector for the leader/break/leader preamble.
#[derive(Clone, Copy, Debug)]
pub struct CalibrationDetector {
    timing: Timing,
    state: CalibrationState,
}

impl CalibrationDetector {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: CalibrationState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn next(&self, frequency: Frequency) -> CalibrationState {
        let timing = &self.timing;
        let leader_max = timing.leader + timing.leader / LEADER_TOLERANCE;
        let leader_min = timing.leader - timing.leader / LEADER_TOLERANCE;
        let break_max = timing.leader_break + timing.leader_break / BREAK_TOLERANCE;

        match self.state {
            CalibrationState::Idle => {
                if frequency == LEADER_TONE {
                    CalibrationState::Leader1 { length: 1 }
                }
                else {
                    CalibrationState::Idle
                }
            }
            CalibrationState::Leader1 { length } => {
                match frequency {
                    LEADER_TONE if length < leader_max => {
                        CalibrationState::Leader1 { length: length + 1 }
                    }
                    SYNC_TONE if within_tolerance(length, timing.leader, LEADER_TOLERANCE) => {
                        CalibrationState::Break { length: 1 }
                    }
                    _ => {
                        tracing::debug!(length, frequency, "first leader rejected");
                        CalibrationState::Idle
                    }
                }
            }
            CalibrationState::Break { length } => {
                match frequency {
                    SYNC_TONE if length < break_max => {
                        CalibrationState::Break { length: length + 1 }
                    }
                    LEADER_TONE => {
                        if within_tolerance(length, timing.leader_break, BREAK_TOLERANCE) {
                            CalibrationState::Leader2 { length: 1 }
                        }
                        else {
                            // might be the start of another preamble
                            CalibrationState::Leader1 { length: 1 }
                        }
                    }
                    _ => {
                        tracing::debug!(length, frequency, "leader break rejected");
                        CalibrationState::Idle
                    }
                }
            }
            CalibrationState::Leader2 { length } => {
                match frequency {
                    LEADER_TONE if length < leader_max => {
                        CalibrationState::Leader2 { length: length + 1 }
                    }
                    LEADER_TONE => CalibrationState::Idle,
                    _ if within_tolerance(length, timing.leader, LEADER_TOLERANCE) => {
                        tracing::debug!("calibration locked");
                        CalibrationState::Locked {
                            silence: 0,
                            leader: 0,
                        }
                    }
                    _ => {
                        tracing::debug!(length, frequency, "second leader rejected");
                        CalibrationState::Idle
                    }
                }
            }
            CalibrationState::Locked { silence, leader } => {
                if is_silence(frequency) {
                    if silence + 1 >= timing.leader {
                        tracing::debug!("calibration lost, no signal");
                        CalibrationState::Idle
                    }
                    else {
                        CalibrationState::Locked {
                            silence: silence + 1,
                            leader: 0,
                        }
                    }
                }
                else if frequency == LEADER_TONE {
                    if leader + 1 >= leader_min {
                        // no scan line is this long, so this is a new preamble
                        tracing::debug!("new preamble while locked");
                        CalibrationState::Relock { length: leader + 1 }
                    }
                    else {
                        CalibrationState::Locked {
                            silence: 0,
                            leader: leader + 1,
                        }
                    }
                }
                else {
                    CalibrationState::Locked {
                        silence: 0,
                        leader: 0,
                    }
                }
            }
            CalibrationState::Relock { length } => {
                if frequency == LEADER_TONE && length < leader_max {
                    CalibrationState::Leader1 { length: length + 1 }
                }
                else {
                    CalibrationState::Idle
                }
            }
        }
    }
}

impl CalibrationSource for CalibrationDetector {
    fn status(&self) -> CalibrationStatus {
        match self.state {
            CalibrationState::Idle | CalibrationState::Relock { .. } => CalibrationStatus::IDLE,
            CalibrationState::Leader1 { .. }
            | CalibrationState::Break { .. }
            | CalibrationState::Leader2 { .. } => CalibrationStatus::ACTIVE,
            CalibrationState::Locked { .. } => CalibrationStatus::OK,
        }
    }

    #[inline]
    fn advance(&mut self, frequency: Frequency) {
        self.state = self.next(frequency);
    }

    #[inline]
    fn reset(&mut self) {
        self.state = CalibrationState::Idle;
    }
}

/// Whether `frequency` is none of the tones a transmission uses.
#[inline]
fn is_silence(frequency: Frequency) -> bool {
    !matches!(frequency, VIS_HIGH_TONE | SYNC_TONE | VIS_LOW_TONE | CHANNEL_LOW_TONE..=CHANNEL_HIGH_TONE)
}
