//! VIS header decoder
//!
//! The header is a start bit at the sync frequency, 7 data bits LSB-first,
//! an even parity bit and a stop bit at the sync frequency. Every bit lasts
//! one bit period and is sampled once, at its midpoint.

use crate::{
    Frequency,
    SYNC_TONE,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    modes::VisCode,
    receiver::DecodeFault,
    timing::Timing,
};

const NUM_BITS: u8 = 8;

/// Bits are shifted in at this position and move down one position at the
/// end of every bit window.
const SHIFT_IN: u16 = 1 << NUM_BITS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisState {
    #[default]
    Idle,
    SyncBegin {
        counter: u32,
    },
    Receiving {
        counter: u32,
        bit_num: u8,
        bits: u16,
    },
    SyncEnd {
        counter: u32,
        bits: u16,
    },
    ParityHold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisInput {
    pub frequency: Frequency,
    pub cal_ok: bool,
    /// Drops the latched code. Asserted while a new calibration is running.
    pub clear: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct VisDecoder {
    timing: Timing,
    state: VisState,
    code: VisCode,
    valid: bool,
}

impl VisDecoder {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: VisState::Idle,
            code: VisCode::default(),
            valid: false,
        }
    }

    #[inline]
    pub fn state(&self) -> VisState {
        self.state
    }

    /// The latched code. Only meaningful if [`valid`](Self::valid) is true.
    #[inline]
    pub fn code(&self) -> VisCode {
        self.code
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.timing);
    }

    pub fn step(&mut self, input: &VisInput) {
        *self = self.next(input);
    }

    /// Computes the decoder as it will be after this tick, without
    /// modifying it.
    pub fn next(&self, input: &VisInput) -> Self {
        let mut next = *self;

        if input.clear {
            next.code = VisCode::default();
            next.valid = false;
        }

        match self.transition(input) {
            Ok(Transition::To(state)) => next.state = state,
            Ok(Transition::Latch { bits }) => {
                next.state = VisState::ParityHold;

                let code = VisCode::from_low_bits(bits as u8);
                let parity = bits & (1 << 7) != 0;
                if code.parity() == parity {
                    tracing::debug!(%code, "vis code received");
                    next.code = code;
                    next.valid = true;
                }
                else {
                    tracing::debug!(%code, parity, fault = %DecodeFault::ParityMismatch);
                }
            }
            Err(fault) => {
                tracing::debug!(state = ?self.state, frequency = input.frequency, %fault);
                next.state = VisState::Idle;
            }
        }

        next
    }

    fn transition(&self, input: &VisInput) -> Result<Transition, DecodeFault> {
        let bit_period = self.timing.bit_period;
        let midpoint = self.timing.bit_midpoint();

        let state = match self.state {
            VisState::Idle => {
                if input.cal_ok && input.frequency == SYNC_TONE {
                    VisState::SyncBegin { counter: 1 }
                }
                else {
                    VisState::Idle
                }
            }
            VisState::SyncBegin { counter } => {
                if counter == midpoint && input.frequency != SYNC_TONE {
                    return Err(DecodeFault::InvalidSyncTone);
                }
                else if counter == bit_period {
                    VisState::Receiving {
                        counter: 1,
                        bit_num: 0,
                        bits: 0,
                    }
                }
                else {
                    VisState::SyncBegin {
                        counter: counter + 1,
                    }
                }
            }
            VisState::Receiving {
                counter,
                mut bit_num,
                mut bits,
            } => {
                if counter == midpoint {
                    let bit = match input.frequency {
                        VIS_LOW_TONE => 0,
                        VIS_HIGH_TONE => 1,
                        _ => return Err(DecodeFault::InvalidDataTone),
                    };
                    if bit == 1 {
                        bits |= SHIFT_IN;
                    }
                    bit_num += 1;
                }

                if counter == bit_period {
                    bits >>= 1;
                    if bit_num == NUM_BITS {
                        VisState::SyncEnd { counter: 1, bits }
                    }
                    else {
                        VisState::Receiving {
                            counter: 1,
                            bit_num,
                            bits,
                        }
                    }
                }
                else {
                    VisState::Receiving {
                        counter: counter + 1,
                        bit_num,
                        bits,
                    }
                }
            }
            VisState::SyncEnd { counter, bits } => {
                if counter == midpoint && input.frequency != SYNC_TONE {
                    return Err(DecodeFault::InvalidSyncTone);
                }
                else if counter == bit_period {
                    return Ok(Transition::Latch { bits });
                }
                else {
                    VisState::SyncEnd {
                        counter: counter + 1,
                        bits,
                    }
                }
            }
            VisState::ParityHold => {
                if input.cal_ok {
                    VisState::ParityHold
                }
                else {
                    VisState::Idle
                }
            }
        };

        Ok(Transition::To(state))
    }
}

#[derive(Clone, Copy, Debug)]
enum Transition {
    To(VisState),
    /// The stop bit completed, check parity and latch the code.
    Latch { bits: u16 },
}
