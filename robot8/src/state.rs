//! Sequence of segments a Robot-8 transmission is made of

use crate::{
    HEIGHT,
    WIDTH,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Header { header_state: HeaderState },
    Line { y: usize, line_state: LineState },
}

impl Default for State {
    fn default() -> Self {
        State::Header {
            header_state: HeaderState::Leader1,
        }
    }
}

impl State {
    /// The segment that follows this one, or `None` after the last pixel.
    pub fn next(&self) -> Option<Self> {
        let mut state = *self;
        match &mut state {
            Self::Header { header_state } => {
                match header_state {
                    HeaderState::Leader1 => *header_state = HeaderState::LeaderBreak,
                    HeaderState::LeaderBreak => *header_state = HeaderState::Leader2,
                    HeaderState::Leader2 => *header_state = HeaderState::VisStart,
                    HeaderState::VisStart => {
                        *header_state = HeaderState::VisBit { bit: 0 };
                    }
                    HeaderState::VisBit { bit } => {
                        *bit += 1;
                        if *bit == 8 {
                            *header_state = HeaderState::VisStop;
                        }
                    }
                    HeaderState::VisStop => {
                        state = State::Line {
                            y: 0,
                            line_state: LineState::Sync,
                        }
                    }
                }
            }
            Self::Line { y, line_state } => {
                match line_state {
                    LineState::Sync => {
                        *line_state = LineState::Scan { x: 0 };
                    }
                    LineState::Scan { x } => {
                        *x += 1;
                        if *x == WIDTH {
                            *y += 1;
                            if *y == HEIGHT {
                                return None;
                            }
                            *line_state = LineState::Sync;
                        }
                    }
                }
            }
        }

        Some(state)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderState {
    Leader1,
    LeaderBreak,
    Leader2,
    VisStart,
    /// Bits 0 to 6 carry the code, bit 7 is the parity bit.
    VisBit { bit: u8 },
    VisStop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineState {
    Sync,
    Scan { x: usize },
}

#[cfg(test)]
mod tests {
    use std::iter;

    use crate::{
        HEIGHT,
        WIDTH,
        state::{
            HeaderState,
            LineState,
            State,
        },
    };

    #[test]
    fn segment_counts() {
        let states = iter::successors(Some(State::default()), State::next).collect::<Vec<_>>();

        // leader, break, leader, start, 8 bits, stop
        let header = states
            .iter()
            .filter(|state| matches!(state, State::Header { .. }))
            .count();
        assert_eq!(header, 13);

        let syncs = states
            .iter()
            .filter(|state| {
                matches!(
                    state,
                    State::Line {
                        line_state: LineState::Sync,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(syncs, HEIGHT);
        assert_eq!(states.len(), 13 + HEIGHT * (WIDTH + 1));
    }

    #[test]
    fn header_runs_into_first_line() {
        let stop = State::Header {
            header_state: HeaderState::VisStop,
        };
        assert_eq!(
            stop.next(),
            Some(State::Line {
                y: 0,
                line_state: LineState::Sync
            })
        );

        let last = State::Line {
            y: HEIGHT - 1,
            line_state: LineState::Scan { x: WIDTH - 1 },
        };
        assert_eq!(last.next(), None);
    }
}
