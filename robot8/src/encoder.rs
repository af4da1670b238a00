use crate::{
    Frequency,
    HSYNC_TONE,
    LEADER_TONE,
    SYNC_TONE,
    VIS_HIGH_TONE,
    VIS_LOW_TONE,
    image::FrameBuffer,
    modes::{
        Mode,
        VisCode,
    },
    state::{
        HeaderState,
        LineState,
        State,
    },
    timing::Timing,
};

/// Generates the tone of every tick of a Robot-8 transmission of an image.
///
/// This is the mirror image of the [`Receiver`](crate::Receiver) and mostly
/// useful to produce test input for it.
#[derive(Clone, Debug)]
pub struct ToneEncoder<F> {
    frame_buffer: F,
    timing: Timing,
    vis_code: VisCode,
    flip_parity: bool,
    state: Option<(State, Pulse)>,
    remaining: usize,
}

impl<F> ToneEncoder<F>
where
    F: FrameBuffer,
{
    pub fn new(frame_buffer: F, timing: Timing) -> Self {
        ToneEncoderBuilder::new(timing).build(frame_buffer)
    }

    fn pulse(&self, state: &State) -> Pulse {
        let timing = &self.timing;
        match state {
            State::Header { header_state } => {
                match header_state {
                    HeaderState::Leader1 | HeaderState::Leader2 => {
                        Pulse::new(LEADER_TONE, timing.leader)
                    }
                    HeaderState::LeaderBreak => Pulse::new(SYNC_TONE, timing.leader_break),
                    HeaderState::VisStart | HeaderState::VisStop => {
                        Pulse::new(SYNC_TONE, timing.bit_period)
                    }
                    HeaderState::VisBit { bit } => {
                        let bit = if *bit == 7 {
                            self.vis_code.parity() ^ self.flip_parity
                        }
                        else {
                            self.vis_code.get_bit(*bit)
                        };
                        Pulse::new(
                            if bit { VIS_HIGH_TONE } else { VIS_LOW_TONE },
                            timing.bit_period,
                        )
                    }
                }
            }
            State::Line { y, line_state } => {
                match line_state {
                    LineState::Sync => Pulse::new(HSYNC_TONE, timing.hsync_gap),
                    LineState::Scan { x } => {
                        let color = self.frame_buffer.pixel(*x, *y);
                        Pulse::new(color.tone(), timing.pixel_period)
                    }
                }
            }
        }
    }
}

impl ToneEncoder<()> {
    /// The frame buffer type is picked by [`ToneEncoderBuilder::build`].
    pub fn builder(timing: Timing) -> ToneEncoderBuilder {
        ToneEncoderBuilder::new(timing)
    }
}

impl<F> Iterator for ToneEncoder<F>
where
    F: FrameBuffer,
{
    type Item = Frequency;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (state, pulse) = self.state.as_mut()?;

            if pulse.remaining > 0 {
                pulse.remaining -= 1;
                self.remaining -= 1;
                return Some(pulse.frequency);
            }

            if let Some(next_state) = state.next() {
                let next_pulse = self.pulse(&next_state);
                self.state = Some((next_state, next_pulse));
            }
            else {
                self.state = None;
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<F> ExactSizeIterator for ToneEncoder<F> where F: FrameBuffer {}

#[derive(Clone, Copy, Debug)]
pub struct ToneEncoderBuilder {
    timing: Timing,
    vis_code: VisCode,
    flip_parity: bool,
}

impl ToneEncoderBuilder {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            vis_code: Mode::ROBOT8.vis_code,
            flip_parity: false,
        }
    }

    pub fn with_vis_code(mut self, vis_code: VisCode) -> Self {
        self.vis_code = vis_code;
        self
    }

    /// Sends the wrong parity bit.
    pub fn with_flipped_parity(mut self, flip_parity: bool) -> Self {
        self.flip_parity = flip_parity;
        self
    }

    pub fn build<F>(self, frame_buffer: F) -> ToneEncoder<F>
    where
        F: FrameBuffer,
    {
        assert_eq!(frame_buffer.width(), crate::WIDTH);
        assert_eq!(frame_buffer.height(), crate::HEIGHT);

        let mut encoder = ToneEncoder {
            frame_buffer,
            timing: self.timing,
            vis_code: self.vis_code,
            flip_parity: self.flip_parity,
            state: None,
            remaining: self.timing.transmission_length(),
        };

        let state = State::default();
        let pulse = encoder.pulse(&state);
        encoder.state = Some((state, pulse));
        encoder
    }
}

#[derive(Clone, Copy, Debug)]
struct Pulse {
    frequency: Frequency,
    remaining: u32,
}

impl Pulse {
    #[inline]
    fn new(frequency: Frequency, duration: u32) -> Self {
        Self {
            frequency,
            remaining: duration,
        }
    }
}
