use crate::{
    Frequency,
    HEIGHT,
    HSYNC_TONE,
    WIDTH,
    calibration::{
        CalibrationDetector,
        CalibrationSource,
        CalibrationStatus,
        ExternalCalibration,
    },
    classify::{
        ClassifyPixel,
        LinearClassifier,
    },
    image::{
        FrameBufferMut,
        Framebuffer,
        PixelColor,
    },
    is_channel_tone,
    modes::{
        Mode,
        VisCode,
    },
    timing::Timing,
    vis::{
        VisDecoder,
        VisInput,
    },
};

/// Reasons for a state machine to fall back to idle.
///
/// These never reach the caller. They only show up in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFault {
    #[error("sync tone missing at bit midpoint")]
    InvalidSyncTone,
    #[error("no VIS bit tone at bit midpoint")]
    InvalidDataTone,
    #[error("VIS parity mismatch")]
    ParityMismatch,
    #[error("calibration lost")]
    CalibrationLost,
}

/// Position of the frame decoder within the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCursor {
    pub row: usize,
    pub col: usize,
    /// Tick within the current pixel window, starting at 1.
    pub counter: u32,
}

impl FrameCursor {
    pub const START: Self = Self {
        row: 0,
        col: 0,
        counter: 1,
    };

    #[inline]
    pub fn address(&self) -> usize {
        Framebuffer::address(self.col, self.row)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Calibrating,
    VisDecoding,
    FrameDecoding {
        cursor: FrameCursor,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWrite {
    pub address: usize,
    pub color: PixelColor,
}

impl PixelWrite {
    #[inline]
    pub fn x(&self) -> usize {
        self.address % WIDTH
    }

    #[inline]
    pub fn y(&self) -> usize {
        self.address / WIDTH
    }
}

/// Everything the orchestrator looks at during one tick. Calibration and
/// VIS values are those committed at the end of the previous tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorInput {
    pub frequency: Frequency,
    pub calibration: CalibrationStatus,
    pub vis_valid: bool,
    pub vis_code: VisCode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorStep {
    pub phase: Phase,
    pub write: Option<PixelWrite>,
    pub frame_complete: bool,
}

impl OrchestratorStep {
    #[inline]
    fn to(phase: Phase) -> Self {
        Self {
            phase,
            write: None,
            frame_complete: false,
        }
    }
}

/// Top-level receive state machine.
#[derive(Clone, Copy, Debug)]
pub struct Orchestrator {
    timing: Timing,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            phase: Phase::Idle,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn step<P>(&mut self, input: &OrchestratorInput, classifier: &P) -> OrchestratorStep
    where
        P: ClassifyPixel,
    {
        let step = self.next(input, classifier);
        self.phase = step.phase;
        step
    }

    /// Computes the next phase and this tick's pixel write, without
    /// modifying the orchestrator.
    pub fn next<P>(&self, input: &OrchestratorInput, classifier: &P) -> OrchestratorStep
    where
        P: ClassifyPixel,
    {
        let calibration = input.calibration;

        match self.phase {
            Phase::Idle => {
                if calibration.active {
                    tracing::debug!("calibration started");
                    OrchestratorStep::to(Phase::Calibrating)
                }
                else {
                    OrchestratorStep::to(Phase::Idle)
                }
            }
            Phase::Calibrating => {
                if calibration.active {
                    OrchestratorStep::to(Phase::Calibrating)
                }
                else if calibration.ok {
                    OrchestratorStep::to(Phase::VisDecoding)
                }
                else {
                    tracing::debug!("calibration failed");
                    OrchestratorStep::to(Phase::Idle)
                }
            }
            Phase::VisDecoding => {
                if input.vis_valid {
                    log_vis_code(input.vis_code);
                    OrchestratorStep::to(Phase::FrameDecoding {
                        cursor: FrameCursor::START,
                    })
                }
                else if !calibration.ok {
                    tracing::debug!(fault = %DecodeFault::CalibrationLost, "waiting for VIS");
                    OrchestratorStep::to(Phase::Idle)
                }
                else {
                    OrchestratorStep::to(Phase::VisDecoding)
                }
            }
            Phase::FrameDecoding { cursor } => {
                if !calibration.active && !calibration.ok {
                    tracing::debug!(
                        fault = %DecodeFault::CalibrationLost,
                        row = cursor.row,
                        col = cursor.col,
                        "frame aborted"
                    );
                    OrchestratorStep::to(Phase::Idle)
                }
                else {
                    self.decode_frame(cursor, input.frequency, classifier)
                }
            }
        }
    }

    fn decode_frame<P>(
        &self,
        mut cursor: FrameCursor,
        frequency: Frequency,
        classifier: &P,
    ) -> OrchestratorStep
    where
        P: ClassifyPixel,
    {
        let address = cursor.address();
        let mut write = None;

        if frequency == HSYNC_TONE {
            cursor.col = 0;
            cursor.counter = 1;
        }
        else if is_channel_tone(frequency) {
            if cursor.counter == self.timing.pixel_midpoint() {
                write = Some(PixelWrite {
                    address,
                    color: classifier.classify(frequency),
                });
            }

            if cursor.counter == self.timing.pixel_period {
                cursor.counter = 1;
                if cursor.col == WIDTH - 1 {
                    cursor.col = 0;
                    cursor.row += 1;
                    if cursor.row == HEIGHT {
                        return OrchestratorStep {
                            phase: Phase::Idle,
                            write,
                            frame_complete: true,
                        };
                    }
                }
                else {
                    cursor.col += 1;
                }
            }
            else {
                cursor.counter += 1;
            }
        }
        // any other tone stalls the pixel window

        OrchestratorStep {
            phase: Phase::FrameDecoding { cursor },
            write,
            frame_complete: false,
        }
    }
}

fn log_vis_code(vis_code: VisCode) {
    if let Some(mode) = Mode::from_vis_code(vis_code) {
        tracing::info!(%vis_code, mode = mode.name, "VIS header decoded");
    }
    else {
        tracing::warn!(%vis_code, "unknown mode, decoding as {}", Mode::ROBOT8.name);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickInput {
    pub frequency: Frequency,
    pub reset: bool,
}

impl TickInput {
    #[inline]
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            reset: false,
        }
    }

    #[inline]
    pub fn reset() -> Self {
        Self {
            frequency: 0,
            reset: true,
        }
    }
}

impl From<Frequency> for TickInput {
    #[inline]
    fn from(value: Frequency) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickOutput {
    pub vis_code: VisCode,
    pub vis_valid: bool,
    pub write: Option<PixelWrite>,
    pub phase: Phase,
}

/// Calibration detector, VIS decoder and orchestrator, advanced together
/// one tick at a time.
///
/// Every tick all components compute their next state from the state all
/// of them had at the start of the tick, then all of them commit.
#[derive(Clone, Debug)]
pub struct Receiver<C = CalibrationDetector, P = LinearClassifier, F = Framebuffer> {
    calibration: C,
    classifier: P,
    vis: VisDecoder,
    orchestrator: Orchestrator,
    frame_buffer: F,
    frames_completed: usize,
    pixels_written: usize,
}

impl Receiver {
    pub fn new(timing: Timing) -> Self {
        Self::from_parts(
            timing,
            CalibrationDetector::new(timing),
            LinearClassifier,
            Framebuffer::new(),
        )
    }
}

impl<C, P, F> Receiver<C, P, F> {
    pub fn from_parts(timing: Timing, calibration: C, classifier: P, frame_buffer: F) -> Self {
        Self {
            calibration,
            classifier,
            vis: VisDecoder::new(timing),
            orchestrator: Orchestrator::new(timing),
            frame_buffer,
            frames_completed: 0,
            pixels_written: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    #[inline]
    pub fn vis(&self) -> &VisDecoder {
        &self.vis
    }

    #[inline]
    pub fn calibration(&self) -> &C {
        &self.calibration
    }

    #[inline]
    pub fn calibration_mut(&mut self) -> &mut C {
        &mut self.calibration
    }

    #[inline]
    pub fn frame_buffer(&self) -> &F {
        &self.frame_buffer
    }

    #[inline]
    pub fn into_frame_buffer(self) -> F {
        self.frame_buffer
    }

    #[inline]
    pub fn frames_completed(&self) -> usize {
        self.frames_completed
    }

    #[inline]
    pub fn pixels_written(&self) -> usize {
        self.pixels_written
    }
}

impl<C, P, F> Receiver<C, P, F>
where
    C: CalibrationSource,
    P: ClassifyPixel,
    F: FrameBufferMut,
{
    pub fn step(&mut self, input: impl Into<TickInput>) -> TickOutput {
        let input = input.into();

        if input.reset {
            tracing::debug!("reset");
            self.calibration.reset();
            self.vis.reset();
            self.orchestrator.reset();
            return self.output(None);
        }

        let calibration = self.calibration.status();

        let vis = self.vis.next(&VisInput {
            frequency: input.frequency,
            cal_ok: calibration.ok,
            clear: self.orchestrator.phase() == Phase::Calibrating,
        });

        let step = self.orchestrator.next(
            &OrchestratorInput {
                frequency: input.frequency,
                calibration,
                vis_valid: self.vis.valid(),
                vis_code: self.vis.code(),
            },
            &self.classifier,
        );

        // commit
        self.calibration.advance(input.frequency);
        self.vis = vis;
        self.orchestrator.phase = step.phase;

        if let Some(write) = step.write {
            self.frame_buffer.set_pixel(write.x(), write.y(), write.color);
            self.pixels_written += 1;
        }
        if step.frame_complete {
            self.frames_completed += 1;
            tracing::info!(
                frames_completed = self.frames_completed,
                pixels_written = self.pixels_written,
                "frame complete"
            );
        }

        self.output(step.write)
    }

    /// Steps through all `frequencies` and returns how many frames were
    /// completed meanwhile.
    pub fn feed(&mut self, frequencies: impl IntoIterator<Item = Frequency>) -> usize {
        let frames_before = self.frames_completed;
        for frequency in frequencies {
            self.step(frequency);
        }
        self.frames_completed - frames_before
    }

    fn output(&self, write: Option<PixelWrite>) -> TickOutput {
        TickOutput {
            vis_code: self.vis.code(),
            vis_valid: self.vis.valid(),
            write,
            phase: self.orchestrator.phase(),
        }
    }
}

impl<P, F> Receiver<ExternalCalibration, P, F>
where
    P: ClassifyPixel,
    F: FrameBufferMut,
{
    /// Steps with calibration flags supplied along with the tone.
    pub fn step_with_calibration(
        &mut self,
        input: impl Into<TickInput>,
        calibration: CalibrationStatus,
    ) -> TickOutput {
        self.calibration.set(calibration);
        self.step(input)
    }
}

#[cfg(test)]
mod tests {
    use std::iter;

    use crate::{
        CHANNEL_HIGH_TONE,
        CHANNEL_LOW_TONE,
        Frequency,
        HEIGHT,
        HSYNC_TONE,
        LEADER_TONE,
        NUM_PIXELS,
        SYNC_TONE,
        VIS_HIGH_TONE,
        VIS_LOW_TONE,
        WIDTH,
        calibration::{
            CalibrationSource,
            CalibrationStatus,
            ExternalCalibration,
        },
        classify::LinearClassifier,
        image::{
            Framebuffer,
            PixelColor,
        },
        modes::VisCode,
        receiver::{
            FrameCursor,
            Orchestrator,
            OrchestratorInput,
            Phase,
            PixelWrite,
            Receiver,
            TickInput,
        },
        timing::Timing,
        vis::VisState,
    };

    const TIMING: Timing = Timing::TEST;

    fn input(frequency: Frequency, calibration: CalibrationStatus) -> OrchestratorInput {
        OrchestratorInput {
            frequency,
            calibration,
            vis_valid: false,
            vis_code: VisCode::default(),
        }
    }

    fn frame_decoding() -> Orchestrator {
        let mut orchestrator = Orchestrator::new(TIMING);
        orchestrator.step(&input(0, CalibrationStatus::ACTIVE), &LinearClassifier);
        orchestrator.step(&input(0, CalibrationStatus::OK), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::VisDecoding);
        orchestrator.step(
            &OrchestratorInput {
                vis_valid: true,
                ..input(0, CalibrationStatus::OK)
            },
            &LinearClassifier,
        );
        assert_eq!(
            orchestrator.phase(),
            Phase::FrameDecoding {
                cursor: FrameCursor::START
            }
        );
        orchestrator
    }

    fn cursor(orchestrator: &Orchestrator) -> FrameCursor {
        match orchestrator.phase() {
            Phase::FrameDecoding { cursor } => cursor,
            phase => panic!("not decoding a frame: {phase:?}"),
        }
    }

    fn line(color: impl Fn(usize) -> PixelColor) -> impl Iterator<Item = Frequency> {
        iter::repeat_n(HSYNC_TONE, TIMING.hsync_gap as usize).chain((0..WIDTH).flat_map(
            move |x| iter::repeat_n(color(x).tone(), TIMING.pixel_period as usize),
        ))
    }

    #[test]
    fn calibration_sequencing() {
        let mut orchestrator = Orchestrator::new(TIMING);
        orchestrator.step(&input(0, CalibrationStatus::IDLE), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::Idle);

        orchestrator.step(&input(0, CalibrationStatus::ACTIVE), &LinearClassifier);
        orchestrator.step(&input(0, CalibrationStatus::ACTIVE), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::Calibrating);

        orchestrator.step(&input(0, CalibrationStatus::OK), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::VisDecoding);

        // waits for the VIS decoder as long as calibration holds
        for _ in 0..100 {
            orchestrator.step(&input(SYNC_TONE, CalibrationStatus::OK), &LinearClassifier);
        }
        assert_eq!(orchestrator.phase(), Phase::VisDecoding);

        orchestrator.step(&input(SYNC_TONE, CalibrationStatus::IDLE), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn failed_calibration_returns_to_idle() {
        let mut orchestrator = Orchestrator::new(TIMING);
        orchestrator.step(&input(0, CalibrationStatus::ACTIVE), &LinearClassifier);
        orchestrator.step(&input(0, CalibrationStatus::IDLE), &LinearClassifier);
        assert_eq!(orchestrator.phase(), Phase::Idle);
    }

    #[test]
    fn hsync_resets_column() {
        let mut orchestrator = frame_decoding();
        for frequency in line(|_| PixelColor::WHITE).take(TIMING.hsync_gap as usize + 10 * 7) {
            orchestrator.step(&input(frequency, CalibrationStatus::OK), &LinearClassifier);
        }
        assert_eq!(cursor(&orchestrator).col, 10);

        orchestrator.step(&input(HSYNC_TONE, CalibrationStatus::OK), &LinearClassifier);
        assert_eq!(
            cursor(&orchestrator),
            FrameCursor {
                row: 0,
                col: 0,
                counter: 1
            }
        );
    }

    #[test]
    fn full_frame_writes_every_address_once_in_order() {
        let mut orchestrator = frame_decoding();
        let mut writes = vec![];

        for y in 0..HEIGHT {
            let color = move |x: usize| {
                if (x + y) % 2 == 0 {
                    PixelColor::BLACK
                }
                else {
                    PixelColor::WHITE
                }
            };
            for frequency in line(color) {
                let step =
                    orchestrator.step(&input(frequency, CalibrationStatus::OK), &LinearClassifier);
                writes.extend(step.write);
                if step.frame_complete {
                    assert_eq!(y, HEIGHT - 1);
                }
            }
        }

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(writes.len(), NUM_PIXELS);
        for (i, write) in writes.iter().enumerate() {
            assert_eq!(write.address, i);
            let expected = if (write.x() + write.y()) % 2 == 0 {
                PixelColor::BLACK
            }
            else {
                PixelColor::WHITE
            };
            assert_eq!(write.color, expected);
        }
    }

    #[test]
    fn writes_at_pixel_midpoint() {
        let mut orchestrator = frame_decoding();
        orchestrator.step(&input(HSYNC_TONE, CalibrationStatus::OK), &LinearClassifier);

        let writes = (1..=TIMING.pixel_period)
            .map(|_| {
                orchestrator
                    .step(&input(CHANNEL_HIGH_TONE, CalibrationStatus::OK), &LinearClassifier)
                    .write
            })
            .collect::<Vec<_>>();

        let midpoint = TIMING.pixel_midpoint() as usize;
        for (i, write) in writes.iter().enumerate() {
            if i + 1 == midpoint {
                assert_eq!(
                    *write,
                    Some(PixelWrite {
                        address: 0,
                        color: PixelColor::WHITE
                    })
                );
            }
            else {
                assert_eq!(*write, None);
            }
        }
        assert_eq!(cursor(&orchestrator).col, 1);
    }

    #[test]
    fn out_of_band_tone_stalls_pixel_window() {
        let mut orchestrator = frame_decoding();
        orchestrator.step(&input(HSYNC_TONE, CalibrationStatus::OK), &LinearClassifier);
        orchestrator.step(&input(CHANNEL_LOW_TONE, CalibrationStatus::OK), &LinearClassifier);
        let before = cursor(&orchestrator);

        for frequency in [0, 1000, 1100, 1300, 2400, 4095] {
            let step =
                orchestrator.step(&input(frequency, CalibrationStatus::OK), &LinearClassifier);
            assert_eq!(step.write, None);
            assert_eq!(cursor(&orchestrator), before);
        }
    }

    #[test]
    fn lost_calibration_ends_frame() {
        let mut orchestrator = frame_decoding();
        // either flag keeps the frame going
        orchestrator.step(&input(HSYNC_TONE, CalibrationStatus::ACTIVE), &LinearClassifier);
        assert!(matches!(orchestrator.phase(), Phase::FrameDecoding { .. }));

        let step = orchestrator.step(
            &input(CHANNEL_LOW_TONE, CalibrationStatus::IDLE),
            &LinearClassifier,
        );
        assert_eq!(step.phase, Phase::Idle);
        assert_eq!(step.write, None);
    }

    /// Start bit, 0x02 with parity and stop bit.
    fn vis_header() -> Vec<Frequency> {
        let code = VisCode::new(0x02).unwrap();
        let bits = (0..7).map(|bit| code.get_bit(bit)).chain([code.parity()]);
        iter::once(SYNC_TONE)
            .chain(bits.map(|bit| if bit { VIS_HIGH_TONE } else { VIS_LOW_TONE }))
            .chain(iter::once(SYNC_TONE))
            .flat_map(|frequency| iter::repeat_n(frequency, TIMING.bit_period as usize))
            .collect()
    }

    fn receiver_calibrating() -> Receiver<ExternalCalibration> {
        let mut receiver = Receiver::from_parts(
            TIMING,
            ExternalCalibration::default(),
            LinearClassifier,
            Framebuffer::new(),
        );

        receiver.step_with_calibration(LEADER_TONE, CalibrationStatus::ACTIVE);
        receiver.step_with_calibration(LEADER_TONE, CalibrationStatus::ACTIVE);
        assert_eq!(receiver.phase(), Phase::Calibrating);
        receiver
    }

    /// Drives a receiver with externally supplied calibration through a
    /// VIS header into frame decoding.
    fn receiver_in_frame() -> Receiver<ExternalCalibration> {
        let mut receiver = receiver_calibrating();
        for frequency in vis_header().into_iter().chain(iter::repeat_n(HSYNC_TONE, 3)) {
            receiver.step_with_calibration(frequency, CalibrationStatus::OK);
        }

        assert_eq!(receiver.vis().state(), VisState::ParityHold);
        assert!(receiver.vis().valid());
        assert!(matches!(receiver.phase(), Phase::FrameDecoding { .. }));
        receiver
    }

    #[test]
    fn receiver_decodes_frame_with_external_calibration() {
        let mut receiver = receiver_in_frame();
        for y in 0..HEIGHT {
            for frequency in line(|x| PixelColor::from_low_bits((x / 4 + y) as u8)) {
                receiver.step_with_calibration(frequency, CalibrationStatus::OK);
            }
        }

        assert_eq!(receiver.phase(), Phase::Idle);
        assert_eq!(receiver.frames_completed(), 1);
        assert_eq!(receiver.pixels_written(), NUM_PIXELS);
        let frame_buffer = receiver.frame_buffer();
        assert_eq!(frame_buffer.get_xy(9, 3), Some(PixelColor::from_low_bits(5)));
        assert_eq!(frame_buffer.get_xy(159, 119), Some(PixelColor::from_low_bits(39 + 119)));
    }

    #[test]
    fn reset_during_calibration() {
        let mut receiver = receiver_calibrating();

        let output = receiver.step(TickInput::reset());
        assert_eq!(output.phase, Phase::Idle);
        assert_eq!(receiver.calibration().status(), CalibrationStatus::IDLE);

        // a completed calibration alone doesn't resume
        receiver.step_with_calibration(SYNC_TONE, CalibrationStatus::OK);
        assert_eq!(receiver.phase(), Phase::Idle);
    }

    #[test]
    fn reset_during_vis_reception() {
        let mut receiver = receiver_calibrating();
        let header = vis_header();
        let (head, rest) = header.split_at(TIMING.bit_period as usize + 10);
        for frequency in head {
            receiver.step_with_calibration(*frequency, CalibrationStatus::OK);
        }
        assert_eq!(receiver.phase(), Phase::VisDecoding);
        assert!(matches!(receiver.vis().state(), VisState::Receiving { .. }));

        let output = receiver.step(TickInput::reset());
        assert_eq!(output.phase, Phase::Idle);
        assert_eq!(receiver.vis().state(), VisState::Idle);

        // the rest of the header is ignored
        for frequency in rest.iter().copied().chain(iter::repeat_n(HSYNC_TONE, 3)) {
            let output = receiver.step_with_calibration(frequency, CalibrationStatus::OK);
            assert!(!output.vis_valid);
            assert_eq!(output.phase, Phase::Idle);
        }
        assert_ne!(receiver.vis().state(), VisState::ParityHold);
    }

    #[test]
    fn reset_during_frame_decoding() {
        let mut receiver = receiver_in_frame();
        for frequency in line(|_| PixelColor::WHITE).take(500) {
            receiver.step_with_calibration(frequency, CalibrationStatus::OK);
        }

        let output = receiver.step(TickInput::reset());
        assert_eq!(output.phase, Phase::Idle);
        assert!(!output.vis_valid);
        assert_eq!(receiver.vis().state(), VisState::Idle);
        assert_eq!(receiver.calibration().status(), CalibrationStatus::IDLE);

        // pixels written before the reset stay in the frame buffer
        assert_eq!(receiver.frame_buffer().get(0).unwrap(), PixelColor::WHITE);
    }

    #[test]
    fn vis_output_cleared_by_new_calibration() {
        let mut receiver = receiver_in_frame();
        receiver.step_with_calibration(0, CalibrationStatus::IDLE);
        assert_eq!(receiver.phase(), Phase::Idle);
        assert!(receiver.vis().valid());

        receiver.step_with_calibration(LEADER_TONE, CalibrationStatus::ACTIVE);
        assert!(receiver.vis().valid());
        let output = receiver.step_with_calibration(LEADER_TONE, CalibrationStatus::ACTIVE);
        assert!(!output.vis_valid);
    }
}
