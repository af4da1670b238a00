use std::{
    fs::File,
    io::{
        BufReader,
        Read,
    },
    path::Path,
};

use robot8::{
    CalibrationSource,
    ExternalCalibration,
    Framebuffer,
    LinearClassifier,
    Mode,
    Receiver,
    Timing,
    VisCode,
};
use serde::Serialize;

use crate::{
    Error,
    ticks::{
        TickReader,
        TickRecord,
    },
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub ticks: usize,
    /// Last VIS code the receiver reported as valid.
    pub vis_code: Option<u8>,
    pub mode: Option<&'static str>,
    pub frames_completed: usize,
    pub pixels_written: usize,
    /// Whether calibration flags were replayed from the input.
    pub external_calibration: bool,
}

pub fn decode_path(
    path: impl AsRef<Path>,
    timing: Timing,
) -> Result<(DecodeSummary, Framebuffer), Error> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Decoding ticks");
    decode(BufReader::new(File::open(path)?), timing)
}

pub fn decode<R>(reader: R, timing: Timing) -> Result<(DecodeSummary, Framebuffer), Error>
where
    R: Read,
{
    let mut reader = TickReader::new(reader)?;
    let external_calibration = reader.has_calibration();

    let (mut summary, frame_buffer) = if external_calibration {
        let receiver = Receiver::from_parts(
            timing,
            ExternalCalibration::default(),
            LinearClassifier,
            Framebuffer::new(),
        );
        run(receiver, reader.records(), |calibration, record| {
            calibration.set(record.calibration());
        })
    }
    else {
        run(Receiver::new(timing), reader.records(), |_, _| {})
    }?;

    summary.external_calibration = external_calibration;
    tracing::info!(?summary);
    Ok((summary, frame_buffer))
}

fn run<C>(
    mut receiver: Receiver<C>,
    records: impl Iterator<Item = Result<TickRecord, Error>>,
    mut calibrate: impl FnMut(&mut C, &TickRecord),
) -> Result<(DecodeSummary, Framebuffer), Error>
where
    C: CalibrationSource,
{
    let mut ticks = 0;
    let mut vis_code: Option<VisCode> = None;

    for record in records {
        let record = record?;
        calibrate(receiver.calibration_mut(), &record);
        let output = receiver.step(record.tick_input());
        if output.vis_valid {
            vis_code = Some(output.vis_code);
        }
        ticks += 1;
    }

    let summary = DecodeSummary {
        ticks,
        vis_code: vis_code.map(|vis_code| vis_code.get()),
        mode: vis_code
            .and_then(Mode::from_vis_code)
            .map(|mode| mode.name),
        frames_completed: receiver.frames_completed(),
        pixels_written: receiver.pixels_written(),
        external_calibration: false,
    };

    Ok((summary, receiver.into_frame_buffer()))
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use robot8::{
        PixelColor,
        Timing,
        ToneEncoder,
    };

    use crate::{
        args::Pattern,
        decode::decode,
        ticks::write_tones,
    };

    const TIMING: Timing = Timing::TEST;

    #[test]
    fn decodes_encoded_pattern() {
        let image = Pattern::Checker.frame_buffer();
        let mut data = vec![];
        write_tones(&mut data, ToneEncoder::new(&image, TIMING)).unwrap();

        let (summary, frame_buffer) = decode(&data[..], TIMING).unwrap();
        assert_eq!(summary.ticks, TIMING.transmission_length());
        assert_eq!(summary.vis_code, Some(0x02));
        assert_eq!(summary.mode, Some("Robot 8"));
        assert_eq!(summary.frames_completed, 1);
        assert_eq!(summary.pixels_written, robot8::NUM_PIXELS);
        assert!(!summary.external_calibration);
        assert_eq!(frame_buffer, image);
    }

    #[test]
    fn replays_calibration_columns() {
        let image = Pattern::Stripes.frame_buffer();
        let preamble = (2 * TIMING.leader + TIMING.leader_break) as usize;

        let mut data = String::from("frequency,cal_active,cal_ok\n");
        for (tick, frequency) in ToneEncoder::new(&image, TIMING).enumerate() {
            let (active, ok) = if tick < preamble { (1, 0) } else { (0, 1) };
            writeln!(data, "{frequency},{active},{ok}").unwrap();
        }

        let (summary, frame_buffer) = decode(data.as_bytes(), TIMING).unwrap();
        assert!(summary.external_calibration);
        assert_eq!(summary.frames_completed, 1);
        assert_eq!(frame_buffer, image);
        assert_eq!(frame_buffer.get_xy(25, 0), Some(PixelColor::LIGHT_GRAY));
    }

    #[test]
    fn calibration_never_ok_decodes_nothing() {
        let image = Pattern::Gradient.frame_buffer();
        let mut data = String::from("frequency,cal_active,cal_ok\n");
        for frequency in ToneEncoder::new(&image, TIMING) {
            writeln!(data, "{frequency},0,0").unwrap();
        }

        let (summary, _) = decode(data.as_bytes(), TIMING).unwrap();
        assert_eq!(summary.vis_code, None);
        assert_eq!(summary.mode, None);
        assert_eq!(summary.frames_completed, 0);
        assert_eq!(summary.pixels_written, 0);
    }
}
