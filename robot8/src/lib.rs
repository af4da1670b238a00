//! Tick-level receiver for Robot-8 SSTV transmissions.
//!
//! The input is a stream of already classified tone frequencies, one per
//! tick. The [`Receiver`] recognizes the calibration preamble and the VIS
//! header, then decodes a 160×120 image with 2 bits per pixel into a
//! [`Framebuffer`].
//!
//! # References
//!
//! - <http://lionel.cordesses.free.fr/gpages/sstv.html>
//! - <https://web.archive.org/web/20050306193820/http://www.tima.com/~djones/vis.txt>
//! - <http://www.barberdsp.com/downloads/Dayton%20Paper.pdf>

pub mod calibration;
pub mod classify;
mod encoder;
pub mod image;
pub mod modes;
mod receiver;
pub mod state;
pub mod timing;
mod util;
pub mod vis;

pub use crate::{
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
    encoder::{
        ToneEncoder,
        ToneEncoderBuilder,
    },
    image::{
        FrameBuffer,
        FrameBufferMut,
        Framebuffer,
        PixelColor,
    },
    modes::{
        Mode,
        VisCode,
    },
    receiver::{
        DecodeFault,
        FrameCursor,
        Orchestrator,
        OrchestratorInput,
        OrchestratorStep,
        Phase,
        PixelWrite,
        Receiver,
        TickInput,
        TickOutput,
    },
    timing::{
        Timing,
        TimingProfile,
    },
    vis::{
        VisDecoder,
        VisInput,
        VisState,
    },
};

/// Frequency estimate in Hz, as delivered per tick by the tone classifier.
pub type Frequency = u16;

pub const LEADER_TONE: Frequency = 1900;

// leader break, vis start/stop and line sync
pub const SYNC_TONE: Frequency = 1200;
pub const HSYNC_TONE: Frequency = SYNC_TONE;

/// VIS tone for a `0` bit.
pub const VIS_LOW_TONE: Frequency = 1300;
/// VIS tone for a `1` bit.
pub const VIS_HIGH_TONE: Frequency = 1100;

pub const CHANNEL_LOW_TONE: Frequency = 1500;
pub const CHANNEL_HIGH_TONE: Frequency = 2300;

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 120;
pub const NUM_PIXELS: usize = WIDTH * HEIGHT;

#[inline]
pub fn is_channel_tone(frequency: Frequency) -> bool {
    (CHANNEL_LOW_TONE..=CHANNEL_HIGH_TONE).contains(&frequency)
}
