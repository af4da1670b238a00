//! Frequency to pixel color mapping

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    Frequency,
    image::PixelColor,
    util::unlerp,
};

/// Maps an instantaneous frequency to a 2-bit color.
///
/// The receiver only asks for a color when the frequency lies within the
/// channel band.
pub trait ClassifyPixel {
    fn classify(&self, frequency: Frequency) -> PixelColor;
}

impl<F> ClassifyPixel for F
where
    F: Fn(Frequency) -> PixelColor,
{
    #[inline]
    fn classify(&self, frequency: Frequency) -> PixelColor {
        self(frequency)
    }
}

/// Maps the channel band linearly onto the 4 color levels, rounding to the
/// nearest one.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearClassifier;

impl ClassifyPixel for LinearClassifier {
    fn classify(&self, frequency: Frequency) -> PixelColor {
        let t = unlerp(
            f32::from(frequency),
            f32::from(CHANNEL_LOW_TONE),
            f32::from(CHANNEL_HIGH_TONE),
        )
        .clamp(0.0, 1.0);
        PixelColor::from_low_bits((t * f32::from(PixelColor::MAX)).round() as u8)
    }
}
