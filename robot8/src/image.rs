use image::{
    GrayImage,
    Luma,
};

use crate::{
    CHANNEL_HIGH_TONE,
    CHANNEL_LOW_TONE,
    Frequency,
    HEIGHT,
    NUM_PIXELS,
    WIDTH,
    util::lerp,
};

/// 2-bit pixel value. `0` is black, `3` is white.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PixelColor(u8);

impl PixelColor {
    pub const BLACK: Self = Self(0);
    pub const DARK_GRAY: Self = Self(1);
    pub const LIGHT_GRAY: Self = Self(2);
    pub const WHITE: Self = Self(3);

    pub const MAX: u8 = 3;

    #[inline]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        }
        else {
            None
        }
    }

    #[inline]
    pub const fn from_low_bits(value: u8) -> Self {
        Self(value & Self::MAX)
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Expands to the full 8-bit range.
    #[inline]
    pub fn luma(&self) -> u8 {
        self.0 * 85
    }

    /// Nearest 2-bit value for an 8-bit luma value.
    #[inline]
    pub fn from_luma(luma: u8) -> Self {
        Self(((u16::from(luma) * 3 + 127) / 255) as u8)
    }

    /// Tone a transmitter sends for this color.
    #[inline]
    pub fn tone(&self) -> Frequency {
        let t = f32::from(self.0) / f32::from(Self::MAX);
        lerp(t, f32::from(CHANNEL_LOW_TONE), f32::from(CHANNEL_HIGH_TONE)).round() as Frequency
    }
}

pub trait FrameBuffer {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn pixel(&self, x: usize, y: usize) -> PixelColor;
}

impl<F> FrameBuffer for &F
where
    F: FrameBuffer,
{
    #[inline]
    fn width(&self) -> usize {
        (&**self).width()
    }

    #[inline]
    fn height(&self) -> usize {
        (&**self).height()
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> PixelColor {
        (&**self).pixel(x, y)
    }
}

impl FrameBuffer for GrayImage {
    #[inline]
    fn width(&self) -> usize {
        GrayImage::width(self) as usize
    }

    #[inline]
    fn height(&self) -> usize {
        GrayImage::height(self) as usize
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> PixelColor {
        PixelColor::from_luma(self.get_pixel(x as u32, y as u32).0[0])
    }
}

pub trait FrameBufferMut {
    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor);
}

impl<F> FrameBufferMut for &mut F
where
    F: FrameBufferMut,
{
    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor) {
        (&mut **self).set_pixel(x, y, color);
    }
}

impl FrameBufferMut for GrayImage {
    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor) {
        if let Some(pixel) = self.get_pixel_mut_checked(x as u32, y as u32) {
            *pixel = Luma([color.luma()]);
        }
    }
}

const PIXELS_PER_BYTE: usize = 4;

#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("framebuffer address out of range: {address}")]
pub struct AddressOutOfRange {
    pub address: usize,
}

/// Robot-8 image, 160×120 cells at 2 bits each, packed 4 cells per byte.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Framebuffer {
    #[debug(skip)]
    data: Box<[u8]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    pub const SIZE_IN_BYTES: usize = NUM_PIXELS / PIXELS_PER_BYTE;

    pub fn new() -> Self {
        Self {
            data: vec![0; Self::SIZE_IN_BYTES].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn address(x: usize, y: usize) -> usize {
        y * WIDTH + x
    }

    pub fn get(&self, address: usize) -> Result<PixelColor, AddressOutOfRange> {
        if address >= NUM_PIXELS {
            return Err(AddressOutOfRange { address });
        }
        let byte = self.data[address / PIXELS_PER_BYTE];
        let shift = (address % PIXELS_PER_BYTE) * 2;
        Ok(PixelColor::from_low_bits(byte >> shift))
    }

    pub fn set(&mut self, address: usize, color: PixelColor) -> Result<(), AddressOutOfRange> {
        if address >= NUM_PIXELS {
            return Err(AddressOutOfRange { address });
        }
        let byte = &mut self.data[address / PIXELS_PER_BYTE];
        let shift = (address % PIXELS_PER_BYTE) * 2;
        *byte = (*byte & !(0b11 << shift)) | (color.get() << shift);
        Ok(())
    }

    #[inline]
    pub fn get_xy(&self, x: usize, y: usize) -> Option<PixelColor> {
        if x >= WIDTH || y >= HEIGHT {
            return None;
        }
        self.get(Self::address(x, y)).ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = PixelColor> + '_ {
        self.data.iter().flat_map(|byte| {
            (0..PIXELS_PER_BYTE).map(move |i| PixelColor::from_low_bits(byte >> (i * 2)))
        })
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| {
            let color = self.get_xy(x as usize, y as usize).unwrap_or_default();
            Luma([color.luma()])
        })
    }

    pub fn from_fn(mut f: impl FnMut(usize, usize) -> PixelColor) -> Self {
        let mut frame_buffer = Self::new();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                frame_buffer.set_pixel(x, y, f(x, y));
            }
        }
        frame_buffer
    }
}

impl FrameBuffer for Framebuffer {
    #[inline]
    fn width(&self) -> usize {
        WIDTH
    }

    #[inline]
    fn height(&self) -> usize {
        HEIGHT
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> PixelColor {
        self.get_xy(x, y).unwrap_or_default()
    }
}

impl FrameBufferMut for Framebuffer {
    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor) {
        if x < WIDTH && y < HEIGHT {
            let _ = self.set(Self::address(x, y), color);
        }
    }
}
