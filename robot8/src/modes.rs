//! VIS codes and mode descriptions
//!
//! [Vis codes][1]
//!
//! [1]: https://web.archive.org/web/20050306193820/http://www.tima.com/~djones/vis.txt

use std::fmt::Display;

/// 7-bit VIS code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VisCode(u8);

impl VisCode {
    #[inline]
    pub const fn new(value: u8) -> Option<Self> {
        if value & 0x80 == 0 {
            Some(Self(value))
        }
        else {
            None
        }
    }

    /// Keeps only the low 7 bits of `value`.
    #[inline]
    pub const fn from_low_bits(value: u8) -> Self {
        Self(value & 0x7f)
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn get_bit(&self, bit: u8) -> bool {
        assert!(bit < 7);
        (self.0 >> bit) & 1 != 0
    }

    /// Even parity over the 7 data bits, i.e. the value of the parity bit a
    /// transmitter sends.
    #[inline]
    pub fn parity(&self) -> bool {
        self.0.count_ones() & 1 != 0
    }
}

impl Display for VisCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("VIS code out of range: {0:#04x}")]
pub struct InvalidVisCode(pub u8);

impl TryFrom<u8> for VisCode {
    type Error = InvalidVisCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidVisCode(value))
    }
}

impl From<VisCode> for u8 {
    #[inline]
    fn from(value: VisCode) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mode {
    pub name: &'static str,
    pub short_name: &'static str,
    pub vis_code: VisCode,
    pub width: usize,
    pub height: usize,
    pub bits_per_pixel: u8,
}

impl Mode {
    pub const ROBOT8: Self = Self {
        name: "Robot 8",
        short_name: "R8",
        vis_code: VisCode(0x02),
        width: crate::WIDTH,
        height: crate::HEIGHT,
        bits_per_pixel: 2,
    };

    pub fn from_vis_code(vis_code: VisCode) -> Option<&'static Self> {
        BUILTIN_MODES.iter().find(|mode| mode.vis_code == vis_code)
    }
}

static BUILTIN_MODES: &[Mode] = &[Mode::ROBOT8];
