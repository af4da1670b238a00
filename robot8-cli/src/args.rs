use std::{
    path::PathBuf,
    str::FromStr,
};

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::eyre;
use robot8::{
    Framebuffer,
    Mode,
    PixelColor,
    TimingProfile,
    VisCode,
};

use crate::Error;

#[derive(Debug, Parser)]
#[clap(version, about = "Robot-8 SSTV tone encoder and tick-level decoder")]
pub struct Args {
    /// Tick timing, `real` (20 MHz) or `test` (compressed by 1000). Overrides
    /// the configuration file.
    #[clap(short, long)]
    pub timing: Option<TimingProfile>,

    /// Configuration file. Defaults to `config.toml` in the user's config
    /// directory.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the tones of a transmission to a CSV file, one tick per row.
    Encode {
        /// 7-bit VIS code, decimal or hex with `0x` prefix.
        #[clap(long, default_value_t = Mode::ROBOT8.vis_code, value_parser = parse_vis_code)]
        vis_code: VisCode,

        #[clap(short, long, default_value = "checker")]
        pattern: Pattern,

        /// Send the wrong VIS parity bit.
        #[clap(long)]
        flip_parity: bool,

        output: PathBuf,
    },

    /// Run the receiver over ticks read from a CSV file.
    ///
    /// If the file has `cal_active` and `cal_ok` columns, these replace the
    /// built-in calibration detector.
    Decode {
        input: PathBuf,

        /// Print the summary as JSON.
        #[clap(long)]
        json: bool,

        /// Save the frame buffer as PNG.
        #[clap(long)]
        image: Option<PathBuf>,
    },
}

fn parse_vis_code(s: &str) -> Result<VisCode, Error> {
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)?
    }
    else {
        s.parse()?
    };
    Ok(VisCode::try_from(value)?)
}

/// Test images for the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// 8x8 black and white squares
    Checker,
    /// Vertical bars of all 4 gray levels
    Stripes,
    /// Horizontal gray ramp
    Gradient,
}

impl Pattern {
    pub fn frame_buffer(&self) -> Framebuffer {
        match self {
            Self::Checker => {
                Framebuffer::from_fn(|x, y| {
                    if (x / 8 + y / 8) % 2 == 0 {
                        PixelColor::BLACK
                    }
                    else {
                        PixelColor::WHITE
                    }
                })
            }
            Self::Stripes => Framebuffer::from_fn(|x, _| PixelColor::from_low_bits((x / 10) as u8)),
            Self::Gradient => {
                Framebuffer::from_fn(|x, _| {
                    PixelColor::from_luma((x * 255 / (robot8::WIDTH - 1)) as u8)
                })
            }
        }
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checker" | "checkerboard" => Ok(Self::Checker),
            "stripes" => Ok(Self::Stripes),
            "gradient" => Ok(Self::Gradient),
            _ => Err(eyre!("No such pattern: {s}")),
        }
    }
}
