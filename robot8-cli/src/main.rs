pub mod args;
pub mod config;
pub mod decode;
pub mod encode;
pub mod ticks;

use clap::Parser;
use color_eyre::eyre::Error;
use tracing_subscriber::EnvFilter;

use crate::{
    args::{
        Args,
        Command,
    },
    config::Config,
    decode::DecodeSummary,
};

fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(?args);

    let config = Config::load(args.config.as_deref())?;
    let timing_profile = args.timing.unwrap_or(config.timing_profile);
    let timing = timing_profile.timing();
    tracing::debug!(%timing_profile, ?timing);

    match args.command {
        Command::Encode {
            vis_code,
            pattern,
            flip_parity,
            output,
        } => {
            let ticks = encode::encode_to_path(
                &output,
                timing,
                pattern.frame_buffer(),
                vis_code,
                flip_parity,
            )?;
            tracing::info!(ticks, output = %output.display(), "transmission written");
        }
        Command::Decode { input, json, image } => {
            let (summary, frame_buffer) = decode::decode_path(&input, timing)?;

            if let Some(image) = image {
                tracing::debug!(path = %image.display(), "writing decoded image");
                frame_buffer.to_gray_image().save(&image)?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            else {
                print_summary(&summary);
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &DecodeSummary) {
    println!("ticks:            {}", summary.ticks);
    match summary.vis_code {
        Some(vis_code) => {
            println!(
                "VIS code:         {vis_code:#04x} ({})",
                summary.mode.unwrap_or("unknown mode")
            )
        }
        None => println!("VIS code:         none"),
    }
    println!("frames completed: {}", summary.frames_completed);
    println!("pixels written:   {}", summary.pixels_written);
}
